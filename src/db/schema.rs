//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- One organization's connection to the messaging provider
        CREATE TABLE IF NOT EXISTS instances (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            label TEXT NOT NULL,
            phone_number TEXT,
            provider_session_id TEXT,
            provider_token TEXT,
            status TEXT NOT NULL DEFAULT 'uninitialized'
                CHECK(status IN ('uninitialized', 'pending', 'waiting_qr', 'connected',
                                 'disconnected', 'error', 'canceled', 'logged_out')),
            is_connected INTEGER NOT NULL DEFAULT 0,
            qr_code TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_instances_org ON instances(organization_id);

        -- A thread with one external contact, bound to one instance
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            instance_id TEXT REFERENCES instances(id),
            contact_id TEXT,
            display_number TEXT,
            last_activity_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_org ON conversations(organization_id);
        CREATE INDEX IF NOT EXISTS idx_conversations_instance ON conversations(instance_id);

        -- Message log: one row per attempted send
        CREATE TABLE IF NOT EXISTS outbound_messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            instance_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('text', 'image', 'audio', 'video', 'document')),
            body TEXT,
            media_url TEXT,
            status TEXT NOT NULL CHECK(status IN ('sent', 'failed')),
            provider_message_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_outbound_conversation ON outbound_messages(conversation_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Unread counter for the conversation list view
        ALTER TABLE conversations ADD COLUMN unread_count INTEGER NOT NULL DEFAULT 0;

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2 (unread counter)");
    Ok(())
}

fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Keep the last failure detail next to the failed row
        ALTER TABLE outbound_messages ADD COLUMN error_detail TEXT;

        PRAGMA user_version = 3;
        ",
    )?;

    tracing::info!("migrated to schema v3 (dispatch error detail)");
    Ok(())
}
