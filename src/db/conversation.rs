//! Conversation repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use super::instance::parse_datetime;
use crate::{Error, Result};

/// A logical thread with one external contact, bound to one instance
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub organization_id: String,
    /// Instance currently used for sending
    pub instance_id: Option<String>,
    /// Stable provider-assigned destination identifier
    pub contact_id: Option<String>,
    /// Display phone number; a fallback destination only
    pub display_number: Option<String>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Conversation repository
#[derive(Clone)]
pub struct ConversationRepo {
    pool: DbPool,
}

const COLUMNS: &str = "id, organization_id, instance_id, contact_id, display_number, \
                       last_activity_at, unread_count, created_at";

impl ConversationRepo {
    /// Create a new conversation repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a conversation bound to an instance
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(
        &self,
        organization_id: &str,
        instance_id: Option<&str>,
        contact_id: Option<&str>,
        display_number: Option<&str>,
    ) -> Result<Conversation> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO conversations (id, organization_id, instance_id, contact_id,
                                        display_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![&id, organization_id, instance_id, contact_id, display_number, &now],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        // Release the pooled connection before find_required re-acquires one;
        // holding it would deadlock a single-connection pool.
        drop(conn);

        self.find_required(&id)
    }

    /// Find a conversation by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let conversation = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
                [id],
                row_to_conversation,
            )
            .ok();

        Ok(conversation)
    }

    /// Find a conversation by id, failing when it does not exist
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` if the row is missing
    pub fn find_required(&self, id: &str) -> Result<Conversation> {
        self.find(id)?
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))
    }

    /// Rebind a conversation to a different instance
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set_instance(&self, id: &str, instance_id: &str) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE conversations SET instance_id = ?1 WHERE id = ?2",
            [instance_id, id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Refresh the conversation summary after an outbound attempt
    ///
    /// An agent reply marks the thread as handled: the unread counter resets
    /// and the activity timestamp moves, whether or not the provider call
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn record_outbound_activity(&self, id: &str) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE conversations SET last_activity_at = ?1, unread_count = 0 WHERE id = ?2",
            rusqlite::params![Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        instance_id: row.get(2)?,
        contact_id: row.get(3)?,
        display_number: row.get(4)?,
        last_activity_at: row
            .get::<_, Option<String>>(5)?
            .map(|s| parse_datetime(&s)),
        unread_count: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> ConversationRepo {
        ConversationRepo::new(init_memory().unwrap())
    }

    #[test]
    fn test_create_and_find() {
        let repo = setup();

        let conversation = repo
            .create("org-1", None, Some("5511999998888@c.us"), Some("+55 11 99999-8888"))
            .unwrap();

        assert_eq!(conversation.organization_id, "org-1");
        assert!(conversation.last_activity_at.is_none());
        assert_eq!(conversation.unread_count, 0);
    }

    #[test]
    fn test_outbound_activity_resets_unread() {
        let repo = setup();
        let conversation = repo.create("org-1", None, None, Some("11999998888")).unwrap();

        {
            let conn = repo.pool.get().unwrap();
            conn.execute(
                "UPDATE conversations SET unread_count = 4 WHERE id = ?1",
                [&conversation.id],
            )
            .unwrap();
        }

        repo.record_outbound_activity(&conversation.id).unwrap();

        let updated = repo.find_required(&conversation.id).unwrap();
        assert_eq!(updated.unread_count, 0);
        assert!(updated.last_activity_at.is_some());
    }

    #[test]
    fn test_rebind_instance() {
        let repo = setup();
        let conversation = repo.create("org-1", None, None, None).unwrap();

        repo.set_instance(&conversation.id, "instance-2").unwrap();

        let updated = repo.find_required(&conversation.id).unwrap();
        assert_eq!(updated.instance_id.as_deref(), Some("instance-2"));
    }
}
