//! Outbound message log
//!
//! Every dispatch attempt leaves exactly one row here; the status column,
//! not the row's existence, carries the outcome.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use super::instance::parse_datetime;
use crate::{Error, Result};

/// Declared message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
}

impl MessageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
        }
    }

    /// Parse a declared kind from its wire form
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMessageType` for anything outside the known set
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "document" => Ok(Self::Document),
            other => Err(Error::UnsupportedMessageType(other.to_string())),
        }
    }

    /// Whether this kind carries a media payload
    #[must_use]
    pub const fn is_media(self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// Outcome of a dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundStatus {
    Sent,
    Failed,
}

impl OutboundStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One attempted send
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub id: String,
    pub conversation_id: String,
    pub instance_id: String,
    pub kind: MessageKind,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub status: OutboundStatus,
    pub provider_message_id: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for recording a dispatch attempt
#[derive(Debug)]
pub struct NewOutboundMessage<'a> {
    pub conversation_id: &'a str,
    pub instance_id: &'a str,
    pub kind: MessageKind,
    pub body: Option<&'a str>,
    pub media_url: Option<&'a str>,
    pub status: OutboundStatus,
    pub provider_message_id: Option<&'a str>,
    pub error_detail: Option<&'a str>,
}

/// Outbound message repository
#[derive(Clone)]
pub struct OutboundMessageRepo {
    pool: DbPool,
}

const COLUMNS: &str = "id, conversation_id, instance_id, kind, body, media_url, status, \
                       provider_message_id, error_detail, created_at";

impl OutboundMessageRepo {
    /// Create a new outbound message repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a dispatch attempt
    ///
    /// Rows are append-only; nothing in this core mutates them afterward.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn record(&self, new: &NewOutboundMessage<'_>) -> Result<OutboundMessage> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO outbound_messages (id, conversation_id, instance_id, kind, body,
                                            media_url, status, provider_message_id,
                                            error_detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                &id,
                new.conversation_id,
                new.instance_id,
                new.kind.as_str(),
                new.body,
                new.media_url,
                new.status.as_str(),
                new.provider_message_id,
                new.error_detail,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(OutboundMessage {
            id,
            conversation_id: new.conversation_id.to_string(),
            instance_id: new.instance_id.to_string(),
            kind: new.kind,
            body: new.body.map(String::from),
            media_url: new.media_url.map(String::from),
            status: new.status,
            provider_message_id: new.provider_message_id.map(String::from),
            error_detail: new.error_detail.map(String::from),
            created_at: now,
        })
    }

    /// List the message log for a conversation, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_conversation(&self, conversation_id: &str) -> Result<Vec<OutboundMessage>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM outbound_messages
                 WHERE conversation_id = ?1 ORDER BY created_at"
            ))
            .map_err(|e| Error::Database(e.to_string()))?;

        let messages = stmt
            .query_map([conversation_id], row_to_message)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboundMessage> {
    Ok(OutboundMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        instance_id: row.get(2)?,
        kind: MessageKind::parse(&row.get::<_, String>(3)?).unwrap_or(MessageKind::Text),
        body: row.get(4)?,
        media_url: row.get(5)?,
        status: OutboundStatus::from_str(&row.get::<_, String>(6)?)
            .unwrap_or(OutboundStatus::Failed),
        provider_message_id: row.get(7)?,
        error_detail: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}
