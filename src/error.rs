//! Error types for the Courier gateway

use thiserror::Error;

/// Result type alias for Courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Courier gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider transport failure or 5xx response
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider call exceeded the configured per-request timeout
    #[error("provider timed out: {0}")]
    ProviderTimeout(String),

    /// Provider rejected the instance credential; the session is likely gone
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Local precondition: the instance is not connected
    #[error("session not connected: {0}")]
    SessionNotConnected(String),

    /// QR payload not available yet; the caller may re-poll
    #[error("pairing not ready: {0}")]
    PairingNotReady(String),

    /// Instance has no destination phone number
    #[error("missing phone number: {0}")]
    MissingPhoneNumber(String),

    /// Media-bearing message kind without a resolved media URL
    #[error("media required: {0}")]
    MediaRequired(String),

    /// Blob upload or URL issuance failed; dispatch must not proceed
    #[error("media upload failed: {0}")]
    MediaUploadFailed(String),

    /// Declared message kind is not in the known set
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    /// Instance row not found
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// Conversation row not found
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
