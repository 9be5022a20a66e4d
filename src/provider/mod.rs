//! Messaging provider boundary
//!
//! The provider is an opaque HTTP request/response surface. Everything the
//! gateway needs from it goes through [`ProviderApi`], so the session
//! manager and dispatcher never care whether they talk to the real service
//! or a test double.

mod http;

pub use http::HttpProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Request to create a provider session for one instance
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    /// Webhook URL the provider will deliver inbound events to
    pub webhook_url: String,
    /// Human-readable session label
    pub name: String,
    /// Destination phone/account number the session will bind to
    pub phone_number: String,
}

/// Provider response to session creation
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreated {
    /// Provider-assigned session identifier
    pub session_id: String,
    /// Provider-assigned access credential for this session
    pub token: String,
}

/// Provider-reported session status
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatus {
    pub connected: bool,
    /// Number the session is bound to, once known
    pub phone_number: Option<String>,
}

/// One candidate request shape in the dispatch cascade
#[derive(Debug, Clone)]
pub struct SendCandidate {
    /// Short name for logs and error details
    pub label: &'static str,
    /// Path relative to the provider base URL
    pub path: &'static str,
    /// JSON request body
    pub body: serde_json::Value,
}

/// Operations the gateway performs against the messaging provider
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Create a session, registering the webhook URL
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<SessionCreated>;

    /// Fetch the pairing QR payload, when one is available
    async fn fetch_qr(&self, session_id: &str, token: &str) -> Result<Option<String>>;

    /// Initialize the session; may return a QR payload embedded in the
    /// response
    async fn connect_session(&self, session_id: &str, token: &str) -> Result<Option<String>>;

    /// Poll the session's connection state
    async fn session_status(&self, token: &str) -> Result<SessionStatus>;

    /// Tear down the session on the provider side
    async fn disconnect_session(&self, session_id: &str, token: &str) -> Result<()>;

    /// Execute one candidate send request, returning the raw response body
    async fn execute_send(&self, token: &str, candidate: &SendCandidate)
        -> Result<serde_json::Value>;
}
