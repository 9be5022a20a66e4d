//! Shared test utilities

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_gateway::db::{self, Conversation, ConversationRepo, DbPool, Instance, InstanceRepo};
use courier_gateway::provider::{
    CreateSessionRequest, ProviderApi, SendCandidate, SessionCreated, SessionStatus,
};
use courier_gateway::{Error, Result};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Create an instance holding provider credentials, marked connected
pub fn create_connected_instance(db: &DbPool) -> Instance {
    let repo = InstanceRepo::new(db.clone());
    let instance = repo
        .create("org-1", "Test line", Some("5511999998888"))
        .expect("failed to create test instance");
    repo.set_provider_session(&instance.id, "sess-test", "tok-test")
        .expect("failed to set session");
    repo.mark_connected(&instance.id, Some("5511999998888"))
        .expect("failed to mark connected");
    repo.find_required(&instance.id).expect("instance vanished")
}

/// Create a conversation bound to the given instance
pub fn create_test_conversation(db: &DbPool, instance_id: Option<&str>) -> Conversation {
    let repo = ConversationRepo::new(db.clone());
    repo.create(
        "org-1",
        instance_id,
        Some("5511999998888@c.us"),
        Some("(11) 99999-8888"),
    )
    .expect("failed to create test conversation")
}

/// One scripted provider reply
pub enum Reply {
    Body(serde_json::Value),
    Fail(&'static str),
    Timeout,
}

impl Reply {
    fn into_result(self, context: &str) -> Result<serde_json::Value> {
        match self {
            Self::Body(body) => Ok(body),
            Self::Fail(message) => Err(Error::ProviderUnavailable(format!("{context}: {message}"))),
            Self::Timeout => Err(Error::ProviderTimeout(format!("{context}: timed out"))),
        }
    }
}

/// Mock provider with scripted replies and a call log
pub struct MockProvider {
    /// Replies for `execute_send`, popped in order; exhausted script fails
    pub send_script: Mutex<VecDeque<Reply>>,
    /// Candidate labels `execute_send` was called with, in order
    pub send_calls: Mutex<Vec<&'static str>>,
    /// Reply for `fetch_qr`
    pub qr_reply: Mutex<Option<Reply>>,
    /// QR payload embedded in the `connect_session` response
    pub connect_qr: Mutex<Option<String>>,
    /// Reply for `session_status`
    pub status_reply: Mutex<Option<Reply>>,
    /// Whether `disconnect_session` times out
    pub disconnect_times_out: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            send_script: Mutex::new(VecDeque::new()),
            send_calls: Mutex::new(Vec::new()),
            qr_reply: Mutex::new(None),
            connect_qr: Mutex::new(None),
            status_reply: Mutex::new(None),
            disconnect_times_out: false,
        }
    }
}

impl MockProvider {
    pub async fn script_sends(&self, replies: Vec<Reply>) {
        *self.send_script.lock().await = replies.into();
    }

    pub async fn sent_labels(&self) -> Vec<&'static str> {
        self.send_calls.lock().await.clone()
    }
}

#[async_trait]
impl ProviderApi for MockProvider {
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<SessionCreated> {
        assert!(!request.webhook_url.is_empty());
        Ok(SessionCreated {
            session_id: "sess-created".to_string(),
            token: "tok-created".to_string(),
        })
    }

    async fn fetch_qr(&self, _session_id: &str, _token: &str) -> Result<Option<String>> {
        match self.qr_reply.lock().await.take() {
            Some(Reply::Body(body)) => Ok(body.as_str().map(String::from)),
            Some(Reply::Fail(message)) => {
                Err(Error::ProviderUnavailable(format!("fetch qr: {message}")))
            }
            Some(Reply::Timeout) => Err(Error::ProviderTimeout("fetch qr: timed out".to_string())),
            None => Ok(None),
        }
    }

    async fn connect_session(&self, _session_id: &str, _token: &str) -> Result<Option<String>> {
        Ok(self.connect_qr.lock().await.clone())
    }

    async fn session_status(&self, _token: &str) -> Result<SessionStatus> {
        match self.status_reply.lock().await.take() {
            Some(Reply::Body(body)) => Ok(SessionStatus {
                connected: body["connected"].as_bool().unwrap_or(false),
                phone_number: body["phone_number"].as_str().map(String::from),
            }),
            Some(Reply::Fail(message)) => Err(Error::ProviderUnavailable(format!(
                "session status: {message}"
            ))),
            Some(Reply::Timeout) => {
                Err(Error::ProviderTimeout("session status: timed out".to_string()))
            }
            None => Ok(SessionStatus {
                connected: false,
                phone_number: None,
            }),
        }
    }

    async fn disconnect_session(&self, _session_id: &str, _token: &str) -> Result<()> {
        if self.disconnect_times_out {
            return Err(Error::ProviderTimeout("disconnect: timed out".to_string()));
        }
        Ok(())
    }

    async fn execute_send(
        &self,
        _token: &str,
        candidate: &SendCandidate,
    ) -> Result<serde_json::Value> {
        self.send_calls.lock().await.push(candidate.label);
        match self.send_script.lock().await.pop_front() {
            Some(reply) => reply.into_result(candidate.label),
            None => Err(Error::ProviderUnavailable(format!(
                "{}: unscripted call",
                candidate.label
            ))),
        }
    }
}
