//! Raw provider API calls over HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CreateSessionRequest, ProviderApi, SendCandidate, SessionCreated, SessionStatus};
use crate::config::ProviderConfig;
use crate::{Error, Result};

/// HTTP implementation of the provider boundary
pub struct HttpProvider {
    base_url: String,
    admin_token: String,
    client: Client,
}

/// QR payload field as it appears in both the qr-code and connect responses
#[derive(Debug, Deserialize)]
struct QrResponse {
    #[serde(alias = "qrcode", alias = "qr")]
    qr_code: Option<String>,
}

impl HttpProvider {
    /// Create a new HTTP provider client from injected configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            admin_token: config.admin_token.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map a transport error, surfacing timeouts distinctly
    fn transport_error(context: &str, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ProviderTimeout(format!("{context}: {e}"))
        } else {
            Error::ProviderUnavailable(format!("{context}: {e}"))
        }
    }

    /// Map a non-success response, attaching a re-pairing hint when the
    /// provider indicates the session itself is gone
    async fn response_error(context: &str, response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_lower = body.to_lowercase();

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
            || body_lower.contains("session not found")
            || body_lower.contains("invalid token")
        {
            return Error::InvalidCredentials(format!(
                "{context}: {status} - {body} (session needs re-pairing)"
            ));
        }

        Error::ProviderUnavailable(format!("{context}: {status} - {body}"))
    }
}

#[async_trait]
impl ProviderApi for HttpProvider {
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<SessionCreated> {
        let response = self
            .client
            .post(self.url("/api/sessions"))
            .header("Client-Token", &self.admin_token)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::transport_error("create session", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("create session", response).await);
        }

        let created: SessionCreated = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("create session response: {e}")))?;

        tracing::info!(session_id = %created.session_id, "provider session created");
        Ok(created)
    }

    async fn fetch_qr(&self, session_id: &str, token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.url(&format!("/api/sessions/{session_id}/qr-code")))
            .header("Client-Token", token)
            .send()
            .await
            .map_err(|e| Self::transport_error("fetch qr", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("fetch qr", response).await);
        }

        let parsed: QrResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("qr response: {e}")))?;

        Ok(parsed.qr_code.filter(|qr| !qr.is_empty()))
    }

    async fn connect_session(&self, session_id: &str, token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(self.url(&format!("/api/sessions/{session_id}/connect")))
            .header("Client-Token", token)
            .send()
            .await
            .map_err(|e| Self::transport_error("connect session", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("connect session", response).await);
        }

        let parsed: QrResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("connect response: {e}")))?;

        Ok(parsed.qr_code.filter(|qr| !qr.is_empty()))
    }

    async fn session_status(&self, token: &str) -> Result<SessionStatus> {
        let response = self
            .client
            .get(self.url("/api/sessions/status"))
            .header("Client-Token", token)
            .send()
            .await
            .map_err(|e| Self::transport_error("session status", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("session status", response).await);
        }

        let status: SessionStatus = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("status response: {e}")))?;

        Ok(status)
    }

    async fn disconnect_session(&self, session_id: &str, token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/sessions/{session_id}/disconnect")))
            .header("Client-Token", token)
            .send()
            .await
            .map_err(|e| Self::transport_error("disconnect session", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("disconnect session", response).await);
        }

        tracing::debug!(session_id, "provider session disconnected");
        Ok(())
    }

    async fn execute_send(
        &self,
        token: &str,
        candidate: &SendCandidate,
    ) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(self.url(candidate.path))
            .header("Client-Token", token)
            .json(&candidate.body)
            .send()
            .await
            .map_err(|e| Self::transport_error(candidate.label, &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error(candidate.label, response).await);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("{}: {e}", candidate.label)))?;

        // Some provider shapes report failure inside a 200 body
        if body.get("error").is_some_and(|e| !e.is_null()) {
            return Err(Error::ProviderUnavailable(format!(
                "{}: {}",
                candidate.label,
                body.get("error").map(ToString::to_string).unwrap_or_default()
            )));
        }

        Ok(body)
    }
}
