//! Provider session lifecycle
//!
//! Drives an instance through create, QR pairing, status polling, and
//! disconnect. Provider-side state is authoritative for connectivity;
//! local rows mirror it.

use std::sync::Arc;

use crate::db::{Instance, InstanceRepo, InstanceStatus};
use crate::provider::{CreateSessionRequest, ProviderApi};
use crate::{Error, Result};

/// Session lifecycle coordinator
pub struct SessionManager {
    provider: Arc<dyn ProviderApi>,
    instances: InstanceRepo,
    webhook_base_url: String,
}

/// Result of a pairing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingState {
    pub status: InstanceStatus,
    /// QR payload to render, when one is available
    pub qr_code: Option<String>,
}

impl SessionManager {
    /// Create a new session manager
    #[must_use]
    pub fn new(
        provider: Arc<dyn ProviderApi>,
        instances: InstanceRepo,
        webhook_base_url: &str,
    ) -> Self {
        Self {
            provider,
            instances,
            webhook_base_url: webhook_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create the provider session for an instance
    ///
    /// Idempotent: an instance that already holds credentials keeps them,
    /// and the existing session id is returned.
    ///
    /// # Errors
    ///
    /// Returns `MissingPhoneNumber` if the instance has no number to bind,
    /// `InstanceNotFound`, or a provider/database error
    pub async fn create(&self, instance_id: &str) -> Result<String> {
        let instance = self.instances.find_required(instance_id)?;

        if instance.has_credentials() {
            tracing::debug!(instance_id, "session already provisioned");
            // has_credentials guarantees the id is present
            return Ok(instance.provider_session_id.unwrap_or_default());
        }

        let phone_number = instance
            .phone_number
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::MissingPhoneNumber(instance_id.to_string()))?;

        let created = self
            .provider
            .create_session(&CreateSessionRequest {
                webhook_url: format!("{}/webhooks/provider/{instance_id}", self.webhook_base_url),
                name: instance.label.clone(),
                phone_number,
            })
            .await?;

        self.instances
            .set_provider_session(instance_id, &created.session_id, &created.token)?;

        tracing::info!(instance_id, session_id = %created.session_id, "session provisioned");
        Ok(created.session_id)
    }

    /// Drive the instance toward a scannable QR payload
    ///
    /// Tries the dedicated QR endpoint first; when that yields nothing,
    /// falls back to initializing the session, which may embed a QR in its
    /// response. When neither path produces a payload the instance keeps
    /// its current status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the instance was never provisioned,
    /// `PairingNotReady` when no QR payload is obtainable yet
    pub async fn pair(&self, instance_id: &str) -> Result<PairingState> {
        let instance = self.instances.find_required(instance_id)?;
        let (session_id, token) = credentials(&instance)?;

        if instance.is_connected {
            return Ok(PairingState {
                status: InstanceStatus::Connected,
                qr_code: None,
            });
        }

        let qr = match self.provider.fetch_qr(&session_id, &token).await {
            Ok(qr) => qr,
            Err(e) => {
                tracing::warn!(instance_id, error = %e, "qr fetch failed, initializing session");
                None
            }
        };

        let qr = match qr {
            Some(qr) => Some(qr),
            None => self.provider.connect_session(&session_id, &token).await?,
        };

        match qr {
            Some(qr) => {
                self.instances.set_qr_code(instance_id, &qr)?;
                tracing::info!(instance_id, "qr payload ready");
                Ok(PairingState {
                    status: InstanceStatus::WaitingQr,
                    qr_code: Some(qr),
                })
            }
            // Not an adverse state: the provider may just not have
            // generated the payload yet
            None => Err(Error::PairingNotReady(instance_id.to_string())),
        }
    }

    /// Reconcile local state with the provider's reported connectivity
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the instance was never provisioned,
    /// or a provider/database error
    pub async fn check_connection(&self, instance_id: &str) -> Result<Instance> {
        let instance = self.instances.find_required(instance_id)?;
        let (_, token) = credentials(&instance)?;

        let status = self.provider.session_status(&token).await?;

        if status.connected {
            self.instances
                .mark_connected(instance_id, status.phone_number.as_deref())?;
            tracing::info!(instance_id, "session connected");
        } else if instance.is_connected {
            // Provider dropped the session underneath us
            self.instances
                .mark_disconnected(instance_id, InstanceStatus::Disconnected)?;
            tracing::warn!(instance_id, "session no longer connected at provider");
        }

        self.instances.find_required(instance_id)
    }

    /// Disconnect an instance
    ///
    /// The provider call is best-effort: the local row always ends up
    /// disconnected, even when the provider is unreachable.
    ///
    /// # Errors
    ///
    /// Returns `InstanceNotFound` or a database error
    pub async fn disconnect(&self, instance_id: &str) -> Result<()> {
        let instance = self.instances.find_required(instance_id)?;

        if let Ok((session_id, token)) = credentials(&instance) {
            if let Err(e) = self.provider.disconnect_session(&session_id, &token).await {
                tracing::warn!(instance_id, error = %e, "provider disconnect failed");
            }
        }

        self.instances
            .mark_disconnected(instance_id, InstanceStatus::Disconnected)?;
        tracing::info!(instance_id, "instance disconnected");
        Ok(())
    }
}

fn credentials(instance: &Instance) -> Result<(String, String)> {
    match (&instance.provider_session_id, &instance.provider_token) {
        (Some(session_id), Some(token)) => Ok((session_id.clone(), token.clone())),
        _ => Err(Error::InvalidCredentials(format!(
            "instance {} has no provider session",
            instance.id
        ))),
    }
}
