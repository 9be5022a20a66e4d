//! Outbound message dispatch
//!
//! One send request produces exactly one persisted outbound row, sent or
//! failed. The dispatcher resolves the conversation's binding, stages any
//! media, then walks the candidate cascade until one shape succeeds.

mod candidates;
mod phone;

pub use candidates::{build_candidates, extract_message_id};
pub use phone::normalize_destination;

use std::sync::Arc;

use crate::binding::ConversationBinding;
use crate::db::{
    ConversationRepo, InstanceRepo, MessageKind, NewOutboundMessage, OutboundMessage,
    OutboundMessageRepo, OutboundStatus,
};
use crate::media::{MediaIngestor, MediaSource};
use crate::provider::ProviderApi;
use crate::{Error, Result};

/// One request to send a message into a conversation
#[derive(Debug)]
pub struct SendRequest {
    pub conversation_id: String,
    pub kind: MessageKind,
    /// Message text, or caption for media kinds
    pub text: Option<String>,
    pub media: Option<MediaSource>,
}

/// Result of a dispatch: the persisted row plus the outcome split out
#[derive(Debug)]
pub struct SendOutcome {
    pub message: OutboundMessage,
    pub sent: bool,
    /// Present when `sent` is false
    pub error: Option<String>,
}

/// Outbound dispatcher
pub struct Dispatcher {
    provider: Arc<dyn ProviderApi>,
    ingestor: MediaIngestor,
    instances: InstanceRepo,
    conversations: ConversationRepo,
    outbound: OutboundMessageRepo,
    country_code: String,
}

impl Dispatcher {
    /// Create a dispatcher over the given provider and repositories
    #[must_use]
    pub fn new(
        provider: Arc<dyn ProviderApi>,
        ingestor: MediaIngestor,
        instances: InstanceRepo,
        conversations: ConversationRepo,
        outbound: OutboundMessageRepo,
        country_code: String,
    ) -> Self {
        Self {
            provider,
            ingestor,
            instances,
            conversations,
            outbound,
            country_code,
        }
    }

    /// Dispatch one send request
    ///
    /// Provider and precondition failures are reported inside the returned
    /// outcome, with a failed row already persisted. The error path proper
    /// is reserved for cases where no row can exist: unknown conversation
    /// or instance, or a database failure.
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound`, `InstanceNotFound`, or a database
    /// error
    pub async fn send(&self, request: SendRequest) -> Result<SendOutcome> {
        let conversation = self.conversations.find_required(&request.conversation_id)?;

        // Binding failures have no instance id to attribute a row to
        let binding = ConversationBinding::resolve(&conversation, &self.country_code)?;

        let instance = self.instances.find_required(&binding.instance_id)?;

        let precondition = if !instance.is_connected {
            Some(Error::SessionNotConnected(instance.id.clone()))
        } else if instance.provider_token.is_none() {
            Some(Error::InvalidCredentials(format!(
                "instance {} has no provider token",
                instance.id
            )))
        } else if request.kind.is_media() && request.media.is_none() {
            Some(Error::MediaRequired(request.kind.as_str().to_string()))
        } else {
            None
        };

        if let Some(e) = precondition {
            return self.persist_failed(&request, &conversation.id, &instance.id, None, &e);
        }

        // Stage media before touching the provider; a failed upload still
        // leaves a failed row
        let media_url = match request.media.clone() {
            Some(source) => {
                match self
                    .ingestor
                    .resolve(
                        &conversation.organization_id,
                        &conversation.id,
                        request.kind,
                        source,
                    )
                    .await
                {
                    Ok(url) => Some(url),
                    Err(e) => {
                        return self.persist_failed(
                            &request,
                            &conversation.id,
                            &instance.id,
                            None,
                            &e,
                        );
                    }
                }
            }
            None => None,
        };

        let token = instance.provider_token.as_deref().unwrap_or_default();
        let candidates = build_candidates(
            request.kind,
            &binding.destination,
            request.text.as_deref(),
            media_url.as_deref(),
        );

        let mut last_error: Option<String> = None;
        for candidate in &candidates {
            match self.provider.execute_send(token, candidate).await {
                Ok(body) => {
                    let provider_message_id = extract_message_id(&body);
                    tracing::info!(
                        conversation_id = %conversation.id,
                        instance_id = %instance.id,
                        shape = candidate.label,
                        provider_message_id = provider_message_id.as_deref().unwrap_or(""),
                        "message sent"
                    );

                    let message = self.outbound.record(&NewOutboundMessage {
                        conversation_id: &conversation.id,
                        instance_id: &instance.id,
                        kind: request.kind,
                        body: request.text.as_deref(),
                        media_url: media_url.as_deref(),
                        status: OutboundStatus::Sent,
                        provider_message_id: provider_message_id.as_deref(),
                        error_detail: None,
                    })?;
                    self.conversations.record_outbound_activity(&conversation.id)?;

                    return Ok(SendOutcome {
                        message,
                        sent: true,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %conversation.id,
                        shape = candidate.label,
                        error = %e,
                        "send candidate failed, trying next"
                    );
                    last_error = Some(format!("{}: {e}", candidate.label));
                }
            }
        }

        let detail = last_error.unwrap_or_else(|| "no send candidates".to_string());
        tracing::warn!(
            conversation_id = %conversation.id,
            instance_id = %instance.id,
            error = %detail,
            "all send candidates failed"
        );

        let message = self.outbound.record(&NewOutboundMessage {
            conversation_id: &conversation.id,
            instance_id: &instance.id,
            kind: request.kind,
            body: request.text.as_deref(),
            media_url: media_url.as_deref(),
            status: OutboundStatus::Failed,
            provider_message_id: None,
            error_detail: Some(&detail),
        })?;
        self.conversations.record_outbound_activity(&conversation.id)?;

        Ok(SendOutcome {
            message,
            sent: false,
            error: Some(detail),
        })
    }

    fn persist_failed(
        &self,
        request: &SendRequest,
        conversation_id: &str,
        instance_id: &str,
        media_url: Option<&str>,
        error: &Error,
    ) -> Result<SendOutcome> {
        let detail = error.to_string();
        tracing::warn!(conversation_id, instance_id, error = %detail, "dispatch rejected");

        let message = self.outbound.record(&NewOutboundMessage {
            conversation_id,
            instance_id,
            kind: request.kind,
            body: request.text.as_deref(),
            media_url,
            status: OutboundStatus::Failed,
            provider_message_id: None,
            error_detail: Some(&detail),
        })?;
        self.conversations.record_outbound_activity(conversation_id)?;

        Ok(SendOutcome {
            message,
            sent: false,
            error: Some(detail),
        })
    }
}
