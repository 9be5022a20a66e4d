//! Outbound message API endpoints
//!
//! - POST /api/messages - dispatch one message into a conversation
//! - GET /api/conversations/{id}/messages - read the outbound log

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiState, ErrorBody, error_response};
use crate::db::{MessageKind, OutboundMessage};
use crate::dispatch::SendRequest;
use crate::media::MediaSource;
use crate::Error;

/// Request body for sending a message
#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub conversation_id: String,
    /// One of: text, image, audio, video, document
    pub kind: String,
    /// Message text, or caption for media kinds
    pub text: Option<String>,
    /// Already-hosted media URL
    pub media_url: Option<String>,
    /// Inline base64 payload, bare or as a `data:` URI
    pub media_base64: Option<String>,
    /// MIME type of the inline payload
    pub media_mime_type: Option<String>,
}

/// Outcome of a send request
///
/// Returned with 200 whenever a row was persisted, sent or failed; the
/// `sent` flag carries the outcome.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub sent: bool,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of the outbound log
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub instance_id: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: String,
}

impl From<OutboundMessage> for MessageView {
    fn from(message: OutboundMessage) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            instance_id: message.instance_id,
            kind: message.kind.as_str(),
            body: message.body,
            media_url: message.media_url,
            status: message.status.as_str(),
            provider_message_id: message.provider_message_id,
            error_detail: message.error_detail,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

fn media_source(body: &SendMessageBody) -> crate::Result<Option<MediaSource>> {
    if let Some(url) = body.media_url.clone().filter(|u| !u.is_empty()) {
        return Ok(Some(MediaSource::Url(url)));
    }

    match body.media_base64.clone().filter(|d| !d.is_empty()) {
        Some(data) => {
            let mime_type = body
                .media_mime_type
                .clone()
                .filter(|m| !m.is_empty())
                .ok_or_else(|| {
                    Error::MediaRequired("inline media needs media_mime_type".to_string())
                })?;
            Ok(Some(MediaSource::Inline { mime_type, data }))
        }
        None => Ok(None),
    }
}

/// Dispatch one message
async fn send_message(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<SendResponse>, (StatusCode, Json<ErrorBody>)> {
    let kind = MessageKind::parse(&body.kind).map_err(|e| error_response(&e))?;
    let media = media_source(&body).map_err(|e| error_response(&e))?;

    let outcome = state
        .dispatcher
        .send(SendRequest {
            conversation_id: body.conversation_id,
            kind,
            text: body.text,
            media,
        })
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(SendResponse {
        sent: outcome.sent,
        message_id: outcome.message.id,
        provider_message_id: outcome.message.provider_message_id,
        error: outcome.error,
    }))
}

/// Read the outbound log for a conversation, oldest first
async fn list_messages(
    State(state): State<Arc<ApiState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<MessageView>>, (StatusCode, Json<ErrorBody>)> {
    // 404 for unknown conversations, empty list for known-but-quiet ones
    state
        .conversations
        .find_required(&conversation_id)
        .map_err(|e| error_response(&e))?;

    let messages = state
        .outbound
        .list_for_conversation(&conversation_id)
        .map_err(|e| error_response(&e))?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// Build messages router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/messages", post(send_message))
        .route(
            "/api/conversations/{conversation_id}/messages",
            get(list_messages),
        )
        .with_state(state)
}
