//! HTTP API server for the courier gateway

pub mod health;
pub mod instances;
pub mod media_files;
pub mod messages;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Error;
use crate::Result;
use crate::db::{ConversationRepo, InstanceRepo, OutboundMessageRepo};
use crate::dispatch::Dispatcher;
use crate::media::LocalBlobStore;
use crate::session::SessionManager;

/// Shared state for API handlers
pub struct ApiState {
    pub sessions: SessionManager,
    pub dispatcher: Dispatcher,
    pub instances: InstanceRepo,
    pub conversations: ConversationRepo,
    pub outbound: OutboundMessageRepo,
    pub blobs: Arc<LocalBlobStore>,
}

/// Error payload returned by all endpoints
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Map a domain error to an HTTP response
pub(crate) fn error_response(e: &Error) -> (StatusCode, Json<ErrorBody>) {
    let status = match e {
        Error::InstanceNotFound(_) | Error::ConversationNotFound(_) => StatusCode::NOT_FOUND,
        Error::UnsupportedMessageType(_)
        | Error::MediaRequired(_)
        | Error::MissingPhoneNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::SessionNotConnected(_) | Error::InvalidCredentials(_) => StatusCode::CONFLICT,
        Error::ProviderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::ProviderUnavailable(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

/// Build the full API router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(instances::router(Arc::clone(&state)))
        .merge(messages::router(Arc::clone(&state)))
        .merge(media_files::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind and serve the API until shutdown
///
/// # Errors
///
/// Returns error if the port cannot be bound or the server fails
pub async fn serve(state: Arc<ApiState>, port: u16) -> Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "api server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
