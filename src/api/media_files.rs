//! Signed media serving
//!
//! Serves stored blobs back to the provider (or a browser) at the URLs the
//! ingestion pipeline signs. Requests with a missing, wrong, or expired
//! signature are rejected before the filesystem is touched.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use super::{ApiState, ErrorBody};
use crate::media::{BlobStore as _, mime_for_extension};

/// Signed URL query parameters
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub sig: String,
}

fn reject(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Serve one stored blob after verifying its signature
async fn serve_blob(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Response {
    if !state.blobs.verify(&path, query.expires, &query.sig) {
        tracing::warn!(path, "rejected media request with bad signature");
        return reject(StatusCode::FORBIDDEN, "invalid or expired signature");
    }

    match state.blobs.fetch(&path).await {
        Ok(bytes) => {
            let ext = path.rsplit('.').next().unwrap_or_default();
            let content_type = mime_for_extension(ext);
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => {
            tracing::debug!(path, error = %e, "media blob not found");
            reject(StatusCode::NOT_FOUND, "not found")
        }
    }
}

/// Build media router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/media/{*path}", get(serve_blob))
        .with_state(state)
}
