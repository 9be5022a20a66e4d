//! Media ingestion pipeline
//!
//! Turns inline-encoded payloads into provider-fetchable URLs: decode,
//! persist to blob storage, issue a signed URL. Already-remote URLs pass
//! through untouched.

mod store;

pub use store::{BlobStore, LocalBlobStore};

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::db::MessageKind;
use crate::{Error, Result};

/// Media reference supplied with a send request
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Already-remote URL; passed through unchanged
    Url(String),
    /// Inline payload: MIME type plus base64 bytes (bare or `data:` URI)
    Inline { mime_type: String, data: String },
}

/// Map a MIME type to a file extension; unknown types get a generic one
#[must_use]
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or_default().trim() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "video/quicktime" => "mov",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "text/plain" => "txt",
        "text/csv" => "csv",
        _ => "bin",
    }
}

/// Reverse lookup used when serving stored blobs
#[must_use]
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

/// Storage folder for a message kind
#[must_use]
pub const fn folder_for_kind(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Audio => "audio",
        MessageKind::Image => "images",
        MessageKind::Video => "videos",
        // Text never reaches the pipeline; bin-fallback lands with docs
        MessageKind::Document | MessageKind::Text => "docs",
    }
}

/// Media ingestion pipeline
pub struct MediaIngestor {
    store: Arc<dyn BlobStore>,
    url_ttl: Duration,
}

impl MediaIngestor {
    /// Create a new ingestor over the given store
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>, url_ttl: Duration) -> Self {
        Self { store, url_ttl }
    }

    /// Resolve a media source to a provider-fetchable URL
    ///
    /// # Errors
    ///
    /// Returns `MediaUploadFailed` if the inline payload cannot be decoded,
    /// stored, or issued a URL; dispatch must not proceed in that case
    pub async fn resolve(
        &self,
        organization_id: &str,
        conversation_id: &str,
        kind: MessageKind,
        source: MediaSource,
    ) -> Result<String> {
        match source {
            MediaSource::Url(url) => Ok(url),
            MediaSource::Inline { mime_type, data } => {
                self.ingest(organization_id, conversation_id, kind, &mime_type, &data)
                    .await
            }
        }
    }

    async fn ingest(
        &self,
        organization_id: &str,
        conversation_id: &str,
        kind: MessageKind,
        mime_type: &str,
        data: &str,
    ) -> Result<String> {
        let bytes = decode_inline(data)?;
        let path = storage_path(organization_id, conversation_id, kind, mime_type);

        self.store.upload(&path, &bytes, mime_type).await?;

        match self.store.signed_url(&path, self.url_ttl).await {
            Ok(url) => {
                tracing::debug!(path, "media stored, signed url issued");
                Ok(url)
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "url signing failed, trying public url");
                self.store
                    .public_url(&path)
                    .await
                    .map_err(|e| Error::MediaUploadFailed(format!("{path}: {e}")))
            }
        }
    }
}

/// Decode an inline base64 payload, tolerating a `data:` URI prefix
fn decode_inline(data: &str) -> Result<Vec<u8>> {
    let raw = data
        .split_once(";base64,")
        .map_or(data, |(_, rest)| rest)
        .trim();

    BASE64
        .decode(raw)
        .map_err(|e| Error::MediaUploadFailed(format!("invalid base64 payload: {e}")))
}

/// Derive a storage path that cannot collide between concurrent sends
fn storage_path(
    organization_id: &str,
    conversation_id: &str,
    kind: MessageKind,
    mime_type: &str,
) -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M");
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    format!(
        "{organization_id}/{conversation_id}/{}/{stamp}-{token}.{}",
        folder_for_kind(kind),
        extension_for_mime(mime_type)
    )
}
