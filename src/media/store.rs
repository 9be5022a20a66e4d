//! Blob storage boundary
//!
//! Stores raw media bytes and issues time-bounded signed URLs for the
//! provider to fetch. The local filesystem implementation signs URLs with
//! an HMAC-style SHA-256 digest over the path and expiry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::StorageConfig;
use crate::{Error, Result};

/// Durable blob storage with signed-URL issuance
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes under the given path, overwriting any existing blob
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Issue a time-bounded URL granting read access to the blob
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String>;

    /// Issue a non-expiring public URL (fallback when signing fails)
    async fn public_url(&self, path: &str) -> Result<String>;

    /// Read a blob back
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed blob store
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
    signing_secret: String,
}

impl LocalBlobStore {
    /// Create a store rooted at the configured directory
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            public_base: config.public_base_url.trim_end_matches('/').to_string(),
            signing_secret: config.signing_secret.clone(),
        }
    }

    /// Compute the signature for a path/expiry pair
    #[must_use]
    pub fn signature(&self, path: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verify a signed URL's query parameters against the current time
    #[must_use]
    pub fn verify(&self, path: &str, expires: i64, signature: &str) -> bool {
        if expires < chrono::Utc::now().timestamp() {
            return false;
        }
        // Compare digests of both sides so match timing does not depend on
        // how much of the expected signature the caller guessed
        let expected = self.signature(path, expires);
        Sha256::digest(expected.as_bytes()) == Sha256::digest(signature.as_bytes())
    }

    fn blob_path(&self, path: &str) -> Result<PathBuf> {
        // Storage paths are derived internally, but reject traversal anyway
        if path.split('/').any(|seg| seg == "..") || Path::new(path).is_absolute() {
            return Err(Error::MediaUploadFailed(format!("invalid path: {path}")));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let full = self.blob_path(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::MediaUploadFailed(format!("mkdir {path}: {e}")))?;
        }

        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| Error::MediaUploadFailed(format!("write {path}: {e}")))?;

        tracing::debug!(path, content_type, size = bytes.len(), "blob stored");
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        if self.signing_secret.is_empty() {
            return Err(Error::MediaUploadFailed(
                "no signing secret configured".to_string(),
            ));
        }

        let expires = chrono::Utc::now().timestamp()
            + i64::try_from(ttl.as_secs())
                .map_err(|e| Error::MediaUploadFailed(format!("ttl overflow: {e}")))?;
        let sig = self.signature(path, expires);

        Ok(format!(
            "{}/media/{path}?expires={expires}&sig={sig}",
            self.public_base
        ))
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        Ok(format!("{}/media/{path}", self.public_base))
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.blob_path(path)?;
        Ok(tokio::fs::read(&full).await?)
    }
}
