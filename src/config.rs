//! Configuration management for the Courier gateway
//!
//! All provider and storage credentials live here and are injected into the
//! components that need them. Business logic never reads the environment
//! directly.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Courier gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, blob storage)
    pub data_dir: PathBuf,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Messaging provider configuration
    pub provider: ProviderConfig,

    /// Blob storage configuration
    pub storage: StorageConfig,

    /// Outbound messaging configuration
    pub messaging: MessagingConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self { port: 18790 }
    }
}

/// Messaging provider configuration
///
/// The admin token authorizes session creation; each instance then carries
/// its own provider-issued credential for everything else.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider API base URL
    pub base_url: String,

    /// Account-level token used only to create sessions
    pub admin_token: String,

    /// Externally reachable base URL registered as the inbound webhook
    /// target at session-creation time
    pub webhook_base_url: String,

    /// Per-request timeout in seconds for all provider calls
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.provider.example".to_string(),
            admin_token: String::new(),
            webhook_base_url: "http://localhost:18790".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored media blobs.
    /// Relative paths are resolved under the data directory.
    pub root_dir: PathBuf,

    /// Public base URL under which stored blobs are served
    pub public_base_url: String,

    /// Secret used to sign time-bounded media URLs
    pub signing_secret: String,

    /// Signed URL validity in days
    pub signed_url_ttl_days: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("media"),
            public_base_url: "http://localhost:18790".to_string(),
            signing_secret: String::new(),
            signed_url_ttl_days: 7,
        }
    }
}

/// Outbound messaging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Country code prefixed to local-format destination numbers
    pub default_country_code: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            default_country_code: "55".to_string(),
        }
    }
}

/// On-disk configuration file shape
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    api_server: ApiServerConfig,
    provider: ProviderConfig,
    storage: StorageConfig,
    messaging: MessagingConfig,
}

impl Config {
    /// Load configuration from the given file, or from the default location
    /// when no path is supplied
    ///
    /// Secrets may be overridden via `COURIER_PROVIDER_TOKEN` and
    /// `COURIER_SIGNING_SECRET`; the override happens here, at the edge,
    /// so nothing downstream touches the environment.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or if
    /// no data directory can be determined
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Self::read_file(p)?,
            None => {
                let default = Self::default_config_path()?;
                if default.exists() {
                    Self::read_file(&default)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let data_dir = match file.data_dir {
            Some(dir) => dir,
            None => Self::default_data_dir()?,
        };

        let mut provider = file.provider;
        if let Ok(token) = std::env::var("COURIER_PROVIDER_TOKEN") {
            provider.admin_token = token;
        }

        let mut storage = file.storage;
        if let Ok(secret) = std::env::var("COURIER_SIGNING_SECRET") {
            storage.signing_secret = secret;
        }
        if storage.root_dir.is_relative() {
            storage.root_dir = data_dir.join(&storage.root_dir);
        }

        Ok(Self {
            data_dir,
            api_server: file.api_server,
            provider,
            storage,
            messaging: file.messaging,
        })
    }

    fn read_file(path: &Path) -> Result<FileConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "courier", "courier")
            .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))?;
        Ok(dirs.config_dir().join("courier.toml"))
    }

    fn default_data_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "courier", "courier")
            .ok_or_else(|| Error::Config("cannot determine data directory".to_string()))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Path to the gateway database file
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("courier.db")
    }
}
