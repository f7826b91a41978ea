//! Runtime credentials for storage and notification
//!
//! The credentials arrive as environment variables, are materialized once
//! into a small YAML state file at process start, and are then read back
//! into an explicit [`RuntimeConfig`] that is handed to the pipeline. The
//! file keeps the layout used by the deployment:
//!
//! ```yaml
//! state:
//!   bucket: digests
//!   endpoint_url: https://<account>.r2.cloudflarestorage.com
//!   access_key: ...
//!   secret_key: ...
//!   region: auto
//! notify:
//!   bark:
//!     server: https://api.day.app
//!     key: ...
//! ```

use crate::error::{DigestError, Result};
use digest_utils::{env_or, env_var};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Default Bark server
pub const DEFAULT_BARK_SERVER: &str = "https://api.day.app";

/// Default region for R2-style endpoints
pub const DEFAULT_REGION: &str = "auto";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_bark_server() -> String {
    DEFAULT_BARK_SERVER.to_string()
}

/// S3-compatible storage credentials
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub endpoint_url: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_region")]
    pub region: String,
}

impl StorageConfig {
    /// Names of required fields that are blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("bucket", &self.bucket),
            ("endpoint_url", &self.endpoint_url),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

// Keeps the secret out of logs
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Bark push credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarkConfig {
    #[serde(default = "default_bark_server")]
    pub server: String,
    #[serde(default)]
    pub key: String,
}

impl Default for BarkConfig {
    fn default() -> Self {
        Self {
            server: default_bark_server(),
            key: String::new(),
        }
    }
}

impl fmt::Debug for BarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BarkConfig")
            .field("server", &self.server)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Notification section of the state file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bark: Option<BarkConfig>,
}

/// Credentials for one process lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Object storage, stored under the `state` key
    #[serde(default, rename = "state", skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifyConfig>,
}

impl RuntimeConfig {
    /// Build from `R2_*` and `BARK_*` environment variables.
    ///
    /// Returns `None` when none of them are set.
    pub fn from_env() -> Option<Self> {
        let storage_vars = ["R2_BUCKET", "R2_ENDPOINT", "R2_ACCESS_KEY", "R2_SECRET_KEY"];
        let storage = storage_vars
            .iter()
            .any(|name| env_var(name).is_some())
            .then(|| StorageConfig {
                bucket: env_var("R2_BUCKET").unwrap_or_default(),
                endpoint_url: env_var("R2_ENDPOINT").unwrap_or_default(),
                access_key: env_var("R2_ACCESS_KEY").unwrap_or_default(),
                secret_key: env_var("R2_SECRET_KEY").unwrap_or_default(),
                region: env_or("R2_REGION", DEFAULT_REGION),
            });

        let bark = env_var("BARK_KEY").map(|key| BarkConfig {
            server: env_or("BARK_SERVER", DEFAULT_BARK_SERVER),
            key,
        });

        if storage.is_none() && bark.is_none() {
            return None;
        }

        Some(Self {
            storage,
            notify: bark.map(|bark| NotifyConfig { bark: Some(bark) }),
        })
    }

    /// Parse the YAML state format
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
            .map_err(|e| DigestError::Config(format!("malformed state file: {e}")))
    }

    /// Render the YAML state format
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Read a state file.
    ///
    /// A missing file yields `Ok(None)`; an unreadable or malformed one is
    /// a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "State file not found; upload and notify disabled");
            return Ok(None);
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            DigestError::Config(format!("cannot read state file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text).map(Some)
    }

    /// Write the state file, owner-readable only on unix
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_yaml()?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(path = %path.display(), "Wrote state file");
        Ok(())
    }

    /// Write the file from the environment when the environment carries
    /// credentials, then read it back once.
    pub fn materialize(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if let Some(config) = Self::from_env() {
            config.write(path)?;
        }
        Self::load(path)
    }

    /// Storage section, if configured
    pub fn storage(&self) -> Option<&StorageConfig> {
        self.storage.as_ref()
    }

    /// Bark section, if configured
    pub fn bark(&self) -> Option<&BarkConfig> {
        self.notify.as_ref().and_then(|n| n.bark.as_ref())
    }
}
