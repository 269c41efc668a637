//! Portal configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default. Two environment variables override the file:
//!
//! - `CAREPORTAL_LOCAL_STORE`: path of the local store database
//! - `CAREPORTAL_LOG`: log filter directive

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guard::GuardConfig;
use crate::remote::MemoryBackendConfig;

pub const ENV_LOCAL_STORE: &str = "CAREPORTAL_LOCAL_STORE";
pub const ENV_LOG: &str = "CAREPORTAL_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub public_base_url: String,
    pub require_email_confirmation: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let backend = MemoryBackendConfig::default();
        Self {
            public_base_url: backend.public_base_url,
            require_email_confirmation: backend.require_email_confirmation,
        }
    }
}

impl From<&RemoteConfig> for MemoryBackendConfig {
    fn from(config: &RemoteConfig) -> Self {
        MemoryBackendConfig {
            public_base_url: config.public_base_url.clone(),
            require_email_confirmation: config.require_email_confirmation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Local store database; in-memory when unset
    pub local_store_path: Option<PathBuf>,
    pub log_level: String,
    pub guard: GuardConfig,
    pub remote: RemoteConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            local_store_path: None,
            log_level: "info".into(),
            guard: GuardConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl PortalConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_LOCAL_STORE).filter(|v| !v.is_empty()) {
            self.local_store_path = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_level = level;
        }
        self
    }

    pub fn backend_config(&self) -> MemoryBackendConfig {
        (&self.remote).into()
    }
}
