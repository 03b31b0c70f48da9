//! Daemon configuration parsing.
//!
//! The daemon is configured from a TOML file. Secrets are never stored in
//! the file: the `[github]` section names environment variables
//! (`api_token_env`, `webhook_secret_env`) and the values are resolved once
//! at bootstrap.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use alertsync_core::SyncConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// GitHub backend settings. Required section.
    pub github: GitHubConfig,

    /// Synchronization engine settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl DaemonConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates required fields.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.github.owner.is_empty() {
            return Err(ConfigError::Validation(
                "github.owner must not be empty".to_string(),
            ));
        }
        if self.github.repo.is_empty() {
            return Err(ConfigError::Validation(
                "github.repo must not be empty".to_string(),
            ));
        }
        if self.github.webhook_secret_env.is_empty() {
            return Err(ConfigError::Validation(
                "github.webhook_secret_env must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the webhook server listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// GitHub backend settings.
///
/// The API token and webhook secret are referenced by environment variable
/// name only; the token itself never appears in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubConfig {
    /// GitHub API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Repository owner.
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Environment variable holding the API token.
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,

    /// Environment variable holding the webhook secret.
    #[serde(default = "default_webhook_secret_env")]
    pub webhook_secret_env: String,

    /// Per-request transport timeout, seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl GitHubConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

fn default_listen_addr() -> SocketAddr {
    ([0, 0, 0, 0], 3000).into()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_api_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_webhook_secret_env() -> String {
    "GITHUB_WEBHOOK_SECRET".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}
