//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::retry::RetryPolicy;

/// Environment variable overriding [`ClientConfig::base_url`].
pub const ENV_BASE_URL: &str = "TOURIFY_BASE_URL";
/// Environment variable overriding [`ClientConfig::poll_interval_secs`].
pub const ENV_POLL_INTERVAL: &str = "TOURIFY_POLL_INTERVAL_SECS";
/// Environment variable overriding [`ClientConfig::request_timeout_secs`].
pub const ENV_REQUEST_TIMEOUT: &str = "TOURIFY_REQUEST_TIMEOUT_SECS";
/// Environment variable overriding [`ClientConfig::store_path`].
pub const ENV_STORE_PATH: &str = "TOURIFY_STORE_PATH";

/// Settings shared by every API call and background poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend root, e.g. `https://app.demodrive.tech`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds. `0` keeps reqwest's default (none).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Interval between status polls in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Retry policy for the media library fetch.
    #[serde(default)]
    pub media_retry: RetryPolicy,
    /// Location of the preference store. Defaults to the platform data dir.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            media_retry: RetryPolicy::default(),
            store_path: None,
        }
    }
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Apply `TOURIFY_*` environment overrides on top of the loaded values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            debug!(base_url = %url, "Base URL overridden from environment");
            self.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL) {
            self.poll_interval_secs = raw.trim().parse().map_err(|_| {
                ClientError::config(format!("{ENV_POLL_INTERVAL} must be an integer, got {raw}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            self.request_timeout_secs = raw.trim().parse().map_err(|_| {
                ClientError::config(format!(
                    "{ENV_REQUEST_TIMEOUT} must be an integer, got {raw}"
                ))
            })?;
        }
        if let Some(path) = lookup(ENV_STORE_PATH).filter(|v| !v.trim().is_empty()) {
            self.store_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Reject values that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::config(format!(
                "base_url must be http or https, got {}",
                parsed.scheme()
            )));
        }
        if self.media_retry.max_attempts == 0 {
            return Err(ClientError::config("media_retry.max_attempts must be at least 1"));
        }
        Ok(())
    }
}
