//! CLI configuration file.
//!
//! Lives at `<config dir>/tourify/config.toml` unless `--config` points
//! elsewhere. Missing fields take their defaults, then `TOURIFY_*`
//! environment variables are applied on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tourify_client::ClientConfig;
use tracing::debug;

use crate::error::{CliError, Result};

const APP_DIR: &str = "tourify";
const CONFIG_FILE: &str = "config.toml";
const STORE_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub player: PlayerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { colored: true }
    }
}

/// External program used for track previews. The preview URL is appended
/// to `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default = "default_player_command")]
    pub command: String,
    #[serde(default = "default_player_args")]
    pub args: Vec<String>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            command: default_player_command(),
            args: default_player_args(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_player_command() -> String {
    "ffplay".to_string()
}

fn default_player_args() -> Vec<String> {
    ["-nodisp", "-autoexit", "-loglevel", "quiet"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or_else(|| CliError::config("could not determine the config directory"))
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Read the file (if any), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        let mut config = if path.exists() {
            debug!(path = %path.display(), "Loading config file");
            Self::from_toml(&std::fs::read_to_string(&path)?)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.client.apply_env()?;
        config.client.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overwrite the file with the defaults.
    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Self::default().show()?)?;
        Ok(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Location of the preference store.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.client.store_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join(STORE_FILE))
            .ok_or_else(|| CliError::config("could not determine the data directory"))
    }
}
