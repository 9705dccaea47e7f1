//! Client configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the authenticator base URL, the still encoding and where the
//! session token is persisted. The frame count and spacing of a capture are
//! fixed by the protocol and live in [`crate::capture`].
//!
//! Configuration is stored at `~/.config/faceauth/config.json`. Environment
//! variables (optionally from a `.env` file) override the stored values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Application name used for config/data directory paths
const APP_NAME: &str = "faceauth";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default authenticator location, matching the development backend.
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// Face matching on the server can take a few seconds per frame.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Encoding used for captured stills.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

const ENV_API_URL: &str = "FACEAUTH_API_URL";
const ENV_STORAGE: &str = "FACEAUTH_STORAGE";
const ENV_LOG_DIR: &str = "FACEAUTH_LOG_DIR";

/// Where the session token is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON file in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Process memory only; nothing survives a restart
    Memory,
}

impl StorageKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Some(StorageKind::File),
            "keyring" => Some(StorageKind::Keyring),
            "memory" => Some(StorageKind::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub image_mime: String,
    pub storage: StorageKind,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            image_mime: DEFAULT_IMAGE_MIME.to_string(),
            storage: StorageKind::default(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load the stored config (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        debug!(api_base_url = %config.api_base_url, storage = ?config.storage, "Config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(value) = std::env::var(ENV_STORAGE) {
            match StorageKind::parse(&value) {
                Some(kind) => self.storage = kind,
                None => warn!(value = %value, "Unknown {}, keeping {:?}", ENV_STORAGE, self.storage),
            }
        }
        if let Ok(dir) = std::env::var(ENV_LOG_DIR) {
            if !dir.trim().is_empty() {
                self.log_dir = Some(PathBuf::from(dir));
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session file.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
