//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the preferred session store and the
//! last email used to log in.
//!
//! Configuration is stored at `~/.config/keyhold/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;
use crate::auth::{FileStore, KeyValueStore, KeyringStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "keyhold";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "KEYHOLD_API_URL";

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "KEYHOLD_HOME";

/// Where the session entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub store_backend: StoreBackend,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config")?)
        } else {
            Ok(Self::default())
        }
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

    fn config_path() -> Result<PathBuf> {
        if let Ok(home) = std::env::var(HOME_ENV) {
            return Ok(PathBuf::from(home).join(CONFIG_FILE));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the session file and logs
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Ok(home) = std::env::var(HOME_ENV) {
            return Ok(PathBuf::from(home));
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API base URL: environment, then config, then the built-in fallback
    pub fn api_base_url(&self) -> String {
        let env = std::env::var(API_URL_ENV).ok();
        Self::resolve_base_url(env.as_deref(), self.api_base_url.as_deref())
    }

    fn resolve_base_url(env: Option<&str>, configured: Option<&str>) -> String {
        env.into_iter()
            .chain(configured)
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// The file store in the data directory, regardless of backend
    pub fn file_store(&self) -> Result<FileStore> {
        Ok(FileStore::in_dir(&self.data_dir()?))
    }

    /// Open the configured session store
    pub fn open_store(&self) -> Result<Box<dyn KeyValueStore>> {
        Ok(match self.store_backend {
            StoreBackend::File => Box::new(self.file_store()?),
            StoreBackend::Keyring => Box::new(KeyringStore::new()),
        })
    }
}
