//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the last used email and where the
//! session tokens are kept.
//!
//! Configuration is stored at `~/.config/pontuae/config.json`. The
//! `PONTUAE_API_URL` environment variable overrides the configured URL.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::auth::{CredentialStore, FileBackend, KeyringBackend};

/// Application name used for config/data directory paths
const APP_NAME: &str = "pontuae";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "PONTUAE_API_URL";

/// API base URL used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackendKind {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_email: Option<String>,
    #[serde(default)]
    pub credential_backend: CredentialBackendKind,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
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
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the session file and logs.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Effective API base URL: environment, then config file, then default.
    pub fn base_url(&self) -> String {
        resolve_base_url(self.api_base_url.as_deref(), std::env::var(API_URL_ENV).ok())
    }

    /// Open the credential store selected by `credential_backend`.
    pub fn credential_store(&self) -> Result<CredentialStore> {
        Ok(match self.credential_backend {
            CredentialBackendKind::File => {
                CredentialStore::open(FileBackend::in_dir(&self.data_dir()?))
            }
            CredentialBackendKind::Keyring => CredentialStore::open(KeyringBackend::new()),
        })
    }
}

fn resolve_base_url(configured: Option<&str>, env: Option<String>) -> String {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}
