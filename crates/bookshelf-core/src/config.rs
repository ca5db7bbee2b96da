//! Application configuration management.
//!
//! Configuration is stored at `~/.config/bookshelf/config.json` and can be
//! overridden per run with `BOOKSHELF_*` environment variables (a `.env`
//! file is honoured by the binary).

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_REFRESH_THRESHOLD_SECS;
use crate::keycloak::KeycloakConfig;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "bookshelf";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_AUTH_URL: &str = "http://localhost:8080";
const DEFAULT_REALM: &str = "library";
const DEFAULT_CLIENT_ID: &str = "library-client";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the catalog API
    pub api_url: String,
    /// Base URL of the Keycloak server
    pub auth_url: String,
    pub realm: String,
    pub client_id: String,
    /// Refresh the access token when it expires within this many seconds
    pub refresh_threshold_secs: i64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            realm: DEFAULT_REALM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            last_username: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if absent) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
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

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("BOOKSHELF_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = non_empty("BOOKSHELF_AUTH_URL") {
            self.auth_url = url;
        }
        if let Some(realm) = non_empty("BOOKSHELF_REALM") {
            self.realm = realm;
        }
        if let Some(client_id) = non_empty("BOOKSHELF_CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Some(secs) = non_empty("BOOKSHELF_REFRESH_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.refresh_threshold_secs = secs;
        }
    }

    pub fn keycloak(&self) -> KeycloakConfig {
        KeycloakConfig {
            base_url: self.auth_url.clone(),
            realm: self.realm.clone(),
            client_id: self.client_id.clone(),
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
