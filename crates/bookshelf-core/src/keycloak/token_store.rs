use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token file name in cache directory
const TOKEN_FILE: &str = "session.json";

/// What survives a restart: enough to silently resume the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub refresh_token: String,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
}

impl StoredTokens {
    pub fn is_expired(&self) -> bool {
        self.refresh_expires_at
            .map(|expiry| Utc::now() > expiry)
            .unwrap_or(false)
    }
}

/// Persists the refresh token between runs.
pub struct TokenStore {
    cache_dir: PathBuf,
}

impl TokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load stored tokens, ignoring ones whose refresh token has expired
    pub fn load(&self) -> Result<Option<StoredTokens>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let tokens: StoredTokens = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;

        if tokens.is_expired() {
            return Ok(None);
        }
        Ok(Some(tokens))
    }

    pub fn save(&self, tokens: &StoredTokens) -> Result<()> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn token_path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }
}
