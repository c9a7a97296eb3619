//! Client configuration.
//!
//! Provides a unified `AppConfig` read from a JSON file and overridden by
//! environment variables. Front-ends apply their own flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::OwnerKey;
use crate::sync::SyncPolicy;
use crate::util::{normalize_base_url, normalize_text_option};

pub const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_API_URL: &str = "AZUKR_API_URL";
pub const ENV_API_TOKEN: &str = "AZUKR_API_TOKEN";
pub const ENV_EMAIL: &str = "AZUKR_EMAIL";
pub const ENV_QUEUE_DB: &str = "AZUKR_QUEUE_DB";

/// Settings shared by every front-end.
///
/// Secrets may live here only because the file is per-user; the API token is
/// usually supplied through the environment instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the remote data API. No remote connection when absent.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Signed-in user's email, used to derive the owner key.
    #[serde(default)]
    pub email: Option<String>,
    /// Path of the SQLite file holding the offline queue.
    #[serde(default)]
    pub queue_db_path: Option<PathBuf>,
    /// Failed drain attempts before an operation is dead-lettered.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load from `path`. A missing file yields the default config.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize()?;
        Ok(config)
    }

    /// Override fields with values from `lookup`, keyed by the `AZUKR_*`
    /// variable names. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_API_TOKEN)) {
            self.api_token = Some(token);
        }
        if let Some(email) = normalize_text_option(lookup(ENV_EMAIL)) {
            self.email = Some(email);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_QUEUE_DB)) {
            self.queue_db_path = Some(PathBuf::from(path));
        }
        self.normalize()
    }

    /// Process environment variant of [`AppConfig::apply_env`].
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Trim text fields and validate the API URL.
    pub fn normalize(&mut self) -> Result<()> {
        self.api_base_url = match normalize_text_option(self.api_base_url.take()) {
            Some(url) => Some(normalize_http_url(&url, "api_base_url")?),
            None => None,
        };
        self.api_token = normalize_text_option(self.api_token.take());
        self.email = normalize_text_option(self.email.take());
        if self.max_attempts == Some(0) {
            return Err(Error::Config(
                "max_attempts must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Owner key for the configured email, if any.
    pub fn owner_key(&self) -> Result<Option<OwnerKey>> {
        self.email.as_deref().map(OwnerKey::from_email).transpose()
    }

    #[must_use]
    pub const fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            max_attempts: self.max_attempts,
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Queue database path, falling back to `default`.
    #[must_use]
    pub fn queue_db_path_or(&self, default: PathBuf) -> PathBuf {
        self.queue_db_path.clone().unwrap_or(default)
    }
}

fn normalize_http_url(raw: &str, field: &str) -> Result<String> {
    normalize_base_url(raw).ok_or_else(|| {
        Error::Config(format!(
            "config field '{field}' must include http:// or https://"
        ))
    })
}
