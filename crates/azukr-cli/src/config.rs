//! Resolve CLI settings from the config file, environment and flags.

use std::path::{Path, PathBuf};

use azukr_core::config::CONFIG_FILE_NAME;
use azukr_core::{AppConfig, OwnerKey};

use crate::cli::Cli;
use crate::error::CliError;

const QUEUE_DB_FILE_NAME: &str = "queue.db";

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub app: AppConfig,
    pub db_path: PathBuf,
    pub offline: bool,
}

impl Settings {
    /// File values, then `AZUKR_*` variables, then command-line flags.
    pub fn resolve(cli: &Cli) -> Result<Self, CliError> {
        let config_path = cli.config.clone().unwrap_or_else(default_config_path);
        let mut app = AppConfig::load_from_path(&config_path)?;
        app.apply_process_env()?;
        Self::from_parts(app, cli)
    }

    pub fn from_parts(mut app: AppConfig, cli: &Cli) -> Result<Self, CliError> {
        if let Some(email) = azukr_core::util::normalize_text_option(cli.email.clone()) {
            app.email = Some(email);
        }
        if let Some(path) = &cli.db_path {
            app.queue_db_path = Some(path.clone());
        }
        app.normalize()?;

        let db_path = app.queue_db_path_or(default_db_path());
        Ok(Self {
            app,
            db_path,
            offline: cli.offline,
        })
    }

    pub fn owner(&self) -> Result<OwnerKey, CliError> {
        self.app.owner_key()?.ok_or(CliError::MissingEmail)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("azukr")
        .join(CONFIG_FILE_NAME)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("azukr")
        .join(QUEUE_DB_FILE_NAME)
}
