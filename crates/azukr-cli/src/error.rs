use std::io;

use azukr_core::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] azukr_core::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid field assignment '{0}'; expected key=value")]
    InvalidAssignment(String),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Nothing to update; pass --kind, --at, --notes or key=value fields")]
    EmptyUpdate,
    #[error("No dead-lettered operation with id {0}")]
    DeadLetterNotFound(String),
    #[error(
        "No account email configured. Pass --email, set AZUKR_EMAIL, or add \"email\" to the config file."
    )]
    MissingEmail,
    #[error(
        "Remote sync is not configured. Set AZUKR_API_URL or add \"api_base_url\" to the config file."
    )]
    SyncNotConfigured,
}
