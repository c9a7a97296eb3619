//! Error types for azukr-core

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::models::OperationId;

/// Result type alias using azukr-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in azukr-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote call failed (reads only; writes report [`Error::Queued`])
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A direct remote write failed and the operation was queued for retry.
    ///
    /// `operation_id` is `None` when local storage also failed and the
    /// operation was lost.
    #[error("Remote write failed ({source}); queued as {}", .operation_id.as_ref().map_or("<lost>", OperationId::as_str))]
    Queued {
        operation_id: Option<OperationId>,
        #[source]
        source: GatewayError,
    },

    /// No remote connection is attached
    #[error("Not connected to the remote store")]
    NotConnected,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
