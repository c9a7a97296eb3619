//! azukr-core - Core library for Azukr
//!
//! This crate contains the health models, the durable offline write queue,
//! the remote data gateway and the sync coordinator shared by all Azukr
//! front-ends.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod queue;
pub mod state;
pub mod sync;
pub mod util;

pub use config::AppConfig;
pub use connectivity::Connectivity;
pub use error::{Error, Result};
pub use gateway::{GatewayError, HttpGateway, MemoryGateway, RemoteGateway};
pub use models::{
    HealthRecord, OperationId, OwnerKey, QueuedAction, QueuedOperation, RecordId, RecordKind,
    RecordPatch, Timestamp, UserProfile,
};
pub use queue::OfflineQueue;
pub use state::SyncState;
pub use sync::{DrainReport, SyncCoordinator, SyncPolicy, WriteOutcome};
