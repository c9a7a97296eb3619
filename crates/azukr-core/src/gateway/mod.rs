//! Remote data gateway.
//!
//! A gateway executes one remote call per mutation or read and keeps no
//! state of its own beyond a connection handle. It never retries; that is
//! the sync coordinator's job.

mod http;
mod memory;

use thiserror::Error;

use crate::models::{HealthRecord, OwnerKey, RecordId, RecordPatch, Timestamp, UserProfile};

pub use http::HttpGateway;
pub use memory::MemoryGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Not authenticated with the remote store")]
    Unauthenticated,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Invalid response payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfiguration(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result of a delete. Deleting an absent record succeeds, but says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Which end of the timeline [`RemoteGateway::read_extreme_record`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    Oldest,
    Newest,
}

impl RecordOrder {
    #[must_use]
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Oldest => "asc",
            Self::Newest => "desc",
        }
    }
}

/// Remote document store operations, namespaced by owner.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway {
    /// Upsert the profile; fields missing from `profile` stay untouched.
    async fn create_profile(&self, owner: &OwnerKey, profile: &UserProfile) -> GatewayResult<()>;

    /// Create a record and return its server-generated id.
    async fn create_record(&self, owner: &OwnerKey, record: &HealthRecord)
        -> GatewayResult<RecordId>;

    /// Merge `patch` into an existing record.
    async fn update_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
        patch: &RecordPatch,
    ) -> GatewayResult<()>;

    /// Hard-delete a record.
    async fn delete_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
    ) -> GatewayResult<DeleteOutcome>;

    /// Current remote profile, or `None` if it was never created.
    async fn read_profile(&self, owner: &OwnerKey) -> GatewayResult<Option<UserProfile>>;

    /// Records with `from <= timestamp <= to`, newest first.
    async fn read_records(
        &self,
        owner: &OwnerKey,
        from: Timestamp,
        to: Timestamp,
    ) -> GatewayResult<Vec<HealthRecord>>;

    /// The single oldest or newest record.
    async fn read_extreme_record(
        &self,
        owner: &OwnerKey,
        order: RecordOrder,
    ) -> GatewayResult<Option<HealthRecord>>;
}

/// Prepare a record for creation: drop any client-side id and stamp a
/// missing timestamp with the current time.
pub(crate) fn stamp_for_create(record: &HealthRecord) -> HealthRecord {
    let mut record = record.clone();
    record.id = None;
    if record.timestamp.is_none() {
        record.timestamp = Some(Timestamp::now());
    }
    record
}
