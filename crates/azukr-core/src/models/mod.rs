//! Data models for Azukr

mod operation;
mod owner;
mod profile;
mod record;
mod timestamp;

pub use operation::{OperationId, QueuedAction, QueuedOperation};
pub use owner::OwnerKey;
pub use profile::{GlucoseThresholds, UserProfile};
pub use record::{HealthRecord, RecordData, RecordId, RecordKind, RecordPatch};
pub use timestamp::{Timestamp, TimestampInput};
