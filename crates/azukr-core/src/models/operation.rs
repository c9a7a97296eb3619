//! Queued operation model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::{HealthRecord, OwnerKey, RecordId, RecordPatch, Timestamp, UserProfile};

/// Identifier of a queued operation.
///
/// New ids are UUID v7 (time-sortable and distinct within one millisecond).
/// Ids written by older clients are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A mutation intent, tagged by `action` in its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum QueuedAction {
    SaveProfile {
        profile: UserProfile,
    },
    SaveRecord {
        record: HealthRecord,
    },
    #[serde(rename_all = "camelCase")]
    UpdateRecord {
        record_id: RecordId,
        record: RecordPatch,
    },
    #[serde(rename_all = "camelCase")]
    DeleteRecord {
        record_id: RecordId,
    },
    /// Unknown or undecodable entry found in storage. Drain drops these.
    #[serde(other)]
    Unsupported,
}

impl QueuedAction {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SaveProfile { .. } => "saveProfile",
            Self::SaveRecord { .. } => "saveRecord",
            Self::UpdateRecord { .. } => "updateRecord",
            Self::DeleteRecord { .. } => "deleteRecord",
            Self::Unsupported => "unsupported",
        }
    }
}

/// A pending mutation awaiting remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: OperationId,
    pub enqueued_at: Timestamp,
    pub owner_key: OwnerKey,
    #[serde(flatten)]
    pub action: QueuedAction,
}

impl QueuedOperation {
    #[must_use]
    pub fn new(owner_key: OwnerKey, action: QueuedAction) -> Self {
        Self {
            id: OperationId::new(),
            enqueued_at: Timestamp::now(),
            owner_key,
            action,
        }
    }

    /// Decode one stored entry.
    ///
    /// Entries that do not decode but still carry a string `id` come back as
    /// [`QueuedAction::Unsupported`] so they can be retired by id. Entries
    /// without an id cannot be addressed and yield `None`.
    #[must_use]
    pub fn decode(value: Value) -> Option<Self> {
        let fallback = Self::fallback_from(&value);
        match serde_json::from_value::<Self>(value) {
            Ok(operation) => Some(operation),
            Err(error) => {
                tracing::warn!(%error, "Stored queue entry could not be decoded");
                fallback
            }
        }
    }

    fn fallback_from(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let id = fields.get("id").and_then(Value::as_str)?;
        let owner_key = fields
            .get("ownerKey")
            .or_else(|| fields.get("email"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let enqueued_at = fields
            .get("enqueuedAt")
            .or_else(|| fields.get("ts"))
            .and_then(|raw| serde_json::from_value::<Timestamp>(raw.clone()).ok())
            .unwrap_or_else(|| Timestamp::from_millis(0));

        Some(Self {
            id: OperationId::from(id),
            enqueued_at,
            owner_key: OwnerKey::from_encoded(owner_key),
            action: QueuedAction::Unsupported,
        })
    }
}
