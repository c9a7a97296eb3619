//! Durable offline write queue.
//!
//! Pending mutations are kept as one ordered JSON array under a single
//! storage key. Every mutating call rewrites the whole array before it
//! returns; reads always go back to storage so two queues sharing a store
//! never see stale contents.

mod attempts;
mod dead_letter;

use serde_json::Value;

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::{OperationId, OwnerKey, QueuedAction, QueuedOperation, UserProfile};

pub use attempts::ATTEMPTS_STORAGE_KEY;
pub use dead_letter::DeadLetter;

/// Storage key of the queue. A new on-disk format gets a new key.
pub const QUEUE_STORAGE_KEY: &str = "azukr_offline_queue_v1";

/// Ordered log of pending operations, oldest first.
pub struct OfflineQueue<S> {
    store: S,
}

impl<S: KeyValueStore> OfflineQueue<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Append an operation and persist the queue.
    ///
    /// The id is always minted here; callers cannot supply one. The only
    /// path that puts an existing id back in the queue is
    /// [`OfflineQueue::requeue_dead_letter`].
    ///
    /// Returns the assigned id, or `None` when storage rejected the write.
    /// In that case the operation is lost; it is logged and not retried.
    pub fn enqueue(&self, owner_key: OwnerKey, action: QueuedAction) -> Option<OperationId> {
        let operation = QueuedOperation::new(owner_key, action);
        let id = operation.id.clone();
        let action_name = operation.action.name();

        let mut operations = self.all();
        operations.push(operation);
        match self.write(&operations) {
            Ok(()) => {
                tracing::debug!(
                    operation_id = %id,
                    action = action_name,
                    pending = operations.len(),
                    "Queued offline operation"
                );
                Some(id)
            }
            Err(error) => {
                tracing::error!(
                    %error,
                    operation_id = %id,
                    action = action_name,
                    "Failed to persist offline queue; operation lost"
                );
                None
            }
        }
    }

    /// All pending operations in insertion order.
    ///
    /// Unreadable storage is logged and reported as an empty queue.
    pub fn all(&self) -> Vec<QueuedOperation> {
        match self.read_entries(QUEUE_STORAGE_KEY) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(QueuedOperation::decode)
                .collect(),
            Err(error) => {
                tracing::error!(%error, "Failed to read offline queue; treating as empty");
                Vec::new()
            }
        }
    }

    /// Remove the operation with `id`.
    ///
    /// Absent ids are a no-op. Returns whether an entry was removed.
    pub fn remove_by_id(&self, id: &OperationId) -> Result<bool> {
        let mut operations = self.all();
        let before = operations.len();
        operations.retain(|operation| &operation.id != id);
        if operations.len() == before {
            return Ok(false);
        }

        self.write(&operations)?;
        tracing::debug!(operation_id = %id, pending = operations.len(), "Removed queued operation");
        Ok(true)
    }

    /// Union of every queued profile save for `owner_key`, later saves
    /// winning field by field.
    pub fn pending_profile_for(&self, owner_key: &OwnerKey) -> Option<UserProfile> {
        self.all()
            .into_iter()
            .filter(|operation| &operation.owner_key == owner_key)
            .filter_map(|operation| match operation.action {
                QueuedAction::SaveProfile { profile } => Some(profile),
                _ => None,
            })
            .reduce(|mut merged, profile| {
                merged.merge_from(&profile);
                merged
            })
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, operations: &[QueuedOperation]) -> Result<()> {
        let serialized = serde_json::to_string(operations)?;
        self.store.set(QUEUE_STORAGE_KEY, &serialized)
    }

    fn read_entries(&self, key: &str) -> Result<Vec<Value>> {
        match self.store.get(key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }
}
