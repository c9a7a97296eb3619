//! Dead-letter list for operations the remote store keeps rejecting.

use serde::{Deserialize, Serialize};

use super::OfflineQueue;
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::{OperationId, QueuedOperation, Timestamp};

/// Storage key of the dead-letter list.
pub const DEAD_LETTER_STORAGE_KEY: &str = "azukr_dead_letter_v1";

/// An operation set aside after exhausting its drain attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub operation: QueuedOperation,
    pub attempts: u32,
    pub last_error: String,
    pub dead_lettered_at: Timestamp,
}

impl<S: KeyValueStore> OfflineQueue<S> {
    /// Operations moved aside by the retry policy, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        match self.read_entries(DEAD_LETTER_STORAGE_KEY) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|entry| match serde_json::from_value::<DeadLetter>(entry) {
                    Ok(letter) => Some(letter),
                    Err(error) => {
                        tracing::warn!(%error, "Skipping unreadable dead letter");
                        None
                    }
                })
                .collect(),
            Err(error) => {
                tracing::error!(%error, "Failed to read dead letters; treating as empty");
                Vec::new()
            }
        }
    }

    /// Move a queued operation to the dead-letter list.
    ///
    /// The dead letter is written before the queue entry is removed, so a
    /// storage failure in between leaves the operation in both places rather
    /// than in neither.
    pub(crate) fn dead_letter(
        &self,
        operation: &QueuedOperation,
        attempts: u32,
        last_error: String,
    ) -> Result<()> {
        let mut letters = self.dead_letters();
        letters.retain(|letter| letter.operation.id != operation.id);
        letters.push(DeadLetter {
            operation: operation.clone(),
            attempts,
            last_error,
            dead_lettered_at: Timestamp::now(),
        });
        self.store
            .set(DEAD_LETTER_STORAGE_KEY, &serde_json::to_string(&letters)?)?;
        self.remove_by_id(&operation.id)?;

        tracing::warn!(
            operation_id = %operation.id,
            action = operation.action.name(),
            attempts,
            "Moved operation to dead letters"
        );
        Ok(())
    }

    /// Put a dead-lettered operation back at the tail of the queue, keeping
    /// its id. Returns `false` when no dead letter has that id.
    pub fn requeue_dead_letter(&self, id: &OperationId) -> Result<bool> {
        let mut letters = self.dead_letters();
        let Some(position) = letters.iter().position(|letter| &letter.operation.id == id) else {
            return Ok(false);
        };
        let letter = letters.remove(position);

        let mut operations = self.all();
        if !operations.iter().any(|operation| &operation.id == id) {
            operations.push(letter.operation);
            self.write(&operations)?;
        }
        self.store
            .set(DEAD_LETTER_STORAGE_KEY, &serde_json::to_string(&letters)?)?;

        tracing::info!(operation_id = %id, "Requeued dead letter");
        Ok(true)
    }
}
