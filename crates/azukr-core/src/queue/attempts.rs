//! Failed drain attempt counts, kept next to the queue so they outlive the
//! coordinator that recorded them.

use std::collections::BTreeMap;

use super::OfflineQueue;
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::OperationId;

/// Storage key of the attempt counts: a JSON object from operation id to
/// failed drain attempts.
pub const ATTEMPTS_STORAGE_KEY: &str = "azukr_drain_attempts_v1";

type AttemptCounts = BTreeMap<String, u32>;

impl<S: KeyValueStore> OfflineQueue<S> {
    /// Failed drain attempts recorded for `id`. Zero when none are stored or
    /// the counts cannot be read.
    pub fn failed_attempts(&self, id: &OperationId) -> u32 {
        match self.read_attempts() {
            Ok(counts) => counts.get(id.as_str()).copied().unwrap_or(0),
            Err(error) => {
                tracing::error!(%error, "Failed to read drain attempt counts");
                0
            }
        }
    }

    /// Count one more failed attempt for `id` and return the new total.
    ///
    /// Counts for operations no longer queued are pruned on the way.
    pub(crate) fn record_failed_attempt(&self, id: &OperationId) -> Result<u32> {
        let mut counts = self.read_attempts().unwrap_or_else(|error| {
            tracing::warn!(%error, "Discarding unreadable drain attempt counts");
            AttemptCounts::new()
        });
        let queued = self
            .all()
            .into_iter()
            .map(|operation| operation.id)
            .collect::<Vec<_>>();
        counts.retain(|key, _| queued.iter().any(|queued_id| queued_id.as_str() == key));

        let count = counts.entry(id.as_str().to_string()).or_insert(0);
        *count = count.saturating_add(1);
        let total = *count;
        self.write_attempts(&counts)?;
        Ok(total)
    }

    /// Forget the attempt count of `id`. Absent ids are a no-op.
    pub(crate) fn clear_failed_attempts(&self, id: &OperationId) -> Result<()> {
        let mut counts = self.read_attempts()?;
        if counts.remove(id.as_str()).is_some() {
            self.write_attempts(&counts)?;
        }
        Ok(())
    }

    fn read_attempts(&self) -> Result<AttemptCounts> {
        match self.store.get(ATTEMPTS_STORAGE_KEY)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(AttemptCounts::new()),
        }
    }

    fn write_attempts(&self, counts: &AttemptCounts) -> Result<()> {
        self.store
            .set(ATTEMPTS_STORAGE_KEY, &serde_json::to_string(counts)?)
    }
}
