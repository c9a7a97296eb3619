//! Sync coordinator: routes every mutation either straight to the remote
//! gateway or into the offline queue, and replays the queue when it can.
//!
//! Drains are strictly sequential. At most one drain runs per coordinator;
//! a drain requested while another is running returns immediately without
//! touching the queue and relies on the next trigger (successful write,
//! gateway attach, or offline to online transition) to pick up leftovers.

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::connectivity::Connectivity;
use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::gateway::{GatewayResult, RecordOrder, RemoteGateway};
use crate::models::{
    HealthRecord, OperationId, OwnerKey, QueuedAction, QueuedOperation, RecordId, RecordPatch,
    Timestamp, UserProfile,
};
use crate::queue::{DeadLetter, OfflineQueue};
use crate::state::SyncState;

/// Retry policy for queued operations the remote store keeps rejecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Failed drain attempts after which the head operation is moved to the
    /// dead-letter list. `None` blocks the queue behind it indefinitely.
    pub max_attempts: Option<u32>,
}

/// Result of a write that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// `true` when the write was queued instead of applied
    pub offline: bool,
    /// Queue id when `offline`; `None` if the queue could not persist it
    pub operation_id: Option<OperationId>,
    /// Server id of a record created directly
    pub record_id: Option<RecordId>,
}

impl WriteOutcome {
    const fn queued(operation_id: Option<OperationId>) -> Self {
        Self {
            offline: true,
            operation_id,
            record_id: None,
        }
    }

    const fn confirmed(record_id: Option<RecordId>) -> Self {
        Self {
            offline: false,
            operation_id: None,
            record_id,
        }
    }
}

/// Why a drain did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainSkip {
    AlreadyRunning,
    Offline,
    NotConnected,
}

/// What one drain cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub skipped: Option<DrainSkip>,
    /// Applied remotely and removed, in order
    pub applied: Vec<OperationId>,
    /// Unsupported entries discarded without a remote call
    pub dropped: Vec<OperationId>,
    /// Moved aside by the retry policy
    pub dead_lettered: Vec<OperationId>,
    /// Head entry that failed and stopped the drain
    pub blocked_on: Option<OperationId>,
    pub last_error: Option<String>,
}

impl DrainReport {
    fn skipped(reason: DrainSkip) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

enum Applied {
    Done,
    Created(RecordId),
    Unsupported,
}

async fn apply<G: RemoteGateway>(
    gateway: &G,
    owner: &OwnerKey,
    action: &QueuedAction,
) -> GatewayResult<Applied> {
    match action {
        QueuedAction::SaveProfile { profile } => {
            gateway.create_profile(owner, profile).await?;
            Ok(Applied::Done)
        }
        QueuedAction::SaveRecord { record } => {
            let id = gateway.create_record(owner, record).await?;
            Ok(Applied::Created(id))
        }
        QueuedAction::UpdateRecord { record_id, record } => {
            gateway.update_record(owner, record_id, record).await?;
            Ok(Applied::Done)
        }
        QueuedAction::DeleteRecord { record_id } => {
            let outcome = gateway.delete_record(owner, record_id).await?;
            tracing::debug!(%record_id, ?outcome, "Deleted record");
            Ok(Applied::Done)
        }
        QueuedAction::Unsupported => Ok(Applied::Unsupported),
    }
}

/// Clears the in-flight flag when the drain finishes or its future is
/// dropped.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One per process (or per test): owns the queue, the remote connection
/// handle, the connectivity signal and the drain flag.
pub struct SyncCoordinator<S, G> {
    queue: OfflineQueue<S>,
    gateway: RwLock<Option<Arc<G>>>,
    connectivity: Connectivity,
    policy: SyncPolicy,
    draining: AtomicBool,
}

impl<S: KeyValueStore, G: RemoteGateway> SyncCoordinator<S, G> {
    /// Create a coordinator over `store` with no remote connection yet.
    pub fn new(store: S) -> Self {
        Self {
            queue: OfflineQueue::new(store),
            gateway: RwLock::new(None),
            connectivity: Connectivity::default(),
            policy: SyncPolicy::default(),
            draining: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub const fn queue(&self) -> &OfflineQueue<S> {
        &self.queue
    }

    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub const fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// The attached remote connection, if any.
    pub fn gateway(&self) -> Option<Arc<G>> {
        self.gateway
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attach (or replace) the remote connection and drain the queue.
    pub async fn attach_gateway(&self, gateway: G) -> DrainReport {
        *self.gateway.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(gateway));
        tracing::info!("Remote gateway attached");
        self.drain().await
    }

    /// Drop the remote connection (e.g. on sign-out). Later writes queue.
    pub fn detach_gateway(&self) -> Option<Arc<G>> {
        let previous = self
            .gateway
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::info!("Remote gateway detached");
        }
        previous
    }

    /// Record a connectivity change. An offline to online transition drains
    /// the queue and returns the drain report.
    pub async fn set_online(&self, online: bool) -> Option<DrainReport> {
        if self.connectivity.set_online(online) {
            tracing::info!("Connectivity restored; draining offline queue");
            Some(self.drain().await)
        } else {
            None
        }
    }

    pub fn sync_state(&self) -> SyncState {
        if self.draining.load(Ordering::Acquire) {
            SyncState::Syncing
        } else if self.connected_gateway().is_none() {
            SyncState::Offline
        } else if self.queue.is_empty() {
            SyncState::Synced
        } else {
            SyncState::Pending
        }
    }

    fn connected_gateway(&self) -> Option<Arc<G>> {
        if self.connectivity.is_online() {
            self.gateway()
        } else {
            None
        }
    }

    pub async fn save_profile(
        &self,
        owner: &OwnerKey,
        profile: UserProfile,
    ) -> Result<WriteOutcome> {
        self.write(owner, QueuedAction::SaveProfile { profile })
            .await
    }

    pub async fn save_record(&self, owner: &OwnerKey, record: HealthRecord) -> Result<WriteOutcome> {
        self.write(owner, QueuedAction::SaveRecord { record }).await
    }

    pub async fn update_record(
        &self,
        owner: &OwnerKey,
        record_id: RecordId,
        patch: RecordPatch,
    ) -> Result<WriteOutcome> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("record update has no fields".to_string()));
        }
        self.write(
            owner,
            QueuedAction::UpdateRecord {
                record_id,
                record: patch,
            },
        )
        .await
    }

    pub async fn delete_record(&self, owner: &OwnerKey, record_id: RecordId) -> Result<WriteOutcome> {
        self.write(owner, QueuedAction::DeleteRecord { record_id })
            .await
    }

    async fn write(&self, owner: &OwnerKey, action: QueuedAction) -> Result<WriteOutcome> {
        let Some(gateway) = self.connected_gateway() else {
            let operation_id = self.queue.enqueue(owner.clone(), action);
            return Ok(WriteOutcome::queued(operation_id));
        };

        match apply(gateway.as_ref(), owner, &action).await {
            Ok(applied) => {
                let record_id = match applied {
                    Applied::Created(id) => Some(id),
                    Applied::Done | Applied::Unsupported => None,
                };
                let report = self.drain().await;
                if let Some(blocked) = report.blocked_on {
                    tracing::debug!(operation_id = %blocked, "Post-write drain stopped early");
                }
                Ok(WriteOutcome::confirmed(record_id))
            }
            Err(source) => {
                tracing::warn!(
                    error = %source,
                    action = action.name(),
                    "Remote write failed; queueing for retry"
                );
                let operation_id = self.queue.enqueue(owner.clone(), action);
                Err(Error::Queued {
                    operation_id,
                    source,
                })
            }
        }
    }

    /// Replay queued operations in order until the queue is empty or an
    /// operation fails.
    pub async fn drain(&self) -> DrainReport {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("Drain already running; skipping");
            return DrainReport::skipped(DrainSkip::AlreadyRunning);
        };
        if !self.connectivity.is_online() {
            return DrainReport::skipped(DrainSkip::Offline);
        }
        let Some(gateway) = self.gateway() else {
            return DrainReport::skipped(DrainSkip::NotConnected);
        };

        let operations = self.queue.all();
        if operations.is_empty() {
            return DrainReport::default();
        }
        tracing::info!(pending = operations.len(), "Draining offline queue");

        let mut report = DrainReport::default();
        for operation in operations {
            match apply(gateway.as_ref(), &operation.owner_key, &operation.action).await {
                Ok(Applied::Unsupported) => {
                    tracing::warn!(
                        operation_id = %operation.id,
                        owner_key = %operation.owner_key,
                        "Dropping queued operation with unsupported action"
                    );
                    if let Err(error) = self.queue.remove_by_id(&operation.id) {
                        tracing::error!(%error, operation_id = %operation.id, "Failed to drop queued operation");
                        report.blocked_on = Some(operation.id);
                        report.last_error = Some(error.to_string());
                        break;
                    }
                    self.clear_failures(&operation.id);
                    report.dropped.push(operation.id);
                }
                Ok(_) => {
                    self.clear_failures(&operation.id);
                    if let Err(error) = self.queue.remove_by_id(&operation.id) {
                        // Stop here: continuing would replay this entry again next time
                        // while later entries were already applied.
                        tracing::error!(
                            %error,
                            operation_id = %operation.id,
                            "Applied operation could not be removed from the queue"
                        );
                        report.blocked_on = Some(operation.id);
                        report.last_error = Some(error.to_string());
                        break;
                    }
                    report.applied.push(operation.id);
                }
                Err(error) => {
                    let attempts = self.record_failure(&operation.id);
                    if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                        match self.queue.dead_letter(&operation, attempts, error.to_string()) {
                            Ok(()) => {
                                self.clear_failures(&operation.id);
                                report.dead_lettered.push(operation.id);
                                continue;
                            }
                            Err(storage_error) => {
                                tracing::error!(
                                    error = %storage_error,
                                    operation_id = %operation.id,
                                    "Failed to dead-letter operation"
                                );
                            }
                        }
                    }

                    tracing::warn!(
                        %error,
                        operation_id = %operation.id,
                        action = operation.action.name(),
                        attempts,
                        "Queued operation failed; keeping it and stopping drain"
                    );
                    report.blocked_on = Some(operation.id);
                    report.last_error = Some(error.to_string());
                    break;
                }
            }
        }

        tracing::info!(
            applied = report.applied.len(),
            dropped = report.dropped.len(),
            dead_lettered = report.dead_lettered.len(),
            blocked = report.blocked_on.is_some(),
            "Drain finished"
        );
        report
    }

    /// Persist one more failed attempt for `id`. A storage failure still
    /// counts the attempt for this drain.
    fn record_failure(&self, id: &OperationId) -> u32 {
        self.queue.record_failed_attempt(id).unwrap_or_else(|error| {
            tracing::error!(%error, operation_id = %id, "Failed to persist drain attempt count");
            self.queue.failed_attempts(id).saturating_add(1)
        })
    }

    fn clear_failures(&self, id: &OperationId) {
        if let Err(error) = self.queue.clear_failed_attempts(id) {
            tracing::warn!(%error, operation_id = %id, "Failed to clear drain attempt count");
        }
    }

    /// Remote profile overlaid with pending local profile edits.
    ///
    /// The remote side counts as absent while offline or disconnected, so
    /// queued edits stay visible. Recomputed on every call.
    pub async fn effective_profile(&self, owner: &OwnerKey) -> Result<Option<UserProfile>> {
        let remote = match self.connected_gateway() {
            Some(gateway) => gateway.read_profile(owner).await?,
            None => None,
        };
        let pending = self.queue.pending_profile_for(owner);

        Ok(match (remote, pending) {
            (Some(mut remote), Some(pending)) => {
                remote.merge_from(&pending);
                Some(remote)
            }
            (remote, pending) => remote.or(pending),
        })
    }

    /// Remote records in `[from, to]`, newest first. Queued writes are not
    /// reflected until they drain.
    pub async fn read_records(
        &self,
        owner: &OwnerKey,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<HealthRecord>> {
        let gateway = self.connected_gateway().ok_or(Error::NotConnected)?;
        Ok(gateway.read_records(owner, from, to).await?)
    }

    pub async fn read_extreme_record(
        &self,
        owner: &OwnerKey,
        order: RecordOrder,
    ) -> Result<Option<HealthRecord>> {
        let gateway = self.connected_gateway().ok_or(Error::NotConnected)?;
        Ok(gateway.read_extreme_record(owner, order).await?)
    }

    /// Pending operations, oldest first.
    pub fn pending(&self) -> Vec<QueuedOperation> {
        self.queue.all()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.queue.dead_letters()
    }

    pub fn requeue_dead_letter(&self, id: &OperationId) -> Result<bool> {
        self.queue.requeue_dead_letter(id)
    }
}
