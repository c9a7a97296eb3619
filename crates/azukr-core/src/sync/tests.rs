use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::Notify;

use super::*;
use crate::connectivity::Connectivity;
use crate::db::{MemoryStore, SqliteStore};
use crate::gateway::{DeleteOutcome, GatewayError, MemoryGateway};
use crate::models::RecordKind;
use crate::queue::QUEUE_STORAGE_KEY;

/// Memory gateway with failure injection and an optional gate that holds
/// the first mutating call until released.
#[derive(Default)]
struct ScriptedGateway {
    inner: MemoryGateway,
    attempts: Mutex<Vec<String>>,
    failing_attempts: Mutex<HashSet<usize>>,
    fail_all: AtomicBool,
    gate: Option<Gate>,
}

#[derive(Clone, Default)]
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl ScriptedGateway {
    fn failing_on(attempts: &[usize]) -> Self {
        Self {
            failing_attempts: Mutex::new(attempts.iter().copied().collect()),
            ..Self::default()
        }
    }

    fn failing_always() -> Self {
        Self {
            fail_all: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn gated(gate: Gate) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    async fn before_mutation(&self, label: String) -> GatewayResult<()> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(label);
            attempts.len()
        };
        if let Some(gate) = &self.gate {
            if attempt == 1 {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
        if self.fail_all.load(Ordering::SeqCst)
            || self.failing_attempts.lock().unwrap().contains(&attempt)
        {
            return Err(GatewayError::Unavailable("scripted failure".to_string()));
        }
        Ok(())
    }
}

impl RemoteGateway for ScriptedGateway {
    async fn create_profile(&self, owner: &OwnerKey, profile: &UserProfile) -> GatewayResult<()> {
        self.before_mutation("saveProfile".to_string()).await?;
        self.inner.create_profile(owner, profile).await
    }

    async fn create_record(
        &self,
        owner: &OwnerKey,
        record: &HealthRecord,
    ) -> GatewayResult<RecordId> {
        self.before_mutation(format!("saveRecord:{}", record.notes))
            .await?;
        self.inner.create_record(owner, record).await
    }

    async fn update_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
        patch: &RecordPatch,
    ) -> GatewayResult<()> {
        self.before_mutation(format!("updateRecord:{record_id}"))
            .await?;
        self.inner.update_record(owner, record_id, patch).await
    }

    async fn delete_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
    ) -> GatewayResult<DeleteOutcome> {
        self.before_mutation(format!("deleteRecord:{record_id}"))
            .await?;
        self.inner.delete_record(owner, record_id).await
    }

    async fn read_profile(&self, owner: &OwnerKey) -> GatewayResult<Option<UserProfile>> {
        self.inner.read_profile(owner).await
    }

    async fn read_records(
        &self,
        owner: &OwnerKey,
        from: Timestamp,
        to: Timestamp,
    ) -> GatewayResult<Vec<HealthRecord>> {
        self.inner.read_records(owner, from, to).await
    }

    async fn read_extreme_record(
        &self,
        owner: &OwnerKey,
        order: RecordOrder,
    ) -> GatewayResult<Option<HealthRecord>> {
        self.inner.read_extreme_record(owner, order).await
    }
}

fn u1() -> OwnerKey {
    OwnerKey::from_encoded("u1")
}

fn glucose(note: &str) -> HealthRecord {
    HealthRecord::new(RecordKind::Glucose)
        .with_timestamp(Timestamp::from_millis(1_000))
        .with_notes(note)
        .with_field("level", 120)
}

fn all_time() -> (Timestamp, Timestamp) {
    (Timestamp::from_millis(i64::MIN), Timestamp::from_millis(i64::MAX))
}

/// Coordinator with a gateway attached while offline, so nothing drains
/// until the test flips the raw connectivity flag.
async fn offline_coordinator<G: RemoteGateway>(gateway: G) -> SyncCoordinator<MemoryStore, G> {
    let coordinator =
        SyncCoordinator::new(MemoryStore::new()).with_connectivity(Connectivity::new(false));
    let report = coordinator.attach_gateway(gateway).await;
    assert_eq!(report.skipped, Some(DrainSkip::Offline));
    coordinator
}

#[tokio::test]
async fn offline_writes_queue_in_order() {
    let coordinator = offline_coordinator(ScriptedGateway::default()).await;

    let mut ids = Vec::new();
    for note in ["a", "b", "c"] {
        let outcome = coordinator.save_record(&u1(), glucose(note)).await.unwrap();
        assert!(outcome.offline);
        ids.push(outcome.operation_id.unwrap());
    }

    let pending = coordinator.pending();
    assert_eq!(
        pending.iter().map(|op| op.id.clone()).collect::<Vec<_>>(),
        ids
    );
    assert!(coordinator.gateway().unwrap().attempts().is_empty());
    assert_eq!(coordinator.sync_state(), SyncState::Offline);
}

#[tokio::test]
async fn writes_without_gateway_queue() {
    let coordinator: SyncCoordinator<MemoryStore, MemoryGateway> =
        SyncCoordinator::new(MemoryStore::new());

    let outcome = coordinator
        .delete_record(&u1(), RecordId::new("r1"))
        .await
        .unwrap();

    assert!(outcome.offline);
    assert_eq!(coordinator.pending().len(), 1);
    assert_eq!(coordinator.drain().await.skipped, Some(DrainSkip::NotConnected));
}

#[tokio::test]
async fn offline_record_syncs_after_reconnect() {
    let coordinator = offline_coordinator(MemoryGateway::new()).await;
    let record = HealthRecord::new(RecordKind::Glucose).with_field("level", 120);

    coordinator.save_record(&u1(), record).await.unwrap();
    assert_eq!(coordinator.pending().len(), 1);

    let report = coordinator.set_online(true).await.unwrap();
    assert_eq!(report.applied.len(), 1);
    assert!(coordinator.pending().is_empty());

    let (from, to) = all_time();
    let stored = coordinator.read_records(&u1(), from, to).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].data["level"], json!(120));
    assert!(stored[0].timestamp.is_some());
    assert_eq!(coordinator.sync_state(), SyncState::Synced);
}

#[tokio::test]
async fn set_online_drains_only_on_transition() {
    let coordinator = offline_coordinator(MemoryGateway::new()).await;
    assert!(coordinator.set_online(false).await.is_none());
    assert!(coordinator.set_online(true).await.is_some());
    assert!(coordinator.set_online(true).await.is_none());
}

#[tokio::test]
async fn attach_gateway_drains_queue() {
    let coordinator: SyncCoordinator<MemoryStore, MemoryGateway> =
        SyncCoordinator::new(MemoryStore::new());
    coordinator
        .save_profile(&u1(), UserProfile::new().with("unidadGlucosa", "mmol/L"))
        .await
        .unwrap();

    let report = coordinator.attach_gateway(MemoryGateway::new()).await;

    assert_eq!(report.applied.len(), 1);
    let remote = coordinator
        .gateway()
        .unwrap()
        .read_profile(&u1())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remote.glucose_unit(), Some("mmol/L"));
}

#[tokio::test]
async fn direct_write_is_confirmed_and_drains_backlog() {
    let coordinator = offline_coordinator(ScriptedGateway::default()).await;
    coordinator.save_record(&u1(), glucose("queued")).await.unwrap();
    coordinator.connectivity().set_online(true);

    let outcome = coordinator
        .save_record(&u1(), glucose("direct"))
        .await
        .unwrap();

    assert!(!outcome.offline);
    assert!(outcome.record_id.is_some());
    assert!(coordinator.pending().is_empty());
    assert_eq!(
        coordinator.gateway().unwrap().attempts(),
        vec!["saveRecord:direct", "saveRecord:queued"]
    );
}

#[tokio::test]
async fn failed_direct_write_is_queued_and_reported() {
    let coordinator: SyncCoordinator<MemoryStore, ScriptedGateway> =
        SyncCoordinator::new(MemoryStore::new());
    coordinator
        .attach_gateway(ScriptedGateway::failing_always())
        .await;

    let error = coordinator
        .save_record(&u1(), glucose("lost signal"))
        .await
        .unwrap_err();

    let Error::Queued {
        operation_id,
        source,
    } = error
    else {
        panic!("expected a queued error");
    };
    assert!(matches!(source, GatewayError::Unavailable(_)));
    let pending = coordinator.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(Some(pending[0].id.clone()), operation_id);
    assert_eq!(coordinator.sync_state(), SyncState::Pending);
}

#[tokio::test]
async fn drain_stops_at_first_failure() {
    let coordinator = offline_coordinator(ScriptedGateway::failing_on(&[2])).await;
    for note in ["first", "second", "third"] {
        coordinator.save_record(&u1(), glucose(note)).await.unwrap();
    }
    let queued = coordinator.pending();
    coordinator.connectivity().set_online(true);

    let report = coordinator.drain().await;

    assert_eq!(report.applied, vec![queued[0].id.clone()]);
    assert_eq!(report.blocked_on, Some(queued[1].id.clone()));
    assert_eq!(
        coordinator.pending(),
        vec![queued[1].clone(), queued[2].clone()]
    );
    assert_eq!(
        coordinator.gateway().unwrap().attempts(),
        vec!["saveRecord:first", "saveRecord:second"]
    );
}

#[tokio::test]
async fn concurrent_drain_is_a_no_op() {
    let gate = Gate::default();
    let coordinator = offline_coordinator(ScriptedGateway::gated(gate.clone())).await;
    for note in ["a", "b", "c"] {
        coordinator.save_record(&u1(), glucose(note)).await.unwrap();
    }
    coordinator.connectivity().set_online(true);

    let second = async {
        gate.entered.notified().await;
        assert_eq!(coordinator.sync_state(), SyncState::Syncing);
        let report = coordinator.drain().await;
        assert_eq!(coordinator.pending().len(), 3);
        gate.release.notify_one();
        report
    };
    let (first_report, second_report) = tokio::join!(coordinator.drain(), second);

    assert_eq!(second_report.skipped, Some(DrainSkip::AlreadyRunning));
    assert!(second_report.applied.is_empty());
    assert_eq!(first_report.applied.len(), 3);
    assert!(coordinator.pending().is_empty());
    assert_eq!(coordinator.gateway().unwrap().attempts().len(), 3);
}

#[tokio::test]
async fn drain_flag_resets_when_drain_is_cancelled() {
    let gate = Gate::default();
    let coordinator = offline_coordinator(ScriptedGateway::gated(gate.clone())).await;
    coordinator.save_record(&u1(), glucose("a")).await.unwrap();
    coordinator.connectivity().set_online(true);

    tokio::select! {
        _ = coordinator.drain() => panic!("gated drain should not finish"),
        () = gate.entered.notified() => {}
    }

    let report = coordinator.drain().await;
    assert_eq!(report.skipped, None);
    assert_eq!(report.applied.len(), 1);
}

#[tokio::test]
async fn unsupported_entries_are_dropped_and_reported() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            QUEUE_STORAGE_KEY,
            &json!([
                {
                    "id": "legacy-1",
                    "enqueuedAt": 0,
                    "ownerKey": "u1",
                    "action": "syncWearable"
                },
                {
                    "id": "op-2",
                    "enqueuedAt": 1,
                    "ownerKey": "u1",
                    "action": "saveProfile",
                    "profile": { "unidadGlucosa": "mg/dL" }
                }
            ])
            .to_string(),
        )
        .unwrap();
    let coordinator: SyncCoordinator<_, ScriptedGateway> = SyncCoordinator::new(Arc::clone(&store));

    let report = coordinator.attach_gateway(ScriptedGateway::default()).await;

    assert_eq!(report.dropped, vec![OperationId::from("legacy-1")]);
    assert_eq!(report.applied, vec![OperationId::from("op-2")]);
    assert!(coordinator.pending().is_empty());
    assert_eq!(coordinator.gateway().unwrap().attempts(), vec!["saveProfile"]);
}

#[tokio::test]
async fn effective_profile_prefers_pending_values() {
    let coordinator = offline_coordinator(MemoryGateway::new()).await;
    coordinator
        .gateway()
        .unwrap()
        .create_profile(
            &u1(),
            &UserProfile::new()
                .with("unidadGlucosa", "mg/dL")
                .with("muyAlto", 180),
        )
        .await
        .unwrap();
    coordinator
        .save_profile(&u1(), UserProfile::new().with("unidadGlucosa", "mmol/L"))
        .await
        .unwrap();
    coordinator.connectivity().set_online(true);

    let profile = coordinator.effective_profile(&u1()).await.unwrap().unwrap();

    assert_eq!(profile.glucose_unit(), Some("mmol/L"));
    assert_eq!(profile.get("muyAlto"), Some(&json!(180)));
    // Recomputed per call: once drained, the remote alone carries the value.
    coordinator.drain().await;
    let profile = coordinator.effective_profile(&u1()).await.unwrap().unwrap();
    assert_eq!(profile.glucose_unit(), Some("mmol/L"));
}

#[tokio::test]
async fn effective_profile_is_none_only_when_both_sides_are_absent() {
    let coordinator = offline_coordinator(MemoryGateway::new()).await;
    assert!(coordinator.effective_profile(&u1()).await.unwrap().is_none());

    coordinator
        .save_profile(&u1(), UserProfile::new().with("sexo", "F"))
        .await
        .unwrap();
    let profile = coordinator.effective_profile(&u1()).await.unwrap().unwrap();
    assert_eq!(profile.get("sexo"), Some(&json!("F")));
}

#[tokio::test]
async fn offline_delete_is_eventually_consistent() {
    let coordinator: SyncCoordinator<MemoryStore, MemoryGateway> =
        SyncCoordinator::new(MemoryStore::new());
    coordinator.attach_gateway(MemoryGateway::new()).await;
    let created = coordinator
        .save_record(&u1(), glucose("to delete"))
        .await
        .unwrap()
        .record_id
        .unwrap();

    // Reads are not offline-aware: the record stays visible until drain.
    coordinator.connectivity().set_online(false);
    coordinator
        .delete_record(&u1(), created.clone())
        .await
        .unwrap();
    let pending = coordinator.pending();
    assert_eq!(
        pending[0].action,
        QueuedAction::DeleteRecord {
            record_id: created.clone()
        }
    );
    assert_eq!(coordinator.gateway().unwrap().records(&u1()).unwrap().len(), 1);

    coordinator.set_online(true).await;
    assert!(coordinator.gateway().unwrap().records(&u1()).unwrap().is_empty());
}

#[tokio::test]
async fn update_record_rejects_empty_patch() {
    let coordinator: SyncCoordinator<MemoryStore, MemoryGateway> =
        SyncCoordinator::new(MemoryStore::new());
    let result = coordinator
        .update_record(&u1(), RecordId::new("r1"), RecordPatch::default())
        .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(coordinator.pending().is_empty());
}

#[tokio::test]
async fn default_policy_keeps_failing_head_forever() {
    let coordinator = offline_coordinator(MemoryGateway::new()).await;
    let patch = RecordPatch {
        notes: Some("edited".to_string()),
        ..RecordPatch::default()
    };
    coordinator
        .update_record(&u1(), RecordId::new("missing"), patch)
        .await
        .unwrap();
    coordinator.save_record(&u1(), glucose("behind")).await.unwrap();
    coordinator.connectivity().set_online(true);

    for _ in 0..5 {
        let report = coordinator.drain().await;
        assert!(report.blocked_on.is_some());
        assert!(report.dead_lettered.is_empty());
    }
    assert_eq!(coordinator.pending().len(), 2);
}

#[tokio::test]
async fn bounded_policy_dead_letters_and_continues() {
    let coordinator = SyncCoordinator::new(MemoryStore::new())
        .with_connectivity(Connectivity::new(false))
        .with_policy(SyncPolicy {
            max_attempts: Some(2),
        });
    coordinator.attach_gateway(MemoryGateway::new()).await;
    let patch = RecordPatch {
        notes: Some("edited".to_string()),
        ..RecordPatch::default()
    };
    coordinator
        .update_record(&u1(), RecordId::new("missing"), patch)
        .await
        .unwrap();
    coordinator.save_record(&u1(), glucose("behind")).await.unwrap();
    let stuck = coordinator.pending()[0].id.clone();
    coordinator.connectivity().set_online(true);

    let first = coordinator.drain().await;
    assert_eq!(first.blocked_on, Some(stuck.clone()));

    assert_eq!(coordinator.policy().max_attempts, Some(2));
    assert_eq!(coordinator.queue().failed_attempts(&stuck), 1);

    let second = coordinator.drain().await;
    assert_eq!(second.dead_lettered, vec![stuck.clone()]);
    assert_eq!(coordinator.queue().failed_attempts(&stuck), 0);
    assert_eq!(second.applied.len(), 1);
    assert!(coordinator.pending().is_empty());

    let letters = coordinator.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].attempts, 2);
    assert!(letters[0].last_error.contains("missing"));

    assert!(coordinator.requeue_dead_letter(&stuck).unwrap());
    assert_eq!(coordinator.pending()[0].id, stuck);
}

#[tokio::test]
async fn attempt_counts_carry_over_between_coordinators() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("queue.db");
    let open = || {
        SyncCoordinator::<SqliteStore, MemoryGateway>::new(SqliteStore::open(&path).unwrap())
            .with_policy(SyncPolicy {
                max_attempts: Some(2),
            })
    };
    let patch = RecordPatch {
        notes: Some("edited".to_string()),
        ..RecordPatch::default()
    };
    let stuck = open()
        .update_record(&u1(), RecordId::new("missing"), patch)
        .await
        .unwrap()
        .operation_id
        .unwrap();

    let first = open().attach_gateway(MemoryGateway::new()).await;
    assert_eq!(first.blocked_on, Some(stuck.clone()));
    assert!(first.dead_lettered.is_empty());

    let coordinator = open();
    assert_eq!(coordinator.queue().failed_attempts(&stuck), 1);
    let second = coordinator.attach_gateway(MemoryGateway::new()).await;
    assert_eq!(second.dead_lettered, vec![stuck.clone()]);
    assert!(coordinator.pending().is_empty());
    assert_eq!(coordinator.dead_letters()[0].attempts, 2);
}

#[tokio::test]
async fn far_future_record_survives_the_queue() {
    let far_future = Timestamp::from_millis(253_402_300_800_000);
    let coordinator = offline_coordinator(MemoryGateway::new()).await;
    let record = glucose("year 10000").with_timestamp(far_future);
    coordinator.save_record(&u1(), record).await.unwrap();

    let pending = coordinator.pending();
    let QueuedAction::SaveRecord { record } = &pending[0].action else {
        panic!("expected saveRecord, got {:?}", pending[0].action);
    };
    assert_eq!(record.timestamp, Some(far_future));

    let report = coordinator.set_online(true).await.unwrap();
    assert_eq!(report.applied, vec![pending[0].id.clone()]);
    assert!(report.dropped.is_empty());
    let stored = coordinator.gateway().unwrap().records(&u1()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].timestamp, Some(far_future));
}

#[tokio::test]
async fn detached_gateway_sends_writes_to_the_queue() {
    let coordinator: SyncCoordinator<MemoryStore, MemoryGateway> =
        SyncCoordinator::new(MemoryStore::new());
    coordinator.attach_gateway(MemoryGateway::new()).await;
    assert_eq!(coordinator.sync_state(), SyncState::Synced);

    let previous = coordinator.detach_gateway().unwrap();
    assert!(coordinator.detach_gateway().is_none());
    assert_eq!(coordinator.sync_state(), SyncState::Offline);

    let outcome = coordinator.save_record(&u1(), glucose("after sign-out")).await.unwrap();
    assert!(outcome.offline);
    assert_eq!(coordinator.pending().len(), 1);
    assert!(previous.records(&u1()).unwrap().is_empty());
    assert_eq!(coordinator.drain().await.skipped, Some(DrainSkip::NotConnected));
}

#[tokio::test]
async fn coordinators_are_independent() {
    let gate = Gate::default();
    let blocked = offline_coordinator(ScriptedGateway::gated(gate.clone())).await;
    let other = offline_coordinator(ScriptedGateway::default()).await;
    blocked.save_record(&u1(), glucose("a")).await.unwrap();
    other.save_record(&u1(), glucose("b")).await.unwrap();
    blocked.connectivity().set_online(true);
    other.connectivity().set_online(true);

    let check_other = async {
        gate.entered.notified().await;
        let report = other.drain().await;
        gate.release.notify_one();
        report
    };
    let (_, other_report) = tokio::join!(blocked.drain(), check_other);

    assert_eq!(other_report.skipped, None);
    assert_eq!(other_report.applied.len(), 1);
}

#[tokio::test]
async fn queue_survives_reopen_of_sqlite_store() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("queue.db");

    {
        let coordinator: SyncCoordinator<SqliteStore, MemoryGateway> =
            SyncCoordinator::new(SqliteStore::open(&path).unwrap());
        coordinator.save_record(&u1(), glucose("persisted")).await.unwrap();
    }

    let coordinator: SyncCoordinator<SqliteStore, MemoryGateway> =
        SyncCoordinator::new(SqliteStore::open(&path).unwrap());
    assert_eq!(coordinator.pending().len(), 1);

    let report = coordinator.attach_gateway(MemoryGateway::new()).await;
    assert_eq!(report.applied.len(), 1);
    assert!(coordinator.pending().is_empty());
}
