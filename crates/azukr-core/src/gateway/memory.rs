//! In-process document store gateway

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{
    stamp_for_create, DeleteOutcome, GatewayError, GatewayResult, RecordOrder, RemoteGateway,
};
use crate::models::{HealthRecord, OwnerKey, RecordId, RecordPatch, Timestamp, UserProfile};

#[derive(Debug, Default)]
struct OwnerDocuments {
    profile: Option<UserProfile>,
    records: HashMap<RecordId, HealthRecord>,
}

/// Remote store kept in memory, partitioned per owner.
///
/// Behaves like the hosted document store: merge upserts for profiles,
/// server-assigned record ids, inclusive timestamp range reads.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    owners: Mutex<HashMap<OwnerKey, OwnerDocuments>>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, HashMap<OwnerKey, OwnerDocuments>>> {
        self.owners
            .lock()
            .map_err(|_| GatewayError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Every record stored for `owner`, newest first.
    pub fn records(&self, owner: &OwnerKey) -> GatewayResult<Vec<HealthRecord>> {
        let owners = self.lock()?;
        let mut records = owners
            .get(owner)
            .map(|documents| documents.records.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        sort_newest_first(&mut records);
        Ok(records)
    }
}

fn timestamp_of(record: &HealthRecord) -> Timestamp {
    record.timestamp.unwrap_or(Timestamp::from_millis(0))
}

fn sort_newest_first(records: &mut [HealthRecord]) {
    records.sort_by(|a, b| {
        timestamp_of(b)
            .cmp(&timestamp_of(a))
            .then_with(|| b.id.cmp(&a.id))
    });
}

impl RemoteGateway for MemoryGateway {
    async fn create_profile(&self, owner: &OwnerKey, profile: &UserProfile) -> GatewayResult<()> {
        let mut owners = self.lock()?;
        let documents = owners.entry(owner.clone()).or_default();
        match documents.profile.as_mut() {
            Some(existing) => existing.merge_from(profile),
            None => documents.profile = Some(profile.clone()),
        }
        Ok(())
    }

    async fn create_record(
        &self,
        owner: &OwnerKey,
        record: &HealthRecord,
    ) -> GatewayResult<RecordId> {
        let id = RecordId::new(Uuid::now_v7().simple().to_string());
        let mut stored = stamp_for_create(record);
        stored.id = Some(id.clone());

        let mut owners = self.lock()?;
        owners
            .entry(owner.clone())
            .or_default()
            .records
            .insert(id.clone(), stored);
        Ok(id)
    }

    async fn update_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
        patch: &RecordPatch,
    ) -> GatewayResult<()> {
        let mut owners = self.lock()?;
        let record = owners
            .get_mut(owner)
            .and_then(|documents| documents.records.get_mut(record_id))
            .ok_or_else(|| GatewayError::NotFound(format!("record {record_id}")))?;
        patch.apply_to(record);
        Ok(())
    }

    async fn delete_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
    ) -> GatewayResult<DeleteOutcome> {
        let mut owners = self.lock()?;
        let removed = owners
            .get_mut(owner)
            .and_then(|documents| documents.records.remove(record_id));
        Ok(if removed.is_some() {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::AlreadyAbsent
        })
    }

    async fn read_profile(&self, owner: &OwnerKey) -> GatewayResult<Option<UserProfile>> {
        let owners = self.lock()?;
        Ok(owners
            .get(owner)
            .and_then(|documents| documents.profile.clone()))
    }

    async fn read_records(
        &self,
        owner: &OwnerKey,
        from: Timestamp,
        to: Timestamp,
    ) -> GatewayResult<Vec<HealthRecord>> {
        let mut records = self.records(owner)?;
        records.retain(|record| {
            let timestamp = timestamp_of(record);
            from <= timestamp && timestamp <= to
        });
        Ok(records)
    }

    async fn read_extreme_record(
        &self,
        owner: &OwnerKey,
        order: RecordOrder,
    ) -> GatewayResult<Option<HealthRecord>> {
        let mut records = self.records(owner)?;
        Ok(match order {
            RecordOrder::Newest => records.into_iter().next(),
            RecordOrder::Oldest => records.pop(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordData, RecordKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn owner() -> OwnerKey {
        OwnerKey::from_encoded("u1")
    }

    fn glucose_at(millis: i64, level: i64) -> HealthRecord {
        HealthRecord::new(RecordKind::Glucose)
            .with_timestamp(Timestamp::from_millis(millis))
            .with_field("level", level)
    }

    #[tokio::test]
    async fn create_profile_merges_fields() {
        let gateway = MemoryGateway::new();
        gateway
            .create_profile(&owner(), &UserProfile::new().with("unidadGlucosa", "mg/dL").with("muyAlto", 180))
            .await
            .unwrap();
        gateway
            .create_profile(&owner(), &UserProfile::new().with("unidadGlucosa", "mmol/L"))
            .await
            .unwrap();

        let profile = gateway.read_profile(&owner()).await.unwrap().unwrap();
        assert_eq!(profile.glucose_unit(), Some("mmol/L"));
        assert_eq!(profile.get("muyAlto"), Some(&json!(180)));
        assert!(gateway
            .read_profile(&OwnerKey::from_encoded("nobody"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn read_records_is_inclusive_and_newest_first() {
        let gateway = MemoryGateway::new();
        for (millis, level) in [(100, 1), (200, 2), (300, 3), (400, 4)] {
            gateway
                .create_record(&owner(), &glucose_at(millis, level))
                .await
                .unwrap();
        }

        let records = gateway
            .read_records(&owner(), Timestamp::from_millis(200), Timestamp::from_millis(300))
            .await
            .unwrap();
        let levels = records
            .iter()
            .map(|record| record.data["level"].clone())
            .collect::<Vec<_>>();
        assert_eq!(levels, vec![json!(3), json!(2)]);
        assert!(records.iter().all(|record| record.id.is_some()));
    }

    #[tokio::test]
    async fn read_extreme_record_returns_bounds() {
        let gateway = MemoryGateway::new();
        assert!(gateway
            .read_extreme_record(&owner(), RecordOrder::Oldest)
            .await
            .unwrap()
            .is_none());

        for millis in [500, 100, 900] {
            gateway
                .create_record(&owner(), &glucose_at(millis, 1))
                .await
                .unwrap();
        }

        let oldest = gateway
            .read_extreme_record(&owner(), RecordOrder::Oldest)
            .await
            .unwrap()
            .unwrap();
        let newest = gateway
            .read_extreme_record(&owner(), RecordOrder::Newest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(oldest.timestamp, Some(Timestamp::from_millis(100)));
        assert_eq!(newest.timestamp, Some(Timestamp::from_millis(900)));
    }

    #[tokio::test]
    async fn update_merges_and_rejects_missing_records() {
        let gateway = MemoryGateway::new();
        let id = gateway
            .create_record(&owner(), &glucose_at(100, 120).with_field("unit", "mg/dL"))
            .await
            .unwrap();

        let mut data = RecordData::new();
        data.insert("level".to_string(), json!(99));
        let patch = RecordPatch {
            data: Some(data),
            ..RecordPatch::default()
        };
        gateway.update_record(&owner(), &id, &patch).await.unwrap();

        let stored = gateway.records(&owner()).unwrap().remove(0);
        assert_eq!(stored.data["level"], json!(99));
        assert_eq!(stored.data["unit"], json!("mg/dL"));

        let missing = gateway
            .update_record(&owner(), &RecordId::new("missing"), &patch)
            .await;
        assert!(matches!(missing, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_distinguishes_absent_records() {
        let gateway = MemoryGateway::new();
        let id = gateway
            .create_record(&owner(), &glucose_at(100, 120))
            .await
            .unwrap();

        assert_eq!(
            gateway.delete_record(&owner(), &id).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            gateway.delete_record(&owner(), &id).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }
}
