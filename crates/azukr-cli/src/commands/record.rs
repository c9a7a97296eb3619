use azukr_core::db::KeyValueStore;
use azukr_core::gateway::RecordOrder;
use azukr_core::{
    HealthRecord, OwnerKey, RecordKind, RecordPatch, RemoteGateway, SyncCoordinator, Timestamp,
};

use crate::commands::common::{
    describe_write, format_record_lines, format_timestamp, normalize_record_id, parse_assignments,
    parse_time,
};
use crate::error::CliError;

/// Flags shared by `record add` and `record update`.
#[derive(Debug, Default)]
pub struct RecordInput<'a> {
    pub kind: Option<&'a str>,
    pub at: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub fields: &'a [String],
}

pub fn build_record(kind: &str, input: &RecordInput<'_>) -> Result<HealthRecord, CliError> {
    let mut record = HealthRecord::new(RecordKind::parse(kind));
    if let Some(at) = input.at {
        record.timestamp = Some(parse_time(at)?);
    }
    if let Some(notes) = input.notes {
        record.notes = notes.trim().to_string();
    }
    record.data = parse_assignments(input.fields)?;
    Ok(record)
}

pub fn build_patch(input: &RecordInput<'_>) -> Result<RecordPatch, CliError> {
    let data = parse_assignments(input.fields)?;
    let patch = RecordPatch {
        kind: input.kind.map(RecordKind::parse),
        timestamp: input.at.map(parse_time).transpose()?,
        notes: input.notes.map(|notes| notes.trim().to_string()),
        data: (!data.is_empty()).then_some(data),
    };
    if patch.is_empty() {
        return Err(CliError::EmptyUpdate);
    }
    Ok(patch)
}

pub async fn run_record_add<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    kind: &str,
    input: &RecordInput<'_>,
) -> Result<(), CliError> {
    let record = build_record(kind, input)?;
    let outcome = coordinator.save_record(owner, record).await?;
    println!("{}", describe_write(&outcome));
    Ok(())
}

pub async fn run_record_update<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    id: &str,
    input: &RecordInput<'_>,
) -> Result<(), CliError> {
    let record_id = normalize_record_id(id)?;
    let patch = build_patch(input)?;
    let outcome = coordinator.update_record(owner, record_id, patch).await?;
    println!("{}", describe_write(&outcome));
    Ok(())
}

pub async fn run_record_delete<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    id: &str,
) -> Result<(), CliError> {
    let record_id = normalize_record_id(id)?;
    let outcome = coordinator.delete_record(owner, record_id).await?;
    println!("{}", describe_write(&outcome));
    Ok(())
}

pub async fn list_records<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Vec<HealthRecord>, CliError> {
    let from = from.map_or(Ok(Timestamp::from_millis(i64::MIN)), parse_time)?;
    let to = to.map_or(Ok(Timestamp::from_millis(i64::MAX)), parse_time)?;
    Ok(coordinator.read_records(owner, from, to).await?)
}

pub async fn run_record_list<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    from: Option<&str>,
    to: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let records = list_records(coordinator, owner, from, to).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No records in range.");
        return Ok(());
    }
    for line in format_record_lines(&records) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_record_bounds<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
) -> Result<(), CliError> {
    let oldest = coordinator
        .read_extreme_record(owner, RecordOrder::Oldest)
        .await?;
    let newest = coordinator
        .read_extreme_record(owner, RecordOrder::Newest)
        .await?;

    let describe = |record: Option<HealthRecord>| {
        record
            .and_then(|record| record.timestamp)
            .map_or_else(|| "-".to_string(), format_timestamp)
    };
    println!("Oldest: {}", describe(oldest));
    println!("Newest: {}", describe(newest));
    Ok(())
}
