use azukr_core::db::SqliteStore;
use azukr_core::queue::DeadLetter;
use azukr_core::{
    Connectivity, DrainReport, HealthRecord, HttpGateway, QueuedAction, QueuedOperation, RecordId,
    SyncCoordinator, Timestamp, WriteOutcome,
};
use serde_json::{Map, Value};

use crate::config::Settings;
use crate::error::CliError;

pub type CliCoordinator = SyncCoordinator<SqliteStore, HttpGateway>;

/// Coordinator opened for one invocation, plus the report of the drain that
/// ran when the remote gateway was attached.
pub struct Session {
    pub coordinator: CliCoordinator,
    pub attach_report: Option<DrainReport>,
}

pub async fn open_session(settings: &Settings) -> Result<Session, CliError> {
    let store = SqliteStore::open(settings.db_path())?;
    let coordinator = SyncCoordinator::new(store)
        .with_policy(settings.app.sync_policy())
        .with_connectivity(Connectivity::new(!settings.offline));

    let Some(api_base_url) = settings.app.api_base_url.clone() else {
        tracing::debug!("No API URL configured; writes stay in the offline queue");
        return Ok(Session {
            coordinator,
            attach_report: None,
        });
    };

    let gateway = HttpGateway::new(
        api_base_url,
        settings.app.api_token.clone(),
        settings.app.request_timeout(),
    )?;
    let report = coordinator.attach_gateway(gateway).await;
    if let Some(error) = &report.last_error {
        tracing::warn!(%error, "Queued operations are still pending");
    }

    Ok(Session {
        coordinator,
        attach_report: Some(report),
    })
}

/// Parse `key=value` pairs. Values are JSON when they parse as JSON and plain
/// strings otherwise.
pub fn parse_assignments(pairs: &[String]) -> Result<Map<String, Value>, CliError> {
    let mut fields = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(CliError::InvalidAssignment(pair.clone()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidAssignment(pair.clone()));
        }
        fields.insert(key.to_string(), parse_value(raw));
    }
    Ok(fields)
}

pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn parse_time(raw: &str) -> Result<Timestamp, CliError> {
    Ok(raw.parse::<Timestamp>()?)
}

pub fn normalize_record_id(id: &str) -> Result<RecordId, CliError> {
    let id = id.trim();
    if id.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(RecordId::new(id))
    }
}

pub fn describe_write(outcome: &WriteOutcome) -> String {
    if outcome.offline {
        outcome.operation_id.as_ref().map_or_else(
            || "Offline, and the change could not be stored locally".to_string(),
            |id| format!("Queued {id}; it will sync when the remote store is reachable"),
        )
    } else {
        outcome
            .record_id
            .as_ref()
            .map_or_else(|| "Saved".to_string(), |id| format!("Saved record {id}"))
    }
}

pub fn format_record_lines(records: &[HealthRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = record.id.as_ref().map_or("-", RecordId::as_str);
            let short_id = id.chars().take(13).collect::<String>();
            let when = record
                .timestamp
                .map_or_else(|| "-".to_string(), format_timestamp);
            let summary = record_summary(record);
            format!(
                "{short_id:<13}  {:<16}  {when:<23}  {summary}",
                record.kind.as_str()
            )
        })
        .collect()
}

pub fn record_summary(record: &HealthRecord) -> String {
    let mut parts = record
        .data
        .iter()
        .map(|(key, value)| format!("{key}={}", render_value(value)))
        .collect::<Vec<_>>();
    let notes = record.notes.trim();
    if !notes.is_empty() {
        parts.push(format!("\"{notes}\""));
    }
    parts.join(" ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn format_queue_lines(operations: &[QueuedOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            format!(
                "{}  {}  {:<12}  {}  {}",
                operation.id,
                format_timestamp(operation.enqueued_at),
                operation.action.name(),
                operation.owner_key,
                action_target(&operation.action)
            )
        })
        .collect()
}

fn action_target(action: &QueuedAction) -> String {
    match action {
        QueuedAction::SaveProfile { profile } => {
            let mut keys = profile.fields().keys().cloned().collect::<Vec<_>>();
            keys.sort();
            keys.join(",")
        }
        QueuedAction::SaveRecord { record } => record.kind.to_string(),
        QueuedAction::UpdateRecord { record_id, .. } | QueuedAction::DeleteRecord { record_id } => {
            record_id.to_string()
        }
        QueuedAction::Unsupported => String::new(),
    }
}

pub fn format_dead_letter_lines(letters: &[DeadLetter]) -> Vec<String> {
    letters
        .iter()
        .map(|letter| {
            format!(
                "{}  {:<12}  attempts={}  {}  {}",
                letter.operation.id,
                letter.operation.action.name(),
                letter.attempts,
                format_timestamp(letter.dead_lettered_at),
                letter.last_error
            )
        })
        .collect()
}

pub fn format_drain_report(report: &DrainReport) -> Vec<String> {
    if let Some(reason) = report.skipped {
        return vec![format!("Drain skipped: {reason:?}")];
    }

    let mut lines = vec![format!(
        "Applied {}, dropped {}, dead-lettered {}",
        report.applied.len(),
        report.dropped.len(),
        report.dead_lettered.len()
    )];
    if let Some(blocked) = &report.blocked_on {
        let error = report.last_error.as_deref().unwrap_or("unknown error");
        lines.push(format!("Stopped at {blocked}: {error}"));
    }
    lines
}

pub fn format_timestamp(timestamp: Timestamp) -> String {
    let millis = timestamp.as_millis();
    chrono::DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
