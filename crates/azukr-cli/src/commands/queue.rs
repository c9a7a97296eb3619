use azukr_core::db::KeyValueStore;
use azukr_core::{DrainReport, OperationId, RemoteGateway, SyncCoordinator};

use crate::commands::common::{
    format_dead_letter_lines, format_drain_report, format_queue_lines, Session,
};
use crate::error::CliError;

pub fn run_queue_list<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    as_json: bool,
) -> Result<(), CliError> {
    let pending = coordinator.pending();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    println!(
        "{} pending ({})",
        pending.len(),
        coordinator.sync_state().label()
    );
    for line in format_queue_lines(&pending) {
        println!("{line}");
    }
    Ok(())
}

/// Drain the queue. Opening the session already drained once when the
/// gateway was attached; that report is shown unless it was skipped.
pub async fn run_queue_drain(session: &Session) -> Result<(), CliError> {
    let Some(attach_report) = &session.attach_report else {
        return Err(CliError::SyncNotConfigured);
    };

    let report = if attach_report.skipped.is_none() {
        attach_report.clone()
    } else {
        session.coordinator.drain().await
    };
    print_drain_report(&report);
    Ok(())
}

pub fn print_drain_report(report: &DrainReport) {
    for line in format_drain_report(report) {
        println!("{line}");
    }
}

pub fn run_queue_dead_letters<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    as_json: bool,
) -> Result<(), CliError> {
    let letters = coordinator.dead_letters();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&letters)?);
        return Ok(());
    }
    if letters.is_empty() {
        println!("No dead-lettered operations.");
        return Ok(());
    }
    for line in format_dead_letter_lines(&letters) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_queue_requeue<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    id: &str,
) -> Result<(), CliError> {
    let id = OperationId::from(id.trim());
    if !coordinator.requeue_dead_letter(&id)? {
        return Err(CliError::DeadLetterNotFound(id.to_string()));
    }
    println!("Requeued {id}");
    Ok(())
}
