//! Azukr CLI - log health records from the terminal
//!
//! Writes go straight to the remote store when it is reachable and into the
//! local offline queue otherwise.

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, ProfileCommands, QueueCommands, RecordCommands};
use crate::commands::common::open_session;
use crate::commands::completions::run_completions;
use crate::commands::profile::{run_profile_set, run_profile_show};
use crate::commands::queue::{
    run_queue_dead_letters, run_queue_drain, run_queue_list, run_queue_requeue,
};
use crate::commands::record::{
    run_record_add, run_record_bounds, run_record_delete, run_record_list, run_record_update,
    RecordInput,
};
use crate::config::Settings;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "azukr=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let settings = Settings::resolve(&cli)?;
    let session = open_session(&settings).await?;
    let coordinator = &session.coordinator;

    match cli.command {
        Commands::Profile { command } => {
            let owner = settings.owner()?;
            match command {
                ProfileCommands::Show {
                    json,
                    with_defaults,
                } => run_profile_show(coordinator, &owner, json, with_defaults).await?,
                ProfileCommands::Set { fields } => {
                    run_profile_set(coordinator, &owner, &fields).await?;
                }
            }
        }
        Commands::Record { command } => {
            let owner = settings.owner()?;
            match command {
                RecordCommands::Add {
                    kind,
                    at,
                    notes,
                    fields,
                } => {
                    let input = RecordInput {
                        kind: None,
                        at: at.as_deref(),
                        notes: notes.as_deref(),
                        fields: &fields,
                    };
                    run_record_add(coordinator, &owner, &kind, &input).await?;
                }
                RecordCommands::Update {
                    id,
                    kind,
                    at,
                    notes,
                    fields,
                } => {
                    let input = RecordInput {
                        kind: kind.as_deref(),
                        at: at.as_deref(),
                        notes: notes.as_deref(),
                        fields: &fields,
                    };
                    run_record_update(coordinator, &owner, &id, &input).await?;
                }
                RecordCommands::Delete { id } => {
                    run_record_delete(coordinator, &owner, &id).await?;
                }
                RecordCommands::List { from, to, json } => {
                    run_record_list(coordinator, &owner, from.as_deref(), to.as_deref(), json)
                        .await?;
                }
                RecordCommands::Bounds => run_record_bounds(coordinator, &owner).await?,
            }
        }
        Commands::Queue { command } => match command {
            QueueCommands::List { json } => run_queue_list(coordinator, json)?,
            QueueCommands::Drain => run_queue_drain(&session).await?,
            QueueCommands::DeadLetters { json } => run_queue_dead_letters(coordinator, json)?,
            QueueCommands::Requeue { id } => run_queue_requeue(coordinator, &id)?,
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
