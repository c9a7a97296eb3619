use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "azukr")]
#[command(about = "Log health records from the command line, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the local queue database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Account email that owns the data
    #[arg(long, global = true, value_name = "EMAIL")]
    pub email: Option<String>,

    /// Treat the network as unreachable; writes go to the offline queue
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read or edit the user profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Create, edit and list health records
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// Inspect and replay the offline queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the profile, including edits still waiting to sync
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Fill unset fields with default values
        #[arg(long)]
        with_defaults: bool,
    },
    /// Set profile fields: azukr profile set unidadGlucosa=mmol/L muyAlto=200
    Set {
        /// key=value pairs; values are parsed as JSON when possible
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Log a new record: azukr record add --kind Glucosa level=120
    #[command(alias = "new")]
    Add {
        /// Record kind (Glucosa, Alimentación, Actividad, Medicación, Presión arterial)
        #[arg(long, value_name = "KIND")]
        kind: String,
        /// When it happened (epoch millis or ISO 8601); defaults to now
        #[arg(long, value_name = "TIME")]
        at: Option<String>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// key=value data fields
        #[arg(value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Update fields of an existing record
    Update {
        /// Record ID
        id: String,
        #[arg(long, value_name = "KIND")]
        kind: Option<String>,
        #[arg(long, value_name = "TIME")]
        at: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// key=value data fields to merge
        #[arg(value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Delete a record
    Delete {
        /// Record ID
        id: String,
    },
    /// List records in a time range, newest first
    List {
        /// Range start (epoch millis or ISO 8601); unbounded when omitted
        #[arg(long, value_name = "TIME")]
        from: Option<String>,
        /// Range end (epoch millis or ISO 8601); unbounded when omitted
        #[arg(long, value_name = "TIME")]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the oldest and newest record timestamps
    Bounds,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List operations waiting to sync, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued operations against the remote store now
    Drain,
    /// List operations set aside after repeated failures
    DeadLetters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a dead-lettered operation back to the end of the queue
    Requeue {
        /// Operation ID
        id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
