use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::errors::MonitorError;
use crate::events::EventKind;
use crate::store::QueryFilter;

#[derive(Parser)]
#[command(name = "watchtrail")]
#[command(version = "0.1.0")]
#[command(about = "Recursive filesystem change monitor with a queryable event history")]
#[command(
    long_about = "watchtrail watches directory trees for file creation, modification, and \
deletion, records normalized change events into a SQLite history, and can export or mail \
filtered reports."
)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch directory trees and record change events
    Watch(WatchArgs),
    /// Search the recorded history, optionally exporting or mailing results
    Query(QueryArgs),
}

#[derive(Args)]
pub struct WatchArgs {
    /// Directories to watch
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Only record events for this file extension (e.g. ".txt")
    #[arg(short, long)]
    pub extension: Option<String>,

    /// SQLite database to append events to
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Output format for recorded events
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Only include events for this file extension (e.g. ".txt")
    #[arg(short, long)]
    pub extension: Option<String>,

    /// Only include events of this kind (CREATED, MODIFIED, DELETED)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Only include events from this directory
    #[arg(short, long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Earliest date to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// Latest date to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub until: Option<String>,

    /// SQLite database to search
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Export matching events to a CSV file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Mail the exported CSV to this address (requires --export)
    #[arg(long, value_name = "ADDR")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event, for scripting
    Json,
    /// Compact single-character kind prefix
    Compact,
}

impl Cli {
    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

impl QueryArgs {
    /// Translates the command-line arguments into a store filter.
    /// Dates are interpreted as whole days in UTC.
    pub fn to_filter(&self) -> Result<QueryFilter, MonitorError> {
        let kind = self
            .kind
            .as_deref()
            .map(|raw| raw.parse::<EventKind>())
            .transpose()?;
        let from = self
            .from
            .as_deref()
            .map(|raw| parse_date(raw).map(start_of_day))
            .transpose()?;
        let until = self
            .until
            .as_deref()
            .map(|raw| parse_date(raw).map(end_of_day))
            .transpose()?;

        Ok(QueryFilter {
            extension: self.extension.clone().map(normalize_extension),
            kind,
            directory: self.directory.clone(),
            from,
            until,
        })
    }
}

/// Stored extensions carry a leading dot; accept user input either way.
fn normalize_extension(raw: String) -> String {
    let trimmed = raw.trim().trim_start_matches('.');
    format!(".{trimmed}")
}

fn parse_date(raw: &str) -> Result<NaiveDate, MonitorError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| MonitorError::InvalidArgument(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59).unwrap().and_utc()
}
