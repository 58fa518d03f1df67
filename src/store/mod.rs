//! SQLite persistence for monitor events.
//!
//! The store is a pure consumer of the monitor's event stream: batches go
//! in append-ordered, and a fixed set of filter fields comes back out. No
//! cross-batch transactional guarantees.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::events::{EventKind, MonitorEvent};

/// Timestamps are stored as fixed-format UTC text so that string
/// comparison in SQL is chronological.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Optional criteria for `search`; all `None` selects everything.
/// Mirrors the query form fields: extension, event kind, directory,
/// date range.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub extension: Option<String>,
    pub kind: Option<EventKind>,
    pub directory: Option<PathBuf>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// A persisted event together with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: i64,
    pub event: MonitorEvent,
}

/// SQLite-backed event history.
#[derive(Clone)]
pub struct EventStore {
    conn: Arc<Mutex<Connection>>,
}

impl EventStore {
    /// Opens (creating if necessary) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).with_context(|| {
            format!("failed to open event database {}", path.as_ref().display())
        })?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                event TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                extension TEXT NOT NULL,
                directory TEXT NOT NULL
            )",
            [],
        )
        .context("failed to create events table")?;
        Ok(())
    }

    /// Appends a batch of events in order. The batch is one transaction;
    /// either all rows land or none do.
    pub fn insert_batch(&self, events: &[MonitorEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().context("failed to begin transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO events (filename, event, timestamp, extension, directory)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .context("failed to prepare insert")?;
            for event in events {
                stmt.execute(rusqlite::params![
                    event.filename,
                    event.kind.as_str(),
                    event.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    event.extension,
                    event.directory.to_string_lossy(),
                ])
                .context("failed to insert event")?;
            }
        }
        tx.commit().context("failed to commit event batch")?;
        Ok(events.len())
    }

    /// Filtered search over the history, ordered by insertion. Every
    /// criterion is bound as a parameter, never spliced into the SQL.
    pub fn search(&self, filter: &QueryFilter) -> Result<Vec<StoredEvent>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(extension) = &filter.extension {
            clauses.push("extension = ?");
            params.push(extension.clone());
        }
        if let Some(kind) = filter.kind {
            clauses.push("event = ?");
            params.push(kind.as_str().to_string());
        }
        if let Some(directory) = &filter.directory {
            clauses.push("directory = ?");
            params.push(directory.to_string_lossy().into_owned());
        }
        if let Some(from) = filter.from {
            clauses.push("timestamp >= ?");
            params.push(from.format(TIMESTAMP_FORMAT).to_string());
        }
        if let Some(until) = filter.until {
            clauses.push("timestamp <= ?");
            params.push(until.format(TIMESTAMP_FORMAT).to_string());
        }

        let mut sql = String::from(
            "SELECT id, filename, event, timestamp, extension, directory FROM events",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql).context("failed to prepare search")?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("failed to run search")?;

        let mut results = Vec::new();
        for row in rows {
            let (id, filename, kind, timestamp, extension, directory) =
                row.context("failed to read row")?;
            results.push(StoredEvent {
                id,
                event: MonitorEvent {
                    filename,
                    kind: kind
                        .parse::<EventKind>()
                        .with_context(|| format!("corrupt event kind in row {id}"))?,
                    timestamp: parse_timestamp(&timestamp)
                        .with_context(|| format!("corrupt timestamp in row {id}"))?,
                    extension,
                    directory: PathBuf::from(directory),
                },
            });
        }
        Ok(results)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .context("failed to count events")
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)?;
    Ok(naive.and_utc())
}
