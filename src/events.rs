use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;

/// Closed set of change kinds the monitor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "CREATED",
            EventKind::Modified => "MODIFIED",
            EventKind::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(EventKind::Created),
            "MODIFIED" => Ok(EventKind::Modified),
            "DELETED" => Ok(EventKind::Deleted),
            other => Err(MonitorError::InvalidArgument(format!(
                "unknown event kind: {other}"
            ))),
        }
    }
}

/// One normalized change record. Immutable after construction; the
/// monitoring loop is the only producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Name of the changed entry, not its full path.
    pub filename: String,
    pub kind: EventKind,
    /// Detection time, not the time of the underlying fs operation.
    pub timestamp: DateTime<Utc>,
    /// Leading-dot form (".log"); empty string when the name has no dot.
    pub extension: String,
    /// Absolute path of the containing directory.
    pub directory: PathBuf,
}

impl MonitorEvent {
    pub fn new(filename: impl Into<String>, kind: EventKind, directory: PathBuf) -> Self {
        let filename = filename.into();
        let extension = extension_of(&filename);
        Self {
            filename,
            kind,
            timestamp: Utc::now(),
            extension,
            directory,
        }
    }

    /// Absolute path of the changed entry.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Extension of `filename` including the dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => filename[idx..].to_string(),
        None => String::new(),
    }
}

/// Append-ordered, thread-safe collection of monitor events.
///
/// The monitoring loop is the sole writer. Consumers either poll
/// (`snapshot`/`drain`) or attach a channel with `subscribe`; both see
/// events in append order.
#[derive(Clone, Default)]
pub struct EventSink {
    events: Arc<Mutex<Vec<MonitorEvent>>>,
    subscribers: Arc<Mutex<Vec<Sender<MonitorEvent>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and fans it out to live subscribers. Subscribers
    /// whose receiving end is gone are pruned here.
    pub fn push(&self, event: MonitorEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        self.events.lock().unwrap().push(event.clone());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Channel that receives every event appended after this call.
    pub fn subscribe(&self) -> Receiver<MonitorEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    pub fn snapshot(&self) -> Vec<MonitorEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Removes and returns all accumulated events, preserving order.
    /// Used by persistence to hand batches to the store.
    pub fn drain(&self) -> Vec<MonitorEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
