pub mod cli;
pub mod config;
pub mod errors;
pub mod events;
pub mod export;
pub mod filter;
pub mod mail;
pub mod monitor;
pub mod store;

pub use errors::MonitorError;
pub use events::{EventKind, EventSink, MonitorEvent};
pub use filter::ExtensionFilter;
pub use monitor::{FileMonitor, WatchHandle, WatchRegistry};
pub use store::{EventStore, QueryFilter, StoredEvent};
