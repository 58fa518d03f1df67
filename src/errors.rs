use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced synchronously by the monitor core.
///
/// Watch invalidation and reactive-registration failures are recovered
/// locally inside the monitoring loop and logged, so they never appear here.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("path does not exist or is not a directory: {path}")]
    InvalidPath { path: PathBuf },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
