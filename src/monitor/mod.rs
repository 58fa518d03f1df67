//! Recursive filesystem change monitor.
//!
//! One `FileMonitor` owns a set of per-directory OS watches, a background
//! thread that normalizes raw notifications into [`MonitorEvent`]s, and the
//! sink those events are appended to. Instances are independent; the
//! composition root owns one and hands it to consumers.

mod registry;
mod walker;
mod worker;

pub use registry::{WatchHandle, WatchRegistry};
pub use walker::DirectoryWalker;

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use notify::RecommendedWatcher;

use crate::errors::MonitorError;
use crate::events::{EventSink, MonitorEvent};
use crate::filter::ExtensionFilter;

use worker::{MonitorWorker, RawSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Stopped,
    Running,
    StopRequested,
}

struct MonitorState {
    lifecycle: Lifecycle,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Recursive filesystem change monitor.
///
/// `add_root` synchronously registers a directory tree; `start` spawns the
/// background task that turns raw OS notifications into normalized events;
/// `stop` ends it in bounded time. All entry points may be called from any
/// thread, including while monitoring is active.
pub struct FileMonitor {
    registry: WatchRegistry,
    filter: ExtensionFilter,
    sink: EventSink,
    walker: DirectoryWalker,
    signal_tx: Sender<RawSignal>,
    signal_rx: Arc<Mutex<Receiver<RawSignal>>>,
    state: Arc<Mutex<MonitorState>>,
}

impl FileMonitor {
    pub fn new() -> Result<Self, MonitorError> {
        let (signal_tx, signal_rx) = mpsc::channel();

        let fs_tx = signal_tx.clone();
        let watcher: RecommendedWatcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    // The loop may not be running; signals queue until it is.
                    Ok(event) => {
                        let _ = fs_tx.send(RawSignal::Fs(event));
                    }
                    Err(err) => tracing::warn!("watch backend error: {}", err),
                }
            })?;

        let registry = WatchRegistry::new();
        let walker = DirectoryWalker::new(registry.clone(), Arc::new(Mutex::new(watcher)));

        Ok(Self {
            registry,
            filter: ExtensionFilter::new(),
            sink: EventSink::new(),
            walker,
            signal_tx,
            signal_rx: Arc::new(Mutex::new(signal_rx)),
            state: Arc::new(Mutex::new(MonitorState {
                lifecycle: Lifecycle::Stopped,
                generation: 0,
                task: None,
            })),
        })
    }

    /// Brings the whole subtree rooted at `path` under observation.
    /// Synchronous: every directory is watched by the time this returns.
    ///
    /// Fails with [`MonitorError::InvalidPath`] if `path` does not exist or
    /// is not a directory.
    pub fn add_root(&self, path: impl AsRef<Path>) -> Result<(), MonitorError> {
        let path = path.as_ref();
        let added = self.walker.add_root(path)?;
        tracing::info!("watching {} new directories under {}", added, path.display());
        Ok(())
    }

    /// Starts the background monitoring task. No-op when already running.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        if state.lifecycle == Lifecycle::Running {
            return;
        }
        // A loop that exited on its own leaves a finished handle behind.
        if let Some(task) = state.task.take() {
            let _ = task.join();
        }

        state.generation += 1;
        state.lifecycle = Lifecycle::Running;

        let worker = MonitorWorker {
            registry: self.registry.clone(),
            filter: self.filter.clone(),
            sink: self.sink.clone(),
            walker: self.walker.clone(),
            generation: state.generation,
        };
        let signal_rx = Arc::clone(&self.signal_rx);
        let loop_state = Arc::clone(&self.state);

        state.task = Some(std::thread::spawn(move || {
            {
                // Held for the lifetime of this run; released before the
                // lifecycle flips so the next start can take it over.
                let rx = signal_rx.lock().unwrap();
                worker.run(&rx);
            }
            loop_state.lock().unwrap().lifecycle = Lifecycle::Stopped;
        }));
        tracing::info!("monitoring started");
    }

    /// Stops the background task and waits for it to exit. Returns in
    /// bounded time regardless of filesystem activity; the shutdown
    /// sentinel unblocks the loop's wait. No-op when already stopped.
    ///
    /// Must not be called from the monitoring loop's own thread (a sink
    /// subscriber callback, for instance), as it joins that thread.
    pub fn stop(&self) {
        let task = {
            let mut state = self.state.lock().unwrap();
            if state.lifecycle != Lifecycle::Running {
                return;
            }
            state.lifecycle = Lifecycle::StopRequested;
            let _ = self.signal_tx.send(RawSignal::Shutdown(state.generation));
            state.task.take()
        };
        if let Some(task) = task {
            let _ = task.join();
        }
        self.state.lock().unwrap().lifecycle = Lifecycle::Stopped;
        tracing::info!("monitoring stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().lifecycle == Lifecycle::Running
    }

    /// Restricts recorded events to files with the given extension.
    /// An empty value matches everything.
    pub fn set_extension_filter(&self, extension: impl Into<String>) {
        self.filter.set(extension);
    }

    pub fn clear_extension_filter(&self) {
        self.filter.clear();
    }

    pub fn extension_filter(&self) -> Option<String> {
        self.filter.get()
    }

    /// Read access to the ordered event stream.
    pub fn events(&self) -> &EventSink {
        &self.sink
    }

    /// Convenience over `events().snapshot()`.
    pub fn recorded(&self) -> Vec<MonitorEvent> {
        self.sink.snapshot()
    }

    pub fn watched_dirs(&self) -> usize {
        self.registry.len()
    }
}

impl Drop for FileMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
