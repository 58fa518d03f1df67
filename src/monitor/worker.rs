use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use crate::events::{EventKind, EventSink, MonitorEvent};
use crate::filter::ExtensionFilter;

use super::registry::WatchRegistry;
use super::walker::DirectoryWalker;

/// Signal consumed by the monitoring loop.
///
/// Shutdown carries the generation of the run it is meant to stop, so a
/// stale sentinel left behind by a `stop()` racing the loop's own exit
/// cannot end a later run.
pub(crate) enum RawSignal {
    Fs(notify::Event),
    Shutdown(u64),
}

/// State owned by one run of the background monitoring task.
pub(crate) struct MonitorWorker {
    pub registry: WatchRegistry,
    pub filter: ExtensionFilter,
    pub sink: EventSink,
    pub walker: DirectoryWalker,
    pub generation: u64,
}

impl MonitorWorker {
    /// Blocks on the raw-signal channel until a shutdown sentinel for this
    /// generation arrives, the watch set empties, or the channel closes.
    pub(crate) fn run(&self, rx: &Receiver<RawSignal>) {
        while let Ok(signal) = rx.recv() {
            match signal {
                RawSignal::Shutdown(generation) if generation == self.generation => break,
                RawSignal::Shutdown(_) => continue,
                RawSignal::Fs(event) => {
                    self.handle_raw(event);
                    if self.registry.is_empty() {
                        tracing::info!("watch set is empty, monitoring loop exiting");
                        break;
                    }
                }
            }
        }
    }

    fn handle_raw(&self, event: notify::Event) {
        use notify::event::{ModifyKind, RemoveKind, RenameMode};

        let kind = match event.kind {
            notify::EventKind::Create(_) => EventKind::Created,
            // A rename is reported as the old entry vanishing and the new
            // one appearing.
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)) => EventKind::Deleted,
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::To)) => EventKind::Created,
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to] = event.paths.as_slice() {
                    self.normalize(EventKind::Deleted, from);
                    self.normalize(EventKind::Created, to);
                }
                return;
            }
            notify::EventKind::Modify(_) => EventKind::Modified,
            // A watched directory reporting its own removal is watch
            // invalidation, not a change within a parent.
            notify::EventKind::Remove(RemoveKind::Other) => {
                for path in &event.paths {
                    if self.registry.contains_path(path) {
                        self.walker.drop_subtree(path);
                    }
                }
                return;
            }
            notify::EventKind::Remove(_) => EventKind::Deleted,
            _ => return,
        };
        // Paths within one notification are appended in delivery order.
        for path in &event.paths {
            self.normalize(kind, path);
        }
    }

    /// Turns one raw (kind, path) notification into at most one sink
    /// event, extending or shrinking the watch set as a side effect.
    fn normalize(&self, kind: EventKind, path: &Path) {
        if kind == EventKind::Deleted && self.registry.contains_path(path) {
            // The deleted entry was itself a watched directory. Shrink the
            // watch set even when no registered parent is left to report
            // the deletion against.
            self.walker.drop_subtree(path);
        }

        let Some(directory) = self.owning_directory(path) else {
            tracing::warn!(
                "dropping event for {}: owning directory not registered",
                path.display()
            );
            return;
        };
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            tracing::warn!("dropping event with unusable name: {}", path.display());
            return;
        };

        if kind == EventKind::Created && path.is_dir() {
            // Extend coverage before anything else. The extension filter
            // gates event emission, never which directories get watched.
            if let Err(err) = self.walker.add_root(path) {
                tracing::warn!(
                    "failed to extend watch to new directory {}: {}",
                    path.display(),
                    err
                );
            }
        }

        if self.filter.matches(filename) {
            self.sink.push(MonitorEvent::new(filename, kind, directory.clone()));
        }

        // Registry maintenance: the owning directory may have vanished
        // between delivery and now.
        if !directory.exists() {
            self.walker.drop_subtree(&directory);
        }
    }

    /// Resolves the directory that owns the notification. Unresolvable
    /// paths mean the watch was invalidated between delivery and
    /// processing; callers skip those.
    fn owning_directory(&self, path: &Path) -> Option<PathBuf> {
        let parent = path.parent()?;
        self.registry
            .contains_path(parent)
            .then(|| parent.to_path_buf())
    }
}
