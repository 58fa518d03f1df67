use std::path::Path;
use std::sync::{Arc, Mutex};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use walkdir::WalkDir;

use crate::errors::MonitorError;

use super::registry::WatchRegistry;

/// Discovers every directory under a root and attaches one non-recursive
/// OS watch per directory, recording each in the registry.
///
/// Used synchronously by `add_root` and reactively by the monitoring loop
/// when a CREATE event resolves to a new directory.
#[derive(Clone)]
pub struct DirectoryWalker {
    registry: WatchRegistry,
    watcher: Arc<Mutex<RecommendedWatcher>>,
}

impl DirectoryWalker {
    pub(crate) fn new(registry: WatchRegistry, watcher: Arc<Mutex<RecommendedWatcher>>) -> Self {
        Self { registry, watcher }
    }

    /// Registers `root` and every directory below it. Registration is
    /// complete when this returns, so changes in any subdirectory are
    /// observable immediately after. Re-entrant: already-watched
    /// directories are left alone.
    ///
    /// Returns the number of newly watched directories.
    pub fn add_root(&self, root: &Path) -> Result<usize, MonitorError> {
        if !root.is_dir() {
            return Err(MonitorError::InvalidPath {
                path: root.to_path_buf(),
            });
        }
        let root = root.canonicalize().map_err(|_| MonitorError::InvalidPath {
            path: root.to_path_buf(),
        })?;

        let mut added = 0;
        for entry in WalkDir::new(&root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("skipping unreadable entry under {}: {}", root.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if self.registry.try_register(entry.path()).is_none() {
                continue;
            }
            let mut watcher = self.watcher.lock().unwrap();
            if let Err(err) = watcher.watch(entry.path(), RecursiveMode::NonRecursive) {
                tracing::warn!("failed to watch {}: {}", entry.path().display(), err);
                self.registry.remove_path(entry.path());
                continue;
            }
            added += 1;
        }
        tracing::debug!("registered {} directories under {}", added, root.display());
        Ok(added)
    }

    /// Drops `path` and all registered descendants from the watch set.
    /// Unwatch failures are ignored; the OS has usually already discarded
    /// the watch when the directory disappeared.
    pub(crate) fn drop_subtree(&self, path: &Path) {
        let removed = self.registry.remove_subtree(path);
        if removed.is_empty() {
            return;
        }
        let mut watcher = self.watcher.lock().unwrap();
        for dir in &removed {
            let _ = watcher.unwatch(dir);
        }
        tracing::warn!(
            "directory {} became inaccessible, dropped {} watch(es)",
            path.display(),
            removed.len()
        );
    }
}
