use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Opaque token for one directory's OS watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

/// Bookkeeping for the handle-to-path relationship. Single source of truth
/// for which directories are under observation.
///
/// Cloning shares the underlying map; the walker writes from the caller's
/// thread while the monitoring loop reads and removes from its own.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    by_handle: HashMap<WatchHandle, PathBuf>,
    by_path: HashMap<PathBuf, WatchHandle>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path`, returning its handle. A path that is already
    /// watched keeps its existing handle; no path ever holds two live ones.
    pub fn register(&self, path: &Path) -> WatchHandle {
        let mut inner = self.inner.write().unwrap();
        if let Some(handle) = inner.by_path.get(path) {
            return *handle;
        }
        Self::insert(&mut inner, path)
    }

    /// Registers `path` only if it is not already watched, returning the
    /// fresh handle. The walker uses this to decide whether an OS watch
    /// still needs to be attached.
    pub fn try_register(&self, path: &Path) -> Option<WatchHandle> {
        let mut inner = self.inner.write().unwrap();
        if inner.by_path.contains_key(path) {
            return None;
        }
        Some(Self::insert(&mut inner, path))
    }

    fn insert(inner: &mut Inner, path: &Path) -> WatchHandle {
        inner.next_id += 1;
        let handle = WatchHandle(inner.next_id);
        inner.by_handle.insert(handle, path.to_path_buf());
        inner.by_path.insert(path.to_path_buf(), handle);
        handle
    }

    pub fn resolve(&self, handle: WatchHandle) -> Option<PathBuf> {
        self.inner.read().unwrap().by_handle.get(&handle).cloned()
    }

    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.inner.read().unwrap().by_path.get(path).copied()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.inner.read().unwrap().by_path.contains_key(path)
    }

    pub fn unregister(&self, handle: WatchHandle) -> Option<PathBuf> {
        let mut inner = self.inner.write().unwrap();
        let path = inner.by_handle.remove(&handle)?;
        inner.by_path.remove(&path);
        Some(path)
    }

    pub fn remove_path(&self, path: &Path) -> Option<WatchHandle> {
        let mut inner = self.inner.write().unwrap();
        let handle = inner.by_path.remove(path)?;
        inner.by_handle.remove(&handle);
        Some(handle)
    }

    /// Removes `path` and every registered directory below it, returning
    /// the removed paths. Used when a watched directory is deleted.
    pub fn remove_subtree(&self, path: &Path) -> Vec<PathBuf> {
        let mut inner = self.inner.write().unwrap();
        let doomed: Vec<PathBuf> = inner
            .by_path
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();
        for p in &doomed {
            if let Some(handle) = inner.by_path.remove(p) {
                inner.by_handle.remove(&handle);
            }
        }
        doomed
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().by_handle.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_handle.len()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner.read().unwrap().by_path.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = WatchRegistry::new();
        let handle = registry.register(Path::new("/tmp/a"));

        assert_eq!(registry.resolve(handle), Some(PathBuf::from("/tmp/a")));
        assert_eq!(registry.handle_for(Path::new("/tmp/a")), Some(handle));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_keeps_single_handle() {
        let registry = WatchRegistry::new();
        let first = registry.register(Path::new("/tmp/a"));
        let second = registry.register(Path::new("/tmp/a"));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert!(registry.try_register(Path::new("/tmp/a")).is_none());
    }

    #[test]
    fn test_unregister_clears_both_directions() {
        let registry = WatchRegistry::new();
        let handle = registry.register(Path::new("/tmp/a"));

        assert_eq!(registry.unregister(handle), Some(PathBuf::from("/tmp/a")));
        assert_eq!(registry.resolve(handle), None);
        assert!(!registry.contains_path(Path::new("/tmp/a")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_subtree() {
        let registry = WatchRegistry::new();
        registry.register(Path::new("/tmp/a"));
        registry.register(Path::new("/tmp/a/b"));
        registry.register(Path::new("/tmp/a/b/c"));
        registry.register(Path::new("/tmp/other"));

        let removed = registry.remove_subtree(Path::new("/tmp/a/b"));
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains_path(Path::new("/tmp/a")));
        assert!(registry.contains_path(Path::new("/tmp/other")));
    }
}
