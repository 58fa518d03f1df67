use std::sync::{Arc, RwLock};

/// Single mutable extension predicate shared between the caller and the
/// monitoring loop.
///
/// The value lives behind one `RwLock`'d reference, swapped whole on
/// update, so the loop always observes either the old or the new filter.
/// Unset means "match all".
#[derive(Clone, Default)]
pub struct ExtensionFilter {
    value: Arc<RwLock<Option<String>>>,
}

impl ExtensionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the extension to match. Leading dots and case are
    /// ignored, so `".TXT"` and `"txt"` configure the same filter. An
    /// empty value is the "match all" sentinel.
    pub fn set(&self, extension: impl Into<String>) {
        let normalized = Self::normalize(&extension.into());
        let value = if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        };
        *self.value.write().unwrap() = value;
    }

    /// Resets to "match all".
    pub fn clear(&self) {
        *self.value.write().unwrap() = None;
    }

    /// Currently configured extension, in normalized (dotless, lowercase)
    /// form, or `None` when matching all.
    pub fn get(&self) -> Option<String> {
        self.value.read().unwrap().clone()
    }

    /// Whether `filename` passes the filter. The candidate extension is the
    /// substring after the last dot; a name without a dot has the empty
    /// extension, which only the "match all" sentinel accepts.
    pub fn matches(&self, filename: &str) -> bool {
        let guard = self.value.read().unwrap();
        let Some(want) = guard.as_deref() else {
            return true;
        };
        let candidate = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        candidate.eq_ignore_ascii_case(want)
    }

    fn normalize(extension: &str) -> String {
        extension.trim().trim_start_matches('.').to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_matches_everything() {
        let filter = ExtensionFilter::new();
        assert!(filter.matches("a.txt"));
        assert!(filter.matches("README"));
    }

    #[test]
    fn test_set_restricts_to_extension() {
        let filter = ExtensionFilter::new();
        filter.set(".txt");
        assert!(filter.matches("a.txt"));
        assert!(!filter.matches("b.png"));
        assert!(!filter.matches("no_extension"));
    }

    #[test]
    fn test_dot_and_case_are_normalized() {
        let filter = ExtensionFilter::new();
        filter.set("TXT");
        assert_eq!(filter.get().as_deref(), Some("txt"));
        assert!(filter.matches("a.txt"));
        assert!(filter.matches("b.TXT"));
    }

    #[test]
    fn test_empty_value_is_match_all_sentinel() {
        let filter = ExtensionFilter::new();
        filter.set(".txt");
        filter.set("");
        assert!(filter.matches("b.png"));
        assert_eq!(filter.get(), None);
    }

    #[test]
    fn test_clear_resets() {
        let filter = ExtensionFilter::new();
        filter.set("log");
        filter.clear();
        assert!(filter.matches("anything.md"));
    }

    #[test]
    fn test_last_dot_wins() {
        let filter = ExtensionFilter::new();
        filter.set("gz");
        assert!(filter.matches("archive.tar.gz"));
        assert!(!filter.matches("archive.gz.tar"));
    }
}
