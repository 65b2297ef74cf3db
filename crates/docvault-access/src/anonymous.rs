//! View counting for visitors without an account.
//!
//! Counts live in client-side storage under one key, as
//! `{"documents": {"<document id>": <views>}}`. There is no day
//! partitioning: a count only grows until the storage is cleared.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::defaults::{ANONYMOUS_VIEWS_KEY, DEFAULT_MAX_VIEWS};
use crate::storage::KeyValueStorage;

#[derive(Debug, Default, Serialize, Deserialize)]
struct AnonymousViews {
    #[serde(default)]
    documents: HashMap<String, u32>,
}

/// Quota state of one document for an anonymous visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnonymousViewStatus {
    /// More views than allowed have been made.
    pub exceeded: bool,
    pub remaining: u32,
    /// Views counted so far, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u32>,
}

impl AnonymousViewStatus {
    fn fresh(max_views: u32) -> Self {
        Self {
            exceeded: false,
            remaining: max_views,
            view_count: None,
        }
    }

    fn from_count(count: u32, max_views: u32) -> Self {
        Self {
            exceeded: count > max_views,
            remaining: max_views.saturating_sub(count),
            view_count: Some(count),
        }
    }
}

/// Anonymous per-document view tracker.
#[derive(Debug)]
pub struct AnonymousViewTracker<S: KeyValueStorage> {
    storage: S,
    max_views: u32,
}

impl<S: KeyValueStorage> AnonymousViewTracker<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            max_views: DEFAULT_MAX_VIEWS,
        }
    }

    /// Builder: set the view cap.
    pub fn max_views(mut self, n: u32) -> Self {
        self.max_views = n;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn load(&self) -> Result<AnonymousViews, serde_json::Error> {
        match self.storage.get_item(ANONYMOUS_VIEWS_KEY) {
            Some(raw) => serde_json::from_str(&raw),
            None => Ok(AnonymousViews::default()),
        }
    }

    /// Count one view of `document_id` and report the resulting state.
    ///
    /// The view is counted even past the cap; `exceeded` turns true on the
    /// first view beyond it.
    pub fn track(&self, document_id: &str) -> AnonymousViewStatus {
        if document_id.is_empty() {
            return AnonymousViewStatus::fresh(self.max_views);
        }

        let mut views = self.load().unwrap_or_else(|e| {
            warn!(error = %e, "unreadable anonymous view data, starting over");
            AnonymousViews::default()
        });

        let count = views.documents.entry(document_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        let count = *count;

        match serde_json::to_string(&views) {
            Ok(payload) => {
                if let Err(e) = self.storage.set_item(ANONYMOUS_VIEWS_KEY, &payload) {
                    warn!(error = %e, "failed to save anonymous view data");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize anonymous view data"),
        }

        AnonymousViewStatus::from_count(count, self.max_views)
    }

    /// Report the state of `document_id` without counting a view.
    pub fn limit_data(&self, document_id: &str) -> AnonymousViewStatus {
        if document_id.is_empty() {
            return AnonymousViewStatus::fresh(self.max_views);
        }

        let views = match self.load() {
            Ok(views) => views,
            Err(e) => {
                warn!(error = %e, "unreadable anonymous view data");
                return AnonymousViewStatus::fresh(self.max_views);
            }
        };

        match views.documents.get(document_id) {
            Some(&count) if count > 0 => AnonymousViewStatus::from_count(count, self.max_views),
            _ => AnonymousViewStatus::fresh(self.max_views),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_sixth_view_exceeds() {
        let tracker = AnonymousViewTracker::new(MemoryStorage::new());

        for expected in [4, 3, 2, 1, 0] {
            let status = tracker.track("doc");
            assert!(!status.exceeded);
            assert_eq!(status.remaining, expected);
        }

        let status = tracker.track("doc");
        assert!(status.exceeded);
        assert_eq!(status.remaining, 0);
        assert_eq!(status.view_count, Some(6));
    }

    #[test]
    fn test_limit_data_is_read_only() {
        let tracker = AnonymousViewTracker::new(MemoryStorage::new());
        assert_eq!(tracker.limit_data("doc"), AnonymousViewStatus::fresh(5));

        tracker.track("doc");
        tracker.track("doc");

        for _ in 0..3 {
            let status = tracker.limit_data("doc");
            assert_eq!(status.view_count, Some(2));
            assert_eq!(status.remaining, 3);
        }
    }

    #[test]
    fn test_documents_counted_separately() {
        let tracker = AnonymousViewTracker::new(MemoryStorage::new()).max_views(2);
        tracker.track("a");
        tracker.track("a");
        let status = tracker.track("b");
        assert_eq!(status.remaining, 1);
        assert!(tracker.track("a").exceeded);
    }

    #[test]
    fn test_empty_id_and_corrupt_storage() {
        let storage = MemoryStorage::new();
        storage.set_item(ANONYMOUS_VIEWS_KEY, "garbage").unwrap();
        let tracker = AnonymousViewTracker::new(storage);

        assert_eq!(tracker.track(""), AnonymousViewStatus::fresh(5));
        assert_eq!(tracker.limit_data("doc"), AnonymousViewStatus::fresh(5));

        // Tracking rewrites the corrupt payload
        let status = tracker.track("doc");
        assert_eq!(status.view_count, Some(1));
        assert_eq!(tracker.limit_data("doc").view_count, Some(1));
    }

    #[test]
    fn test_payload_shape() {
        let tracker = AnonymousViewTracker::new(MemoryStorage::new());
        tracker.track("doc");

        let raw = tracker.storage().get_item(ANONYMOUS_VIEWS_KEY).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["documents"]["doc"], 1);
    }
}
