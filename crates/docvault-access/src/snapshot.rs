//! Snapshot cache with per-key TTL.
//!
//! Values are stored as `{"data": <value>, "expiry": <epoch ms>}` JSON
//! envelopes in a [`KeyValueStorage`]. A read treats an absent key, an
//! unparsable payload and an expired envelope alike: as a miss. Expired
//! envelopes are removed on read. There is no eviction beyond that.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::defaults::{CATEGORIES_SNAPSHOT_KEY, DEFAULT_SNAPSHOT_TTL_MS};
use crate::storage::KeyValueStorage;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    data: &'a T,
    expiry: u64,
}

/// TTL cache over a [`KeyValueStorage`].
#[derive(Debug)]
pub struct SnapshotCache<S: KeyValueStorage> {
    storage: S,
    default_ttl: Duration,
}

impl<S: KeyValueStorage> SnapshotCache<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            default_ttl: Duration::from_millis(DEFAULT_SNAPSHOT_TTL_MS),
        }
    }

    /// Builder: TTL used by [`cache_default`](Self::cache_default).
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Store `data` under `key` for `ttl`.
    ///
    /// Returns `false` if the key is empty or the value could not be
    /// serialized or stored.
    #[allow(clippy::cast_possible_truncation)]
    pub fn cache_data<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> bool {
        if key.is_empty() {
            return false;
        }

        let envelope = Envelope {
            data,
            expiry: Self::now_ms().saturating_add(ttl.as_millis() as u64),
        };
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize snapshot");
                return false;
            }
        };

        match self.storage.set_item(key, &payload) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "failed to store snapshot");
                false
            }
        }
    }

    /// Store `data` under `key` with the default TTL.
    #[inline]
    pub fn cache_default<T: Serialize>(&self, key: &str, data: &T) -> bool {
        self.cache_data(key, data, self.default_ttl)
    }

    /// Read a live snapshot.
    ///
    /// Payloads without an envelope (written by older clients) are
    /// returned as-is.
    pub fn get_data_from_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if key.is_empty() {
            return None;
        }
        let raw = self.storage.get_item(key)?;

        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(key, error = %e, "unparsable snapshot treated as miss");
                return None;
            }
        };

        let data = match parsed {
            Value::Object(mut map)
                if map.get("expiry").is_some_and(Value::is_u64) && map.contains_key("data") =>
            {
                let expiry = map.get("expiry").and_then(Value::as_u64).unwrap_or(0);
                if Self::now_ms() > expiry {
                    if let Err(e) = self.storage.remove_item(key) {
                        warn!(key, error = %e, "failed to remove expired snapshot");
                    }
                    return None;
                }
                map.remove("data").unwrap_or(Value::Null)
            }
            legacy => legacy,
        };

        serde_json::from_value(data)
            .inspect_err(|e| debug!(key, error = %e, "snapshot has unexpected shape"))
            .ok()
    }

    /// Whether anything is stored under `key`, live or not.
    pub fn is_cache_exist(&self, key: &str) -> bool {
        !key.is_empty() && self.storage.get_item(key).is_some()
    }

    /// Remove one key.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            warn!(key, error = %e, "failed to remove snapshot");
        }
    }

    /// Drop the categories-with-documents snapshot.
    pub fn clear_categories_cache(&self) {
        self.remove(CATEGORIES_SNAPSHOT_KEY);
        self.remove(&format!("{CATEGORIES_SNAPSHOT_KEY}_timestamp"));
    }

    /// Drop every cached question list of one document.
    pub fn clear_document_question_cache(&self, document_id: &str) {
        if document_id.is_empty() {
            return;
        }
        for key in question_cache_keys(document_id) {
            self.remove(&key);
        }
    }
}

/// Keys under which question lists of a document have been cached.
pub fn question_cache_keys(document_id: &str) -> [String; 4] {
    [
        format!("questions_{document_id}"),
        format!("questions_{document_id}_timestamp"),
        format!("ques_{document_id}"),
        format!("ques_optimized_{document_id}"),
    ]
}
