//! User profile cache with TTL support.
//!
//! Caches account lookups so repeated checks by the same user skip the
//! backend. Also keeps short-lived negative entries for user ids that have
//! no account record (they are evaluated as free users).
//!
//! View counters are never cached; they always go to the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::role::Role;

use super::record::{PaidCategories, UserRecord};

/// Entry count past which inserts first drop expired entries.
pub const PRUNE_THRESHOLD: usize = 1024;

/// Cached account data.
#[derive(Clone, Debug)]
pub struct CachedProfile {
    pub user_id: String,
    pub role: Role,
    pub paid_categories: PaidCategories,
    /// When this cache entry was created.
    pub cached_at: Instant,
}

impl From<&UserRecord> for CachedProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            role: record.role,
            paid_categories: record.paid_categories.clone(),
            cached_at: Instant::now(),
        }
    }
}

/// Cache entry with expiration.
#[derive(Debug)]
struct CacheEntry {
    profile: CachedProfile,
    expires_at: Instant,
}

/// Profile cache with configurable TTL.
#[derive(Debug)]
pub struct ProfileCache {
    /// Positive cache: user_id → profile.
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,

    /// Negative cache: user_id → expiry instant.
    neg_cache: RwLock<HashMap<String, Instant>>,
    /// TTL for negative entries (Duration::ZERO = disabled).
    neg_ttl: Duration,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProfileCache {
    /// Create a new profile cache.
    ///
    /// - `ttl` - positive entry lifetime
    /// - `neg_ttl` - negative entry lifetime (`Duration::ZERO` to disable)
    pub fn new(ttl: Duration, neg_ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
            neg_cache: RwLock::new(HashMap::new()),
            neg_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    // ── Positive cache ──────────────────────────────────────────

    /// Get a cached profile if present and within TTL.
    pub fn get(&self, user_id: &str) -> Option<CachedProfile> {
        let cache = self.cache.read();
        if let Some(entry) = cache.get(user_id)
            && Instant::now() < entry.expires_at
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.profile.clone());
        }
        drop(cache);

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, profile: CachedProfile) {
        let entry = CacheEntry {
            expires_at: Instant::now() + self.ttl,
            profile,
        };
        let mut cache = self.cache.write();
        if cache.len() >= PRUNE_THRESHOLD {
            let now = Instant::now();
            cache.retain(|_, entry| entry.expires_at > now);
        }
        cache.insert(entry.profile.user_id.clone(), entry);
    }

    /// Drop both positive and negative entries for a user.
    pub fn invalidate_user(&self, user_id: &str) {
        self.cache.write().remove(user_id);
        self.neg_cache.write().remove(user_id);
    }

    pub fn clear(&self) {
        self.cache.write().clear();
        self.neg_cache.write().clear();
    }

    /// Remove expired entries from both caches.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.cache.write().retain(|_, entry| entry.expires_at > now);
        self.neg_cache.write().retain(|_, &mut exp| exp > now);
    }

    // ── Negative cache ──────────────────────────────────────────

    /// Record a user id as having no account record.
    pub fn insert_negative(&self, user_id: &str) {
        if self.neg_ttl == Duration::ZERO {
            return;
        }
        let now = Instant::now();
        let mut neg_cache = self.neg_cache.write();
        if neg_cache.len() >= PRUNE_THRESHOLD {
            neg_cache.retain(|_, &mut exp| exp > now);
        }
        neg_cache.insert(user_id.to_string(), now + self.neg_ttl);
    }

    /// Check if a user id is known to have no account record.
    pub fn is_negative(&self, user_id: &str) -> bool {
        if self.neg_ttl == Duration::ZERO {
            return false;
        }
        let cache = self.neg_cache.read();
        if let Some(&exp) = cache.get(user_id)
            && Instant::now() < exp
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        false
    }

    // ── Statistics ──────────────────────────────────────────────

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.read().len(),
            neg_size: self.neg_cache.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl: self.ttl,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of positive entries.
    pub size: usize,
    /// Number of negative entries.
    pub neg_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl: Duration,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
