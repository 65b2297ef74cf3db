//! Generic store-based access policy.
//!
//! [`StorePolicy<S>`] wraps any [`LibraryStore`] implementation and provides:
//! - The decision order (params → admin → paid → metered free views)
//! - Optional profile caching via [`ProfileCache`]
//! - Failure handling: backend errors become decisions, never panics

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::date_key::{Clock, DateKey, SystemClock};
use crate::error::AccessError;
use crate::result::{AccessDecision, AccessReason, ViewQuota};
use crate::role::{Role, SubscriptionKind};
use crate::traits::AccessPolicy;

use super::cache::{CacheStats, CachedProfile, ProfileCache};
use super::config::StorePolicyConfig;
use super::record::{UserRecord, ViewIncrement, ViewedDocument};
use super::traits::LibraryStore;

/// Access policy backed by a [`LibraryStore`].
///
/// # Type parameter
///
/// - `S` - the underlying data store (e.g. `MemoryStore`, `SqlStore`)
pub struct StorePolicy<S: LibraryStore> {
    store: S,
    config: StorePolicyConfig,
    profile_cache: Option<ProfileCache>,
    clock: Arc<dyn Clock>,
}

impl<S: LibraryStore> StorePolicy<S> {
    /// Create a new policy over the given store, metering by local wall-clock days.
    pub fn new(store: S, config: StorePolicyConfig) -> Self {
        let profile_cache = if config.cache_enabled {
            Some(ProfileCache::new(config.cache_ttl, config.neg_cache_ttl))
        } else {
            None
        };

        Self {
            store,
            config,
            profile_cache,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to derive date keys.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &StorePolicyConfig {
        &self.config
    }

    /// Date key of the current metering day.
    pub fn today(&self) -> DateKey {
        self.clock.date_key()
    }

    /// Get cache statistics. Returns `None` if caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.profile_cache.as_ref().map(|c| c.stats())
    }

    /// Invalidate the cached profile of a user (after a role change).
    pub fn cache_invalidate_user(&self, user_id: &str) {
        if let Some(ref cache) = self.profile_cache {
            cache.invalidate_user(user_id);
        }
    }

    /// Clear all cache entries.
    pub fn cache_clear(&self) {
        if let Some(ref cache) = self.profile_cache {
            cache.clear();
        }
    }

    /// Drop expired profile cache entries.
    ///
    /// Inserts already prune once the cache passes
    /// [`PRUNE_THRESHOLD`](super::cache::PRUNE_THRESHOLD) entries; call this
    /// periodically to keep smaller caches tidy as well.
    pub fn cache_cleanup_expired(&self) {
        if let Some(ref cache) = self.profile_cache {
            cache.cleanup_expired();
        }
    }

    /// Resolve the role of a user, going through the profile cache.
    ///
    /// Users without an account record are free users.
    async fn load_role(&self, user_id: &str) -> Result<Role, AccessError> {
        if let Some(ref cache) = self.profile_cache {
            if cache.is_negative(user_id) {
                return Ok(Role::Free);
            }
            if let Some(cached) = cache.get(user_id) {
                return Ok(UserRecord::from(cached).role);
            }
        }

        match self.store.find_user(user_id).await? {
            Some(record) => {
                if let Some(ref cache) = self.profile_cache {
                    cache.insert(CachedProfile::from(&record));
                }
                Ok(record.role)
            }
            None => {
                if let Some(ref cache) = self.profile_cache {
                    cache.insert_negative(user_id);
                }
                Ok(Role::Free)
            }
        }
    }

    /// Partial subscribers may view documents whose category they purchased.
    async fn check_partial(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<AccessDecision, AccessError> {
        let Some(document) = self.store.find_document(document_id).await? else {
            return Ok(AccessDecision::deny(AccessReason::DocumentNotFound));
        };

        let Some(purchases) = self.store.purchased_categories(user_id).await? else {
            return Ok(AccessDecision::deny(AccessReason::PremiumPartialNoPurchases));
        };

        let purchased = document
            .category_id
            .as_deref()
            .is_some_and(|category| purchases.iter().any(|p| p == category));

        Ok(if purchased {
            AccessDecision::allow(AccessReason::PremiumPartialPurchased)
        } else {
            AccessDecision::deny(AccessReason::PremiumPartialNotPurchased)
        })
    }

    /// Count the view against today's quota.
    async fn record_metered_view(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<AccessDecision, AccessError> {
        let date_key = self.today();
        let max_views = self.config.max_views;

        let outcome = self
            .store
            .increment_view(user_id, &date_key, document_id, max_views)
            .await?;

        Ok(match outcome {
            ViewIncrement::Recorded(count) => {
                debug!(user_id, document_id, %date_key, count, "metered view recorded");
                AccessDecision::allow(AccessReason::WithinLimit)
                    .with_quota(ViewQuota::new(count, max_views))
            }
            ViewIncrement::LimitReached(count) => {
                debug!(user_id, document_id, %date_key, count, "daily view limit reached");
                AccessDecision::deny(AccessReason::LimitExceeded)
                    .with_quota(ViewQuota::new(count, max_views))
            }
        })
    }

    async fn try_evaluate(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<AccessDecision, AccessError> {
        match self.load_role(user_id).await? {
            Role::Admin => Ok(AccessDecision::allow(AccessReason::AdminUser)),
            Role::Paid(SubscriptionKind::Full) => {
                Ok(AccessDecision::allow(AccessReason::PremiumFull))
            }
            Role::Paid(SubscriptionKind::Partial) => self.check_partial(user_id, document_id).await,
            Role::Free => self.record_metered_view(user_id, document_id).await,
        }
    }

    async fn try_preflight(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<AccessDecision, AccessError> {
        // Coarse check: every non-free account is unmetered here, partial
        // subscriptions included.
        if !self.load_role(user_id).await?.is_free() {
            return Ok(AccessDecision::allow(AccessReason::PremiumUser));
        }

        let max_views = self.config.max_views;
        let count = self
            .store
            .view_count(user_id, &self.today(), document_id)
            .await?;
        let quota = ViewQuota::new(count, max_views);

        Ok(if quota.is_exhausted() {
            AccessDecision::deny(AccessReason::LimitExceeded).with_quota(quota)
        } else {
            AccessDecision::allow(AccessReason::WithinLimit).with_quota(quota)
        })
    }

    /// Documents the user viewed today, most viewed first.
    ///
    /// Documents that no longer exist are skipped; a failed lookup of one
    /// document skips that document only. Any other failure yields an
    /// empty list.
    pub async fn viewed_documents_today(&self, user_id: &str) -> Vec<ViewedDocument> {
        if user_id.is_empty() {
            return Vec::new();
        }

        let date_key = self.today();
        let views = match self.store.views_on(user_id, &date_key).await {
            Ok(views) => views,
            Err(e) => {
                warn!(user_id, error = %e, "failed to load today's views");
                return Vec::new();
            }
        };

        let max_views = self.config.max_views;
        let mut viewed = Vec::with_capacity(views.len());

        for (document_id, count) in views {
            let document = match self.store.find_document(&document_id).await {
                Ok(Some(document)) => document,
                Ok(None) => continue,
                Err(e) => {
                    warn!(user_id, document_id = %document_id, error = %e, "failed to load viewed document");
                    continue;
                }
            };

            let category = match document.category_id.as_deref() {
                Some(category_id) => self
                    .store
                    .find_category(category_id)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(category_id, error = %e, "failed to load category");
                        None
                    }),
                None => None,
            };

            let quota = ViewQuota::new(count, max_views);
            viewed.push(ViewedDocument {
                document_id,
                title: document.title,
                slug: document.slug,
                category_id: document.category_id,
                category_title: category.as_ref().map(|c| c.title.clone()),
                category_logo: category.and_then(|c| c.logo),
                view_count: quota.view_count,
                max_views,
                remaining: quota.remaining,
                percent_used: quota.percent_used(),
            });
        }

        viewed.sort_by(|a, b| {
            b.view_count
                .cmp(&a.view_count)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        viewed
    }
}

#[async_trait]
impl<S: LibraryStore> AccessPolicy for StorePolicy<S> {
    async fn evaluate(&self, user_id: &str, document_id: &str) -> AccessDecision {
        if user_id.is_empty() || document_id.is_empty() {
            return AccessDecision::deny(AccessReason::MissingParams);
        }

        match self.try_evaluate(user_id, document_id).await {
            Ok(decision) => decision,
            Err(e) => {
                let mode = self.config.evaluate_failure;
                warn!(user_id, document_id, error = %e, allow = mode.allows(), "access check failed");
                AccessDecision::failed(mode.allows(), e)
            }
        }
    }

    async fn can_view_document(&self, user_id: &str, document_id: &str) -> AccessDecision {
        if user_id.is_empty() || document_id.is_empty() {
            return AccessDecision::deny(AccessReason::MissingParams);
        }

        match self.try_preflight(user_id, document_id).await {
            Ok(decision) => decision,
            Err(e) => {
                let mode = self.config.preflight_failure;
                warn!(user_id, document_id, error = %e, allow = mode.allows(), "preflight check failed");
                AccessDecision::failed(mode.allows(), e)
            }
        }
    }
}

impl<S: LibraryStore + std::fmt::Debug> std::fmt::Debug for StorePolicy<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePolicy")
            .field("store", &self.store)
            .field("max_views", &self.config.max_views)
            .field("cache_enabled", &self.profile_cache.is_some())
            .finish_non_exhaustive()
    }
}
