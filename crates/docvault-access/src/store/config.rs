//! Configuration for [`StorePolicy`](super::StorePolicy).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_MAX_VIEWS, DEFAULT_PROFILE_CACHE_TTL_SECS, DEFAULT_PROFILE_NEG_CACHE_TTL_SECS,
};

/// What the evaluator does when the backend fails mid-decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Allow the view (`can_view = true, reason = error`).
    #[default]
    Open,
    /// Deny the view (`can_view = false, reason = error`).
    Closed,
}

impl FailureMode {
    #[inline]
    pub fn allows(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Shared configuration consumed by [`StorePolicy`](super::StorePolicy).
#[derive(Debug, Clone)]
pub struct StorePolicyConfig {
    /// Metered views per document per day.
    pub max_views: u32,
    /// Failure handling of [`evaluate`](crate::AccessPolicy::evaluate).
    pub evaluate_failure: FailureMode,
    /// Failure handling of [`can_view_document`](crate::AccessPolicy::can_view_document).
    pub preflight_failure: FailureMode,
    /// Whether to cache user profiles.
    pub cache_enabled: bool,
    /// Positive profile cache TTL.
    pub cache_ttl: Duration,
    /// Negative cache TTL for user ids with no account record.
    ///
    /// Set to `Duration::ZERO` to disable negative caching.
    pub neg_cache_ttl: Duration,
}

impl Default for StorePolicyConfig {
    fn default() -> Self {
        Self {
            max_views: DEFAULT_MAX_VIEWS,
            evaluate_failure: FailureMode::Open,
            preflight_failure: FailureMode::Closed,
            cache_enabled: false,
            cache_ttl: Duration::from_secs(DEFAULT_PROFILE_CACHE_TTL_SECS),
            neg_cache_ttl: Duration::from_secs(DEFAULT_PROFILE_NEG_CACHE_TTL_SECS),
        }
    }
}

impl StorePolicyConfig {
    /// Builder: set the daily view cap.
    pub fn max_views(mut self, n: u32) -> Self {
        self.max_views = n;
        self
    }

    /// Builder: enable profile caching.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Builder: set profile cache TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Builder: set negative cache TTL.
    pub fn neg_cache_ttl(mut self, ttl: Duration) -> Self {
        self.neg_cache_ttl = ttl;
        self
    }

    /// Builder: set evaluate failure handling.
    pub fn evaluate_failure(mut self, mode: FailureMode) -> Self {
        self.evaluate_failure = mode;
        self
    }

    /// Builder: set preflight failure handling.
    pub fn preflight_failure(mut self, mode: FailureMode) -> Self {
        self.preflight_failure = mode;
        self
    }
}
