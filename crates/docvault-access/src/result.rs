//! Access decision types.

use std::fmt;

use serde::Serialize;

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    /// User id or document id was empty.
    MissingParams,
    AdminUser,
    /// Paid account with full subscription.
    PremiumFull,
    /// Any non-free account (preflight check only).
    PremiumUser,
    PremiumPartialPurchased,
    PremiumPartialNotPurchased,
    /// Partial subscriber with no purchase record at all.
    PremiumPartialNoPurchases,
    DocumentNotFound,
    /// Metered view allowed; see the attached quota.
    WithinLimit,
    LimitExceeded,
    /// Backend failure; see [`AccessDecision::error`].
    Error,
}

impl AccessReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingParams => "missing_params",
            Self::AdminUser => "admin_user",
            Self::PremiumFull => "premium_full",
            Self::PremiumUser => "premium_user",
            Self::PremiumPartialPurchased => "premium_partial_purchased",
            Self::PremiumPartialNotPurchased => "premium_partial_not_purchased",
            Self::PremiumPartialNoPurchases => "premium_partial_no_purchases",
            Self::DocumentNotFound => "document_not_found",
            Self::WithinLimit => "within_limit",
            Self::LimitExceeded => "limit_exceeded",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily view quota of one document for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewQuota {
    /// Views counted today, including the current one when it was recorded.
    pub view_count: u32,
    pub max_views: u32,
    /// Views left today; never negative.
    pub remaining: u32,
}

impl ViewQuota {
    #[inline]
    pub fn new(view_count: u32, max_views: u32) -> Self {
        Self {
            view_count,
            max_views,
            remaining: max_views.saturating_sub(view_count),
        }
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.view_count >= self.max_views
    }

    /// Share of the quota used, in percent.
    pub fn percent_used(&self) -> f64 {
        if self.max_views == 0 {
            100.0
        } else {
            f64::from(self.view_count) / f64::from(self.max_views) * 100.0
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessDecision {
    pub can_view: bool,
    pub reason: AccessReason,
    /// Present on metered paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<ViewQuota>,
    /// Backend error message when `reason` is [`AccessReason::Error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccessDecision {
    #[inline]
    pub fn allow(reason: AccessReason) -> Self {
        Self {
            can_view: true,
            reason,
            quota: None,
            error: None,
        }
    }

    #[inline]
    pub fn deny(reason: AccessReason) -> Self {
        Self {
            can_view: false,
            reason,
            quota: None,
            error: None,
        }
    }

    /// Attach quota metadata.
    #[inline]
    pub fn with_quota(mut self, quota: ViewQuota) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Decision produced by a backend failure.
    pub fn failed(can_view: bool, error: impl fmt::Display) -> Self {
        Self {
            can_view,
            reason: AccessReason::Error,
            quota: None,
            error: Some(error.to_string()),
        }
    }

    /// Remaining views, when metered.
    #[inline]
    pub fn remaining(&self) -> Option<u32> {
        self.quota.map(|q| q.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_never_negative() {
        let quota = ViewQuota::new(7, 5);
        assert_eq!(quota.remaining, 0);
        assert!(quota.is_exhausted());

        let quota = ViewQuota::new(2, 5);
        assert_eq!(quota.remaining, 3);
        assert!((quota.percent_used() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decision_serialization() {
        let decision = AccessDecision::deny(AccessReason::LimitExceeded).with_quota(ViewQuota::new(5, 5));
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["can_view"], false);
        assert_eq!(json["reason"], "limit_exceeded");
        assert_eq!(json["quota"]["remaining"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_reason_strings_match_serde() {
        for reason in [
            AccessReason::MissingParams,
            AccessReason::PremiumPartialNotPurchased,
            AccessReason::WithinLimit,
            AccessReason::Error,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.as_str());
        }
    }
}
