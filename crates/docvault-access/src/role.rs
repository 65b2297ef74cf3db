//! User roles and subscription kinds.
//!
//! Accounts store their role as a plain string (`fuser`, `puser`, `admin`)
//! plus an optional `subscriptionType` that only means something for paid
//! users. [`Role`] folds both into one closed type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a paid subscription unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    /// Every document, unmetered.
    #[default]
    Full,
    /// Only documents in purchased categories.
    Partial,
}

impl SubscriptionKind {
    /// Stored `subscriptionType` string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
        }
    }
}

/// Entitlement tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Free account (`fuser`), metered.
    #[default]
    Free,
    /// Paid account (`puser`).
    Paid(SubscriptionKind),
    /// Administrator, unmetered.
    Admin,
}

impl Role {
    pub const FREE: &'static str = "fuser";
    pub const PAID: &'static str = "puser";
    pub const ADMIN: &'static str = "admin";

    /// Build a role from the stored role and subscription strings.
    ///
    /// Unknown or missing roles are treated as free. A paid role without a
    /// recognised subscription type gets full access.
    pub fn from_parts(role: Option<&str>, subscription_type: Option<&str>) -> Self {
        match role.map(str::trim) {
            Some(Self::ADMIN) => Self::Admin,
            Some(Self::PAID) => match subscription_type.map(str::trim) {
                Some("partial") => Self::Paid(SubscriptionKind::Partial),
                _ => Self::Paid(SubscriptionKind::Full),
            },
            _ => Self::Free,
        }
    }

    /// Stored role string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => Self::FREE,
            Self::Paid(_) => Self::PAID,
            Self::Admin => Self::ADMIN,
        }
    }

    /// Stored `subscriptionType` string, only set for paid accounts.
    pub fn subscription_type(self) -> Option<&'static str> {
        match self {
            Self::Paid(kind) => Some(kind.as_str()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paid(kind) => write!(f, "{}/{}", Self::PAID, kind.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}
