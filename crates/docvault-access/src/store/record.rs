//! Records returned by a [`LibraryStore`](super::LibraryStore).

use serde::{Deserialize, Serialize};

use crate::role::Role;

use super::cache::CachedProfile;

/// Categories and documents granted directly on the account.
///
/// Maintained by admins alongside the separate purchase records that
/// partial subscriptions are checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidCategories {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Account data relevant to access decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub role: Role,
    pub paid_categories: PaidCategories,
}

impl UserRecord {
    /// A freshly registered account.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::default(),
            paid_categories: PaidCategories::default(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

impl From<CachedProfile> for UserRecord {
    fn from(cached: CachedProfile) -> Self {
        Self {
            user_id: cached.user_id,
            role: cached.role,
            paid_categories: cached.paid_categories,
        }
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub title: String,
    pub slug: String,
    pub category_id: Option<String>,
}

/// Category metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub category_id: String,
    pub title: String,
    pub logo: Option<String>,
}

/// Result of a conditional counter increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewIncrement {
    /// The view was counted; carries the new count.
    Recorded(u32),
    /// The counter was already at the cap; carries the current count.
    LimitReached(u32),
}

impl ViewIncrement {
    /// Count after the call.
    #[inline]
    pub fn count(self) -> u32 {
        match self {
            Self::Recorded(n) | Self::LimitReached(n) => n,
        }
    }
}

/// One row of the "viewed today" listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewedDocument {
    pub document_id: String,
    pub title: String,
    pub slug: String,
    pub category_id: Option<String>,
    pub category_title: Option<String>,
    pub category_logo: Option<String>,
    pub view_count: u32,
    pub max_views: u32,
    pub remaining: u32,
    pub percent_used: f64,
}
