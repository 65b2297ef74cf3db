//! Data-access trait for the document library.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::AccessError;
use crate::date_key::DateKey;

use super::{CategoryRecord, DocumentRecord, UserRecord, ViewIncrement};

/// Data-access layer behind the access policy.
///
/// Implementations provide only data retrieval and counter persistence.
/// Decision logic (roles, purchases, quotas) is handled by
/// [`StorePolicy`](super::StorePolicy), which wraps a `LibraryStore`.
///
/// Lookups return `Ok(None)` when the record does not exist; errors are
/// reserved for backend failures.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Look up an account.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AccessError>;

    /// Look up document metadata.
    async fn find_document(&self, document_id: &str)
    -> Result<Option<DocumentRecord>, AccessError>;

    /// Look up category metadata.
    async fn find_category(&self, category_id: &str)
    -> Result<Option<CategoryRecord>, AccessError>;

    /// Category ids in the user's purchase record.
    ///
    /// Returns `None` when the user has no purchase record at all.
    async fn purchased_categories(&self, user_id: &str)
    -> Result<Option<Vec<String>>, AccessError>;

    /// Views of one document by one user on one day (0 when absent).
    async fn view_count(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
    ) -> Result<u32, AccessError>;

    /// All per-document view counts of one user on one day.
    async fn views_on(
        &self,
        user_id: &str,
        date_key: &DateKey,
    ) -> Result<HashMap<String, u32>, AccessError>;

    /// Atomically add one view unless the counter already reached `max_views`.
    ///
    /// Concurrent callers must never push a counter past `max_views`.
    async fn increment_view(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
        max_views: u32,
    ) -> Result<ViewIncrement, AccessError>;
}

#[async_trait]
impl<S: LibraryStore + ?Sized> LibraryStore for Arc<S> {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AccessError> {
        (**self).find_user(user_id).await
    }

    async fn find_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, AccessError> {
        (**self).find_document(document_id).await
    }

    async fn find_category(
        &self,
        category_id: &str,
    ) -> Result<Option<CategoryRecord>, AccessError> {
        (**self).find_category(category_id).await
    }

    async fn purchased_categories(
        &self,
        user_id: &str,
    ) -> Result<Option<Vec<String>>, AccessError> {
        (**self).purchased_categories(user_id).await
    }

    async fn view_count(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
    ) -> Result<u32, AccessError> {
        (**self).view_count(user_id, date_key, document_id).await
    }

    async fn views_on(
        &self,
        user_id: &str,
        date_key: &DateKey,
    ) -> Result<HashMap<String, u32>, AccessError> {
        (**self).views_on(user_id, date_key).await
    }

    async fn increment_view(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
        max_views: u32,
    ) -> Result<ViewIncrement, AccessError> {
        (**self)
            .increment_view(user_id, date_key, document_id, max_views)
            .await
    }
}
