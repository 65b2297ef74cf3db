//! In-memory library store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::date_key::DateKey;
use crate::error::AccessError;
use crate::store::{CategoryRecord, DocumentRecord, LibraryStore, UserRecord, ViewIncrement};

type ViewKey = (String, DateKey, String);

/// Library store held entirely in memory.
///
/// Suitable for tests, demos and small fixed deployments. Counters are
/// lost on restart; use a SQL or document-database store for persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    documents: RwLock<HashMap<String, DocumentRecord>>,
    categories: RwLock<HashMap<String, CategoryRecord>>,
    purchases: RwLock<HashMap<String, Vec<String>>>,
    /// (user_id, date_key, document_id) → views.
    views: RwLock<HashMap<ViewKey, u32>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an account.
    pub fn with_user(self, user: UserRecord) -> Self {
        self.insert_user(user);
        self
    }

    /// Builder: add a document.
    pub fn with_document(self, document: DocumentRecord) -> Self {
        self.insert_document(document);
        self
    }

    /// Builder: add a category.
    pub fn with_category(self, category: CategoryRecord) -> Self {
        self.insert_category(category);
        self
    }

    /// Builder: set the purchase record of a user.
    pub fn with_purchases<I, C>(self, user_id: &str, categories: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.set_purchases(user_id, categories);
        self
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.users.write().insert(user.user_id.clone(), user);
    }

    pub fn insert_document(&self, document: DocumentRecord) {
        self.documents
            .write()
            .insert(document.document_id.clone(), document);
    }

    pub fn insert_category(&self, category: CategoryRecord) {
        self.categories
            .write()
            .insert(category.category_id.clone(), category);
    }

    /// Replace the purchase record of a user.
    pub fn set_purchases<I, C>(&self, user_id: &str, categories: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.purchases.write().insert(
            user_id.to_string(),
            categories.into_iter().map(Into::into).collect(),
        );
    }

    /// Remove an account.
    #[inline]
    pub fn remove_user(&self, user_id: &str) -> bool {
        self.users.write().remove(user_id).is_some()
    }

    /// Overwrite a counter (seeding and tests).
    pub fn set_view_count(&self, user_id: &str, date_key: &DateKey, document_id: &str, n: u32) {
        self.views.write().insert(
            (user_id.to_string(), *date_key, document_id.to_string()),
            n,
        );
    }

    /// Number of stored counters across all users and days.
    #[inline]
    pub fn counter_len(&self) -> usize {
        self.views.read().len()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AccessError> {
        Ok(self.users.read().get(user_id).cloned())
    }

    async fn find_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, AccessError> {
        Ok(self.documents.read().get(document_id).cloned())
    }

    async fn find_category(
        &self,
        category_id: &str,
    ) -> Result<Option<CategoryRecord>, AccessError> {
        Ok(self.categories.read().get(category_id).cloned())
    }

    async fn purchased_categories(
        &self,
        user_id: &str,
    ) -> Result<Option<Vec<String>>, AccessError> {
        Ok(self.purchases.read().get(user_id).cloned())
    }

    async fn view_count(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
    ) -> Result<u32, AccessError> {
        let key = (user_id.to_string(), *date_key, document_id.to_string());
        Ok(self.views.read().get(&key).copied().unwrap_or(0))
    }

    async fn views_on(
        &self,
        user_id: &str,
        date_key: &DateKey,
    ) -> Result<HashMap<String, u32>, AccessError> {
        Ok(self
            .views
            .read()
            .iter()
            .filter(|((uid, day, _), _)| uid == user_id && day == date_key)
            .map(|((_, _, doc), &n)| (doc.clone(), n))
            .collect())
    }

    async fn increment_view(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
        max_views: u32,
    ) -> Result<ViewIncrement, AccessError> {
        // Check and increment under a single write lock
        let mut views = self.views.write();
        let key = (user_id.to_string(), *date_key, document_id.to_string());
        let count = views.get(&key).copied().unwrap_or(0);

        if count >= max_views {
            return Ok(ViewIncrement::LimitReached(count));
        }
        views.insert(key, count + 1);
        Ok(ViewIncrement::Recorded(count + 1))
    }
}
