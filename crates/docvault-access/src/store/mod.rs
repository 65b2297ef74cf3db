//! Generic store-based access policy.
//!
//! This module provides:
//!
//! - [`UserRecord`], [`DocumentRecord`], [`CategoryRecord`] - data from any store
//! - [`LibraryStore`] - data-access trait (implement this for new backends)
//! - [`StorePolicy`] - generic wrapper that adds the decision logic + caching
//! - [`ProfileCache`] / [`CacheStats`] / [`CachedProfile`] - optional profile cache
//! - [`StorePolicyConfig`] / [`FailureMode`] - configuration types
//!
//! # Adding a new backend
//!
//! ```ignore
//! use docvault_access::store::{LibraryStore, StorePolicy, StorePolicyConfig};
//!
//! struct MyStore { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl LibraryStore for MyStore {
//!     // lookups + increment_view
//! }
//!
//! // Then construct: StorePolicy::new(MyStore { .. }, StorePolicyConfig::default())
//! ```

mod cache;
mod config;
mod policy;
mod record;
mod traits;

pub use cache::{CacheStats, CachedProfile, PRUNE_THRESHOLD, ProfileCache};
pub use config::{FailureMode, StorePolicyConfig};
pub use policy::StorePolicy;
pub use record::{
    CategoryRecord, DocumentRecord, PaidCategories, UserRecord, ViewIncrement, ViewedDocument,
};
pub use traits::LibraryStore;
