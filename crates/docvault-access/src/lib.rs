//! Document access control for docvault.
//!
//! This crate decides whether an account may open a document and meters
//! the daily free views of non-paying accounts. It also ships the small
//! client-side helpers used next to it: a TTL snapshot cache and an
//! anonymous view tracker over string key-value storage.
//!
//! # Example
//!
//! ```
//! use docvault_access::{AccessPolicy, AccessReason, MemoryStore, UserRecord};
//! use docvault_access::store::{StorePolicy, StorePolicyConfig};
//!
//! # async fn example() {
//! let store = MemoryStore::new().with_user(UserRecord::new("alice"));
//! let policy = StorePolicy::new(store, StorePolicyConfig::default());
//!
//! let decision = policy.evaluate("alice", "doc-1").await;
//! assert!(decision.can_view);
//! assert_eq!(decision.reason, AccessReason::WithinLimit);
//! assert_eq!(decision.remaining(), Some(4));
//! # }
//! ```

mod anonymous;
mod date_key;
pub mod defaults;
mod error;
mod memory;
mod result;
mod role;
mod snapshot;
mod storage;
pub mod store;
mod traits;

#[cfg(feature = "firestore")]
pub mod firestore;
#[cfg(feature = "sql")]
pub mod sql;

pub use anonymous::{AnonymousViewStatus, AnonymousViewTracker};
pub use date_key::{Clock, DateKey, FixedClock, SystemClock};
pub use error::AccessError;
pub use memory::MemoryStore;
pub use result::{AccessDecision, AccessReason, ViewQuota};
pub use role::{Role, SubscriptionKind};
pub use snapshot::{SnapshotCache, question_cache_keys};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{UserRecord, ViewedDocument};
pub use traits::AccessPolicy;
