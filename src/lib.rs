//! # docvault
//!
//! Tiered document access control.
//!
//! Paid and admin accounts read freely, partial subscribers read the
//! categories they bought, and everyone else gets a small number of
//! free views per document per day. This crate bundles the pieces and
//! the `docvault` command-line tool.
//!
//! ## Crates
//!
//! - [`docvault_access`] - Access policy, stores, snapshot cache and anonymous tracking
//! - [`docvault_config`] - Configuration loading and validation

pub mod cli;

pub use docvault_access as access;
pub use docvault_config as config;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use docvault_access::store::{LibraryStore, StorePolicy, StorePolicyConfig};
    pub use docvault_access::{
        AccessDecision, AccessPolicy, AccessReason, AnonymousViewTracker, MemoryStore,
        SnapshotCache,
    };
    pub use docvault_config::{Config, load_config, validate_config};
}
