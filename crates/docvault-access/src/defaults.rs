//! Default values shared by the policy, cache and configuration layers.

/// Maximum metered views of one document per day (and per anonymous browser).
pub const DEFAULT_MAX_VIEWS: u32 = 5;

/// Snapshot cache TTL in milliseconds (5 minutes).
pub const DEFAULT_SNAPSHOT_TTL_MS: u64 = 300_000;

/// Profile cache TTL in seconds.
pub const DEFAULT_PROFILE_CACHE_TTL_SECS: u64 = 60;

/// Negative profile cache TTL in seconds (unknown user ids).
pub const DEFAULT_PROFILE_NEG_CACHE_TTL_SECS: u64 = 5;

/// Attempts made by transactional stores before giving up on contention.
pub const DEFAULT_INCREMENT_ATTEMPTS: u32 = 5;

/// Storage key holding anonymous per-document view counters.
pub const ANONYMOUS_VIEWS_KEY: &str = "anonymous_document_views";

/// Storage key of the categories-with-documents snapshot.
pub const CATEGORIES_SNAPSHOT_KEY: &str = "all_categories_with_documents";

// ── Backends ──────────────────────────────────────────────────────

/// SQLite file next to the working directory, created on first use.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:docvault.db?mode=rwc";

pub const DEFAULT_SQL_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

pub const DEFAULT_FIRESTORE_DATABASE: &str = "(default)";

pub const DEFAULT_FIRESTORE_TIMEOUT_SECS: u64 = 10;
