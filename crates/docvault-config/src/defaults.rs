//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `docvault_access::defaults`.

use docvault_access::defaults;

/// Generate default value functions that forward to docvault_access::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_max_views              => DEFAULT_MAX_VIEWS: u32,
    default_snapshot_ttl_ms        => DEFAULT_SNAPSHOT_TTL_MS: u64,
    default_cache_ttl_secs         => DEFAULT_PROFILE_CACHE_TTL_SECS: u64,
    default_neg_cache_ttl_secs     => DEFAULT_PROFILE_NEG_CACHE_TTL_SECS: u64,
    default_increment_attempts     => DEFAULT_INCREMENT_ATTEMPTS: u32,
    default_max_connections        => DEFAULT_SQL_MAX_CONNECTIONS: u32,
    default_firestore_timeout_secs => DEFAULT_FIRESTORE_TIMEOUT_SECS: u64,
}

default_string_fns! {
    default_database_url       => DEFAULT_DATABASE_URL,
    default_firestore_base_url => DEFAULT_FIRESTORE_BASE_URL,
    default_firestore_database => DEFAULT_FIRESTORE_DATABASE,
}
