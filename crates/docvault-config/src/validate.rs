//! Configuration validation logic.

use docvault_access::sql::DatabaseType;

use crate::loader::ConfigError;
use crate::{Config, StoreBackend};

const LOG_FORMATS: [&str; 3] = ["json", "pretty", "compact"];
const LOG_OUTPUTS: [&str; 2] = ["stdout", "stderr"];

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let store = &config.store;
    match store.backend {
        StoreBackend::Memory => {}
        StoreBackend::Sql => {
            if store.database_url.trim().is_empty() {
                return Err(ConfigError::Validation("store.database_url is empty".into()));
            }
            if DatabaseType::from_url(&store.database_url).is_none() {
                return Err(ConfigError::Validation(
                    "store.database_url must start with sqlite:, postgres://, mysql:// or mariadb://"
                        .into(),
                ));
            }
            if store.max_connections == 0 {
                return Err(ConfigError::Validation(
                    "store.max_connections must be > 0".into(),
                ));
            }
        }
        StoreBackend::Firestore => {
            if store.project_id.as_deref().unwrap_or("").trim().is_empty() {
                return Err(ConfigError::Validation(
                    "store.project_id is required for the firestore backend".into(),
                ));
            }
            if store.firestore_base_url.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "store.firestore_base_url is empty".into(),
                ));
            }
            if store.timeout_secs == 0 {
                return Err(ConfigError::Validation("store.timeout_secs must be > 0".into()));
            }
        }
    }
    if store.increment_attempts == 0 {
        return Err(ConfigError::Validation(
            "store.increment_attempts must be > 0".into(),
        ));
    }

    if config.policy.max_views == 0 {
        return Err(ConfigError::Validation("policy.max_views must be > 0".into()));
    }
    if config.policy.cache_enabled && config.policy.cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "policy.cache_ttl_secs must be > 0 when the cache is enabled".into(),
        ));
    }

    if config.cache.snapshot_ttl_ms == 0 {
        return Err(ConfigError::Validation(
            "cache.snapshot_ttl_ms must be > 0".into(),
        ));
    }
    if config.cache.anonymous_max_views == 0 {
        return Err(ConfigError::Validation(
            "cache.anonymous_max_views must be > 0".into(),
        ));
    }
    if let Some(ref path) = config.cache.path
        && path.as_os_str().is_empty()
    {
        return Err(ConfigError::Validation("cache.path is empty".into()));
    }

    if let Some(ref format) = config.logging.format
        && !LOG_FORMATS.contains(&format.as_str())
    {
        return Err(ConfigError::Validation(format!(
            "logging.format must be one of: {LOG_FORMATS:?}"
        )));
    }
    if let Some(ref output) = config.logging.output
        && !LOG_OUTPUTS.contains(&output.as_str())
    {
        return Err(ConfigError::Validation(format!(
            "logging.output must be one of: {LOG_OUTPUTS:?}"
        )));
    }
    Ok(())
}
