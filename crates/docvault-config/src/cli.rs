//! CLI override definitions and application logic.

use std::path::PathBuf;

use clap::Parser;
use docvault_access::store::FailureMode;

use crate::{Config, StoreBackend};

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override store backend
    #[arg(long, value_enum)]
    pub backend: Option<StoreBackend>,
    /// Override SQL database URL, e.g. sqlite:docvault.db
    #[arg(long, env = "DOCVAULT_DATABASE_URL")]
    pub database_url: Option<String>,
    /// Override Firestore project id
    #[arg(long)]
    pub project_id: Option<String>,
    /// Override Firestore bearer token
    #[arg(long, env = "DOCVAULT_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
    /// Override daily views per document for free accounts
    #[arg(long)]
    pub max_views: Option<u32>,
    /// Backend failure handling of metered checks (open/closed)
    #[arg(long, value_parser = parse_failure_mode)]
    pub evaluate_failure: Option<FailureMode>,
    /// Backend failure handling of preflight checks (open/closed)
    #[arg(long, value_parser = parse_failure_mode)]
    pub preflight_failure: Option<FailureMode>,
    /// Enable or disable the user profile cache
    #[arg(long)]
    pub profile_cache: Option<bool>,
    /// Override client storage file
    #[arg(long)]
    pub storage_path: Option<PathBuf>,
    /// Override snapshot TTL (milliseconds)
    #[arg(long)]
    pub snapshot_ttl_ms: Option<u64>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override log format (json/pretty/compact)
    #[arg(long)]
    pub log_format: Option<String>,
}

fn parse_failure_mode(s: &str) -> Result<FailureMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "open" => Ok(FailureMode::Open),
        "closed" => Ok(FailureMode::Closed),
        other => Err(format!("expected 'open' or 'closed', got '{other}'")),
    }
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = overrides.backend {
        config.store.backend = v;
    }
    if let Some(v) = &overrides.database_url {
        config.store.database_url = v.clone();
    }
    if let Some(v) = &overrides.project_id {
        config.store.project_id = Some(v.clone());
    }
    if let Some(v) = &overrides.auth_token {
        config.store.auth_token = Some(v.clone());
    }
    if let Some(v) = overrides.max_views {
        config.policy.max_views = v;
    }
    if let Some(v) = overrides.evaluate_failure {
        config.policy.evaluate_failure = v;
    }
    if let Some(v) = overrides.preflight_failure {
        config.policy.preflight_failure = v;
    }
    if let Some(v) = overrides.profile_cache {
        config.policy.cache_enabled = v;
    }
    if let Some(v) = &overrides.storage_path {
        config.cache.path = Some(v.clone());
    }
    if let Some(v) = overrides.snapshot_ttl_ms {
        config.cache.snapshot_ttl_ms = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.log_format {
        config.logging.format = Some(v.clone());
    }
}
