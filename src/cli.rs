//! Command-line interface for docvault.
//!
//! # Usage
//!
//! ```bash
//! # Prepare a SQL database and register an account
//! docvault --database-url sqlite:docvault.db?mode=rwc admin init
//! docvault admin add-user alice
//! docvault admin add-document doc-1 --title "Linear algebra" --category math
//!
//! # Record a view (metered for free accounts)
//! docvault view alice doc-1
//!
//! # Read-only entitlement check
//! docvault check alice doc-1 --format json
//!
//! # Documents opened today with their remaining quota
//! docvault viewed alice
//!
//! # Anonymous visitors and snapshots (need cache.path to persist)
//! docvault --storage-path client.json anon track doc-1
//! docvault --storage-path client.json cache clear-questions doc-1
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use docvault_access::firestore::FirestoreStore;
use docvault_access::sql::SqlStore;
use docvault_access::store::{
    CategoryRecord, DocumentRecord, LibraryStore, PaidCategories, StorePolicy, ViewedDocument,
};
use docvault_access::{
    AccessDecision, AccessPolicy, AnonymousViewStatus, AnonymousViewTracker, FileStorage,
    KeyValueStorage, MemoryStorage, MemoryStore, Role, SnapshotCache, UserRecord,
};
use docvault_config::{
    CacheConfig, CliOverrides, Config, LoggingConfig, StoreBackend, StoreConfig, apply_overrides,
    load_config, validate_config,
};
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// docvault CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "docvault",
    version,
    about = "Tiered document access control with daily view quotas",
    propagate_version = true
)]
pub struct Cli {
    /// Config file path (json/jsonc/yaml/toml); built-in defaults when omitted
    #[arg(short, long, env = "DOCVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub overrides: CliOverrides,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Decide whether a user may open a document, recording a metered view.
    View { user_id: String, document_id: String },

    /// Entitlement check without recording a view.
    Check { user_id: String, document_id: String },

    /// Documents a user opened today.
    Viewed { user_id: String },

    /// Anonymous per-document view tracking.
    #[command(subcommand)]
    Anon(AnonCommands),

    /// Client snapshot cache.
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Manage accounts, documents and purchases (SQL backend).
    #[command(subcommand)]
    Admin(AdminCommands),

    /// Load and validate the configuration, then print it.
    ConfigCheck,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AnonCommands {
    /// Count one anonymous view of a document.
    Track { document_id: String },
    /// Show the anonymous quota of a document without counting.
    Status { document_id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommands {
    /// Store a JSON value under a key.
    Put {
        key: String,
        /// JSON payload.
        value: String,
        /// Lifetime in milliseconds (defaults to cache.snapshot_ttl_ms).
        #[arg(long)]
        ttl_ms: Option<u64>,
    },
    /// Print a cached value if it has not expired.
    Get { key: String },
    /// Drop the category snapshot.
    ClearCategories,
    /// Drop every question snapshot of a document.
    ClearQuestions { document_id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Create the tables.
    Init,

    /// Create or replace an account.
    AddUser {
        user_id: String,
        /// Stored role (fuser, puser, admin).
        #[arg(short, long, default_value = Role::FREE)]
        role: String,
        /// Subscription type of paid accounts (full, partial).
        #[arg(short, long)]
        subscription: Option<String>,
        /// Category granted on the account (repeatable).
        #[arg(long = "paid-category")]
        paid_categories: Vec<String>,
        /// Document granted on the account (repeatable).
        #[arg(long = "paid-document")]
        paid_documents: Vec<String>,
    },

    /// Change the role of an existing account.
    SetRole {
        user_id: String,
        role: String,
        #[arg(short, long)]
        subscription: Option<String>,
    },

    /// Record a category purchase.
    Purchase { user_id: String, category_id: String },

    /// Create or replace a document.
    AddDocument {
        document_id: String,
        #[arg(short, long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        slug: String,
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Create or replace a category.
    AddCategory {
        category_id: String,
        #[arg(short, long, default_value = "")]
        title: String,
        #[arg(short, long)]
        logo: Option<String>,
    },
}

/// Run the CLI with parsed arguments.
pub async fn run(cli: Cli) -> CliResult {
    let config = resolve_config(cli.config.as_deref(), &cli.overrides)?;
    init_tracing(&config.logging);
    debug!(backend = ?config.store.backend, "configuration loaded");

    match cli.command {
        Commands::View {
            user_id,
            document_id,
        } => {
            let policy = open_policy(&config).await?;
            let decision = policy.evaluate(&user_id, &document_id).await;
            print_decision(&user_id, &document_id, &decision, cli.format)
        }
        Commands::Check {
            user_id,
            document_id,
        } => {
            let policy = open_policy(&config).await?;
            let decision = policy.can_view_document(&user_id, &document_id).await;
            print_decision(&user_id, &document_id, &decision, cli.format)
        }
        Commands::Viewed { user_id } => {
            let policy = open_policy(&config).await?;
            let viewed = policy.viewed_documents_today(&user_id).await;
            print_viewed(&policy.today().to_string(), &viewed, cli.format)
        }
        Commands::Anon(cmd) => run_anon(cmd, &config.cache, cli.format),
        Commands::Cache(cmd) => run_cache(cmd, &config.cache),
        Commands::Admin(cmd) => run_admin(cmd, &config.store).await,
        Commands::ConfigCheck => {
            println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            Ok(())
        }
    }
}

/// Load the config file (or defaults), apply CLI overrides and validate.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, overrides);
    validate_config(&config)?;
    Ok(config)
}

/// Build the configured [`LibraryStore`].
pub async fn open_store(
    config: &StoreConfig,
) -> Result<Arc<dyn LibraryStore>, Box<dyn std::error::Error>> {
    let store: Arc<dyn LibraryStore> = match config.backend {
        StoreBackend::Memory => {
            warn!("memory backend: accounts and view counters are lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Sql => Arc::new(SqlStore::connect(config.sql_config()).await?),
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(config.firestore_config())?),
    };
    Ok(store)
}

async fn open_policy(
    config: &Config,
) -> Result<StorePolicy<Arc<dyn LibraryStore>>, Box<dyn std::error::Error>> {
    let store = open_store(&config.store).await?;
    Ok(StorePolicy::new(store, config.policy.store_policy_config()))
}

/// Client-side storage: a JSON file when `cache.path` is set, process memory otherwise.
pub fn open_client_storage(
    config: &CacheConfig,
) -> Result<Arc<dyn KeyValueStorage>, Box<dyn std::error::Error>> {
    let storage: Arc<dyn KeyValueStorage> = match &config.path {
        Some(path) => Arc::new(FileStorage::open(path)?),
        None => Arc::new(MemoryStorage::new()),
    };
    Ok(storage)
}

fn run_anon(cmd: AnonCommands, config: &CacheConfig, format: OutputFormat) -> CliResult {
    let tracker = AnonymousViewTracker::new(open_client_storage(config)?)
        .max_views(config.anonymous_max_views);
    let (document_id, status) = match cmd {
        AnonCommands::Track { document_id } => {
            let status = tracker.track(&document_id);
            (document_id, status)
        }
        AnonCommands::Status { document_id } => {
            let status = tracker.limit_data(&document_id);
            (document_id, status)
        }
    };
    print_anonymous(&document_id, &status, format)
}

fn run_cache(cmd: CacheCommands, config: &CacheConfig) -> CliResult {
    let cache =
        SnapshotCache::new(open_client_storage(config)?).with_default_ttl(config.snapshot_ttl());
    match cmd {
        CacheCommands::Put { key, value, ttl_ms } => {
            let data: serde_json::Value = serde_json::from_str(&value)?;
            let stored = match ttl_ms {
                Some(ms) => cache.cache_data(&key, &data, Duration::from_millis(ms)),
                None => cache.cache_default(&key, &data),
            };
            if !stored {
                return Err(format!("failed to cache '{key}'").into());
            }
            println!("Cached '{key}'.");
        }
        CacheCommands::Get { key } => match cache.get_data_from_cache::<serde_json::Value>(&key) {
            Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
            None => println!("No cached value for '{key}'."),
        },
        CacheCommands::ClearCategories => {
            cache.clear_categories_cache();
            println!("Category snapshot cleared.");
        }
        CacheCommands::ClearQuestions { document_id } => {
            cache.clear_document_question_cache(&document_id);
            println!("Question snapshots of '{document_id}' cleared.");
        }
    }
    Ok(())
}

async fn run_admin(cmd: AdminCommands, config: &StoreConfig) -> CliResult {
    if config.backend != StoreBackend::Sql {
        return Err(format!(
            "admin commands need the sql backend (configured: {:?})",
            config.backend
        )
        .into());
    }
    let store = SqlStore::connect(config.sql_config()).await?;

    match cmd {
        AdminCommands::Init => {
            store.init_schema().await?;
            println!("Database schema initialized successfully.");
        }
        AdminCommands::AddUser {
            user_id,
            role,
            subscription,
            paid_categories,
            paid_documents,
        } => {
            let role = parse_role(&role, subscription.as_deref())?;
            let mut user = UserRecord::new(&user_id).with_role(role);
            user.paid_categories = PaidCategories {
                categories: paid_categories,
                documents: paid_documents,
            };
            store.upsert_user(&user).await?;
            info!(user_id = %user_id, role = %role, "account saved");
            println!("User '{user_id}' saved as {role}.");
        }
        AdminCommands::SetRole {
            user_id,
            role,
            subscription,
        } => {
            let role = parse_role(&role, subscription.as_deref())?;
            store.set_role(&user_id, role).await?;
            println!("User '{user_id}' is now {role}.");
        }
        AdminCommands::Purchase {
            user_id,
            category_id,
        } => {
            store.add_purchase(&user_id, &category_id).await?;
            println!("Purchase of '{category_id}' recorded for '{user_id}'.");
        }
        AdminCommands::AddDocument {
            document_id,
            title,
            slug,
            category,
        } => {
            store
                .upsert_document(&DocumentRecord {
                    document_id: document_id.clone(),
                    title,
                    slug,
                    category_id: category,
                })
                .await?;
            println!("Document '{document_id}' saved.");
        }
        AdminCommands::AddCategory {
            category_id,
            title,
            logo,
        } => {
            store
                .upsert_category(&CategoryRecord {
                    category_id: category_id.clone(),
                    title,
                    logo,
                })
                .await?;
            println!("Category '{category_id}' saved.");
        }
    }
    Ok(())
}

/// Parse a stored role name, rejecting anything the store would read as free by accident.
fn parse_role(role: &str, subscription: Option<&str>) -> Result<Role, String> {
    match role.trim() {
        Role::FREE | Role::PAID | Role::ADMIN => {}
        other => {
            return Err(format!(
                "unknown role '{other}' (expected {}, {} or {})",
                Role::FREE,
                Role::PAID,
                Role::ADMIN
            ));
        }
    }
    if let Some(kind) = subscription
        && !matches!(kind.trim(), "full" | "partial")
    {
        return Err(format!(
            "unknown subscription type '{kind}' (expected full or partial)"
        ));
    }
    Ok(Role::from_parts(Some(role), subscription))
}

/// Copy of the config with credentials blanked out.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.store.auth_token.is_some() {
        config.store.auth_token = Some("***".to_string());
    }
    if config.store.api_key.is_some() {
        config.store.api_key = Some("***".to_string());
    }
    config
}

/// Decision display row.
#[derive(Tabled)]
struct DecisionDisplay {
    #[tabled(rename = "User")]
    user_id: String,
    #[tabled(rename = "Document")]
    document_id: String,
    #[tabled(rename = "Allowed")]
    allowed: &'static str,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Views")]
    views: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
}

#[derive(Serialize)]
struct DecisionOutput<'a> {
    user_id: &'a str,
    document_id: &'a str,
    #[serde(flatten)]
    decision: &'a AccessDecision,
}

fn print_decision(
    user_id: &str,
    document_id: &str,
    decision: &AccessDecision,
    format: OutputFormat,
) -> CliResult {
    match format {
        OutputFormat::Json => {
            let output = DecisionOutput {
                user_id,
                document_id,
                decision,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            let row = DecisionDisplay {
                user_id: user_id.to_string(),
                document_id: document_id.to_string(),
                allowed: yes_no(decision.can_view),
                reason: decision.reason.to_string(),
                views: decision
                    .quota
                    .map(|q| format!("{}/{}", q.view_count, q.max_views))
                    .unwrap_or_else(|| "-".to_string()),
                remaining: decision
                    .remaining()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            };
            println!("{}", Table::new([row]));
            if let Some(error) = &decision.error {
                eprintln!("Backend error: {error}");
            }
        }
    }
    Ok(())
}

/// Viewed-today display row.
#[derive(Tabled)]
struct ViewedDisplay {
    #[tabled(rename = "Document")]
    document_id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Views")]
    views: String,
    #[tabled(rename = "Remaining")]
    remaining: u32,
    #[tabled(rename = "Used")]
    used: String,
}

impl From<&ViewedDocument> for ViewedDisplay {
    fn from(doc: &ViewedDocument) -> Self {
        Self {
            document_id: doc.document_id.clone(),
            title: doc.title.clone(),
            category: doc
                .category_title
                .clone()
                .or_else(|| doc.category_id.clone())
                .unwrap_or_else(|| "-".to_string()),
            views: format!("{}/{}", doc.view_count, doc.max_views),
            remaining: doc.remaining,
            used: format!("{:.0}%", doc.percent_used),
        }
    }
}

fn print_viewed(date_key: &str, viewed: &[ViewedDocument], format: OutputFormat) -> CliResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(viewed)?),
        OutputFormat::Table if viewed.is_empty() => println!("No documents viewed on {date_key}."),
        OutputFormat::Table => {
            println!("Viewed on {date_key}:");
            println!("{}", Table::new(viewed.iter().map(ViewedDisplay::from)));
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct AnonymousDisplay {
    #[tabled(rename = "Document")]
    document_id: String,
    #[tabled(rename = "Views")]
    views: String,
    #[tabled(rename = "Remaining")]
    remaining: u32,
    #[tabled(rename = "Exceeded")]
    exceeded: &'static str,
}

fn print_anonymous(
    document_id: &str,
    status: &AnonymousViewStatus,
    format: OutputFormat,
) -> CliResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(status)?),
        OutputFormat::Table => {
            let row = AnonymousDisplay {
                document_id: document_id.to_string(),
                views: status
                    .view_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                remaining: status.remaining,
                exceeded: yes_no(status.exceeded),
            };
            println!("{}", Table::new([row]));
        }
    }
    Ok(())
}

fn yes_no(b: bool) -> &'static str {
    if b { "Yes" } else { "No" }
}

/// Initialize tracing subscriber with the given logging configuration.
///
/// Supports:
/// - `level`: Base log level (trace, debug, info, warn, error). Default: warn
/// - `format`: Output format (json, pretty, compact). Default: compact
/// - `output`: Output target (stdout, stderr). Default: stderr
/// - `filters`: Per-module log level overrides
pub fn init_tracing(config: &LoggingConfig) {
    let base_level = config.level.as_deref().unwrap_or("warn");
    let mut filter_str = base_level.to_string();

    for (module, level) in &config.filters {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }

    let filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("warn"));

    let format = config.format.as_deref().unwrap_or("compact");
    let output = config.output.as_deref().unwrap_or("stderr");

    // try_init: tests may run several commands in one process
    let result = match (format, output) {
        ("json", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stdout))
            .try_init(),
        ("json", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        ("pretty", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(io::stdout))
            .try_init(),
        ("pretty", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .try_init(),
        (_, "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stdout))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
    };
    if result.is_err() {
        debug!("tracing subscriber already installed");
    }
}
