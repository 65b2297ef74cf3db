//! Document-database store over the Firestore REST API.
//!
//! Collection layout:
//!
//! | collection        | document id | fields                                              |
//! |-------------------|-------------|-----------------------------------------------------|
//! | `users`           | user id     | `role`, `subscriptionType`, `paidCategories`        |
//! | `userPurchases`   | user id     | `categories` (array of category ids)                |
//! | `documents`       | document id | `title`, `slug`, `categoryId`                       |
//! | `categories`      | category id | `title`, `logo`                                     |
//! | `userPreferences` | user id     | `documentViews.<date key>.<document id>` (integer)  |
//!
//! # Example
//!
//! ```no_run
//! use docvault_access::firestore::{FirestoreConfig, FirestoreStore};
//!
//! # fn example() -> Result<(), docvault_access::AccessError> {
//! let store = FirestoreStore::new(
//!     FirestoreConfig::new("my-project").auth_token(Some("ya29.token".into())),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::date_key::DateKey;
use crate::defaults::{
    DEFAULT_FIRESTORE_BASE_URL, DEFAULT_FIRESTORE_DATABASE, DEFAULT_FIRESTORE_TIMEOUT_SECS,
    DEFAULT_INCREMENT_ATTEMPTS,
};
use crate::error::AccessError;
use crate::role::Role;
use crate::store::{
    CategoryRecord, DocumentRecord, LibraryStore, PaidCategories, UserRecord, ViewIncrement,
};

const USERS: &str = "users";
const USER_PURCHASES: &str = "userPurchases";
const DOCUMENTS: &str = "documents";
const CATEGORIES: &str = "categories";
const USER_PREFERENCES: &str = "userPreferences";
const DOCUMENT_VIEWS: &str = "documentViews";

/// Configuration for [`FirestoreStore`].
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Database id, `(default)` unless the project has several.
    pub database: String,
    /// REST endpoint; point it at the emulator for local runs.
    pub base_url: String,
    /// OAuth2 access token or ID token sent as a Bearer token.
    pub auth_token: Option<String>,
    /// Web API key sent as the `key` query parameter.
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Transaction attempts before an increment gives up under contention.
    pub increment_attempts: u32,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_FIRESTORE_DATABASE.to_string(),
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            auth_token: None,
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_FIRESTORE_TIMEOUT_SECS),
            increment_attempts: DEFAULT_INCREMENT_ATTEMPTS,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn increment_attempts(mut self, n: u32) -> Self {
        self.increment_attempts = n.max(1);
        self
    }

    /// Resource name of the database, `projects/<p>/databases/<d>`.
    fn database_path(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database)
    }
}

/// Library store backed by Firestore.
pub struct FirestoreStore {
    client: Client,
    /// `<base>/projects/<p>/databases/<d>/documents`
    documents_url: String,
    /// `projects/<p>/databases/<d>/documents`
    documents_name: String,
    config: FirestoreConfig,
}

impl FirestoreStore {
    /// Create a store with its own HTTP client.
    pub fn new(config: FirestoreConfig) -> Result<Self, AccessError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Self::with_client(client, config)
    }

    /// Create with a custom reqwest [`Client`] (for proxies, etc.).
    pub fn with_client(client: Client, config: FirestoreConfig) -> Result<Self, AccessError> {
        if config.project_id.trim().is_empty() {
            return Err(AccessError::InvalidArgument("empty project id".into()));
        }

        let base = config.base_url.trim_end_matches('/');
        let documents_name = format!("{}/documents", config.database_path());
        Ok(Self {
            client,
            documents_url: format!("{base}/{documents_name}"),
            documents_name,
            config,
        })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn authorize(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(ref token) = self.config.auth_token {
            req = req.bearer_auth(token);
        }
        if let Some(ref key) = self.config.api_key {
            req = req.query(&[("key", key)]);
        }
        req
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url, AccessError> {
        let mut url = Url::parse(&self.documents_url).map_err(AccessError::backend)?;
        url.path_segments_mut()
            .map_err(|_| AccessError::backend("base url cannot carry a path"))?
            .push(collection)
            .push(id);
        Ok(url)
    }

    /// Fetch one document as plain JSON fields, `None` when it does not exist.
    async fn get_fields(
        &self,
        collection: &str,
        id: &str,
        transaction: Option<&str>,
    ) -> Result<Option<Map<String, Value>>, AccessError> {
        let mut req = self.authorize(self.client.get(self.document_url(collection, id)?));
        if let Some(tx) = transaction {
            req = req.query(&[("transaction", tx)]);
        }

        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;

        let doc: wire::Document = resp.json().await?;
        Ok(Some(decode_fields(&doc.fields)))
    }

    async fn get_record<T: for<'de> Deserialize<'de>>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, AccessError> {
        match self.get_fields(collection, id, None).await? {
            Some(fields) => serde_json::from_value(Value::Object(fields))
                .map(Some)
                .map_err(AccessError::malformed),
            None => Ok(None),
        }
    }

    async fn begin_transaction(&self) -> Result<String, AccessError> {
        let url = format!("{}:beginTransaction", self.documents_url);
        let resp = self
            .authorize(self.client.post(url))
            .json(&json!({ "options": { "readWrite": {} } }))
            .send()
            .await?;
        let tx: wire::Transaction = check_status(resp).await?.json().await?;
        Ok(tx.transaction)
    }

    /// Best-effort release of a transaction that will not be committed.
    async fn rollback(&self, transaction: &str) {
        let url = format!("{}:rollback", self.documents_url);
        let result = self
            .authorize(self.client.post(url))
            .json(&json!({ "transaction": transaction }))
            .send()
            .await;
        if let Err(e) = result {
            debug!(error = %e, "transaction rollback failed");
        }
    }

    /// Commit a transaction. Returns `false` when the server aborted it
    /// because of a concurrent write.
    async fn commit(&self, body: &Value) -> Result<bool, AccessError> {
        let url = format!("{}:commit", self.documents_url);
        let resp = self.authorize(self.client.post(url)).json(body).send().await?;

        match check_status(resp).await {
            Ok(_) => Ok(true),
            Err(AccessError::Contention(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Build the commit request that sets one view counter.
    fn counter_commit(
        &self,
        transaction: &str,
        user_id: &str,
        date_key: &str,
        document_id: &str,
        count: u32,
    ) -> Value {
        let updated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        json!({
            "writes": [{
                "update": {
                    "name": format!("{}/{USER_PREFERENCES}/{user_id}", self.documents_name),
                    "fields": {
                        DOCUMENT_VIEWS: { "mapValue": { "fields": {
                            date_key: { "mapValue": { "fields": {
                                document_id: { "integerValue": count.to_string() }
                            }}}
                        }}},
                        "updatedAt": { "timestampValue": updated_at }
                    }
                },
                "updateMask": {
                    "fieldPaths": [
                        field_path(&[DOCUMENT_VIEWS, date_key, document_id]),
                        "updatedAt"
                    ]
                }
            }],
            "transaction": transaction
        })
    }

    async fn try_increment(
        &self,
        user_id: &str,
        date_key: &str,
        document_id: &str,
        max_views: u32,
    ) -> Result<Option<ViewIncrement>, AccessError> {
        let tx = self.begin_transaction().await?;

        let fields = match self.get_fields(USER_PREFERENCES, user_id, Some(&tx)).await {
            Ok(fields) => fields.unwrap_or_default(),
            Err(e) => {
                self.rollback(&tx).await;
                return Err(e);
            }
        };

        let current = counter_at(&fields, date_key, document_id);
        if current >= max_views {
            self.rollback(&tx).await;
            return Ok(Some(ViewIncrement::LimitReached(current)));
        }

        let next = current + 1;
        let body = self.counter_commit(&tx, user_id, date_key, document_id, next);
        Ok(self
            .commit(&body)
            .await?
            .then_some(ViewIncrement::Recorded(next)))
    }
}

#[async_trait]
impl LibraryStore for FirestoreStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, AccessError> {
        let Some(doc) = self.get_record::<wire::UserDoc>(USERS, user_id).await? else {
            return Ok(None);
        };

        Ok(Some(UserRecord {
            user_id: user_id.to_string(),
            role: Role::from_parts(doc.role.as_deref(), doc.subscription_type.as_deref()),
            paid_categories: doc.paid_categories.unwrap_or_default(),
        }))
    }

    async fn find_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, AccessError> {
        let doc = self
            .get_record::<wire::DocumentDoc>(DOCUMENTS, document_id)
            .await?;

        Ok(doc.map(|doc| DocumentRecord {
            document_id: document_id.to_string(),
            title: doc.title.unwrap_or_default(),
            slug: doc.slug.unwrap_or_default(),
            category_id: doc.category_id,
        }))
    }

    async fn find_category(
        &self,
        category_id: &str,
    ) -> Result<Option<CategoryRecord>, AccessError> {
        let doc = self
            .get_record::<wire::CategoryDoc>(CATEGORIES, category_id)
            .await?;

        Ok(doc.map(|doc| CategoryRecord {
            category_id: category_id.to_string(),
            title: doc.title.unwrap_or_default(),
            logo: doc.logo,
        }))
    }

    async fn purchased_categories(
        &self,
        user_id: &str,
    ) -> Result<Option<Vec<String>>, AccessError> {
        let doc = self
            .get_record::<wire::PurchasesDoc>(USER_PURCHASES, user_id)
            .await?;
        Ok(doc.map(|doc| doc.categories))
    }

    async fn view_count(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
    ) -> Result<u32, AccessError> {
        let fields = self.get_fields(USER_PREFERENCES, user_id, None).await?;
        Ok(fields
            .map(|f| counter_at(&f, &date_key.to_string(), document_id))
            .unwrap_or(0))
    }

    async fn views_on(
        &self,
        user_id: &str,
        date_key: &DateKey,
    ) -> Result<HashMap<String, u32>, AccessError> {
        let Some(fields) = self.get_fields(USER_PREFERENCES, user_id, None).await? else {
            return Ok(HashMap::new());
        };

        let day = fields
            .get(DOCUMENT_VIEWS)
            .and_then(|views| views.get(date_key.to_string()))
            .and_then(Value::as_object);

        Ok(day
            .map(|day| {
                day.iter()
                    .filter_map(|(id, n)| Some((id.clone(), as_count(n)?)))
                    .filter(|(_, n)| *n > 0)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn increment_view(
        &self,
        user_id: &str,
        date_key: &DateKey,
        document_id: &str,
        max_views: u32,
    ) -> Result<ViewIncrement, AccessError> {
        let date_key = date_key.to_string();

        for attempt in 1..=self.config.increment_attempts {
            if let Some(outcome) = self
                .try_increment(user_id, &date_key, document_id, max_views)
                .await?
            {
                return Ok(outcome);
            }
            debug!(user_id, document_id, attempt, "counter transaction aborted, retrying");
        }

        Err(AccessError::Contention(format!(
            "{USER_PREFERENCES}/{user_id}/{date_key}/{document_id}"
        )))
    }
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("documents_url", &self.documents_url)
            .field("authenticated", &self.config.auth_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Map a non-success response to an error.
async fn check_status(resp: Response) -> Result<Response, AccessError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: wire::ErrorBody = resp.json().await.unwrap_or_default();
    let message = body.error.message;
    let code = body.error.status;

    Err(if status == StatusCode::CONFLICT || code == "ABORTED" {
        AccessError::Contention(message)
    } else if code == "FAILED_PRECONDITION" && message.contains("index") {
        AccessError::MissingIndex(message)
    } else {
        AccessError::Backend(format!("HTTP {} {code}: {message}", status.as_u16()))
    })
}

/// Read a counter out of `userPreferences` fields; malformed values count as 0.
fn counter_at(fields: &Map<String, Value>, date_key: &str, document_id: &str) -> u32 {
    fields
        .get(DOCUMENT_VIEWS)
        .and_then(|views| views.get(date_key))
        .and_then(|day| day.get(document_id))
        .and_then(as_count)
        .unwrap_or(0)
}

fn as_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
        _ => None,
    }
}

/// Convert typed Firestore field values into plain JSON.
fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), decode_value(value)))
        .collect()
}

fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        // 64-bit integers travel as strings
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        },
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "nullValue" => Value::Null,
        _ => inner.clone(),
    }
}

/// Join segments into a field path, quoting segments that are not plain
/// identifiers.
fn field_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| {
            let simple = segment
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if simple {
                (*segment).to_string()
            } else {
                let escaped = segment.replace('\\', "\\\\").replace('`', "\\`");
                format!("`{escaped}`")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

mod wire {
    use serde::Deserialize;
    use serde_json::{Map, Value};

    use crate::store::PaidCategories;

    #[derive(Debug, Deserialize)]
    pub struct Document {
        #[serde(default)]
        pub fields: Map<String, Value>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Transaction {
        pub transaction: String,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct ErrorBody {
        #[serde(default)]
        pub error: ErrorDetail,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct ErrorDetail {
        #[serde(default)]
        pub message: String,
        #[serde(default)]
        pub status: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserDoc {
        pub role: Option<String>,
        pub subscription_type: Option<String>,
        pub paid_categories: Option<PaidCategories>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DocumentDoc {
        pub title: Option<String>,
        pub slug: Option<String>,
        pub category_id: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CategoryDoc {
        pub title: Option<String>,
        pub logo: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct PurchasesDoc {
        #[serde(default)]
        pub categories: Vec<String>,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread;

    use parking_lot::Mutex;

    use super::*;

    /// Just enough of the Firestore REST surface to drive counter transactions.
    #[derive(Default)]
    struct MockState {
        /// (date key, document id) → stored count of the single user.
        counters: HashMap<(String, String), u32>,
        /// Commits still to be rejected with 409/ABORTED.
        conflicts: u32,
        begins: u32,
        commits: u32,
        rollbacks: u32,
    }

    impl MockState {
        fn respond(&mut self, line: &str, body: &str) -> (&'static str, String) {
            if line.contains(":beginTransaction") {
                self.begins += 1;
                let tx = format!("tx-{}", self.begins);
                return ("200 OK", json!({ "transaction": tx }).to_string());
            }
            if line.contains(":rollback") {
                self.rollbacks += 1;
                return ("200 OK", "{}".into());
            }
            if line.contains(":commit") {
                self.commits += 1;
                if self.conflicts > 0 {
                    self.conflicts -= 1;
                    let err = json!({ "error": {
                        "code": 409, "message": "too much contention", "status": "ABORTED"
                    }});
                    return ("409 Conflict", err.to_string());
                }
                self.apply_commit(body);
                return ("200 OK", "{}".into());
            }
            if line.starts_with("GET") && line.contains("/userPreferences/") {
                if self.counters.is_empty() {
                    let err = json!({ "error": {
                        "code": 404, "message": "no document", "status": "NOT_FOUND"
                    }});
                    return ("404 Not Found", err.to_string());
                }
                return ("200 OK", self.preferences_doc().to_string());
            }
            ("404 Not Found", "{}".into())
        }

        fn apply_commit(&mut self, body: &str) {
            let body: Value = serde_json::from_str(body).unwrap_or_default();
            let days = &body["writes"][0]["update"]["fields"][DOCUMENT_VIEWS]["mapValue"]["fields"];
            for (day, docs) in days.as_object().into_iter().flatten() {
                for (doc, n) in docs["mapValue"]["fields"].as_object().into_iter().flatten() {
                    let n = n["integerValue"]
                        .as_str()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0);
                    self.counters.insert((day.clone(), doc.clone()), n);
                }
            }
        }

        fn preferences_doc(&self) -> Value {
            let mut days = Map::new();
            for ((day, doc), n) in &self.counters {
                let entry = days
                    .entry(day.clone())
                    .or_insert_with(|| json!({ "mapValue": { "fields": {} } }));
                entry["mapValue"]["fields"][doc] = json!({ "integerValue": n.to_string() });
            }
            json!({
                "name": "projects/demo/databases/(default)/documents/userPreferences/alice",
                "fields": { DOCUMENT_VIEWS: { "mapValue": { "fields": days } } }
            })
        }
    }

    struct MockFirestore {
        addr: SocketAddr,
        state: Arc<Mutex<MockState>>,
    }

    impl MockFirestore {
        fn start(conflicts: u32) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let state = Arc::new(Mutex::new(MockState {
                conflicts,
                ..Default::default()
            }));

            let shared = state.clone();
            thread::spawn(move || {
                for mut stream in listener.incoming().flatten() {
                    let state = shared.clone();
                    thread::spawn(move || {
                        let Some((line, body)) = read_request(&mut stream) else {
                            return;
                        };
                        let (status, reply) = state.lock().respond(&line, &body);
                        let response = format!(
                            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                             Content-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                            reply.len()
                        );
                        let _ = stream.write_all(response.as_bytes());
                    });
                }
            });

            Self { addr, state }
        }

        fn store(&self, attempts: u32) -> FirestoreStore {
            let config = FirestoreConfig::new("demo")
                .base_url(format!("http://{}/v1", self.addr))
                .increment_attempts(attempts);
            FirestoreStore::new(config).unwrap()
        }
    }

    /// Read one HTTP/1.1 request, returning its request line and body.
    fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = stream.read(&mut chunk).ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let line = head.lines().next()?.to_string();
        let body = String::from_utf8_lossy(&buf[header_end..]).into_owned();
        Some((line, body))
    }

    fn day() -> DateKey {
        DateKey::parse("2024-3-7").unwrap()
    }

    #[tokio::test]
    async fn test_increment_retries_aborted_commit() {
        let server = MockFirestore::start(1);
        let store = server.store(3);

        let outcome = store.increment_view("alice", &day(), "doc", 5).await.unwrap();
        assert_eq!(outcome, ViewIncrement::Recorded(1));

        let state = server.state.lock();
        assert_eq!(state.begins, 2);
        assert_eq!(state.commits, 2);
        assert_eq!(state.counters[&("2024-3-7".to_string(), "doc".to_string())], 1);
    }

    #[tokio::test]
    async fn test_increment_stops_at_cap_and_rolls_back() {
        let server = MockFirestore::start(0);
        let store = server.store(3);

        for expected in 1..=5 {
            let outcome = store.increment_view("alice", &day(), "doc", 5).await.unwrap();
            assert_eq!(outcome, ViewIncrement::Recorded(expected));
        }
        let outcome = store.increment_view("alice", &day(), "doc", 5).await.unwrap();
        assert_eq!(outcome, ViewIncrement::LimitReached(5));

        {
            let state = server.state.lock();
            assert_eq!(state.commits, 5);
            assert_eq!(state.rollbacks, 1);
        }
        assert_eq!(store.view_count("alice", &day(), "doc").await.unwrap(), 5);
        let views = store.views_on("alice", &day()).await.unwrap();
        assert_eq!(views, HashMap::from([("doc".to_string(), 5)]));
    }

    #[tokio::test]
    async fn test_increment_gives_up_under_contention() {
        let server = MockFirestore::start(u32::MAX);
        let store = server.store(2);

        let err = store.increment_view("alice", &day(), "doc", 5).await.unwrap_err();
        assert!(matches!(err, AccessError::Contention(_)), "{err}");

        let state = server.state.lock();
        assert_eq!(state.commits, 2);
        assert!(state.counters.is_empty());
    }

    #[tokio::test]
    async fn test_missing_preferences_read_as_zero() {
        let server = MockFirestore::start(0);
        let store = server.store(1);

        assert_eq!(store.view_count("alice", &day(), "doc").await.unwrap(), 0);
        assert!(store.views_on("alice", &day()).await.unwrap().is_empty());
    }

    #[test]
    fn test_decode_typed_values() {
        let typed = json!({
            "role": { "stringValue": "puser" },
            "count": { "integerValue": "42" },
            "ratio": { "doubleValue": 0.5 },
            "flag": { "booleanValue": true },
            "gone": { "nullValue": null },
            "tags": { "arrayValue": { "values": [{ "stringValue": "a" }, { "stringValue": "b" }] } },
            "empty": { "arrayValue": {} },
            "nested": { "mapValue": { "fields": { "x": { "integerValue": "1" } } } }
        });

        let plain = decode_fields(typed.as_object().unwrap());
        assert_eq!(
            Value::Object(plain),
            json!({
                "role": "puser",
                "count": 42,
                "ratio": 0.5,
                "flag": true,
                "gone": null,
                "tags": ["a", "b"],
                "empty": [],
                "nested": { "x": 1 }
            })
        );
    }

    #[test]
    fn test_user_doc_from_fields() {
        let typed = json!({
            "role": { "stringValue": "puser" },
            "subscriptionType": { "stringValue": "partial" },
            "paidCategories": { "mapValue": { "fields": {
                "categories": { "arrayValue": { "values": [{ "stringValue": "math" }] } }
            }}}
        });

        let plain = Value::Object(decode_fields(typed.as_object().unwrap()));
        let doc: wire::UserDoc = serde_json::from_value(plain).unwrap();
        assert_eq!(doc.role.as_deref(), Some("puser"));
        assert_eq!(doc.subscription_type.as_deref(), Some("partial"));
        assert_eq!(doc.paid_categories.unwrap().categories, vec!["math".to_string()]);
    }

    #[test]
    fn test_counter_lookup() {
        let fields = json!({
            "documentViews": {
                "2024-3-7": { "doc": 3, "bad": "x" }
            }
        });
        let fields = fields.as_object().unwrap();

        assert_eq!(counter_at(fields, "2024-3-7", "doc"), 3);
        assert_eq!(counter_at(fields, "2024-3-7", "bad"), 0);
        assert_eq!(counter_at(fields, "2024-3-8", "doc"), 0);
        assert_eq!(counter_at(&Map::new(), "2024-3-7", "doc"), 0);
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path(&["documentViews", "updatedAt"]), "documentViews.updatedAt");
        assert_eq!(
            field_path(&["documentViews", "2024-3-7", "abc123"]),
            "documentViews.`2024-3-7`.abc123"
        );
        assert_eq!(field_path(&["a`b", "c\\d"]), "`a\\`b`.`c\\\\d`");
    }

    #[test]
    fn test_urls() {
        let store = FirestoreStore::new(
            FirestoreConfig::new("demo").base_url("http://localhost:8080/v1/"),
        )
        .unwrap();

        assert_eq!(
            store.documents_url,
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents"
        );
        let url = store.document_url(USERS, "a b/c").unwrap();
        assert!(url.as_str().ends_with("/documents/users/a%20b%2Fc"));
    }

    #[test]
    fn test_rejects_empty_project() {
        assert!(matches!(
            FirestoreStore::new(FirestoreConfig::new(" ")),
            Err(AccessError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_commit_body() {
        let store = FirestoreStore::new(FirestoreConfig::new("demo")).unwrap();
        let body = store.counter_commit("tx1", "alice", "2024-3-7", "doc", 2);

        let write = &body["writes"][0];
        assert_eq!(
            write["update"]["name"],
            "projects/demo/databases/(default)/documents/userPreferences/alice"
        );
        assert_eq!(
            write["update"]["fields"]["documentViews"]["mapValue"]["fields"]["2024-3-7"]["mapValue"]
                ["fields"]["doc"]["integerValue"],
            "2"
        );
        assert_eq!(write["updateMask"]["fieldPaths"][0], "documentViews.`2024-3-7`.doc");
        assert_eq!(body["transaction"], "tx1");
    }
}
