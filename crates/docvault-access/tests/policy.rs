#![allow(clippy::tests_outside_test_module)]
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docvault_access::store::{
    CategoryRecord, DocumentRecord, FailureMode, LibraryStore, PRUNE_THRESHOLD, StorePolicy,
    StorePolicyConfig, ViewIncrement,
};
use docvault_access::{
    AccessError, AccessPolicy, AccessReason, DateKey, FixedClock, MemoryStore, Role,
    SubscriptionKind, UserRecord,
};
use time::Date;
use time::macros::date;

const TODAY: Date = date!(2024 - 3 - 7);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}

fn library() -> MemoryStore {
    MemoryStore::new()
        .with_user(UserRecord::new("free"))
        .with_user(UserRecord::new("admin").with_role(Role::Admin))
        .with_user(UserRecord::new("full").with_role(Role::Paid(SubscriptionKind::Full)))
        .with_user(UserRecord::new("partial").with_role(Role::Paid(SubscriptionKind::Partial)))
        .with_user(UserRecord::new("partial-none").with_role(Role::Paid(SubscriptionKind::Partial)))
        .with_purchases("partial", ["math"])
        .with_category(CategoryRecord {
            category_id: "math".into(),
            title: "Mathematics".into(),
            logo: Some("math.svg".into()),
        })
        .with_document(document("algebra", Some("math")))
        .with_document(document("biology", Some("bio")))
        .with_document(document("loose", None))
}

fn document(id: &str, category: Option<&str>) -> DocumentRecord {
    DocumentRecord {
        document_id: id.into(),
        title: format!("Title of {id}"),
        slug: id.into(),
        category_id: category.map(Into::into),
    }
}

fn policy_over<S: LibraryStore>(store: S) -> StorePolicy<S> {
    StorePolicy::new(store, StorePolicyConfig::default()).with_clock(FixedClock(TODAY))
}

fn today() -> DateKey {
    DateKey::from_date(TODAY)
}

/// Store whose every call fails, counting increment attempts.
#[derive(Default)]
struct BrokenStore {
    increments: AtomicUsize,
}

#[async_trait]
impl LibraryStore for BrokenStore {
    async fn find_user(&self, _: &str) -> Result<Option<UserRecord>, AccessError> {
        Err(AccessError::backend("connection refused"))
    }

    async fn find_document(&self, _: &str) -> Result<Option<DocumentRecord>, AccessError> {
        Err(AccessError::backend("connection refused"))
    }

    async fn find_category(&self, _: &str) -> Result<Option<CategoryRecord>, AccessError> {
        Err(AccessError::backend("connection refused"))
    }

    async fn purchased_categories(&self, _: &str) -> Result<Option<Vec<String>>, AccessError> {
        Err(AccessError::backend("connection refused"))
    }

    async fn view_count(&self, _: &str, _: &DateKey, _: &str) -> Result<u32, AccessError> {
        Err(AccessError::backend("connection refused"))
    }

    async fn views_on(&self, _: &str, _: &DateKey) -> Result<HashMap<String, u32>, AccessError> {
        Err(AccessError::backend("connection refused"))
    }

    async fn increment_view(
        &self,
        _: &str,
        _: &DateKey,
        _: &str,
        _: u32,
    ) -> Result<ViewIncrement, AccessError> {
        self.increments.fetch_add(1, Ordering::SeqCst);
        Err(AccessError::backend("connection refused"))
    }
}

#[tokio::test]
async fn free_user_gets_five_views_then_denied() {
    let policy = policy_over(library());

    for expected in [4, 3, 2, 1, 0] {
        let decision = policy.evaluate("free", "algebra").await;
        assert!(decision.can_view);
        assert_eq!(decision.reason, AccessReason::WithinLimit);
        assert_eq!(decision.remaining(), Some(expected));
    }

    let decision = policy.evaluate("free", "algebra").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::LimitExceeded);
    let quota = decision.quota.unwrap();
    assert_eq!((quota.view_count, quota.max_views, quota.remaining), (5, 5, 0));

    // Denied views are not counted
    policy.evaluate("free", "algebra").await;
    let count = policy
        .store()
        .view_count("free", &today(), "algebra")
        .await
        .unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn quota_is_per_document_and_per_day() {
    let store = Arc::new(library());
    let monday = StorePolicy::new(store.clone(), StorePolicyConfig::default())
        .with_clock(FixedClock(TODAY));
    let tuesday = StorePolicy::new(store.clone(), StorePolicyConfig::default())
        .with_clock(FixedClock(date!(2024 - 3 - 8)));

    for _ in 0..5 {
        monday.evaluate("free", "algebra").await;
    }
    assert_eq!(
        monday.evaluate("free", "algebra").await.reason,
        AccessReason::LimitExceeded
    );

    let other_doc = monday.evaluate("free", "biology").await;
    assert_eq!(other_doc.remaining(), Some(4));

    let next_day = tuesday.evaluate("free", "algebra").await;
    assert!(next_day.can_view);
    assert_eq!(next_day.remaining(), Some(4));
}

#[tokio::test]
async fn unknown_user_is_metered_like_free() {
    let policy = policy_over(library());

    let decision = policy.evaluate("nobody", "algebra").await;
    assert_eq!(decision.reason, AccessReason::WithinLimit);
    assert_eq!(decision.remaining(), Some(4));
}

#[tokio::test]
async fn missing_params_touch_nothing() {
    let policy = policy_over(library());

    for (user, doc) in [("", "algebra"), ("free", ""), ("", "")] {
        let decision = policy.evaluate(user, doc).await;
        assert!(!decision.can_view);
        assert_eq!(decision.reason, AccessReason::MissingParams);

        let decision = policy.can_view_document(user, doc).await;
        assert_eq!(decision.reason, AccessReason::MissingParams);
    }
    assert_eq!(policy.store().counter_len(), 0);
}

#[tokio::test]
async fn admin_and_full_subscribers_are_unmetered() {
    let policy = policy_over(library());
    policy.store().set_view_count("admin", &today(), "algebra", 5);
    policy.store().set_view_count("full", &today(), "biology", 5);

    for _ in 0..10 {
        let decision = policy.evaluate("admin", "algebra").await;
        assert!(decision.can_view);
        assert_eq!(decision.reason, AccessReason::AdminUser);
        assert_eq!(decision.quota, None);

        let decision = policy.evaluate("full", "biology").await;
        assert!(decision.can_view);
        assert_eq!(decision.reason, AccessReason::PremiumFull);
        assert_eq!(decision.quota, None);
    }
    // Prior counts are neither checked nor touched
    assert_eq!(policy.store().counter_len(), 2);
    assert_eq!(
        policy.store().view_count("full", &today(), "biology").await.unwrap(),
        5
    );
}

#[tokio::test]
async fn partial_subscribers_need_the_category() {
    let policy = policy_over(library());

    let decision = policy.evaluate("partial", "algebra").await;
    assert!(decision.can_view);
    assert_eq!(decision.reason, AccessReason::PremiumPartialPurchased);

    let decision = policy.evaluate("partial", "biology").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::PremiumPartialNotPurchased);

    let decision = policy.evaluate("partial", "loose").await;
    assert_eq!(decision.reason, AccessReason::PremiumPartialNotPurchased);

    let decision = policy.evaluate("partial-none", "algebra").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::PremiumPartialNoPurchases);

    let decision = policy.evaluate("partial", "missing").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::DocumentNotFound);

    assert_eq!(policy.store().counter_len(), 0);
}

#[tokio::test]
async fn preflight_is_read_only() {
    let policy = policy_over(library());

    for _ in 0..3 {
        let decision = policy.can_view_document("free", "algebra").await;
        assert!(decision.can_view);
        assert_eq!(decision.reason, AccessReason::WithinLimit);
        assert_eq!(decision.remaining(), Some(5));
    }
    assert_eq!(policy.store().counter_len(), 0);

    policy.store().set_view_count("free", &today(), "algebra", 5);
    let decision = policy.can_view_document("free", "algebra").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::LimitExceeded);
    assert_eq!(decision.remaining(), Some(0));
}

#[tokio::test]
async fn preflight_treats_every_paid_role_alike() {
    let policy = policy_over(library());

    for user in ["admin", "full", "partial", "partial-none"] {
        let decision = policy.can_view_document(user, "biology").await;
        assert!(decision.can_view, "{user}");
        assert_eq!(decision.reason, AccessReason::PremiumUser);
    }
}

#[tokio::test]
async fn unrecognized_stored_roles_are_metered_by_both_checks() {
    // Role strings outside fuser/puser/admin fold into Free, so the
    // preflight meters them too rather than treating them as paid.
    let role = Role::from_parts(Some("moderator"), None);
    assert_eq!(role, Role::Free);

    let store = library().with_user(UserRecord::new("moderator").with_role(role));
    store.set_view_count("moderator", &today(), "algebra", 5);
    let policy = policy_over(store);

    let decision = policy.can_view_document("moderator", "algebra").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::LimitExceeded);

    let decision = policy.evaluate("moderator", "algebra").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::LimitExceeded);
}

#[tokio::test]
async fn backend_failure_fails_open_on_evaluate() {
    init_tracing();
    let policy = policy_over(BrokenStore::default());

    let decision = policy.evaluate("free", "algebra").await;
    assert!(decision.can_view);
    assert_eq!(decision.reason, AccessReason::Error);
    assert!(decision.error.unwrap().contains("connection refused"));

    let decision = policy.can_view_document("free", "algebra").await;
    assert!(!decision.can_view);
    assert_eq!(decision.reason, AccessReason::Error);

    assert!(policy.viewed_documents_today("free").await.is_empty());
}

#[tokio::test]
async fn failure_modes_are_configurable() {
    init_tracing();
    let config = StorePolicyConfig::default()
        .evaluate_failure(FailureMode::Closed)
        .preflight_failure(FailureMode::Open);
    let policy = StorePolicy::new(BrokenStore::default(), config);

    assert!(!policy.evaluate("free", "algebra").await.can_view);
    assert!(policy.can_view_document("free", "algebra").await.can_view);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_views_never_exceed_the_cap() {
    let policy = Arc::new(policy_over(library()));

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let policy = policy.clone();
            tokio::spawn(async move { policy.evaluate("free", "algebra").await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        let decision = handle.await.unwrap();
        if decision.can_view {
            allowed += 1;
        } else {
            assert_eq!(decision.reason, AccessReason::LimitExceeded);
        }
    }

    assert_eq!(allowed, 5);
    let count = policy
        .store()
        .view_count("free", &today(), "algebra")
        .await
        .unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn custom_cap() {
    let config = StorePolicyConfig::default().max_views(2);
    let policy = StorePolicy::new(library(), config).with_clock(FixedClock(TODAY));

    assert_eq!(policy.evaluate("free", "algebra").await.remaining(), Some(1));
    assert_eq!(policy.evaluate("free", "algebra").await.remaining(), Some(0));
    assert!(!policy.evaluate("free", "algebra").await.can_view);
}

#[tokio::test]
async fn profile_cache_serves_stale_role_until_invalidated() {
    let store = Arc::new(library());
    let config = StorePolicyConfig::default().cache_enabled(true);
    let policy = StorePolicy::new(store.clone(), config).with_clock(FixedClock(TODAY));

    assert_eq!(
        policy.evaluate("full", "algebra").await.reason,
        AccessReason::PremiumFull
    );
    store.insert_user(UserRecord::new("full"));

    assert_eq!(
        policy.evaluate("full", "algebra").await.reason,
        AccessReason::PremiumFull
    );
    let stats = policy.cache_stats().unwrap();
    assert_eq!(stats.hits, 1);

    policy.cache_invalidate_user("full");
    assert_eq!(
        policy.evaluate("full", "algebra").await.reason,
        AccessReason::WithinLimit
    );
}

#[tokio::test]
async fn unknown_user_ids_do_not_pile_up_in_the_profile_cache() {
    let config = StorePolicyConfig::default()
        .cache_enabled(true)
        .neg_cache_ttl(Duration::from_millis(1));
    let policy = StorePolicy::new(MemoryStore::new(), config).with_clock(FixedClock(TODAY));

    for i in 0..10_000 {
        policy.evaluate(&format!("ghost-{i}"), "doc").await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    policy.cache_cleanup_expired();
    assert_eq!(policy.cache_stats().unwrap().neg_size, 0);

    // Past the threshold, inserting prunes without an explicit cleanup
    for i in 0..PRUNE_THRESHOLD {
        policy.evaluate(&format!("late-{i}"), "doc").await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    policy.evaluate("last", "doc").await;
    assert_eq!(policy.cache_stats().unwrap().neg_size, 1);
}

#[tokio::test]
async fn viewed_documents_today_lists_most_viewed_first() {
    let policy = policy_over(library());

    for _ in 0..3 {
        policy.evaluate("free", "biology").await;
    }
    policy.evaluate("free", "algebra").await;
    policy.evaluate("free", "loose").await;
    // Counter for a document that no longer exists
    policy.store().set_view_count("free", &today(), "deleted", 2);

    let viewed = policy.viewed_documents_today("free").await;
    let ids: Vec<_> = viewed.iter().map(|v| v.document_id.as_str()).collect();
    assert_eq!(ids, ["biology", "algebra", "loose"]);

    assert_eq!(viewed[0].view_count, 3);
    assert_eq!(viewed[0].remaining, 2);
    assert!((viewed[0].percent_used - 60.0).abs() < 1e-9);
    // Category "bio" has no metadata
    assert_eq!(viewed[0].category_title, None);

    assert_eq!(viewed[1].category_title.as_deref(), Some("Mathematics"));
    assert_eq!(viewed[1].category_logo.as_deref(), Some("math.svg"));
    assert_eq!(viewed[1].title, "Title of algebra");

    assert!(policy.viewed_documents_today("").await.is_empty());
    assert!(policy.viewed_documents_today("admin").await.is_empty());
}

#[tokio::test]
async fn decisions_serialize_with_snake_case_reasons() {
    let policy = policy_over(library());

    let json = serde_json::to_value(policy.evaluate("free", "algebra").await).unwrap();
    assert_eq!(json["can_view"], true);
    assert_eq!(json["reason"], "within_limit");
    assert_eq!(json["quota"]["remaining"], 4);
    assert!(json.get("error").is_none());

    let json = serde_json::to_value(policy.evaluate("partial-none", "algebra").await).unwrap();
    assert_eq!(json["reason"], "premium_partial_no_purchases");
    assert!(json.get("quota").is_none());
}

#[tokio::test]
async fn failed_role_lookup_skips_metering() {
    let store = Arc::new(BrokenStore::default());
    let policy = policy_over(store.clone());

    // Role lookup fails first; the increment is never reached
    policy.evaluate("free", "algebra").await;
    assert_eq!(store.increments.load(Ordering::SeqCst), 0);
}
