//! SQL queries for different databases.
//!
//! PostgreSQL uses numbered placeholders; MySQL and SQLite share the `?`
//! variants except for upserts, where each dialect has its own syntax.

/// Table definitions, one statement each. Portable across all three databases.
pub const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS docvault_users (
    user_id VARCHAR(255) NOT NULL PRIMARY KEY,
    role VARCHAR(32),
    subscription_type VARCHAR(32),
    paid_categories TEXT
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS docvault_user_purchases (
    user_id VARCHAR(255) NOT NULL,
    category_id VARCHAR(255) NOT NULL,
    PRIMARY KEY (user_id, category_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS docvault_documents (
    document_id VARCHAR(255) NOT NULL PRIMARY KEY,
    title TEXT NOT NULL,
    slug VARCHAR(255) NOT NULL,
    category_id VARCHAR(255)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS docvault_categories (
    category_id VARCHAR(255) NOT NULL PRIMARY KEY,
    title TEXT NOT NULL,
    logo TEXT
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS docvault_document_views (
    user_id VARCHAR(255) NOT NULL,
    date_key VARCHAR(16) NOT NULL,
    document_id VARCHAR(255) NOT NULL,
    view_count BIGINT NOT NULL,
    PRIMARY KEY (user_id, date_key, document_id)
)
"#,
];

pub const FIND_USER_PG: &str = r#"
SELECT user_id, role, subscription_type, paid_categories
FROM docvault_users
WHERE user_id = $1
"#;

pub const FIND_USER_MYSQL: &str = r#"
SELECT user_id, role, subscription_type, paid_categories
FROM docvault_users
WHERE user_id = ?
"#;

pub const FIND_DOCUMENT_PG: &str = r#"
SELECT document_id, title, slug, category_id
FROM docvault_documents
WHERE document_id = $1
"#;

pub const FIND_DOCUMENT_MYSQL: &str = r#"
SELECT document_id, title, slug, category_id
FROM docvault_documents
WHERE document_id = ?
"#;

pub const FIND_CATEGORY_PG: &str = r#"
SELECT category_id, title, logo
FROM docvault_categories
WHERE category_id = $1
"#;

pub const FIND_CATEGORY_MYSQL: &str = r#"
SELECT category_id, title, logo
FROM docvault_categories
WHERE category_id = ?
"#;

pub const LIST_PURCHASES_PG: &str = r#"
SELECT category_id
FROM docvault_user_purchases
WHERE user_id = $1
ORDER BY category_id
"#;

pub const LIST_PURCHASES_MYSQL: &str = r#"
SELECT category_id
FROM docvault_user_purchases
WHERE user_id = ?
ORDER BY category_id
"#;

pub const GET_VIEW_COUNT_PG: &str = r#"
SELECT view_count
FROM docvault_document_views
WHERE user_id = $1 AND date_key = $2 AND document_id = $3
"#;

pub const GET_VIEW_COUNT_MYSQL: &str = r#"
SELECT view_count
FROM docvault_document_views
WHERE user_id = ? AND date_key = ? AND document_id = ?
"#;

pub const LIST_VIEWS_PG: &str = r#"
SELECT document_id, view_count
FROM docvault_document_views
WHERE user_id = $1 AND date_key = $2
"#;

pub const LIST_VIEWS_MYSQL: &str = r#"
SELECT document_id, view_count
FROM docvault_document_views
WHERE user_id = ? AND date_key = ?
"#;

/// Conditional increment: touches no row once the counter reached the cap.
pub const INCREMENT_VIEW_PG: &str = r#"
UPDATE docvault_document_views
SET view_count = view_count + 1
WHERE user_id = $1 AND date_key = $2 AND document_id = $3 AND view_count < $4
"#;

pub const INCREMENT_VIEW_MYSQL: &str = r#"
UPDATE docvault_document_views
SET view_count = view_count + 1
WHERE user_id = ? AND date_key = ? AND document_id = ? AND view_count < ?
"#;

/// First view of the day. Fails with a unique violation when another writer
/// created the row first.
pub const INSERT_VIEW_PG: &str = r#"
INSERT INTO docvault_document_views (user_id, date_key, document_id, view_count)
VALUES ($1, $2, $3, 1)
"#;

pub const INSERT_VIEW_MYSQL: &str = r#"
INSERT INTO docvault_document_views (user_id, date_key, document_id, view_count)
VALUES (?, ?, ?, 1)
"#;

pub const UPSERT_USER_PG: &str = r#"
INSERT INTO docvault_users (user_id, role, subscription_type, paid_categories)
VALUES ($1, $2, $3, $4)
ON CONFLICT (user_id) DO UPDATE SET
    role = excluded.role,
    subscription_type = excluded.subscription_type,
    paid_categories = excluded.paid_categories
"#;

pub const UPSERT_USER_SQLITE: &str = r#"
INSERT INTO docvault_users (user_id, role, subscription_type, paid_categories)
VALUES (?, ?, ?, ?)
ON CONFLICT (user_id) DO UPDATE SET
    role = excluded.role,
    subscription_type = excluded.subscription_type,
    paid_categories = excluded.paid_categories
"#;

pub const UPSERT_USER_MYSQL: &str = r#"
INSERT INTO docvault_users (user_id, role, subscription_type, paid_categories)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    role = VALUES(role),
    subscription_type = VALUES(subscription_type),
    paid_categories = VALUES(paid_categories)
"#;

pub const UPSERT_DOCUMENT_PG: &str = r#"
INSERT INTO docvault_documents (document_id, title, slug, category_id)
VALUES ($1, $2, $3, $4)
ON CONFLICT (document_id) DO UPDATE SET
    title = excluded.title,
    slug = excluded.slug,
    category_id = excluded.category_id
"#;

pub const UPSERT_DOCUMENT_SQLITE: &str = r#"
INSERT INTO docvault_documents (document_id, title, slug, category_id)
VALUES (?, ?, ?, ?)
ON CONFLICT (document_id) DO UPDATE SET
    title = excluded.title,
    slug = excluded.slug,
    category_id = excluded.category_id
"#;

pub const UPSERT_DOCUMENT_MYSQL: &str = r#"
INSERT INTO docvault_documents (document_id, title, slug, category_id)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    title = VALUES(title),
    slug = VALUES(slug),
    category_id = VALUES(category_id)
"#;

pub const UPSERT_CATEGORY_PG: &str = r#"
INSERT INTO docvault_categories (category_id, title, logo)
VALUES ($1, $2, $3)
ON CONFLICT (category_id) DO UPDATE SET
    title = excluded.title,
    logo = excluded.logo
"#;

pub const UPSERT_CATEGORY_SQLITE: &str = r#"
INSERT INTO docvault_categories (category_id, title, logo)
VALUES (?, ?, ?)
ON CONFLICT (category_id) DO UPDATE SET
    title = excluded.title,
    logo = excluded.logo
"#;

pub const UPSERT_CATEGORY_MYSQL: &str = r#"
INSERT INTO docvault_categories (category_id, title, logo)
VALUES (?, ?, ?)
ON DUPLICATE KEY UPDATE
    title = VALUES(title),
    logo = VALUES(logo)
"#;

pub const ADD_PURCHASE_PG: &str = r#"
INSERT INTO docvault_user_purchases (user_id, category_id)
VALUES ($1, $2)
ON CONFLICT DO NOTHING
"#;

pub const ADD_PURCHASE_SQLITE: &str = r#"
INSERT INTO docvault_user_purchases (user_id, category_id)
VALUES (?, ?)
ON CONFLICT DO NOTHING
"#;

pub const ADD_PURCHASE_MYSQL: &str = r#"
INSERT IGNORE INTO docvault_user_purchases (user_id, category_id)
VALUES (?, ?)
"#;
