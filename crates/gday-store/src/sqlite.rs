// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed document store.
//!
//! Every collection shares one `documents` table. The dedup key of derived
//! records is a column with a `UNIQUE (collection, dedup_key)` constraint, so
//! concurrent writers racing on the same key produce exactly one row and the
//! loser sees a unique violation, reported as [`InsertOutcome::AlreadyExists`].
//!
//! Filters, sorting and paging are translated to SQL over the JSON body with
//! `json_type`/`json_extract`, matching the in-process semantics of
//! [`Filter`] and [`FindOptions`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::id::RecordId;
use crate::query::{DedupKey, Filter, FindOptions, SortOrder};
use crate::store::{Document, DocumentStore, InsertOutcome, assign_id, merge};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed document store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. Migrations are not run.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and run migrations.
    ///
    /// In-memory URLs (`sqlite::memory:`) are held by a single connection
    /// that is never recycled, since the database lives and dies with it.
    /// For file URLs the parent directory of the database is created.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            create_parent_dir(url)?;
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(url).await?;
        MIGRATOR.run(&pool).await?;
        debug!(url = %url, "SQLite document store ready");
        Ok(Self { pool })
    }

    /// Create (if needed) and open a database file.
    ///
    /// Parent directories are created, the file is created when missing and
    /// migrations are applied.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().to_string_lossy());
        Self::connect(&url).await
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Create the directory holding the database file named by `url`.
fn create_parent_dir(url: &str) -> Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn parse_body(body: &str) -> Result<Document> {
    match serde_json::from_str(body)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidDocument(
            "stored body is not a JSON object".to_string(),
        )),
    }
}

/// JSON path addressing the top-level `field` of a body.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field)
}

/// Append ` AND <clause>` requiring `field` to equal `value` in both JSON type
/// and value, so `1`, `1.0`, `true` and `"1"` stay distinct.
fn push_eq(qb: &mut QueryBuilder<'_, Sqlite>, field: &str, value: &Value) {
    qb.push(" AND json_type(body, ")
        .push_bind(json_path(field))
        .push(")");
    match value {
        Value::Null => {
            qb.push(" = 'null'");
            return;
        }
        Value::Bool(true) => {
            qb.push(" = 'true'");
            return;
        }
        Value::Bool(false) => {
            qb.push(" = 'false'");
            return;
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push(" = 'integer' AND json_extract(body, ")
                    .push_bind(json_path(field))
                    .push(") = ")
                    .push_bind(i);
            }
            None => {
                qb.push(if n.is_f64() { " = 'real'" } else { " IN ('integer', 'real')" })
                    .push(" AND json_extract(body, ")
                    .push_bind(json_path(field))
                    .push(") = ")
                    .push_bind(n.as_f64().unwrap_or(f64::NAN));
            }
        },
        Value::String(text) => {
            qb.push(" = 'text' AND json_extract(body, ")
                .push_bind(json_path(field))
                .push(") = ")
                .push_bind(text.clone());
        }
        Value::Array(_) | Value::Object(_) => {
            let kind = if value.is_array() { "array" } else { "object" };
            qb.push(" = ")
                .push_bind(kind)
                .push(" AND json_extract(body, ")
                .push_bind(json_path(field))
                .push(") = ")
                .push_bind(value.to_string());
        }
    }
}

/// Unique violation on the dedup key, as opposed to the id.
fn is_dedup_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db)
        if db.is_unique_violation() && db.message().contains("dedup_key"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn duplicate_id(collection: &str, id: &RecordId) -> StoreError {
    StoreError::DuplicateId {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT body FROM documents WHERE collection = ");
        qb.push_bind(collection);
        for (field, value) in filter.clauses() {
            push_eq(&mut qb, field, value);
        }

        qb.push(" ORDER BY ");
        if let Some((field, order)) = &options.sort {
            let direction = match order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            qb.push("json_extract(body, ")
                .push_bind(json_path(field))
                .push(") ")
                .push(direction)
                .push(", ");
        }
        // ties keep insertion order in both directions
        qb.push("seq ASC LIMIT ")
            .push_bind(options.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX)))
            .push(" OFFSET ")
            .push_bind(i64::try_from(options.skip).unwrap_or(i64::MAX));

        let rows: Vec<(String,)> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|(body,)| parse_body(&body)).collect()
    }

    async fn find_by_id(&self, collection: &str, id: &RecordId) -> Result<Option<Document>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(body,)| parse_body(&body)).transpose()
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<RecordId> {
        let id = assign_id(&mut doc);
        let body = serde_json::to_string(&doc)?;
        let result = sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id.as_str())
            .bind(body)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(id),
            Err(e) if is_unique_violation(&e) => Err(duplicate_id(collection, &id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_unique(
        &self,
        collection: &str,
        key: &DedupKey,
        mut doc: Document,
    ) -> Result<InsertOutcome> {
        let id = assign_id(&mut doc);
        let body = serde_json::to_string(&doc)?;
        let result = sqlx::query(
            "INSERT INTO documents (collection, id, body, dedup_key) VALUES (?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(id.as_str())
        .bind(body)
        .bind(key.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(id)),
            Err(e) if is_dedup_violation(&e) => {
                debug!(collection = %collection, key = %key, "Dedup key already present");
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) if is_unique_violation(&e) => Err(duplicate_id(collection, &id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_by_id(&self, collection: &str, id: &RecordId, set: Document) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let Some((body,)) = row else {
            return Ok(false);
        };

        let mut doc = parse_body(&body)?;
        merge(&mut doc, set);

        sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&doc)?)
            .bind(collection)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_by_id(&self, collection: &str, id: &RecordId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
