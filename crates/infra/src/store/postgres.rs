//! Postgres-backed document store implementation.
//!
//! Documents live in a single `documents` table shared by all collections:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection TEXT        NOT NULL,
//!     key        TEXT        NOT NULL,
//!     fields     JSONB       NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (collection, key)
//! )
//! ```
//!
//! ## Error Mapping
//!
//! Every SQLx failure (database errors, pool closed, network, decode) becomes
//! `StoreError::Transport` carrying the operation name. Rows whose `fields` are
//! not a JSON object become `StoreError::MalformedDocument`.
//!
//! ## Atomic Adjustments
//!
//! `adjust()` runs in one transaction: `SELECT … FOR UPDATE` locks an existing
//! row, the adjustment is resolved, and the row is updated or deleted before
//! commit. Absent rows cannot be locked, so creation uses
//! `INSERT … ON CONFLICT DO NOTHING`; if a concurrent transaction created the
//! row first, the insert affects nothing and the row is re-read (now lockable)
//! and resolved again.
//!
//! Tests that need a live server read `PANTRY_TEST_DATABASE_URL` and return
//! early when it is unset.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use pantry_core::Lookup;
use pantry_inventory::{Adjustment, Mutation};

use super::r#trait::{lookup, Document, DocumentStore, StoreError};

/// Postgres-backed document collection.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool (Arc + Send + Sync); clones share the pool.
///
/// ## Collection Scoping
///
/// Every query filters on `collection`, so several collections can share one
/// table without seeing each other's documents.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
    collection: String,
}

impl PostgresDocumentStore {
    /// Create a store bound to `collection`.
    pub fn new(pool: PgPool, collection: impl Into<String>) -> Self {
        Self {
            pool: Arc::new(pool),
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the `documents` table if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT        NOT NULL,
                key        TEXT        NOT NULL,
                fields     JSONB       NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, key)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }

    async fn select_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT fields
            FROM documents
            WHERE collection = $1 AND key = $2
            FOR UPDATE
            "#,
        )
        .bind(&self.collection)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("select_for_update", e))?;

        row.map(|r| document_from_row(key, &r)).transpose()
    }

    /// Write `mutation` for a row that was locked (or found absent) in `tx`.
    ///
    /// Returns `false` when a create lost the race to a concurrent insert.
    async fn write_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        before: Lookup,
        mutation: Mutation,
    ) -> Result<bool, StoreError> {
        match (before, mutation) {
            (_, Mutation::Noop) => Ok(true),
            (_, Mutation::Delete) => {
                sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
                    .bind(&self.collection)
                    .bind(key)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_sqlx_error("adjust_delete", e))?;
                Ok(true)
            }
            (Lookup::Present(_) | Lookup::Depleted(_), Mutation::Put(quantity)) => {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET fields = $3, updated_at = NOW()
                    WHERE collection = $1 AND key = $2
                    "#,
                )
                .bind(&self.collection)
                .bind(key)
                .bind(JsonValue::Object(Document::with_quantity(quantity).into_fields()))
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("adjust_update", e))?;
                Ok(true)
            }
            (Lookup::Absent, Mutation::Put(quantity)) => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO documents (collection, key, fields)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, key) DO NOTHING
                    "#,
                )
                .bind(&self.collection)
                .bind(key)
                .bind(JsonValue::Object(Document::with_quantity(quantity).into_fields()))
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("adjust_insert", e))?;
                Ok(result.rows_affected() == 1)
            }
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), fields(collection = %self.collection, operation = tracing::field::Empty), err)]
    async fn get(&self, key: &str) -> Result<Option<Document>, StoreError> {
        let span = Span::current();
        span.record("operation", "get_document");

        let row = sqlx::query(
            r#"
            SELECT fields
            FROM documents
            WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(&self.collection)
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|r| document_from_row(key, &r)).transpose()
    }

    #[instrument(skip(self, document), fields(collection = %self.collection, operation = tracing::field::Empty), err)]
    async fn set(&self, key: &str, document: Document) -> Result<(), StoreError> {
        let span = Span::current();
        span.record("operation", "set_document");

        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key)
            DO UPDATE SET
                fields = EXCLUDED.fields,
                updated_at = NOW()
            "#,
        )
        .bind(&self.collection)
        .bind(key)
        .bind(JsonValue::Object(document.into_fields()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.collection, operation = tracing::field::Empty), err)]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let span = Span::current();
        span.record("operation", "delete_document");

        sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
            .bind(&self.collection)
            .bind(key)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        Ok(())
    }

    #[instrument(
        skip(self),
        fields(
            collection = %self.collection,
            operation = tracing::field::Empty,
            document_count = tracing::field::Empty
        ),
        err
    )]
    async fn list_all(&self) -> Result<Vec<(String, Document)>, StoreError> {
        let span = Span::current();
        span.record("operation", "list_documents");

        let rows = sqlx::query(
            r#"
            SELECT key, fields
            FROM documents
            WHERE collection = $1
            ORDER BY key ASC
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_all", e))?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row
                .try_get("key")
                .map_err(|e| map_sqlx_error("list_all_decode_key", e))?;
            let doc = document_from_row(&key, &row)?;
            documents.push((key, doc));
        }

        span.record("document_count", documents.len());
        Ok(documents)
    }

    #[instrument(skip(self), fields(collection = %self.collection, operation = tracing::field::Empty), err)]
    async fn adjust(&self, key: &str, adjustment: Adjustment) -> Result<Lookup, StoreError> {
        let span = Span::current();
        span.record("operation", "adjust_document");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Second pass only happens when a concurrent create won the insert.
        for _ in 0..2 {
            let before = lookup(key, self.select_for_update(&mut tx, key).await?)?;
            let mutation = adjustment.resolve(before);

            if self.write_locked(&mut tx, key, before, mutation).await? {
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error("commit_transaction", e))?;
                return Ok(mutation.after(before));
            }
        }

        tx.rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))?;
        Err(StoreError::transport(format!(
            "adjust of '{key}' did not settle after a concurrent create"
        )))
    }
}

fn document_from_row(key: &str, row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
    let fields: JsonValue = row
        .try_get("fields")
        .map_err(|e| map_sqlx_error("decode_fields", e))?;

    match fields {
        JsonValue::Object(map) => Ok(Document::new(map)),
        other => Err(StoreError::malformed(
            key,
            format!("fields are not a JSON object: {other}"),
        )),
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::Transport(format!(
                "database error in {operation} (code {code}): {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Transport(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transport(format!("connection pool timed out in {operation}"))
        }
        _ => StoreError::Transport(format!("sqlx error in {operation}: {err}")),
    }
}
