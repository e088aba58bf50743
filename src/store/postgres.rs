//! Postgres-backed document store.
//!
//! Orders and refund requests live in a `doc JSONB` column; the few fields
//! the service filters on are read straight out of the document.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{OrderRepository, ReturnRepository, StoreError, StoreResult};
use crate::domain::aggregates::{Order, OrderChange, ReturnChange, ReturnRequest};

/// Process-wide connection handle. The pool is created by the first caller;
/// concurrent first callers wait on the same initialization.
pub struct Database {
    url: String,
    max_connections: u32,
    pool: OnceCell<PgPool>,
}

impl Database {
    pub fn new(url: impl Into<String>, max_connections: u32) -> Self {
        Self { url: url.into(), max_connections, pool: OnceCell::new() }
    }

    pub async fn pool(&self) -> Result<&PgPool, sqlx::Error> {
        self.pool
            .get_or_try_init(|| async {
                tracing::info!(max_connections = self.max_connections, "opening database pool");
                PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(Duration::from_secs(10))
                    .connect(&self.url)
                    .await
            })
            .await
    }
}

pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(self.db.pool().await?).await?;
        Ok(())
    }
}

/// Stored documents are fetched as raw JSON so a document that no longer
/// matches the aggregate surfaces as [`StoreError::Document`].
fn decode<T: DeserializeOwned>(Json(doc): Json<Value>) -> StoreResult<T> {
    serde_json::from_value(doc).map_err(|e| {
        tracing::error!(error = %e, "stored document does not decode");
        StoreError::Document(e)
    })
}

fn decode_row<T: DeserializeOwned>(row: Option<(Json<Value>,)>) -> StoreResult<Option<T>> {
    row.map(|(doc,)| decode(doc)).transpose()
}

const UNSEEN: &str = "COALESCE((doc->>'adminSeen')::boolean, FALSE) = FALSE";

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        sqlx::query("INSERT INTO orders (id, doc, created_at) VALUES ($1, $2, $3)")
            .bind(order.id()).bind(Json(order)).bind(order.created_at())
            .execute(self.db.pool().await?).await?;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row: Option<(Json<Value>,)> = sqlx::query_as("SELECT doc FROM orders WHERE id = $1")
            .bind(id).fetch_optional(self.db.pool().await?).await?;
        decode_row(row)
    }

    async fn apply_order_change(&self, id: Uuid, change: &OrderChange) -> StoreResult<Option<Order>> {
        let pool = self.db.pool().await?;
        let now = Utc::now().to_rfc3339();
        let row: Option<(Json<Value>,)> = match change {
            OrderChange::ReceiptAttached { url, entry } => {
                sqlx::query_as(
                    "UPDATE orders SET doc = jsonb_set(
                        jsonb_set(doc, '{payment,receiptUrl}', to_jsonb($2::text)),
                        '{tracking,history}', COALESCE(doc #> '{tracking,history}', '[]'::jsonb) || jsonb_build_array($3::jsonb)
                    ) || jsonb_build_object('updatedAt', $4::text)
                    WHERE id = $1 RETURNING doc",
                )
                .bind(id).bind(url).bind(Json(entry)).bind(&now)
                .fetch_optional(pool).await?
            }
            OrderChange::StatusChanged { from, to, entry } => {
                sqlx::query_as(
                    "UPDATE orders SET doc = jsonb_set(
                        jsonb_set(doc, '{status}', to_jsonb($2::text)),
                        '{tracking,history}', COALESCE(doc #> '{tracking,history}', '[]'::jsonb) || jsonb_build_array($3::jsonb)
                    ) || jsonb_build_object('updatedAt', $4::text)
                    WHERE id = $1 AND lower(doc->>'status') = $5 RETURNING doc",
                )
                .bind(id).bind(to.as_str()).bind(Json(entry)).bind(&now).bind(from.as_str())
                .fetch_optional(pool).await?
            }
            OrderChange::PaymentChanged { from, to, entry } => {
                sqlx::query_as(
                    "UPDATE orders SET doc = jsonb_set(
                        jsonb_set(doc, '{payment,status}', to_jsonb($2::text)),
                        '{tracking,history}', COALESCE(doc #> '{tracking,history}', '[]'::jsonb) || jsonb_build_array($3::jsonb)
                    ) || jsonb_build_object('updatedAt', $4::text)
                    WHERE id = $1 AND lower(doc #>> '{payment,status}') = $5 RETURNING doc",
                )
                .bind(id).bind(to.as_str()).bind(Json(entry)).bind(&now).bind(from.as_str())
                .fetch_optional(pool).await?
            }
        };
        decode_row(row)
    }

    async fn mark_all_seen(&self) -> StoreResult<u64> {
        let result = sqlx::query(&format!("UPDATE orders SET doc = jsonb_set(doc, '{{adminSeen}}', 'true'::jsonb) WHERE {UNSEEN}"))
            .execute(self.db.pool().await?).await?;
        Ok(result.rows_affected())
    }

    async fn count_unseen(&self) -> StoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM orders WHERE {UNSEEN}"))
            .fetch_one(self.db.pool().await?).await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ReturnRepository for PgStore {
    async fn insert_return(&self, request: &ReturnRequest) -> StoreResult<()> {
        sqlx::query("INSERT INTO returns (id, order_id, doc, created_at) VALUES ($1, $2, $3, NOW())")
            .bind(request.id()).bind(request.order_id()).bind(Json(request))
            .execute(self.db.pool().await?).await?;
        Ok(())
    }

    async fn find_return(&self, id: Uuid) -> StoreResult<Option<ReturnRequest>> {
        let row: Option<(Json<Value>,)> = sqlx::query_as("SELECT doc FROM returns WHERE id = $1")
            .bind(id).fetch_optional(self.db.pool().await?).await?;
        decode_row(row)
    }

    async fn list_returns_for_order(&self, order_id: Uuid) -> StoreResult<Vec<ReturnRequest>> {
        let rows: Vec<(Json<Value>,)> = sqlx::query_as("SELECT doc FROM returns WHERE order_id = $1 ORDER BY created_at")
            .bind(order_id).fetch_all(self.db.pool().await?).await?;
        rows.into_iter().map(|(doc,)| decode(doc)).collect()
    }

    async fn apply_return_change(&self, id: Uuid, change: &ReturnChange) -> StoreResult<Option<ReturnRequest>> {
        let ReturnChange::StatusChanged { from, to, entry } = change;
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            "UPDATE returns SET doc = jsonb_set(
                jsonb_set(doc, '{status}', to_jsonb($2::text)),
                '{history}', COALESCE(doc->'history', '[]'::jsonb) || jsonb_build_array($3::jsonb)
            ) || jsonb_build_object('updatedAt', $4::text)
            WHERE id = $1 AND lower(doc->>'status') = $5 RETURNING doc",
        )
        .bind(id).bind(to.as_str()).bind(Json(entry)).bind(Utc::now().to_rfc3339()).bind(from.as_str())
        .fetch_optional(self.db.pool().await?).await?;
        decode_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::sample_order;

    #[test]
    fn test_decode_stored_order() {
        let order = sample_order(Some("u1"), "instapay");
        let doc = serde_json::to_value(&order).unwrap();
        let decoded: Option<Order> = decode_row(Some((Json(doc),))).unwrap();
        assert_eq!(decoded.unwrap().id(), order.id());
    }

    #[test]
    fn test_malformed_document_is_a_document_error() {
        let doc = serde_json::json!({ "id": "not-a-uuid", "status": "teleported" });
        let err = decode_row::<Order>(Some((Json(doc),))).unwrap_err();
        assert!(matches!(err, StoreError::Document(_)));
    }
}
