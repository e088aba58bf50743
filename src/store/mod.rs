//! Persistence for orders and refund requests.
//!
//! Both collections are document-shaped. Every mutation goes through a
//! single atomic statement per document (`apply_*_change`, `mark_all_seen`),
//! so concurrent requests never lose a history entry.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderChange, ReturnChange, ReturnRequest};

pub use memory::MemoryStore;
pub use postgres::{Database, PgStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("malformed document: {0}")]
    Document(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Applies `change` to the stored document and returns the result.
    ///
    /// `None` when the order does not exist or, for status changes, is no
    /// longer in the status the change was computed from.
    async fn apply_order_change(&self, id: Uuid, change: &OrderChange) -> StoreResult<Option<Order>>;

    /// Flags every unseen order as seen in one statement; returns how many flipped.
    async fn mark_all_seen(&self) -> StoreResult<u64>;

    async fn count_unseen(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait ReturnRepository: Send + Sync {
    async fn insert_return(&self, request: &ReturnRequest) -> StoreResult<()>;

    async fn find_return(&self, id: Uuid) -> StoreResult<Option<ReturnRequest>>;

    async fn list_returns_for_order(&self, order_id: Uuid) -> StoreResult<Vec<ReturnRequest>>;

    async fn apply_return_change(&self, id: Uuid, change: &ReturnChange) -> StoreResult<Option<ReturnRequest>>;
}
