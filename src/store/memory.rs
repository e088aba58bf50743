//! In-process store used by tests and local runs without Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderRepository, ReturnRepository, StoreResult};
use crate::domain::aggregates::{Order, OrderChange, ReturnChange, ReturnRequest};

#[derive(Default)]
pub struct MemoryStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    returns: RwLock<Vec<ReturnRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn return_count(&self) -> usize {
        self.returns.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut stored = order.clone();
        stored.take_events();
        self.orders.write().await.insert(stored.id(), stored);
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn apply_order_change(&self, id: Uuid, change: &OrderChange) -> StoreResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&id) else { return Ok(None) };
        let current = match change {
            OrderChange::StatusChanged { from, .. } => order.status() == *from,
            OrderChange::PaymentChanged { from, .. } => order.payment().status == *from,
            OrderChange::ReceiptAttached { .. } => true,
        };
        if !current {
            return Ok(None);
        }
        order.apply(change);
        Ok(Some(order.clone()))
    }

    async fn mark_all_seen(&self) -> StoreResult<u64> {
        let mut orders = self.orders.write().await;
        Ok(orders.values_mut().map(Order::mark_seen).filter(|changed| *changed).count() as u64)
    }

    async fn count_unseen(&self) -> StoreResult<u64> {
        Ok(self.orders.read().await.values().filter(|o| !o.admin_seen()).count() as u64)
    }
}

#[async_trait]
impl ReturnRepository for MemoryStore {
    async fn insert_return(&self, request: &ReturnRequest) -> StoreResult<()> {
        let mut stored = request.clone();
        stored.take_events();
        self.returns.write().await.push(stored);
        Ok(())
    }

    async fn find_return(&self, id: Uuid) -> StoreResult<Option<ReturnRequest>> {
        Ok(self.returns.read().await.iter().find(|r| r.id() == id).cloned())
    }

    async fn list_returns_for_order(&self, order_id: Uuid) -> StoreResult<Vec<ReturnRequest>> {
        Ok(self.returns.read().await.iter().filter(|r| r.order_id() == order_id).cloned().collect())
    }

    async fn apply_return_change(&self, id: Uuid, change: &ReturnChange) -> StoreResult<Option<ReturnRequest>> {
        let mut returns = self.returns.write().await;
        let Some(request) = returns.iter_mut().find(|r| r.id() == id) else { return Ok(None) };
        let ReturnChange::StatusChanged { from, .. } = change;
        if request.status() != *from {
            return Ok(None);
        }
        request.apply(change);
        Ok(Some(request.clone()))
    }
}
