//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Return(ReturnEvent),
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(_) => "storefront.orders",
            Self::Return(_) => "storefront.returns",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Option<String>, total: Decimal },
    ReceiptAttached { order_id: Uuid },
    StatusChanged { order_id: Uuid, from: String, to: String },
    PaymentChanged { order_id: Uuid, from: String, to: String },
    MarkedSeen { count: u64 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReturnEvent {
    Requested { return_id: Uuid, order_id: Uuid, refund_amount: Decimal },
    Reviewed { return_id: Uuid, from: String, to: String },
}
