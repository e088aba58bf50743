//! Order Aggregate
//!
//! Orders are stored as documents. The aggregate never writes itself back
//! wholesale: every mutation is expressed as an [`OrderChange`] that the store
//! applies atomically against the current document.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::value_objects::{HistoryEntry, Quantity, Totals, TotalsError};
use crate::domain::events::{DomainEvent, OrderEvent};

pub const RECEIPT_NOTE: &str = "Receipt uploaded";
pub const PLACED_NOTE: &str = "Order placed";
pub const PAYMENT_CONFIRMED_NOTE: &str = "Payment confirmed";
pub const PAYMENT_CANCELLED_NOTE: &str = "Payment cancelled";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    user_id: Option<String>,
    customer_email: Option<String>,
    items: Vec<LineItem>,
    #[serde(default)]
    totals: Totals,
    payment: Payment,
    #[serde(default)]
    shipping: Option<ShippingInfo>,
    status: OrderStatus,
    #[serde(default)]
    tracking: Tracking,
    #[serde(default)]
    admin_seen: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub qty: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl LineItem {
    /// `None` when the amount does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> { self.price.checked_mul(Decimal::from(self.qty.value())) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub method: String,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

impl Payment {
    pub fn is_paid_instapay(&self) -> bool {
        self.status == PaymentStatus::Paid
            && self.channel.as_deref().is_some_and(|c| c.trim().eq_ignore_ascii_case("instapay"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OrderStatus { #[default] Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum PaymentStatus { #[default] Pending, Paid, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Processing => "processing", Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled" }
    }

    /// Allowed forward moves. Delivered and cancelled orders are final.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Shipped)
                | (Self::Processing, Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
                | (Self::Shipped, Self::Cancelled)
        )
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Cancelled => "cancelled" }
    }

    /// Only pending payments can be settled; paid and cancelled are final.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!((self, next), (Self::Pending, Self::Paid) | (Self::Pending, Self::Cancelled))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(OrderError::UnknownStatus(s.to_string())),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(OrderError::UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = OrderError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl TryFrom<String> for PaymentStatus {
    type Error = OrderError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

/// Everything checkout hands over when an order is placed.
#[derive(Clone, Debug, Default)]
pub struct NewOrder {
    pub user_id: Option<String>,
    pub customer_email: Option<String>,
    pub items: Vec<LineItem>,
    pub shipping_fee: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub payment_channel: Option<String>,
    pub shipping: Option<ShippingInfo>,
}

/// A single atomic mutation of a stored order.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderChange {
    ReceiptAttached { url: String, entry: HistoryEntry },
    StatusChanged { from: OrderStatus, to: OrderStatus, entry: HistoryEntry },
    PaymentChanged { from: PaymentStatus, to: PaymentStatus, entry: HistoryEntry },
}

impl Order {
    pub fn place(input: NewOrder) -> Result<Self, OrderError> {
        if input.items.is_empty() { return Err(OrderError::NoItems); }
        if input.items.iter().any(|item| item.price.is_sign_negative()) { return Err(TotalsError::Negative.into()); }
        let subtotal = input
            .items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| item.line_total().and_then(|line| acc.checked_add(line)))
            .ok_or(TotalsError::Overflow)?;
        let totals = Totals::new(subtotal, input.shipping_fee, &input.currency)?;
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut order = Self {
            id, user_id: input.user_id, customer_email: input.customer_email, items: input.items, totals,
            payment: Payment { method: input.payment_method, status: PaymentStatus::Pending, channel: input.payment_channel, receipt_url: None },
            shipping: input.shipping, status: OrderStatus::Processing,
            tracking: Tracking { history: vec![HistoryEntry::now(OrderStatus::Processing, Some(PLACED_NOTE))] },
            admin_seen: false, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: id, user_id: order.user_id.clone(), total: order.totals.total() }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }
    pub fn customer_email(&self) -> Option<&str> { self.customer_email.as_deref() }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn totals(&self) -> &Totals { &self.totals }
    pub fn payment(&self) -> &Payment { &self.payment }
    pub fn shipping(&self) -> Option<&ShippingInfo> { self.shipping.as_ref() }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn history(&self) -> &[HistoryEntry] { &self.tracking.history }
    pub fn admin_seen(&self) -> bool { self.admin_seen }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Records an uploaded payment receipt. Status is left untouched; the
    /// tracking entry repeats the current status.
    pub fn attach_receipt(&mut self, url: &str) -> OrderChange {
        let change = OrderChange::ReceiptAttached { url: url.to_string(), entry: HistoryEntry::now(self.status, Some(RECEIPT_NOTE)) };
        self.apply(&change);
        self.raise_event(DomainEvent::Order(OrderEvent::ReceiptAttached { order_id: self.id }));
        change
    }

    pub fn transition_to(&mut self, next: OrderStatus, note: Option<&str>) -> Result<OrderChange, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        let change = OrderChange::StatusChanged { from, to: next, entry: HistoryEntry::now(next, note) };
        self.apply(&change);
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from: from.to_string(), to: next.to_string() }));
        Ok(change)
    }

    /// Settles the payment, typically after an admin checked the uploaded
    /// receipt. The order status is unchanged; the tracking entry repeats it.
    pub fn update_payment(&mut self, next: PaymentStatus, note: Option<&str>) -> Result<OrderChange, OrderError> {
        let from = self.payment.status;
        if !from.can_transition_to(next) {
            return Err(OrderError::InvalidPaymentTransition { from, to: next });
        }
        let default_note = if next == PaymentStatus::Paid { PAYMENT_CONFIRMED_NOTE } else { PAYMENT_CANCELLED_NOTE };
        let entry = HistoryEntry::now(self.status, Some(note.unwrap_or(default_note)));
        let change = OrderChange::PaymentChanged { from, to: next, entry };
        self.apply(&change);
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentChanged { order_id: self.id, from: from.to_string(), to: next.to_string() }));
        Ok(change)
    }

    /// Refunds can only be requested while the order is still processing and
    /// was paid through InstaPay.
    pub fn ensure_refundable(&self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Processing { return Err(OrderError::NotProcessing); }
        if !self.payment.is_paid_instapay() { return Err(OrderError::NotPaidInstapay); }
        Ok(())
    }

    /// Applies a change in place. Stores call this under their own lock.
    pub fn apply(&mut self, change: &OrderChange) {
        match change {
            OrderChange::ReceiptAttached { url, entry } => {
                self.payment.receipt_url = Some(url.clone());
                self.tracking.history.push(entry.clone());
            }
            OrderChange::StatusChanged { to, entry, .. } => {
                self.status = *to;
                self.tracking.history.push(entry.clone());
            }
            OrderChange::PaymentChanged { to, entry, .. } => {
                self.payment.status = *to;
                self.tracking.history.push(entry.clone());
            }
        }
        self.touch();
    }

    pub fn mark_seen(&mut self) -> bool {
        let changed = !self.admin_seen;
        self.admin_seen = true;
        changed
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    NoItems,
    InvalidTotals(TotalsError),
    UnknownStatus(String),
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },
    NotProcessing,
    NotPaidInstapay,
}
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems => write!(f, "order has no items"),
            Self::InvalidTotals(e) => write!(f, "invalid totals: {e}"),
            Self::UnknownStatus(s) => write!(f, "unknown status {s:?}"),
            Self::InvalidTransition { from, to } => write!(f, "cannot move order from {from} to {to}"),
            Self::InvalidPaymentTransition { from, to } => write!(f, "cannot move payment from {from} to {to}"),
            Self::NotProcessing => write!(f, "refund allowed only during processing"),
            Self::NotPaidInstapay => write!(f, "refund request only for paid InstaPay orders"),
        }
    }
}

impl From<TotalsError> for OrderError {
    fn from(e: TotalsError) -> Self { Self::InvalidTotals(e) }
}
