//! Return (refund request) Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::order::Order;
use crate::domain::events::{DomainEvent, ReturnEvent};
use crate::domain::value_objects::HistoryEntry;

pub const DEFAULT_REFUND_REASON: &str = "Processing refund request";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    id: Uuid,
    order_id: Uuid,
    user_id: Option<String>,
    reason: String,
    notes: String,
    refund_amount: Decimal,
    status: ReturnStatus,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Contact details the customer leaves so the admin can arrange the refund.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefundContact {
    pub name: String,
    pub phone: String,
    pub address: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ReturnStatus { #[default] Requested, Approved, Rejected, Received, Refunded }

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Received => "received",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Approved)
                | (Self::Requested, Self::Rejected)
                | (Self::Approved, Self::Received)
                | (Self::Approved, Self::Refunded)
                | (Self::Received, Self::Refunded)
        )
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ReturnStatus {
    type Err = ReturnError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(Self::Requested),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "received" => Ok(Self::Received),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ReturnError::UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for ReturnStatus {
    type Error = ReturnError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReturnChange {
    StatusChanged { from: ReturnStatus, to: ReturnStatus, entry: HistoryEntry },
}

impl ReturnRequest {
    /// Opens a refund request against `order` for its full current total.
    /// Eligibility is the caller's concern; see [`Order::ensure_refundable`].
    pub fn open(order: &Order, contact: &RefundContact, reason: Option<&str>) -> Self {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REFUND_REASON).to_string();
        let notes = format!(
            "Reason: {reason}\nName: {}\nPhone: {}\nAddress: {}",
            contact.name.trim(), contact.phone.trim(), contact.address.trim()
        );
        let id = Uuid::now_v7();
        let now = Utc::now();
        let refund_amount = order.totals().total();
        let mut request = Self {
            id, order_id: order.id(), user_id: order.user_id().map(str::to_string),
            history: vec![HistoryEntry::now(ReturnStatus::Requested, Some(reason.as_str()))],
            reason, notes, refund_amount, status: ReturnStatus::Requested,
            created_at: now, updated_at: now, events: vec![],
        };
        request.raise_event(DomainEvent::Return(ReturnEvent::Requested { return_id: id, order_id: order.id(), refund_amount }));
        request
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }
    pub fn reason(&self) -> &str { &self.reason }
    pub fn notes(&self) -> &str { &self.notes }
    pub fn refund_amount(&self) -> Decimal { self.refund_amount }
    pub fn status(&self) -> ReturnStatus { self.status }
    pub fn history(&self) -> &[HistoryEntry] { &self.history }

    pub fn review(&mut self, next: ReturnStatus, note: Option<&str>) -> Result<ReturnChange, ReturnError> {
        if !self.status.can_transition_to(next) {
            return Err(ReturnError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        let change = ReturnChange::StatusChanged { from, to: next, entry: HistoryEntry::now(next, note) };
        self.apply(&change);
        self.raise_event(DomainEvent::Return(ReturnEvent::Reviewed { return_id: self.id, from: from.to_string(), to: next.to_string() }));
        Ok(change)
    }

    pub fn apply(&mut self, change: &ReturnChange) {
        match change {
            ReturnChange::StatusChanged { to, entry, .. } => {
                self.status = *to;
                self.history.push(entry.clone());
            }
        }
        self.updated_at = Utc::now();
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnError {
    UnknownStatus(String),
    InvalidTransition { from: ReturnStatus, to: ReturnStatus },
}
impl std::error::Error for ReturnError {}
impl fmt::Display for ReturnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(s) => write!(f, "unknown return status {s:?}"),
            Self::InvalidTransition { from, to } => write!(f, "cannot move refund request from {from} to {to}"),
        }
    }
}
