//! Value Objects for orders and refund requests

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CURRENCY: &str = "EGP";

/// Line item quantity, always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

#[derive(Debug, Clone)] pub enum QuantityError { Zero }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "quantity must be at least 1") }
}

/// Order totals. `total` is always `subtotal + shipping`; the only way to
/// build one is through [`Totals::new`], which computes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    currency: String,
}

impl Totals {
    pub fn new(subtotal: Decimal, shipping: Decimal, currency: &str) -> Result<Self, TotalsError> {
        if subtotal.is_sign_negative() || shipping.is_sign_negative() { return Err(TotalsError::Negative); }
        let currency = currency.trim().to_uppercase();
        if currency.is_empty() { return Err(TotalsError::MissingCurrency); }
        let total = subtotal.checked_add(shipping).ok_or(TotalsError::Overflow)?;
        Ok(Self { subtotal, shipping, total, currency })
    }
    pub fn zero(currency: &str) -> Self {
        Self { subtotal: Decimal::ZERO, shipping: Decimal::ZERO, total: Decimal::ZERO, currency: currency.to_string() }
    }
    pub fn subtotal(&self) -> Decimal { self.subtotal }
    pub fn shipping(&self) -> Decimal { self.shipping }
    pub fn total(&self) -> Decimal { self.total }
    pub fn currency(&self) -> &str { &self.currency }
}

impl Default for Totals { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

#[derive(Debug, Clone, PartialEq, Eq)] pub enum TotalsError { Negative, MissingCurrency, Overflow }
impl std::error::Error for TotalsError {}
impl fmt::Display for TotalsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Negative => write!(f, "amounts must not be negative"), Self::MissingCurrency => write!(f, "currency is required"), Self::Overflow => write!(f, "amount is too large") }
    }
}

/// One entry of an append-only audit trail (order tracking or refund history).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HistoryEntry {
    pub fn now(status: impl fmt::Display, note: Option<&str>) -> Self {
        Self { timestamp: Utc::now(), status: status.to_string(), note: note.map(str::to_string) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_quantity_rejects_zero() {
        assert!(Quantity::new(0).is_err());
        assert_eq!(Quantity::new(3).unwrap().value(), 3);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
    #[test]
    fn test_totals_sum() {
        let t = Totals::new(Decimal::new(120, 0), Decimal::new(30, 0), "egp").unwrap();
        assert_eq!(t.total(), Decimal::new(150, 0));
        assert_eq!(t.currency(), "EGP");
        assert_eq!(Totals::new(Decimal::new(-1, 0), Decimal::ZERO, "EGP"), Err(TotalsError::Negative));
        assert_eq!(Totals::new(Decimal::MAX, Decimal::ONE, "EGP"), Err(TotalsError::Overflow));
    }
    #[test]
    fn test_totals_keep_every_digit_in_documents() {
        let subtotal: Decimal = "1234567890123456789.25".parse().unwrap();
        let t = Totals::new(subtotal, Decimal::new(5, 1), "EGP").unwrap();
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["subtotal"], "1234567890123456789.25");
        let back: Totals = serde_json::from_value(json).unwrap();
        assert_eq!(back.total().to_string(), "1234567890123456789.75");
    }
    #[test]
    fn test_history_entry_omits_empty_note() {
        let json = serde_json::to_value(HistoryEntry::now("processing", None)).unwrap();
        assert!(json.get("note").is_none());
    }
}
