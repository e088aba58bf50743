//! Aggregates module
pub mod order;
pub mod refund;

pub use order::{LineItem, NewOrder, Order, OrderChange, OrderError, OrderStatus, Payment, PaymentStatus, ShippingInfo};
pub use refund::{RefundContact, ReturnChange, ReturnError, ReturnRequest, ReturnStatus};
