//! Storefront Orders
//!
//! Order lifecycle and refund-request service for the storefront.
//!
//! ## Features
//! - Signed-cookie credential verification
//! - Owner / admin authorization gate
//! - Payment receipt upload
//! - Refund requests for paid InstaPay orders
//! - Admin "seen" bookkeeping, payment confirmation and status review

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod publisher;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::{OrderError, ReturnError};
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

/// Every failure an operation can end in. Authentication and authorization
/// failures carry no detail.
#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<OrderError> for EcommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems | OrderError::InvalidTotals(_) | OrderError::UnknownStatus(_) => Self::InvalidInput(e.to_string()),
            OrderError::InvalidTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::NotProcessing
            | OrderError::NotPaidInstapay => Self::InvalidState(e.to_string()),
        }
    }
}

impl From<ReturnError> for EcommerceError {
    fn from(e: ReturnError) -> Self {
        match e {
            ReturnError::UnknownStatus(_) => Self::InvalidInput(e.to_string()),
            ReturnError::InvalidTransition { .. } => Self::InvalidState(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
