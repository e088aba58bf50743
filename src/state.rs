//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::service::OrderLifecycle;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<OrderLifecycle>,
    pub verifier: Arc<TokenVerifier>,
    pub cookie_name: Arc<str>,
}

impl AppState {
    pub fn new(lifecycle: OrderLifecycle, verifier: TokenVerifier, cookie_name: &str) -> Self {
        Self { lifecycle: Arc::new(lifecycle), verifier: Arc::new(verifier), cookie_name: Arc::from(cookie_name) }
    }
}
