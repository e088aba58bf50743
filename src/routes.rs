//! HTTP routes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::Identity;
use crate::middleware::CurrentIdentity;
use crate::service::{PlaceOrderInput, ReceiptInput, RefundRequestInput, StatusInput};
use crate::state::AppState;
use crate::{EcommerceError, Result};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront-orders"})) }))
        .route("/api/orders", post(place_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/receipt", post(attach_receipt))
        .route("/api/orders/:id/refund-requests", get(list_refund_requests).post(request_refund))
        .route("/api/admin/orders/mark-seen", post(mark_all_seen))
        .route("/api/admin/orders/unseen-count", get(count_unseen))
        .route("/api/admin/orders/:id/status", patch(update_order_status))
        .route("/api/admin/orders/:id/payment", patch(update_payment_status))
        .route("/api/admin/refund-requests/:id/status", patch(review_refund_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Malformed ids can never match a stored document, but the caller still has
/// to be identified before learning that.
fn resource_id(raw: &str, identity: Option<&Identity>, what: &'static str) -> Result<Uuid> {
    if identity.is_none() {
        return Err(EcommerceError::Unauthenticated);
    }
    Uuid::parse_str(raw).map_err(|_| EcommerceError::NotFound(what))
}

/// Unreadable bodies are treated as empty so field validation reports them
/// at the input step.
fn body_or_default<T: Default>(body: std::result::Result<Json<T>, JsonRejection>) -> T {
    body.map(|Json(input)| input).unwrap_or_default()
}

async fn place_order(
    State(s): State<AppState>,
    identity: CurrentIdentity,
    body: std::result::Result<Json<PlaceOrderInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(input) = body.map_err(|e| EcommerceError::InvalidInput(e.body_text()))?;
    let order = s.lifecycle.place_order(input, identity.identity()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "order": order }))))
}

async fn get_order(State(s): State<AppState>, identity: CurrentIdentity, Path(id): Path<String>) -> Result<Json<Value>> {
    let id = resource_id(&id, identity.identity(), "Order")?;
    let order = s.lifecycle.get_order(id, identity.identity()).await?;
    Ok(Json(json!({ "order": order })))
}

async fn attach_receipt(
    State(s): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<String>,
    body: std::result::Result<Json<ReceiptInput>, JsonRejection>,
) -> Result<Json<Value>> {
    let id = resource_id(&id, identity.identity(), "Order")?;
    let order = s.lifecycle.attach_receipt(id, &body_or_default(body), identity.identity()).await?;
    Ok(Json(json!({ "order": order })))
}

async fn request_refund(
    State(s): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<String>,
    body: std::result::Result<Json<RefundRequestInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = resource_id(&id, identity.identity(), "Order")?;
    let request_id = s.lifecycle.request_refund(id, &body_or_default(body), identity.identity()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "requestId": request_id }))))
}

async fn list_refund_requests(State(s): State<AppState>, identity: CurrentIdentity, Path(id): Path<String>) -> Result<Json<Value>> {
    let id = resource_id(&id, identity.identity(), "Order")?;
    let requests = s.lifecycle.list_refund_requests(id, identity.identity()).await?;
    Ok(Json(json!({ "requests": requests })))
}

async fn mark_all_seen(State(s): State<AppState>, identity: CurrentIdentity) -> Result<Json<Value>> {
    let updated = s.lifecycle.mark_all_seen(identity.identity()).await?;
    Ok(Json(json!({ "updatedCount": updated })))
}

async fn count_unseen(State(s): State<AppState>, identity: CurrentIdentity) -> Result<Json<Value>> {
    let count = s.lifecycle.count_unseen(identity.identity()).await?;
    Ok(Json(json!({ "count": count })))
}

async fn update_order_status(
    State(s): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<String>,
    body: std::result::Result<Json<StatusInput>, JsonRejection>,
) -> Result<Json<Value>> {
    let id = resource_id(&id, identity.identity(), "Order")?;
    let order = s.lifecycle.update_order_status(id, &body_or_default(body), identity.identity()).await?;
    Ok(Json(json!({ "order": order })))
}

async fn update_payment_status(
    State(s): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<String>,
    body: std::result::Result<Json<StatusInput>, JsonRejection>,
) -> Result<Json<Value>> {
    let id = resource_id(&id, identity.identity(), "Order")?;
    let order = s.lifecycle.update_payment_status(id, &body_or_default(body), identity.identity()).await?;
    Ok(Json(json!({ "order": order })))
}

async fn review_refund_request(
    State(s): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<String>,
    body: std::result::Result<Json<StatusInput>, JsonRejection>,
) -> Result<Json<Value>> {
    let id = resource_id(&id, identity.identity(), "Refund request")?;
    let request = s.lifecycle.review_refund_request(id, &body_or_default(body), identity.identity()).await?;
    Ok(Json(json!({ "request": request })))
}
