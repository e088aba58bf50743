//! End-to-end tests through the HTTP router with the in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use storefront_orders::auth::{Identity, Role, TokenVerifier};
use storefront_orders::publisher::EventPublisher;
use storefront_orders::routes::router;
use storefront_orders::service::OrderLifecycle;
use storefront_orders::state::AppState;
use storefront_orders::store::{MemoryStore, OrderRepository, ReturnRepository};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret";

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    verifier: TokenVerifier,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let verifier = TokenVerifier::new(Some(SECRET.into()));
        let lifecycle = OrderLifecycle::new(store.clone(), store.clone(), EventPublisher::disabled());
        let app = router(AppState::new(lifecycle, verifier.clone(), "token"));
        Self { app, store, verifier }
    }

    fn token(&self, subject: &str, role: Role) -> String {
        let identity = Identity { subject_id: subject.into(), email: format!("{subject}@example.com"), role };
        self.verifier.issue(&identity, Duration::hours(1)).unwrap()
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("lang=ar; token={token}"));
        }
        let request = match body {
            Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    /// Places an order as `owner`; payment starts out pending.
    async fn order(&self, owner: &str, channel: &str) -> Uuid {
        let token = self.token(owner, Role::User);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/orders",
                Some(&token),
                Some(json!({
                    "items": [{ "productId": "P1", "name": "Teddy bear", "price": 60, "qty": 2 }],
                    "shippingFee": 30,
                    "paymentMethod": channel,
                    "paymentChannel": channel
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["order"]["id"].as_str().unwrap().parse().unwrap()
    }

    async fn confirm_payment(&self, id: Uuid) -> (StatusCode, Value) {
        let admin = self.token("boss", Role::Admin);
        self.send(Method::PATCH, &format!("/api/admin/orders/{id}/payment"), Some(&admin), Some(json!({ "status": "paid" }))).await
    }
}

#[tokio::test]
async fn refund_request_for_paid_instapay_order() {
    let h = Harness::new();
    let id = h.order("sara", "instapay").await;
    assert_eq!(h.confirm_payment(id).await.0, StatusCode::OK);

    let token = h.token("sara", Role::User);
    let (status, body) = h
        .send(Method::POST, &format!("/api/orders/{id}/refund-requests"), Some(&token), Some(json!({ "name": "Sara", "phone": "0100", "address": "Cairo" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id: Uuid = body["requestId"].as_str().unwrap().parse().unwrap();

    let stored = h.store.find_return(request_id).await.unwrap().unwrap();
    assert_eq!(stored.refund_amount(), rust_decimal::Decimal::new(150, 0));
    assert_eq!(stored.reason(), "Processing refund request");
    assert_eq!(stored.status().as_str(), "requested");
}

#[tokio::test]
async fn refund_request_for_unpaid_order_is_rejected() {
    let h = Harness::new();
    let id = h.order("sara", "instapay").await;
    let token = h.token("sara", Role::User);
    let (status, body) = h
        .send(Method::POST, &format!("/api/orders/{id}/refund-requests"), Some(&token), Some(json!({ "name": "Sara", "phone": "0100", "address": "Cairo" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "refund request only for paid InstaPay orders");
    assert_eq!(h.store.return_count().await, 0);
}

#[tokio::test]
async fn receipt_upload_by_another_user_is_forbidden() {
    let h = Harness::new();
    let id = h.order("sara", "instapay").await;
    let before = h.store.find_order(id).await.unwrap().unwrap();

    let intruder = h.token("omar", Role::User);
    let (status, _) = h
        .send(Method::POST, &format!("/api/orders/{id}/receipt"), Some(&intruder), Some(json!({ "url": "https://cdn.example.com/r.jpg" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let after = h.store.find_order(id).await.unwrap().unwrap();
    assert_eq!(after.payment().receipt_url, None);
    assert_eq!(after.history().len(), before.history().len());
}

#[tokio::test]
async fn receipt_upload_by_owner_keeps_status() {
    let h = Harness::new();
    let id = h.order("sara", "instapay").await;
    let token = h.token("sara", Role::User);
    let (status, body) = h
        .send(Method::POST, &format!("/api/orders/{id}/receipt"), Some(&token), Some(json!({ "url": "https://cdn.example.com/r.jpg" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["order"]["payment"]["receiptUrl"], "https://cdn.example.com/r.jpg");
    assert_eq!(body["order"]["tracking"]["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn receipt_upload_error_statuses() {
    let h = Harness::new();
    let id = h.order("sara", "instapay").await;
    let token = h.token("sara", Role::User);
    let uri = format!("/api/orders/{id}/receipt");

    let (status, _) = h.send(Method::POST, &uri, None, Some(json!({ "url": "x" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = h.send(Method::POST, &uri, Some("forged.token.value"), Some(json!({ "url": "x" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = h.send(Method::POST, &format!("/api/orders/{}/receipt", Uuid::now_v7()), Some(&token), Some(json!({ "url": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.send(Method::POST, "/api/orders/not-a-uuid/receipt", Some(&token), Some(json!({ "url": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.send(Method::POST, &uri, Some(&token), Some(json!({ "url": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_credential_counts_as_anonymous() {
    let h = Harness::new();
    let identity = Identity { subject_id: "boss".into(), email: "boss@example.com".into(), role: Role::Admin };
    let expired = h.verifier.issue(&identity, Duration::hours(-2)).unwrap();
    let (status, _) = h.send(Method::GET, "/api/admin/orders/unseen-count", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_seen_bookkeeping() {
    let h = Harness::new();
    h.order("sara", "cod").await;
    h.order("omar", "instapay").await;
    let admin = h.token("boss", Role::Admin);
    let user = h.token("sara", Role::User);

    let (status, _) = h.send(Method::POST, "/api/admin/orders/mark-seen", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = h.send(Method::POST, "/api/admin/orders/mark-seen", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = h.send(Method::GET, "/api/admin/orders/unseen-count", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = h.send(Method::GET, "/api/admin/orders/unseen-count", Some(&admin), None).await;
    assert_eq!(body["count"], 2);
    let (status, body) = h.send(Method::POST, "/api/admin/orders/mark-seen", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updatedCount"], 2);
    let (_, body) = h.send(Method::POST, "/api/admin/orders/mark-seen", Some(&admin), None).await;
    assert_eq!(body["updatedCount"], 0);
}

#[tokio::test]
async fn admin_ships_order_and_refund_is_closed() {
    let h = Harness::new();
    let id = h.order("sara", "instapay").await;
    assert_eq!(h.confirm_payment(id).await.0, StatusCode::OK);
    let admin = h.token("boss", Role::Admin);

    let (status, body) = h.send(Method::PATCH, &format!("/api/admin/orders/{id}/status"), Some(&admin), Some(json!({ "status": "shipped" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "shipped");

    let token = h.token("sara", Role::User);
    let (status, body) = h
        .send(Method::POST, &format!("/api/orders/{id}/refund-requests"), Some(&token), Some(json!({ "name": "Sara", "phone": "0100", "address": "Cairo" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "refund allowed only during processing");
    let (_, body) = h.send(Method::GET, &format!("/api/orders/{id}/refund-requests"), Some(&token), None).await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn receipt_then_admin_confirmation_then_refund() {
    let h = Harness::new();
    let id = h.order("sara", "InstaPay").await;
    let token = h.token("sara", Role::User);
    let refund_uri = format!("/api/orders/{id}/refund-requests");
    let contact = json!({ "name": "Sara", "phone": "0100", "address": "Cairo", "reason": "Wrong size" });

    let (status, _) = h.send(Method::POST, &format!("/api/orders/{id}/receipt"), Some(&token), Some(json!({ "url": "https://cdn.example.com/r.jpg" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.send(Method::POST, &refund_uri, Some(&token), Some(contact.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.send(Method::PATCH, &format!("/api/admin/orders/{id}/payment"), Some(&token), Some(json!({ "status": "paid" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = h.confirm_payment(id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["payment"]["status"], "paid");
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["order"]["tracking"]["history"].as_array().unwrap().len(), 3);

    let (status, body) = h.send(Method::POST, &refund_uri, Some(&token), Some(contact)).await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id: Uuid = body["requestId"].as_str().unwrap().parse().unwrap();
    let stored = h.store.find_return(request_id).await.unwrap().unwrap();
    assert_eq!(stored.reason(), "Wrong size");
    assert_eq!(stored.refund_amount(), rust_decimal::Decimal::new(150, 0));

    let (status, _) = h.confirm_payment(id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
