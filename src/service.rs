//! Order lifecycle operations.
//!
//! Every operation checks, in this order: identity, existence of the target,
//! authorization, state, then input. The first failing check decides the error.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::{authorize, Identity, Requirement};
use crate::domain::aggregates::{
    LineItem, NewOrder, Order, OrderStatus, PaymentStatus, RefundContact, ReturnRequest, ReturnStatus, ShippingInfo,
};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::DEFAULT_CURRENCY;
use crate::publisher::EventPublisher;
use crate::store::{OrderRepository, ReturnRepository};
use crate::{EcommerceError, Result};

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReceiptInput {
    #[serde(default)]
    #[validate(custom = "not_blank", length(max = 2048))]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RefundRequestInput {
    #[serde(default)]
    #[validate(custom = "not_blank", length(max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(custom = "not_blank", length(max = 40))]
    pub phone: String,
    #[serde(default)]
    #[validate(custom = "not_blank", length(max = 500))]
    pub address: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderInput {
    #[serde(default)]
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub payment_method: String,
    #[serde(default)]
    pub payment_channel: Option<String>,
    #[serde(default)]
    pub shipping: Option<ShippingInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StatusInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub status: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

fn invalid_fields(errors: ValidationErrors) -> EcommerceError {
    let mut fields: Vec<&str> = errors.field_errors().into_keys().collect();
    fields.sort_unstable();
    EcommerceError::InvalidInput(format!("missing or invalid fields: {}", fields.join(", ")))
}

fn require_identity(identity: Option<&Identity>) -> Result<&Identity> {
    identity.ok_or(EcommerceError::Unauthenticated)
}

/// Global admin operations have no resource to be forbidden from: a caller
/// that is not an admin is treated as not signed in.
fn require_admin(identity: Option<&Identity>) -> Result<&Identity> {
    match identity {
        Some(identity) if authorize(Some(identity), None, Requirement::Admin).is_allowed() => Ok(identity),
        Some(identity) => {
            tracing::warn!(subject_id = %identity.subject_id, "admin operation refused");
            Err(EcommerceError::Unauthenticated)
        }
        None => Err(EcommerceError::Unauthenticated),
    }
}

fn require(identity: &Identity, owner_id: Option<&str>, requirement: Requirement) -> Result<()> {
    if authorize(Some(identity), owner_id, requirement).is_allowed() {
        Ok(())
    } else {
        tracing::warn!(subject_id = %identity.subject_id, ?requirement, "access denied");
        Err(EcommerceError::Forbidden)
    }
}

pub struct OrderLifecycle {
    orders: Arc<dyn OrderRepository>,
    returns: Arc<dyn ReturnRepository>,
    events: EventPublisher,
}

impl OrderLifecycle {
    pub fn new(orders: Arc<dyn OrderRepository>, returns: Arc<dyn ReturnRepository>, events: EventPublisher) -> Self {
        Self { orders, returns, events }
    }

    async fn load_order(&self, id: Uuid) -> Result<Order> {
        self.orders.find_order(id).await?.ok_or(EcommerceError::NotFound("Order"))
    }

    /// Checkout. Guests may order; a signed-in caller becomes the owner.
    #[tracing::instrument(skip_all)]
    pub async fn place_order(&self, input: PlaceOrderInput, identity: Option<&Identity>) -> Result<Order> {
        input.validate().map_err(invalid_fields)?;
        let currency = input.currency.as_deref().map(str::trim).filter(|c| !c.is_empty()).unwrap_or(DEFAULT_CURRENCY);
        let mut order = Order::place(NewOrder {
            user_id: identity.map(|i| i.subject_id.clone()),
            customer_email: input.customer_email.or_else(|| identity.map(|i| i.email.clone())),
            items: input.items,
            shipping_fee: input.shipping_fee,
            currency: currency.to_string(),
            payment_method: input.payment_method.trim().to_string(),
            payment_channel: input.payment_channel,
            shipping: input.shipping,
        })?;
        self.orders.insert_order(&order).await?;
        tracing::info!(order_id = %order.id(), total = %order.totals().total(), "order placed");
        self.events.publish_all(order.take_events()).await;
        Ok(order)
    }

    #[tracing::instrument(skip(self, identity))]
    pub async fn get_order(&self, order_id: Uuid, identity: Option<&Identity>) -> Result<Order> {
        let identity = require_identity(identity)?;
        let order = self.load_order(order_id).await?;
        require(identity, order.user_id(), Requirement::OwnerOrAdmin)?;
        Ok(order)
    }

    /// Stores the payment receipt URL. The order status stays as it is until
    /// an admin confirms the payment.
    #[tracing::instrument(skip(self, input, identity))]
    pub async fn attach_receipt(&self, order_id: Uuid, input: &ReceiptInput, identity: Option<&Identity>) -> Result<Order> {
        let identity = require_identity(identity)?;
        let mut order = self.load_order(order_id).await?;
        require(identity, order.user_id(), Requirement::OwnerOrAdmin)?;
        input.validate().map_err(invalid_fields)?;

        let change = order.attach_receipt(input.url.trim());
        let stored = self.orders.apply_order_change(order_id, &change).await?.ok_or(EcommerceError::NotFound("Order"))?;
        tracing::info!(%order_id, status = %stored.status(), "receipt uploaded");
        self.events.publish_all(order.take_events()).await;
        Ok(stored)
    }

    /// Opens a refund request. Only processing orders paid through InstaPay
    /// qualify; the order itself is not modified.
    #[tracing::instrument(skip(self, input, identity))]
    pub async fn request_refund(&self, order_id: Uuid, input: &RefundRequestInput, identity: Option<&Identity>) -> Result<Uuid> {
        let identity = require_identity(identity)?;
        let order = self.load_order(order_id).await?;
        require(identity, order.user_id(), Requirement::OwnerOrAdmin)?;
        order.ensure_refundable()?;
        input.validate().map_err(invalid_fields)?;

        let contact = RefundContact { name: input.name.clone(), phone: input.phone.clone(), address: input.address.clone() };
        let mut request = ReturnRequest::open(&order, &contact, input.reason.as_deref());
        self.returns.insert_return(&request).await?;
        tracing::info!(%order_id, return_id = %request.id(), amount = %request.refund_amount(), "refund requested");
        self.events.publish_all(request.take_events()).await;
        Ok(request.id())
    }

    #[tracing::instrument(skip(self, identity))]
    pub async fn list_refund_requests(&self, order_id: Uuid, identity: Option<&Identity>) -> Result<Vec<ReturnRequest>> {
        let identity = require_identity(identity)?;
        let order = self.load_order(order_id).await?;
        require(identity, order.user_id(), Requirement::OwnerOrAdmin)?;
        Ok(self.returns.list_returns_for_order(order_id).await?)
    }

    #[tracing::instrument(skip_all)]
    pub async fn mark_all_seen(&self, identity: Option<&Identity>) -> Result<u64> {
        let identity = require_admin(identity)?;
        let count = self.orders.mark_all_seen().await?;
        tracing::info!(count, subject_id = %identity.subject_id, "orders marked seen");
        if count > 0 {
            self.events.publish_all(vec![DomainEvent::Order(OrderEvent::MarkedSeen { count })]).await;
        }
        Ok(count)
    }

    #[tracing::instrument(skip_all)]
    pub async fn count_unseen(&self, identity: Option<&Identity>) -> Result<u64> {
        require_admin(identity)?;
        Ok(self.orders.count_unseen().await?)
    }

    #[tracing::instrument(skip(self, input, identity))]
    pub async fn update_order_status(&self, order_id: Uuid, input: &StatusInput, identity: Option<&Identity>) -> Result<Order> {
        let identity = require_identity(identity)?;
        let mut order = self.load_order(order_id).await?;
        require(identity, order.user_id(), Requirement::Admin)?;
        input.validate().map_err(invalid_fields)?;
        let next: OrderStatus = input.status.parse()?;

        let change = order.transition_to(next, input.note.as_deref())?;
        let stored = self
            .orders
            .apply_order_change(order_id, &change)
            .await?
            .ok_or_else(|| EcommerceError::InvalidState("order status changed concurrently".into()))?;
        tracing::info!(%order_id, status = %next, "order status updated");
        self.events.publish_all(order.take_events()).await;
        Ok(stored)
    }

    /// Admin settles the payment of an order, usually after checking the
    /// uploaded receipt. Confirming an InstaPay payment is what makes the
    /// order refundable.
    #[tracing::instrument(skip(self, input, identity))]
    pub async fn update_payment_status(&self, order_id: Uuid, input: &StatusInput, identity: Option<&Identity>) -> Result<Order> {
        let identity = require_identity(identity)?;
        let mut order = self.load_order(order_id).await?;
        require(identity, order.user_id(), Requirement::Admin)?;
        input.validate().map_err(invalid_fields)?;
        let next: PaymentStatus = input.status.parse()?;

        let change = order.update_payment(next, input.note.as_deref())?;
        let stored = self
            .orders
            .apply_order_change(order_id, &change)
            .await?
            .ok_or_else(|| EcommerceError::InvalidState("payment status changed concurrently".into()))?;
        tracing::info!(%order_id, payment = %next, subject_id = %identity.subject_id, "payment status updated");
        self.events.publish_all(order.take_events()).await;
        Ok(stored)
    }

    #[tracing::instrument(skip(self, input, identity))]
    pub async fn review_refund_request(&self, return_id: Uuid, input: &StatusInput, identity: Option<&Identity>) -> Result<ReturnRequest> {
        let identity = require_identity(identity)?;
        let mut request = self.returns.find_return(return_id).await?.ok_or(EcommerceError::NotFound("Refund request"))?;
        require(identity, request.user_id(), Requirement::Admin)?;
        input.validate().map_err(invalid_fields)?;
        let next: ReturnStatus = input.status.parse()?;

        let change = request.review(next, input.note.as_deref())?;
        let stored = self
            .returns
            .apply_return_change(return_id, &change)
            .await?
            .ok_or_else(|| EcommerceError::InvalidState("refund request status changed concurrently".into()))?;
        tracing::info!(%return_id, status = %next, "refund request reviewed");
        self.events.publish_all(request.take_events()).await;
        Ok(stored)
    }
}
