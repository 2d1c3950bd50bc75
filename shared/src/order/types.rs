//! Order wire model and request DTOs

use super::lifecycle::{self, OrderAction, TransitionError};
use crate::client::{SessionUser, UserSummary};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Money is rounded to 2 decimal places, half away from zero
const DECIMAL_PLACES: u32 = 2;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status
///
/// ```text
/// pending → accepted → payment_confirmed → proof_uploaded → completed*
///    └──────────┴──→ cancelled*
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Accepted,
    PaymentConfirmed,
    ProofUploaded,
    /// `delivered` is a legacy spelling of the same terminal state
    #[serde(alias = "delivered")]
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::PaymentConfirmed,
        OrderStatus::ProofUploaded,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::PaymentConfirmed => "payment_confirmed",
            OrderStatus::ProofUploaded => "proof_uploaded",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Progress line shown in order lists
    pub fn describe(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Awaiting acceptance",
            OrderStatus::Accepted => "Accepted, awaiting payment",
            OrderStatus::PaymentConfirmed => "Payment confirmed, awaiting proof",
            OrderStatus::ProofUploaded => "Proof uploaded, awaiting confirmation",
            OrderStatus::Completed => "Order completed",
            OrderStatus::Cancelled => "Order cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if normalized == "delivered" {
            return Ok(OrderStatus::Completed);
        }
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

// ============================================================================
// Order
// ============================================================================

/// An order as served by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Purchase amount reimbursed to the card holder
    pub amount: f64,
    /// Reward paid to the card holder on top of the amount
    pub reward: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    pub product_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
    pub status: OrderStatus,

    // === Participants ===
    pub buyer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_holder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_holder: Option<UserSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    // === Timestamps (each transition stamps exactly one, never cleared) ===
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A fresh pending order owned by `buyer`
    pub fn new_pending(
        id: impl Into<String>,
        buyer: &SessionUser,
        request: CreateOrderRequest,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            product_name: request.product_name.trim().to_string(),
            description: None,
            amount: request.amount,
            reward: request.reward,
            service_fee: None,
            total_amount: None,
            store: None,
            product_url: request.product_url,
            product_image: request.product_image,
            status: OrderStatus::Pending,
            buyer_id: buyer.id.clone(),
            card_holder_id: None,
            buyer: Some(buyer.summary()),
            card_holder: None,
            instructions: request.instructions,
            proof_url: None,
            cancel_reason: None,
            created_at,
            updated_at: Some(created_at),
            accepted_at: None,
            payment_confirmed_at: None,
            proof_uploaded_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Amount plus reward
    pub fn total(&self) -> f64 {
        let amount = Decimal::from_f64(self.amount).unwrap_or_default();
        let reward = Decimal::from_f64(self.reward).unwrap_or_default();
        (amount + reward)
            .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or_default()
    }

    /// Apply a permitted transition on the system of record.
    ///
    /// Assigns the card holder on accept, stamps the transition's timestamp if it
    /// is still unset and records the cancellation reason.
    pub fn apply_transition(
        &mut self,
        action: OrderAction,
        actor: &SessionUser,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<OrderStatus, TransitionError> {
        let next = lifecycle::next_status(actor.role, self.status, action)?;

        match action {
            OrderAction::Accept => {
                self.card_holder_id = Some(actor.id.clone());
                self.card_holder = Some(actor.summary());
                self.accepted_at.get_or_insert(at);
            }
            OrderAction::Cancel | OrderAction::CancelAcceptance => {
                self.cancelled_at.get_or_insert(at);
                self.cancel_reason = reason.filter(|r| !r.trim().is_empty());
            }
            OrderAction::ConfirmPayment => {
                self.payment_confirmed_at.get_or_insert(at);
            }
            OrderAction::UploadProof => {
                self.proof_uploaded_at.get_or_insert(at);
            }
            OrderAction::ConfirmDelivery => {
                self.completed_at.get_or_insert(at);
            }
        }

        self.status = next;
        self.updated_at = Some(at);
        Ok(next)
    }

    /// First broken model invariant, if any
    pub fn invariant_violation(&self) -> Option<&'static str> {
        if self.completed_at.is_some() && self.cancelled_at.is_some() {
            return Some("order is both completed and cancelled");
        }
        if self.status == OrderStatus::Pending && self.card_holder_id.is_some() {
            return Some("pending order has a card holder");
        }
        let needs_card_holder = matches!(
            self.status,
            OrderStatus::Accepted
                | OrderStatus::PaymentConfirmed
                | OrderStatus::ProofUploaded
                | OrderStatus::Completed
        );
        if needs_card_holder && self.card_holder_id.is_none() {
            return Some("accepted order has no card holder");
        }
        None
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /api/orders/create`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_name: String,
    pub product_url: String,
    pub amount: f64,
    pub reward: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(
        product_name: impl Into<String>,
        product_url: impl Into<String>,
        amount: f64,
        reward: f64,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            product_url: product_url.into(),
            amount,
            reward,
            instructions: None,
            product_image: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Body of the acknowledgement-only transitions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdRequest {
    pub order_id: String,
}

/// Body of `cancel` and `cancel-acceptance`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Query string of `upload-proof`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProofQuery {
    pub order_id: String,
}

/// Filter for `my-orders` and `my-accepted-orders`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Filter for the explore feed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExploreQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Role;

    fn buyer() -> SessionUser {
        SessionUser::new("buyer-1", "Bea", Role::Buyer)
    }

    fn card_holder() -> SessionUser {
        SessionUser::new("holder-1", "Hal", Role::CardHolder)
    }

    fn pending_order() -> Order {
        let request = CreateOrderRequest::new("Headphones", "https://shop.example/h1", 120.0, 15.5);
        Order::new_pending("order-1", &buyer(), request, Utc::now())
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::PaymentConfirmed).unwrap(),
            "\"payment_confirmed\""
        );
        let status: OrderStatus = serde_json::from_str("\"proof_uploaded\"").unwrap();
        assert_eq!(status, OrderStatus::ProofUploaded);
    }

    #[test]
    fn test_delivered_is_completed() {
        let status: OrderStatus = serde_json::from_str("\"delivered\"").unwrap();
        assert_eq!(status, OrderStatus::Completed);
        assert_eq!("delivered".parse::<OrderStatus>(), Ok(OrderStatus::Completed));
        assert!(serde_json::from_str::<OrderStatus>("\"shipped\"").is_err());
    }

    #[test]
    fn test_order_deserializes_camel_case_payload() {
        let json = r#"{
            "id": "665f1c",
            "productName": "Kindle",
            "amount": 89.99,
            "reward": 10,
            "productUrl": "https://shop.example/kindle",
            "status": "accepted",
            "buyerId": "b1",
            "cardHolderId": "c1",
            "cardHolder": {"id": "c1", "name": "Chen"},
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T11:00:00Z",
            "acceptedAt": "2024-03-01T11:00:00Z"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.card_holder_id.as_deref(), Some("c1"));
        assert_eq!(order.card_holder.as_ref().map(|u| u.name.as_str()), Some("Chen"));
        assert!(order.accepted_at.is_some());
        assert!(order.cancelled_at.is_none());
        assert_eq!(order.total(), 99.99);
    }

    #[test]
    fn test_new_pending_has_no_card_holder() {
        let order = pending_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.card_holder_id.is_none());
        assert_eq!(order.buyer_id, "buyer-1");
        assert!(order.invariant_violation().is_none());
    }

    #[test]
    fn test_total_rounds_to_cents() {
        let mut order = pending_order();
        order.amount = 0.1;
        order.reward = 0.2;
        assert_eq!(order.total(), 0.3);
    }

    #[test]
    fn test_full_lifecycle_stamps_each_timestamp_once() {
        let mut order = pending_order();
        let holder = card_holder();
        let t1 = Utc::now();

        order.apply_transition(OrderAction::Accept, &holder, t1, None).unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.card_holder_id.as_deref(), Some("holder-1"));
        assert_eq!(order.accepted_at, Some(t1));

        let t2 = t1 + chrono::Duration::minutes(5);
        order.apply_transition(OrderAction::ConfirmPayment, &buyer(), t2, None).unwrap();
        order.apply_transition(OrderAction::UploadProof, &buyer(), t2, None).unwrap();
        order.apply_transition(OrderAction::ConfirmDelivery, &holder, t2, None).unwrap();

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.accepted_at, Some(t1));
        assert_eq!(order.completed_at, Some(t2));
        assert!(order.cancelled_at.is_none());
        assert!(order.invariant_violation().is_none());
    }

    #[test]
    fn test_terminal_order_rejects_everything() {
        let mut order = pending_order();
        order
            .apply_transition(OrderAction::Cancel, &buyer(), Utc::now(), Some("out of stock".into()))
            .unwrap();
        assert_eq!(order.cancel_reason.as_deref(), Some("out of stock"));

        let err = order
            .apply_transition(OrderAction::ConfirmDelivery, &card_holder(), Utc::now(), None)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Terminal {
                status: OrderStatus::Cancelled
            }
        );
        assert!(order.completed_at.is_none());
    }

    #[test]
    fn test_blank_cancel_reason_is_dropped() {
        let mut order = pending_order();
        order
            .apply_transition(OrderAction::Cancel, &buyer(), Utc::now(), Some("  ".into()))
            .unwrap();
        assert!(order.cancel_reason.is_none());
    }

    #[test]
    fn test_query_skips_unset_fields() {
        let json = serde_json::to_value(OrderQuery::with_status(OrderStatus::Accepted)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "accepted" }));
    }

    #[test]
    fn test_create_request_uses_camel_case() {
        let req = CreateOrderRequest::new("Mug", "https://shop.example/mug", 12.0, 3.0)
            .with_instructions("blue one");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["productName"], "Mug");
        assert_eq!(json["productUrl"], "https://shop.example/mug");
        assert_eq!(json["instructions"], "blue one");
        assert!(json.get("productImage").is_none());
    }
}
