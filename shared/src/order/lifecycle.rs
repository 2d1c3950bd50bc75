//! Role-gated order lifecycle
//!
//! Every permitted move is one row of [`TRANSITIONS`]. Which actions are
//! available depends only on the caller's role and the order's status.

use super::types::OrderStatus;
use crate::client::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A lifecycle action a participant can request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Accept,
    /// Buyer withdraws the order
    Cancel,
    /// Card holder backs out of an accepted order
    CancelAcceptance,
    ConfirmPayment,
    UploadProof,
    ConfirmDelivery,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Accept => "accept",
            OrderAction::Cancel => "cancel",
            OrderAction::CancelAcceptance => "cancel_acceptance",
            OrderAction::ConfirmPayment => "confirm_payment",
            OrderAction::UploadProof => "upload_proof",
            OrderAction::ConfirmDelivery => "confirm_delivery",
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub action: OrderAction,
    pub role: Role,
    pub to: OrderStatus,
}

const fn row(from: OrderStatus, action: OrderAction, role: Role, to: OrderStatus) -> Transition {
    Transition {
        from,
        action,
        role,
        to,
    }
}

/// The complete lifecycle
pub const TRANSITIONS: &[Transition] = &[
    row(OrderStatus::Pending, OrderAction::Accept, Role::CardHolder, OrderStatus::Accepted),
    row(OrderStatus::Pending, OrderAction::Cancel, Role::Buyer, OrderStatus::Cancelled),
    row(OrderStatus::Accepted, OrderAction::Cancel, Role::Buyer, OrderStatus::Cancelled),
    row(
        OrderStatus::Accepted,
        OrderAction::CancelAcceptance,
        Role::CardHolder,
        OrderStatus::Cancelled,
    ),
    row(
        OrderStatus::Accepted,
        OrderAction::ConfirmPayment,
        Role::Buyer,
        OrderStatus::PaymentConfirmed,
    ),
    row(
        OrderStatus::PaymentConfirmed,
        OrderAction::UploadProof,
        Role::Buyer,
        OrderStatus::ProofUploaded,
    ),
    row(
        OrderStatus::ProofUploaded,
        OrderAction::ConfirmDelivery,
        Role::CardHolder,
        OrderStatus::Completed,
    ),
];

/// Why a transition was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("order is already {status}; no further changes are possible")]
    Terminal { status: OrderStatus },

    #[error("a {role} cannot {action} an order that is {status}")]
    NotPermitted {
        action: OrderAction,
        role: Role,
        status: OrderStatus,
    },
}

/// Status reached by `action`, or why it is refused
pub fn next_status(
    role: Role,
    from: OrderStatus,
    action: OrderAction,
) -> Result<OrderStatus, TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal { status: from });
    }
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.action == action && t.role == role)
        .map(|t| t.to)
        .ok_or(TransitionError::NotPermitted {
            action,
            role,
            status: from,
        })
}

/// Actions `role` may take on an order in `status`, in table order
pub fn allowed_actions(role: Role, status: OrderStatus) -> Vec<OrderAction> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == status && t.role == role)
        .map(|t| t.action)
        .collect()
}

/// Which cancel variant applies to `role` on an order in `status`
pub fn cancel_action_for(role: Role, status: OrderStatus) -> Option<OrderAction> {
    allowed_actions(role, status)
        .into_iter()
        .find(|a| matches!(a, OrderAction::Cancel | OrderAction::CancelAcceptance))
}

/// Status every row for `action` leads to
pub fn target_status(action: OrderAction) -> Option<OrderStatus> {
    TRANSITIONS.iter().find(|t| t.action == action).map(|t| t.to)
}

/// Whether any row grants `action` to `role`
pub fn role_may(role: Role, action: OrderAction) -> bool {
    TRANSITIONS
        .iter()
        .any(|t| t.role == role && t.action == action)
}
