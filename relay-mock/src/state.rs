//! In-memory system of record
//!
//! Enforces the lifecycle table plus ownership: only the buyer may cancel,
//! confirm payment or upload proof, only the assigned card holder may cancel
//! the acceptance or confirm delivery.

use chrono::Utc;
use shared::client::{Role, SessionUser};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{
    CreateOrderRequest, ExploreQuery, Order, OrderAction, OrderQuery, OrderStatus,
    TransitionError, lifecycle,
};
use shared::validation;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Uploaded proof metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProof {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Bearer token → user
    accounts: HashMap<String, SessionUser>,
    /// Insertion order; listings are newest first
    orders: RwLock<Vec<Order>>,
    proofs: RwLock<HashMap<String, StoredProof>>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, token: impl Into<String>, user: SessionUser) -> Self {
        self.accounts.insert(token.into(), user);
        self
    }

    /// One account per role: `buyer-token`, `holder-token`, `admin-token`
    pub fn demo() -> Self {
        Self::new()
            .with_account("buyer-token", SessionUser::new("buyer-1", "Bea", Role::Buyer))
            .with_account(
                "holder-token",
                SessionUser::new("holder-1", "Hal", Role::CardHolder),
            )
            .with_account("admin-token", SessionUser::new("admin-1", "Ada", Role::Admin))
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&String, &SessionUser)> {
        self.accounts.iter()
    }

    pub fn authenticate(&self, token: &str) -> Option<SessionUser> {
        self.accounts.get(token).cloned()
    }

    // ========== Reads ==========

    pub async fn orders_created_by(&self, user: &SessionUser, query: &OrderQuery) -> Vec<Order> {
        let orders = self.orders.read().await;
        let matching = orders
            .iter()
            .rev()
            .filter(|o| o.buyer_id == user.id)
            .filter(|o| query.status.is_none_or(|s| o.status == s));
        paginate(matching, query.page, query.limit)
    }

    pub async fn orders_accepted_by(&self, user: &SessionUser, query: &OrderQuery) -> Vec<Order> {
        let orders = self.orders.read().await;
        let matching = orders
            .iter()
            .rev()
            .filter(|o| o.card_holder_id.as_deref() == Some(user.id.as_str()))
            .filter(|o| query.status.is_none_or(|s| o.status == s));
        paginate(matching, query.page, query.limit)
    }

    /// Pending orders from other users; `category` matches the store name
    pub async fn explore(&self, user: &SessionUser, query: &ExploreQuery) -> Vec<Order> {
        let orders = self.orders.read().await;
        let matching = orders
            .iter()
            .rev()
            .filter(|o| o.status == OrderStatus::Pending && o.buyer_id != user.id)
            .filter(|o| match (&query.category, &o.store) {
                (None, _) => true,
                (Some(category), Some(store)) => category.eq_ignore_ascii_case(store),
                (Some(_), None) => false,
            });
        paginate(matching, query.page, query.limit)
    }

    pub async fn order(&self, user: &SessionUser, order_id: &str) -> AppResult<Order> {
        let orders = self.orders.read().await;
        let order = orders
            .iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;

        let visible = user.role == Role::Admin
            || order.buyer_id == user.id
            || order.card_holder_id.as_deref() == Some(user.id.as_str())
            || (user.role == Role::CardHolder && order.status == OrderStatus::Pending);
        if !visible {
            return Err(AppError::forbidden("You are not a participant of this order"));
        }
        Ok(order.clone())
    }

    pub async fn proof(&self, order_id: &str) -> Option<StoredProof> {
        self.proofs.read().await.get(order_id).cloned()
    }

    // ========== Writes ==========

    pub async fn create(&self, user: &SessionUser, request: CreateOrderRequest) -> AppResult<Order> {
        if user.role != Role::Buyer {
            return Err(AppError::with_message(
                ErrorCode::RoleRequired,
                "Only buyers can create orders",
            ));
        }
        validation::validate_create_order(&request).map_err(|e| AppError::validation(e.to_string()))?;

        let order = Order::new_pending(uuid::Uuid::new_v4().to_string(), user, request, Utc::now());
        self.orders.write().await.push(order.clone());
        tracing::info!(order_id = %order.id, buyer_id = %user.id, "Order created");
        Ok(order)
    }

    /// Apply `action` on behalf of `user`
    pub async fn transition(
        &self,
        user: &SessionUser,
        order_id: &str,
        action: OrderAction,
        reason: Option<String>,
    ) -> AppResult<Order> {
        validation::validate_cancel_reason(reason.as_deref())
            .map_err(|e| AppError::validation(e.to_string()))?;

        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;

        check_ownership(order, user, action)?;

        let mut updated = order.clone();
        updated
            .apply_transition(action, user, Utc::now(), reason)
            .map_err(transition_error)?;
        if let Some(violation) = updated.invariant_violation() {
            tracing::error!(order_id, %action, violation, "Transition broke an order invariant");
            return Err(AppError::new(ErrorCode::InternalError));
        }

        *order = updated.clone();
        tracing::info!(order_id, %action, status = %updated.status, user_id = %user.id, "Order transitioned");
        Ok(updated)
    }

    /// Store a proof file and move the order to `proof_uploaded`
    pub async fn upload_proof(
        &self,
        user: &SessionUser,
        order_id: &str,
        proof: StoredProof,
    ) -> AppResult<Order> {
        if proof.size == 0 {
            return Err(AppError::new(ErrorCode::ProofMissing));
        }
        let mut order = self
            .transition(user, order_id, OrderAction::UploadProof, None)
            .await?;

        let proof_url = format!("/uploads/proofs/{order_id}/{}", proof.file_name);
        {
            let mut orders = self.orders.write().await;
            if let Some(stored) = orders.iter_mut().find(|o| o.id == order_id) {
                stored.proof_url = Some(proof_url.clone());
            }
        }
        self.proofs.write().await.insert(order_id.to_string(), proof);

        order.proof_url = Some(proof_url);
        Ok(order)
    }
}

fn check_ownership(order: &Order, user: &SessionUser, action: OrderAction) -> AppResult<()> {
    let allowed = match action {
        OrderAction::Accept => order.buyer_id != user.id,
        OrderAction::Cancel | OrderAction::ConfirmPayment | OrderAction::UploadProof => {
            order.buyer_id == user.id
        }
        OrderAction::CancelAcceptance | OrderAction::ConfirmDelivery => {
            order.card_holder_id.as_deref() == Some(user.id.as_str())
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "You cannot {action} order {}",
            order.id
        )))
    }
}

fn transition_error(err: TransitionError) -> AppError {
    let code = match &err {
        TransitionError::Terminal { .. } => ErrorCode::OrderTerminal,
        TransitionError::NotPermitted { action, role, .. } if !lifecycle::role_may(*role, *action) => {
            ErrorCode::RoleRequired
        }
        TransitionError::NotPermitted { .. } => ErrorCode::InvalidTransition,
    };
    AppError::with_message(code, err.to_string())
}

fn paginate<'a>(
    orders: impl Iterator<Item = &'a Order>,
    page: Option<u32>,
    limit: Option<u32>,
) -> Vec<Order> {
    let orders = orders.cloned();
    match limit {
        Some(limit) => {
            let skip = page.unwrap_or(1).saturating_sub(1) as usize * limit as usize;
            orders.skip(skip).take(limit as usize).collect()
        }
        None => orders.collect(),
    }
}
