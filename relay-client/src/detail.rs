//! Single-order controller
//!
//! Offers exactly the actions the lifecycle table grants the session's role
//! for the order's current status. After every action the order is fetched
//! again and the local copy replaced.

use crate::proof::ProofFile;
use crate::repository::OrderRepository;
use crate::{ClientError, ClientResult};
use shared::client::SessionUser;
use shared::order::{Order, OrderAction, TransitionError, lifecycle};

pub struct OrderDetail {
    repository: OrderRepository,
    user: SessionUser,
    order_id: String,
    order: Option<Order>,
}

impl OrderDetail {
    pub fn new(repository: OrderRepository, user: SessionUser, order_id: impl Into<String>) -> Self {
        Self {
            repository,
            user,
            order_id: order_id.into(),
            order: None,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Last fetched copy
    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Fetch the order and replace the local copy
    pub async fn load(&mut self) -> ClientResult<&Order> {
        match self.repository.get_order(&self.order_id).await {
            Ok(order) => Ok(self.order.insert(order)),
            Err(err) => {
                tracing::warn!(order_id = %self.order_id, error = %err, "Failed to load order");
                Err(err)
            }
        }
    }

    /// Actions available right now; empty until loaded
    pub fn allowed_actions(&self) -> Vec<OrderAction> {
        self.order
            .as_ref()
            .map(|o| lifecycle::allowed_actions(self.user.role, o.status))
            .unwrap_or_default()
    }

    pub fn can(&self, action: OrderAction) -> bool {
        self.allowed_actions().contains(&action)
    }

    pub async fn accept(&mut self) -> ClientResult<()> {
        self.ensure(OrderAction::Accept).await?;
        self.repository.accept_order(&self.order_id).await?;
        self.reload(OrderAction::Accept).await
    }

    /// Buyers cancel the order; card holders cancel their acceptance
    pub async fn cancel(&mut self, reason: Option<String>) -> ClientResult<()> {
        let status = self.current().await?.status;
        let action = lifecycle::cancel_action_for(self.user.role, status).ok_or(
            ClientError::Transition(TransitionError::NotPermitted {
                action: OrderAction::Cancel,
                role: self.user.role,
                status,
            }),
        )?;

        match action {
            OrderAction::CancelAcceptance => {
                self.repository
                    .cancel_acceptance(&self.order_id, reason)
                    .await?
            }
            _ => self.repository.cancel_order(&self.order_id, reason).await?,
        }
        self.reload(action).await
    }

    pub async fn confirm_payment(&mut self) -> ClientResult<()> {
        self.ensure(OrderAction::ConfirmPayment).await?;
        self.repository.confirm_payment(&self.order_id).await?;
        self.reload(OrderAction::ConfirmPayment).await
    }

    pub async fn upload_proof(&mut self, proof: ProofFile) -> ClientResult<()> {
        self.ensure(OrderAction::UploadProof).await?;
        self.repository.upload_proof(&self.order_id, proof).await?;
        self.reload(OrderAction::UploadProof).await
    }

    pub async fn confirm_delivery(&mut self) -> ClientResult<()> {
        self.ensure(OrderAction::ConfirmDelivery).await?;
        self.repository.confirm_delivery(&self.order_id).await?;
        self.reload(OrderAction::ConfirmDelivery).await
    }

    async fn current(&mut self) -> ClientResult<&Order> {
        if self.order.is_none() {
            self.load().await?;
        }
        self.order
            .as_ref()
            .ok_or_else(|| ClientError::NotFound(self.order_id.clone()))
    }

    async fn ensure(&mut self, action: OrderAction) -> ClientResult<()> {
        let role = self.user.role;
        let status = self.current().await?.status;
        lifecycle::next_status(role, status, action)?;
        Ok(())
    }

    /// The action already succeeded; without a fresh copy the old one moves to
    /// the status the action leads to
    async fn reload(&mut self, action: OrderAction) -> ClientResult<()> {
        if self.load().await.is_err() {
            if let (Some(order), Some(status)) =
                (self.order.as_mut(), lifecycle::target_status(action))
            {
                order.status = status;
            }
        }
        Ok(())
    }
}
