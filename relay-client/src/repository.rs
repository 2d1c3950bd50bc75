//! Order repository
//!
//! One task owns the cached order lists and applies commands strictly in
//! arrival order. Callers talk to it through the cloneable [`OrderRepository`]
//! handle and observe state through a watch channel.
//!
//! ```text
//! OrderRepository ──mpsc<Command>──▶ RepositoryWorker ──▶ OrderApi
//!        ▲                                  │
//!        └────────── watch<OrderState> ◀────┘
//! ```
//!
//! # Mutation flow
//!
//! ```text
//! mutate(order_id, mutation)
//!     ├─ 1. Role checked against the lifecycle table
//!     ├─ 2. Request sent; the backend judges the order's status
//!     ├─ 3. Target status written into every cached copy and published
//!     ├─ 4. Notice sent
//!     └─ 5. mine, accepted (and available once loaded) re-fetched
//!           (also after a backend rejection)
//! ```

use crate::api::OrderApi;
use crate::notify::{GENERIC_FAILURE, Notice, Notifier};
use crate::proof::ProofFile;
use crate::session::Session;
use crate::{ClientError, ClientResult};
use shared::client::SessionUser;
use shared::order::{
    CreateOrderRequest, ExploreQuery, Order, OrderAction, OrderQuery, OrderStatus, lifecycle,
};
use shared::validation;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Shown when order creation fails without a backend message
pub const CREATE_FAILURE: &str = "Failed to create order. Please try again.";

// ============================================================================
// State
// ============================================================================

/// Cached order lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderState {
    /// Orders created by the current user, newest first
    pub mine: Vec<Order>,
    /// Orders accepted by the current user
    pub accepted: Vec<Order>,
    /// Explore feed; stays empty until first fetched
    pub available: Vec<Order>,
    /// A command is being processed
    pub loading: bool,
}

impl OrderState {
    /// First cached copy of an order
    pub fn find(&self, order_id: &str) -> Option<&Order> {
        [&self.mine, &self.accepted, &self.available]
            .into_iter()
            .find_map(|list| list.iter().find(|o| o.id == order_id))
    }

    fn copies_mut<'a>(&'a mut self, order_id: &'a str) -> impl Iterator<Item = &'a mut Order> {
        self.mine
            .iter_mut()
            .chain(self.accepted.iter_mut())
            .chain(self.available.iter_mut())
            .filter(move |o| o.id == order_id)
    }
}

// ============================================================================
// Commands
// ============================================================================

type Reply<T> = oneshot::Sender<ClientResult<T>>;

#[derive(Debug)]
enum Mutation {
    Accept,
    Cancel { reason: Option<String> },
    CancelAcceptance { reason: Option<String> },
    ConfirmPayment,
    UploadProof(ProofFile),
    ConfirmDelivery,
}

impl Mutation {
    fn action(&self) -> OrderAction {
        match self {
            Mutation::Accept => OrderAction::Accept,
            Mutation::Cancel { .. } => OrderAction::Cancel,
            Mutation::CancelAcceptance { .. } => OrderAction::CancelAcceptance,
            Mutation::ConfirmPayment => OrderAction::ConfirmPayment,
            Mutation::UploadProof(_) => OrderAction::UploadProof,
            Mutation::ConfirmDelivery => OrderAction::ConfirmDelivery,
        }
    }

    fn reason(&self) -> Option<&str> {
        match self {
            Mutation::Cancel { reason } | Mutation::CancelAcceptance { reason } => {
                reason.as_deref()
            }
            _ => None,
        }
    }

    fn success_notice(&self) -> Notice {
        let (title, description) = match self {
            Mutation::Accept => ("Order accepted", "You have successfully accepted the order."),
            Mutation::Cancel { .. } => {
                ("Order cancelled", "Your order has been cancelled successfully.")
            }
            Mutation::CancelAcceptance { .. } => (
                "Acceptance cancelled",
                "You have cancelled your acceptance of this order.",
            ),
            Mutation::ConfirmPayment => (
                "Payment confirmed",
                "You have confirmed the payment for this order.",
            ),
            Mutation::UploadProof(_) => {
                ("Proof uploaded", "Purchase proof has been uploaded successfully.")
            }
            Mutation::ConfirmDelivery => (
                "Delivery confirmed",
                "You have confirmed the delivery of this order.",
            ),
        };
        Notice::success(title, description)
    }

    fn failure_title(&self) -> &'static str {
        match self {
            Mutation::Accept => "Failed to accept order",
            Mutation::Cancel { .. } => "Failed to cancel order",
            Mutation::CancelAcceptance { .. } => "Failed to cancel acceptance",
            Mutation::ConfirmPayment => "Failed to confirm payment",
            Mutation::UploadProof(_) => "Failed to upload proof",
            Mutation::ConfirmDelivery => "Failed to confirm delivery",
        }
    }
}

#[derive(Debug)]
enum Command {
    Create {
        request: CreateOrderRequest,
        respond_to: Reply<Order>,
    },
    FetchMine {
        query: OrderQuery,
        respond_to: oneshot::Sender<()>,
    },
    FetchAccepted {
        query: OrderQuery,
        respond_to: oneshot::Sender<()>,
    },
    FetchAvailable {
        query: ExploreQuery,
        respond_to: oneshot::Sender<()>,
    },
    Mutate {
        order_id: String,
        mutation: Mutation,
        respond_to: Reply<()>,
    },
    Get {
        order_id: String,
        respond_to: Reply<Order>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

// ============================================================================
// Worker
// ============================================================================

struct RepositoryWorker {
    api: Arc<dyn OrderApi>,
    user: SessionUser,
    notifier: Arc<dyn Notifier>,
    state: OrderState,
    /// Last query of each list, reused by resyncs
    mine_query: OrderQuery,
    accepted_query: OrderQuery,
    available_query: Option<ExploreQuery>,
    state_tx: watch::Sender<OrderState>,
    receiver: mpsc::Receiver<Command>,
}

impl RepositoryWorker {
    async fn run(mut self) {
        tracing::debug!(user_id = %self.user.id, role = %self.user.role, "Order repository started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                Command::Shutdown { respond_to } => {
                    let _ = respond_to.send(());
                    break;
                }
                command => {
                    self.set_loading(true);
                    self.handle(command).await;
                    self.set_loading(false);
                }
            }
        }

        tracing::debug!("Order repository stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Create {
                request,
                respond_to,
            } => {
                let _ = respond_to.send(self.create(request).await);
            }
            Command::FetchMine { query, respond_to } => {
                self.mine_query = query;
                self.refresh_mine().await;
                let _ = respond_to.send(());
            }
            Command::FetchAccepted { query, respond_to } => {
                self.accepted_query = query;
                self.refresh_accepted().await;
                let _ = respond_to.send(());
            }
            Command::FetchAvailable { query, respond_to } => {
                self.available_query = Some(query);
                self.refresh_available().await;
                let _ = respond_to.send(());
            }
            Command::Mutate {
                order_id,
                mutation,
                respond_to,
            } => {
                let _ = respond_to.send(self.mutate(&order_id, mutation).await);
            }
            Command::Get {
                order_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.get(&order_id).await);
            }
            Command::Shutdown { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn set_loading(&mut self, loading: bool) {
        self.state.loading = loading;
        self.publish();
    }

    // ========== Reads ==========

    async fn refresh_mine(&mut self) {
        match self.api.my_orders(&self.mine_query).await {
            Ok(orders) => {
                self.state.mine = orders;
                self.publish();
            }
            Err(err) => self.report_read_failure("Failed to fetch orders", &err),
        }
    }

    async fn refresh_accepted(&mut self) {
        match self.api.my_accepted_orders(&self.accepted_query).await {
            Ok(orders) => {
                self.state.accepted = orders;
                self.publish();
            }
            Err(err) => self.report_read_failure("Failed to fetch accepted orders", &err),
        }
    }

    async fn refresh_available(&mut self) {
        let Some(query) = self.available_query.clone() else {
            return;
        };
        match self.api.explore_orders(&query).await {
            Ok(orders) => {
                self.state.available = orders;
                self.publish();
            }
            Err(err) => self.report_read_failure("Failed to fetch available orders", &err),
        }
    }

    fn report_read_failure(&self, title: &str, err: &ClientError) {
        tracing::warn!(error = %err, "{title}");
        self.notifier
            .notify(Notice::failure(title, err, GENERIC_FAILURE));
    }

    async fn resync(&mut self) {
        self.refresh_mine().await;
        self.refresh_accepted().await;
        if self.available_query.is_some() {
            self.refresh_available().await;
        }
    }

    async fn get(&mut self, order_id: &str) -> ClientResult<Order> {
        let order = self.api.get_order(order_id).await?;
        for copy in self.state.copies_mut(order_id) {
            *copy = order.clone();
        }
        self.publish();
        Ok(order)
    }

    // ========== Mutations ==========

    #[tracing::instrument(skip_all, fields(product = %request.product_name))]
    async fn create(&mut self, request: CreateOrderRequest) -> ClientResult<Order> {
        let result = match validation::validate_create_order(&request) {
            Ok(()) => self.api.create_order(&request).await,
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(order) => {
                tracing::info!(order_id = %order.id, "Order created");
                self.state.mine.insert(0, order.clone());
                self.publish();
                self.notifier.notify(Notice::success(
                    "Order created",
                    "Your order has been created successfully.",
                ));
                Ok(order)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Order creation failed");
                self.notifier
                    .notify(Notice::failure("Order creation failed", &err, CREATE_FAILURE));
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self, mutation), fields(action = %mutation.action()))]
    async fn mutate(&mut self, order_id: &str, mutation: Mutation) -> ClientResult<()> {
        match self.send_mutation(order_id, &mutation).await {
            Ok(()) => {
                let target = lifecycle::target_status(mutation.action());
                if let Some(status) = target {
                    self.patch_status(order_id, status);
                }
                tracing::info!(?target, "Order transition confirmed");
                self.notifier.notify(mutation.success_notice());
                self.resync().await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Order transition failed");
                self.notifier.notify(Notice::failure(
                    mutation.failure_title(),
                    &err,
                    GENERIC_FAILURE,
                ));
                // The backend saw a state our copies did not
                if matches!(err, ClientError::Api { .. }) {
                    self.resync().await;
                }
                Err(err)
            }
        }
    }

    async fn send_mutation(&self, order_id: &str, mutation: &Mutation) -> ClientResult<()> {
        self.check(mutation.action())?;
        validation::validate_cancel_reason(mutation.reason())?;

        match mutation {
            Mutation::Accept => self.api.accept_order(order_id).await,
            Mutation::Cancel { reason } => self.api.cancel_order(order_id, reason.as_deref()).await,
            Mutation::CancelAcceptance { reason } => {
                self.api
                    .cancel_acceptance(order_id, reason.as_deref())
                    .await
            }
            Mutation::ConfirmPayment => self.api.confirm_payment(order_id).await,
            Mutation::UploadProof(proof) => {
                if proof.is_empty() {
                    return Err(ClientError::Validation(
                        "proof: a non-empty file is required".into(),
                    ));
                }
                self.api.upload_proof(order_id, proof).await
            }
            Mutation::ConfirmDelivery => self.api.confirm_delivery(order_id).await,
        }
    }

    /// Role gate applied before any request leaves the client.
    ///
    /// Cached copies may be stale, so the order's status is left to the backend.
    fn check(&self, action: OrderAction) -> ClientResult<()> {
        let role = self.user.role;
        if !lifecycle::role_may(role, action) {
            return Err(ClientError::Forbidden(format!(
                "a {role} cannot {action} orders"
            )));
        }
        Ok(())
    }

    fn patch_status(&mut self, order_id: &str, status: OrderStatus) {
        for copy in self.state.copies_mut(order_id) {
            copy.status = status;
        }
        self.publish();
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to the order repository task
#[derive(Clone)]
pub struct OrderRepository {
    sender: mpsc::Sender<Command>,
    state_rx: watch::Receiver<OrderState>,
    user: SessionUser,
}

impl std::fmt::Debug for OrderRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderRepository")
            .field("user_id", &self.user.id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl OrderRepository {
    /// Start the repository task. Must be called inside a tokio runtime.
    pub fn spawn(
        api: Arc<dyn OrderApi>,
        session: Session,
        notifier: Arc<dyn Notifier>,
        buffer: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let (state_tx, state_rx) = watch::channel(OrderState::default());

        let worker = RepositoryWorker {
            api,
            user: session.user.clone(),
            notifier,
            state: OrderState::default(),
            mine_query: OrderQuery::default(),
            accepted_query: OrderQuery::default(),
            available_query: None,
            state_tx,
            receiver,
        };
        tokio::spawn(worker.run());

        Self {
            sender,
            state_rx,
            user: session.user,
        }
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    /// Snapshot of the cached lists
    pub fn state(&self) -> OrderState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that sees every published state
    pub fn subscribe(&self) -> watch::Receiver<OrderState> {
        self.state_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ClientResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(command(tx))
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    async fn mutate(&self, order_id: &str, mutation: Mutation) -> ClientResult<()> {
        let order_id = order_id.to_string();
        self.request(|respond_to| Command::Mutate {
            order_id,
            mutation,
            respond_to,
        })
        .await?
    }

    async fn read(&self, command: impl FnOnce(oneshot::Sender<()>) -> Command) {
        if let Err(err) = self.request(command).await {
            tracing::warn!(error = %err, "Order list fetch was not processed");
        }
    }

    // ========== Reads ==========

    /// Replace `mine`; failures are notified, never returned
    pub async fn fetch_orders(&self, query: OrderQuery) {
        self.read(|respond_to| Command::FetchMine { query, respond_to })
            .await
    }

    /// Replace `accepted`; failures are notified, never returned
    pub async fn fetch_accepted_orders(&self, query: OrderQuery) {
        self.read(|respond_to| Command::FetchAccepted { query, respond_to })
            .await
    }

    /// Replace `available`; failures are notified, never returned
    pub async fn fetch_available_orders(&self, query: ExploreQuery) {
        self.read(|respond_to| Command::FetchAvailable { query, respond_to })
            .await
    }

    /// Fetch one order and replace every cached copy of it
    pub async fn get_order(&self, order_id: &str) -> ClientResult<Order> {
        let order_id = order_id.to_string();
        self.request(|respond_to| Command::Get {
            order_id,
            respond_to,
        })
        .await?
    }

    // ========== Mutations ==========

    pub async fn create_order(&self, request: CreateOrderRequest) -> ClientResult<Order> {
        self.request(|respond_to| Command::Create {
            request,
            respond_to,
        })
        .await?
    }

    pub async fn accept_order(&self, order_id: &str) -> ClientResult<()> {
        self.mutate(order_id, Mutation::Accept).await
    }

    /// Buyer withdraws the order
    pub async fn cancel_order(&self, order_id: &str, reason: Option<String>) -> ClientResult<()> {
        self.mutate(order_id, Mutation::Cancel { reason }).await
    }

    /// Card holder backs out of an accepted order
    pub async fn cancel_acceptance(
        &self,
        order_id: &str,
        reason: Option<String>,
    ) -> ClientResult<()> {
        self.mutate(order_id, Mutation::CancelAcceptance { reason })
            .await
    }

    pub async fn confirm_payment(&self, order_id: &str) -> ClientResult<()> {
        self.mutate(order_id, Mutation::ConfirmPayment).await
    }

    pub async fn upload_proof(&self, order_id: &str, proof: ProofFile) -> ClientResult<()> {
        self.mutate(order_id, Mutation::UploadProof(proof)).await
    }

    pub async fn confirm_delivery(&self, order_id: &str) -> ClientResult<()> {
        self.mutate(order_id, Mutation::ConfirmDelivery).await
    }

    /// Stop the task once earlier commands are done
    pub async fn shutdown(&self) -> ClientResult<()> {
        self.request(|respond_to| Command::Shutdown { respond_to })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::notify::BroadcastNotifier;
    use async_trait::async_trait;
    use chrono::Utc;
    use reqwest::StatusCode;
    use shared::client::Role;
    use shared::error::ErrorCode;
    use shared::order::TransitionError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    /// In-memory system of record shared by fake sessions
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        orders: Mutex<Vec<Order>>,
        next_id: AtomicUsize,
    }

    pub(crate) struct FakeApi {
        backend: Arc<FakeBackend>,
        user: SessionUser,
        fail_lists: AtomicBool,
        pub(crate) fail_gets: AtomicBool,
        pub(crate) requests: AtomicUsize,
    }

    impl FakeApi {
        pub(crate) fn new(backend: Arc<FakeBackend>, user: SessionUser) -> Self {
            Self {
                backend,
                user,
                fail_lists: AtomicBool::new(false),
                fail_gets: AtomicBool::new(false),
                requests: AtomicUsize::new(0),
            }
        }

        fn list(&self, keep: impl Fn(&Order) -> bool) -> ClientResult<Vec<Order>> {
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    code: None,
                    message: "Backend unavailable".into(),
                });
            }
            let orders = self.backend.orders.lock().unwrap();
            Ok(orders.iter().rev().filter(|o| keep(o)).cloned().collect())
        }

        fn transition(
            &self,
            order_id: &str,
            action: OrderAction,
            reason: Option<&str>,
        ) -> ClientResult<()> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let mut orders = self.backend.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or_else(|| ClientError::NotFound(order_id.to_string()))?;
            order
                .apply_transition(action, &self.user, Utc::now(), reason.map(str::to_string))
                .map_err(|e| ClientError::Api {
                    status: StatusCode::BAD_REQUEST,
                    code: Some(match e {
                        TransitionError::Terminal { .. } => ErrorCode::OrderTerminal,
                        TransitionError::NotPermitted { .. } => ErrorCode::InvalidTransition,
                    }),
                    message: e.to_string(),
                })?;
            Ok(())
        }
    }

    #[async_trait]
    impl OrderApi for FakeApi {
        async fn create_order(&self, request: &CreateOrderRequest) -> ClientResult<Order> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let id = format!("order-{}", self.backend.next_id.fetch_add(1, Ordering::SeqCst));
            let order = Order::new_pending(id, &self.user, request.clone(), Utc::now());
            self.backend.orders.lock().unwrap().push(order.clone());
            Ok(order)
        }

        async fn my_orders(&self, _query: &OrderQuery) -> ClientResult<Vec<Order>> {
            self.list(|o| o.buyer_id == self.user.id)
        }

        async fn my_accepted_orders(&self, _query: &OrderQuery) -> ClientResult<Vec<Order>> {
            self.list(|o| o.card_holder_id.as_deref() == Some(self.user.id.as_str()))
        }

        async fn explore_orders(&self, _query: &ExploreQuery) -> ClientResult<Vec<Order>> {
            self.list(|o| o.status == OrderStatus::Pending)
        }

        async fn accept_order(&self, order_id: &str) -> ClientResult<()> {
            self.transition(order_id, OrderAction::Accept, None)
        }

        async fn cancel_order(&self, order_id: &str, reason: Option<&str>) -> ClientResult<()> {
            self.transition(order_id, OrderAction::Cancel, reason)
        }

        async fn cancel_acceptance(&self, order_id: &str, reason: Option<&str>) -> ClientResult<()> {
            self.transition(order_id, OrderAction::CancelAcceptance, reason)
        }

        async fn confirm_payment(&self, order_id: &str) -> ClientResult<()> {
            self.transition(order_id, OrderAction::ConfirmPayment, None)
        }

        async fn upload_proof(&self, order_id: &str, _proof: &ProofFile) -> ClientResult<()> {
            self.transition(order_id, OrderAction::UploadProof, None)
        }

        async fn confirm_delivery(&self, order_id: &str) -> ClientResult<()> {
            self.transition(order_id, OrderAction::ConfirmDelivery, None)
        }

        async fn get_order(&self, order_id: &str) -> ClientResult<Order> {
            if self.fail_gets.load(Ordering::SeqCst) {
                return Err(ClientError::Internal("connection reset".into()));
            }
            self.backend
                .orders
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == order_id)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(order_id.to_string()))
        }
    }

    pub(crate) fn buyer() -> SessionUser {
        SessionUser::new("buyer-1", "Bea", Role::Buyer)
    }

    pub(crate) fn card_holder() -> SessionUser {
        SessionUser::new("holder-1", "Hal", Role::CardHolder)
    }

    pub(crate) fn request() -> CreateOrderRequest {
        CreateOrderRequest::new("Headphones", "https://shop.example/h1", 120.0, 15.0)
    }

    pub(crate) fn start(
        backend: &Arc<FakeBackend>,
        user: SessionUser,
    ) -> (OrderRepository, Arc<FakeApi>, broadcast::Receiver<Notice>) {
        let api = Arc::new(FakeApi::new(backend.clone(), user.clone()));
        let notifier = BroadcastNotifier::new(32);
        let notices = notifier.subscribe();
        let repository = OrderRepository::spawn(
            api.clone(),
            Session::new(user, None),
            Arc::new(notifier),
            8,
        );
        (repository, api, notices)
    }

    fn drain(notices: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
        std::iter::from_fn(|| notices.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_create_prepends_pending_order() {
        let backend = Arc::new(FakeBackend::default());
        let (repo, _, mut notices) = start(&backend, buyer());

        let first = repo.create_order(request()).await.unwrap();
        let second = repo.create_order(request()).await.unwrap();

        let state = repo.state();
        assert_eq!(state.mine.len(), 2);
        assert_eq!(state.mine[0].id, second.id);
        assert_eq!(state.mine[1].id, first.id);
        assert_eq!(state.mine[0].status, OrderStatus::Pending);
        assert!(state.mine[0].card_holder_id.is_none());

        let notices = drain(&mut notices);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].title, "Order created");
    }

    #[tokio::test]
    async fn test_invalid_create_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let (repo, api, mut notices) = start(&backend, buyer());

        let mut bad = request();
        bad.reward = 0.0;
        let err = repo.create_order(bad).await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(api.requests.load(Ordering::SeqCst), 0);
        assert!(repo.state().mine.is_empty());

        let notice = drain(&mut notices).pop().unwrap();
        assert_eq!(notice.title, "Order creation failed");
        assert!(notice.description.contains("reward"));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_list() {
        let backend = Arc::new(FakeBackend::default());
        let (repo, api, mut notices) = start(&backend, buyer());
        repo.create_order(request()).await.unwrap();
        repo.fetch_orders(OrderQuery::default()).await;
        let before = repo.state().mine;
        drain(&mut notices);

        api.fail_lists.store(true, Ordering::SeqCst);
        repo.fetch_orders(OrderQuery::default()).await;

        assert_eq!(repo.state().mine, before);
        let notice = drain(&mut notices).pop().unwrap();
        assert!(notice.is_error());
        assert_eq!(notice.title, "Failed to fetch orders");
        assert_eq!(notice.description, "Backend unavailable");
    }

    #[tokio::test]
    async fn test_cancel_is_visible_without_resync() {
        let backend = Arc::new(FakeBackend::default());
        let (repo, api, mut notices) = start(&backend, buyer());
        let order = repo.create_order(request()).await.unwrap();
        drain(&mut notices);

        api.fail_lists.store(true, Ordering::SeqCst);
        repo.cancel_order(&order.id, Some("out of stock".into()))
            .await
            .unwrap();

        assert_eq!(repo.state().find(&order.id).unwrap().status, OrderStatus::Cancelled);
        let stored = api.get_order(&order.id).await.unwrap();
        assert_eq!(stored.cancel_reason.as_deref(), Some("out of stock"));

        let titles: Vec<_> = drain(&mut notices).into_iter().map(|n| n.title).collect();
        assert_eq!(titles[0], "Order cancelled");
        assert!(titles.contains(&"Failed to fetch orders".to_string()));
    }

    #[tokio::test]
    async fn test_accept_resyncs_both_lists() {
        let backend = Arc::new(FakeBackend::default());
        let (buyer_repo, _, _) = start(&backend, buyer());
        let (holder_repo, _, _) = start(&backend, card_holder());
        let order = buyer_repo.create_order(request()).await.unwrap();

        holder_repo
            .fetch_available_orders(ExploreQuery::default())
            .await;
        assert_eq!(holder_repo.state().available.len(), 1);

        holder_repo.accept_order(&order.id).await.unwrap();

        let state = holder_repo.state();
        assert_eq!(state.accepted.len(), 1);
        assert_eq!(state.accepted[0].status, OrderStatus::Accepted);
        assert_eq!(state.accepted[0].card_holder_id.as_deref(), Some("holder-1"));
        assert!(state.available.is_empty());

        buyer_repo.fetch_orders(OrderQuery::default()).await;
        assert_eq!(buyer_repo.state().mine[0].status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn test_role_gate_rejects_locally() {
        let backend = Arc::new(FakeBackend::default());
        let (repo, api, mut notices) = start(&backend, buyer());
        let order = repo.create_order(request()).await.unwrap();
        let sent = api.requests.load(Ordering::SeqCst);
        drain(&mut notices);

        let err = repo.accept_order(&order.id).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));
        assert_eq!(api.requests.load(Ordering::SeqCst), sent);
        assert_eq!(drain(&mut notices)[0].title, "Failed to accept order");
    }

    #[tokio::test]
    async fn test_terminal_order_is_rejected_by_backend() {
        let backend = Arc::new(FakeBackend::default());
        let (repo, api, mut notices) = start(&backend, buyer());
        let order = repo.create_order(request()).await.unwrap();
        repo.cancel_order(&order.id, None).await.unwrap();
        let sent = api.requests.load(Ordering::SeqCst);
        drain(&mut notices);

        let err = repo.confirm_payment(&order.id).await.unwrap_err();
        match err {
            ClientError::Api { code, .. } => assert_eq!(code, Some(ErrorCode::OrderTerminal)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.requests.load(Ordering::SeqCst), sent + 1);
        assert_eq!(repo.state().find(&order.id).unwrap().status, OrderStatus::Cancelled);
        assert_eq!(drain(&mut notices)[0].title, "Failed to confirm payment");
    }

    #[tokio::test]
    async fn test_stale_cache_does_not_block_valid_transition() {
        let backend = Arc::new(FakeBackend::default());
        let (buyer_repo, buyer_api, _) = start(&backend, buyer());
        let (holder_repo, _, _) = start(&backend, card_holder());
        let order = buyer_repo.create_order(request()).await.unwrap();
        holder_repo.accept_order(&order.id).await.unwrap();

        // The buyer's copy still says pending
        assert_eq!(buyer_repo.state().mine[0].status, OrderStatus::Pending);
        let sent = buyer_api.requests.load(Ordering::SeqCst);

        buyer_repo.confirm_payment(&order.id).await.unwrap();

        assert_eq!(buyer_api.requests.load(Ordering::SeqCst), sent + 1);
        let cached = buyer_repo.state().find(&order.id).cloned().unwrap();
        assert_eq!(cached.status, OrderStatus::PaymentConfirmed);
        assert_eq!(cached.card_holder_id.as_deref(), Some("holder-1"));
    }

    #[tokio::test]
    async fn test_backend_rejection_resyncs_stale_copy() {
        let backend = Arc::new(FakeBackend::default());
        let (buyer_repo, _, _) = start(&backend, buyer());
        let (holder_repo, _, _) = start(&backend, card_holder());
        let order = buyer_repo.create_order(request()).await.unwrap();
        holder_repo.accept_order(&order.id).await.unwrap();
        holder_repo.cancel_acceptance(&order.id, None).await.unwrap();

        assert!(buyer_repo.confirm_payment(&order.id).await.is_err());
        assert_eq!(buyer_repo.state().mine[0].status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_serialize() {
        let backend = Arc::new(FakeBackend::default());
        let (buyer_repo, buyer_api, _) = start(&backend, buyer());
        let (holder_repo, _, _) = start(&backend, card_holder());
        let order = buyer_repo.create_order(request()).await.unwrap();
        holder_repo.accept_order(&order.id).await.unwrap();
        buyer_repo.fetch_orders(OrderQuery::default()).await;

        let (paid, cancelled) = tokio::join!(
            buyer_repo.confirm_payment(&order.id),
            buyer_repo.cancel_order(&order.id, None)
        );
        assert!(paid.is_ok() ^ cancelled.is_ok());

        let stored = buyer_api.get_order(&order.id).await.unwrap();
        let cached = buyer_repo.state().find(&order.id).cloned().unwrap();
        assert_eq!(cached.status, stored.status);
        let expected = if paid.is_ok() {
            OrderStatus::PaymentConfirmed
        } else {
            OrderStatus::Cancelled
        };
        assert_eq!(stored.status, expected);
    }

    #[tokio::test]
    async fn test_get_order_replaces_cached_copies() {
        let backend = Arc::new(FakeBackend::default());
        let (buyer_repo, _, _) = start(&backend, buyer());
        let (holder_repo, _, _) = start(&backend, card_holder());
        let order = buyer_repo.create_order(request()).await.unwrap();
        holder_repo.accept_order(&order.id).await.unwrap();

        // mine still holds the pending copy
        assert_eq!(buyer_repo.state().mine[0].status, OrderStatus::Pending);

        let fresh = buyer_repo.get_order(&order.id).await.unwrap();
        assert_eq!(fresh.status, OrderStatus::Accepted);
        assert_eq!(buyer_repo.state().mine[0], fresh);
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let backend = Arc::new(FakeBackend::default());
        let (repo, _, _) = start(&backend, buyer());
        repo.shutdown().await.unwrap();

        assert!(matches!(
            repo.create_order(request()).await,
            Err(ClientError::Closed)
        ));
        assert!(repo.is_closed());
    }
}
