//! Relay Client - order lifecycle client for the purchasing marketplace
//!
//! - [`http`]: bearer-authenticated transport over reqwest
//! - [`api`]: typed order endpoints
//! - [`repository`]: single-writer cache of the user's order lists
//! - [`detail`]: role-gated controller for one order
//! - [`notify`]: user-facing notices

pub mod api;
pub mod config;
pub mod detail;
pub mod error;
pub mod http;
pub mod logger;
pub mod notify;
pub mod proof;
pub mod repository;
pub mod session;

pub use api::{OrderApi, RestOrderApi};
pub use config::ClientConfig;
pub use detail::OrderDetail;
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, NetworkHttpClient};
pub use notify::{BroadcastNotifier, LogNotifier, Notice, NoticeLevel, Notifier};
pub use proof::ProofFile;
pub use repository::{OrderRepository, OrderState};
pub use session::Session;

// Re-export shared types for convenience
pub use shared::client::{Role, SessionUser};
pub use shared::order::{
    CreateOrderRequest, ExploreQuery, Order, OrderAction, OrderQuery, OrderStatus,
};

use std::sync::Arc;

/// Wire the REST stack and start a repository for `session`
pub fn connect(
    config: &ClientConfig,
    session: Session,
    notifier: Arc<dyn Notifier>,
) -> ClientResult<OrderRepository> {
    let http = NetworkHttpClient::new(&session.apply(config.clone()))?;
    let api: Arc<dyn OrderApi> = Arc::new(RestOrderApi::new(http));
    Ok(OrderRepository::spawn(
        api,
        session,
        notifier,
        config.command_buffer,
    ))
}
