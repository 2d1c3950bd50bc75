//! Shared types for the purchasing marketplace
//!
//! Wire types used by both the client crate and the reference backend:
//! orders and their lifecycle, session users, error payloads and input
//! validation.

pub mod client;
pub mod error;
pub mod order;
pub mod validation;

// Re-exports
pub use client::{Role, SessionUser, UserSummary};
pub use error::{AppError, ErrorBody, ErrorCode};
pub use order::{Order, OrderAction, OrderStatus, TransitionError};
pub use serde::{Deserialize, Serialize};
