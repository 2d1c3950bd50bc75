//! Order model and lifecycle
//!
//! - `types`: the wire model, status enum and request DTOs
//! - `lifecycle`: the role-gated transition table

pub mod lifecycle;
pub mod types;

// Re-exports
pub use lifecycle::{OrderAction, Transition, TransitionError, TRANSITIONS};
pub use types::*;
