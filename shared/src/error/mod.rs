//! Error types shared by the backend and the client
//!
//! - [`ErrorCode`]: numeric codes grouped by domain
//! - [`ErrorBody`]: the JSON payload of every non-2xx response
//! - [`AppError`]: backend-side error that renders into an [`ErrorBody`]
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::with_message(ErrorCode::InvalidTransition, "Order is not pending");
//! assert_eq!(err.body().message, "Order is not pending");
//! ```

mod codes;
mod types;

pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, AppResult, ErrorBody};
