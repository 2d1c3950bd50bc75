//! Error codes reported by the marketplace backend
//!
//! Codes are grouped by range:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 9xxx: System errors

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend error code
///
/// Serialized as a bare `u16` so the payload stays readable from any client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Caller is authenticated but not allowed
    PermissionDenied = 2001,
    /// Caller's role cannot perform the operation
    RoleRequired = 2002,

    // ==================== 4xxx: Order ====================
    /// Transition not permitted from the current status
    InvalidTransition = 4001,
    /// Order already reached a terminal status
    OrderTerminal = 4002,
    /// Proof upload carried no file
    ProofMissing = 4003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
}

impl ErrorCode {
    /// Numeric code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Default human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Your role cannot perform this action",
            ErrorCode::InvalidTransition => "Order cannot move to that status",
            ErrorCode::OrderTerminal => "Order is already completed or cancelled",
            ErrorCode::ProofMissing => "Proof file is required",
            ErrorCode::InternalError => "Internal server error",
        }
    }

    /// HTTP status the backend answers with for this code
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidRequest
            | ErrorCode::InvalidTransition
            | ErrorCode::OrderTerminal
            | ErrorCode::ProofMissing => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::PermissionDenied | ErrorCode::RoleRequired => StatusCode::FORBIDDEN,
            ErrorCode::Unknown | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Returned when a numeric code has no matching variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            5 => ErrorCode::InvalidRequest,
            1001 => ErrorCode::NotAuthenticated,
            2001 => ErrorCode::PermissionDenied,
            2002 => ErrorCode::RoleRequired,
            4001 => ErrorCode::InvalidTransition,
            4002 => ErrorCode::OrderTerminal,
            4003 => ErrorCode::ProofMissing,
            9001 => ErrorCode::InternalError,
            other => return Err(InvalidErrorCode(other)),
        })
    }
}
