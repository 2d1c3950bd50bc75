//! Client error types

use reqwest::StatusCode;
use shared::error::ErrorCode;
use shared::order::TransitionError;
use shared::validation::ValidationError;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with an error payload
    #[error("API error {status}: {message}")]
    Api {
        status: StatusCode,
        code: Option<ErrorCode>,
        message: String,
    },

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before sending
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lifecycle table refuses the action
    #[error("Transition refused: {0}")]
    Transition(#[from] TransitionError),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local file access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The repository task has stopped
    #[error("Order repository is closed")]
    Closed,
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        ClientError::Validation(err.to_string())
    }
}

impl ClientError {
    /// Message for a notification, `None` when a generic fallback fits better
    pub fn user_message(&self) -> Option<String> {
        match self {
            ClientError::Api { message, .. } if !message.trim().is_empty() => {
                Some(message.clone())
            }
            ClientError::Forbidden(msg)
            | ClientError::NotFound(msg)
            | ClientError::Validation(msg)
                if !msg.trim().is_empty() =>
            {
                Some(msg.clone())
            }
            ClientError::Transition(err) => Some(err.to_string()),
            _ => None,
        }
    }

    /// HTTP status of a backend rejection
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            ClientError::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            ClientError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ClientError::Http(err) => err.status(),
            _ => None,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
