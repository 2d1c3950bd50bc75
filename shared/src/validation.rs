//! Input validation helpers
//!
//! Length limits and checks applied before an order request leaves the client,
//! and again by the backend on arrival.

use crate::order::CreateOrderRequest;
use thiserror::Error;

// ── Limits ──────────────────────────────────────────────────────────

/// Product names
pub const MAX_NAME_LEN: usize = 200;

/// Instructions and cancellation reasons
pub const MAX_NOTE_LEN: usize = 500;

/// Product URLs
pub const MAX_URL_LEN: usize = 2048;

/// Upper bound for amount and reward
pub const MAX_AMOUNT: f64 = 1_000_000.0;

/// A rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

// ── Field checks ────────────────────────────────────────────────────

/// Non-empty after trimming and within `max_len`
pub fn validate_required_text(
    value: &str,
    field: &'static str,
    max_len: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    validate_len(value, field, max_len)
}

/// Within `max_len` when present
pub fn validate_optional_text(
    value: Option<&str>,
    field: &'static str,
    max_len: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(v) => validate_len(v, field, max_len),
        None => Ok(()),
    }
}

fn validate_len(value: &str, field: &'static str, max_len: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max_len {
        return Err(ValidationError::new(
            field,
            format!("is too long ({len} chars, max {max_len})"),
        ));
    }
    Ok(())
}

/// Finite, strictly positive and at most [`MAX_AMOUNT`]
pub fn validate_positive_amount(value: f64, field: &'static str) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(
            field,
            format!("must be a finite number, got {value}"),
        ));
    }
    if value <= 0.0 {
        return Err(ValidationError::new(
            field,
            format!("must be greater than 0, got {value}"),
        ));
    }
    if value > MAX_AMOUNT {
        return Err(ValidationError::new(
            field,
            format!("exceeds maximum allowed ({MAX_AMOUNT}), got {value}"),
        ));
    }
    Ok(())
}

/// Absolute `http`/`https` URL with a host and no whitespace
pub fn validate_http_url(value: &str, field: &'static str) -> Result<(), ValidationError> {
    validate_required_text(value, field, MAX_URL_LEN)?;
    let value = value.trim();
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| ValidationError::new(field, "must start with http:// or https://"))?;

    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::new(field, "must not contain whitespace"));
    }

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    if host.is_empty() {
        return Err(ValidationError::new(field, "must include a host"));
    }
    Ok(())
}

// ── Request checks ──────────────────────────────────────────────────

/// Check a creation request before it is sent or stored
pub fn validate_create_order(req: &CreateOrderRequest) -> Result<(), ValidationError> {
    validate_required_text(&req.product_name, "productName", MAX_NAME_LEN)?;
    validate_http_url(&req.product_url, "productUrl")?;
    validate_positive_amount(req.amount, "amount")?;
    validate_positive_amount(req.reward, "reward")?;
    validate_optional_text(req.instructions.as_deref(), "instructions", MAX_NOTE_LEN)?;
    Ok(())
}

/// Check an optional cancellation reason
pub fn validate_cancel_reason(reason: Option<&str>) -> Result<(), ValidationError> {
    validate_optional_text(reason, "reason", MAX_NOTE_LEN)
}
