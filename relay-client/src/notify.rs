//! User-facing notifications
//!
//! The repository reports every outcome as a [`Notice`]. How notices reach the
//! user is up to the [`Notifier`] handed to it at construction.

use crate::ClientError;
use serde::Serialize;
use tokio::sync::broadcast;

/// Shown when a failure carries no backend message
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A transient message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Error notice using the backend's message, else `fallback`
    pub fn failure(title: impl Into<String>, err: &ClientError, fallback: &str) -> Self {
        let description = err.user_message().unwrap_or_else(|| fallback.to_string());
        Self::error(title, description)
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Sink for notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => {
                tracing::info!(title = %notice.title, "{}", notice.description)
            }
            NoticeLevel::Error => {
                tracing::warn!(title = %notice.title, "{}", notice.description)
            }
        }
    }
}

/// Fans notices out to every subscriber
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_failure_prefers_backend_message() {
        let err = ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            code: None,
            message: "Order already accepted".into(),
        };
        let notice = Notice::failure("Failed to accept order", &err, GENERIC_FAILURE);
        assert!(notice.is_error());
        assert_eq!(notice.description, "Order already accepted");

        let notice = Notice::failure("Failed to accept order", &ClientError::Closed, GENERIC_FAILURE);
        assert_eq!(notice.description, GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::new(4);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.notify(Notice::success("Order created", "done"));

        assert_eq!(a.recv().await.unwrap().title, "Order created");
        assert_eq!(b.recv().await.unwrap().level, NoticeLevel::Success);
    }

    #[test]
    fn test_broadcast_without_subscribers_does_not_fail() {
        BroadcastNotifier::new(1).notify(Notice::error("x", "y"));
        LogNotifier.notify(Notice::error("x", "y"));
    }
}
