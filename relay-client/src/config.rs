//! Client configuration
//!
//! | Variable | Default |
//! |----------|---------|
//! | `RELAY_API_URL` | `http://localhost:5000` |
//! | `RELAY_TOKEN` | none |
//! | `RELAY_TIMEOUT_SECS` | `30` |
//! | `RELAY_COMMAND_BUFFER` | `32` |
//! | `RELAY_NOTICE_CAPACITY` | `64` |

use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Client configuration for connecting to the marketplace backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (e.g., "http://localhost:5000")
    pub base_url: String,

    /// Bearer token for authentication
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Pending commands the order repository queues before callers wait
    pub command_buffer: usize,

    /// Notices kept for slow broadcast subscribers
    pub notice_capacity: usize,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: 30,
            command_buffer: 32,
            notice_capacity: 64,
        }
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("RELAY_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let defaults = Self::new(base_url);

        Self {
            token: std::env::var("RELAY_TOKEN").ok().filter(|t| !t.is_empty()),
            timeout: env_parse("RELAY_TIMEOUT_SECS").unwrap_or(defaults.timeout),
            command_buffer: env_parse("RELAY_COMMAND_BUFFER")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.command_buffer),
            notice_capacity: env_parse("RELAY_NOTICE_CAPACITY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.notice_capacity),
            ..defaults
        }
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size.max(1);
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.timeout_duration(), Duration::from_secs(30));
        assert_eq!(config.command_buffer, 32);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("http://api.example")
            .with_token("abc")
            .with_timeout(5)
            .with_command_buffer(0);
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.timeout, 5);
        assert_eq!(config.command_buffer, 1);
    }
}
