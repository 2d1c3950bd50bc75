//! Signed-in session

use crate::ClientConfig;
use shared::client::{Role, SessionUser};

/// The current user and their bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: SessionUser,
    pub token: Option<String>,
}

impl Session {
    pub fn new(user: SessionUser, token: Option<String>) -> Self {
        Self { user, token }
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Config with this session's token applied
    pub fn apply(&self, config: ClientConfig) -> ClientConfig {
        match &self.token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }
}
