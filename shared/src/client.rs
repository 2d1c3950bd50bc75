//! Session user types shared between backend and client
//!
//! Only `id` and `role` drive order decisions; the rest is display data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplace role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates orders and pays for products
    Buyer,
    /// Accepts orders, fronts payment, earns the reward
    CardHolder,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::CardHolder => "card_holder",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "buyer" => Ok(Role::Buyer),
            "card_holder" | "cardholder" => Ok(Role::CardHolder),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_verified: Option<bool>,
}

impl SessionUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            role,
            is_verified: false,
            kyc_verified: None,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Participant reference embedded in orders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::CardHolder).unwrap(), "\"card_holder\"");
        let role: Role = serde_json::from_str("\"buyer\"").unwrap();
        assert_eq!(role, Role::Buyer);
    }

    #[test]
    fn test_role_from_str_is_lenient() {
        assert_eq!("Card-Holder".parse::<Role>(), Ok(Role::CardHolder));
        assert_eq!(" admin ".parse::<Role>(), Ok(Role::Admin));
        assert!("seller".parse::<Role>().is_err());
    }

    #[test]
    fn test_session_user_deserializes_profile_payload() {
        let json = r#"{
            "id": "u1",
            "name": "Asha",
            "email": "asha@example.com",
            "role": "card_holder",
            "isVerified": true,
            "trustScore": 4.5
        }"#;
        let user: SessionUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::CardHolder);
        assert!(user.is_verified);
        assert_eq!(user.summary().name, "Asha");
    }
}
