//! User model

use std::fmt;

use serde::{Deserialize, Serialize};

use super::versioned::Versioned;

/// A till operator account.
///
/// `password` holds a hash produced by the credential service; it is stored
/// as-is and never serialized back out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// admin, cashier
    #[serde(default)]
    pub role: String,
    #[serde(default, alias = "deviceId")]
    pub device_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default, alias = "createdAt")]
    pub created_at: i64,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: i64,
}

impl fmt::Debug for User {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .field("device_id", &self.device_id)
            .field("version", &self.version)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl Versioned for User {
    const ENTITY: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn normalize(&mut self, now_ms: i64) {
        if self.version <= 0 {
            self.version = 1;
        }
        if self.created_at <= 0 {
            self.created_at = now_ms;
        }
        if self.updated_at <= 0 {
            self.updated_at = now_ms;
        }
    }

    fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User {
            id: "u1".to_string(),
            name: "Wanjiru".to_string(),
            email: "wanjiru@example.com".to_string(),
            password: "$2a$10$hash".to_string(),
            role: "cashier".to_string(),
            device_id: "device-1".to_string(),
            version: 1,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn password_is_never_serialized() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("$2a$10$hash"));
    }

    #[test]
    fn password_is_accepted_on_input() {
        let user: User =
            serde_json::from_str(r#"{"id":"u1","password":"opaque","deviceId":"d9"}"#).unwrap();
        assert_eq!(user.password, "opaque");
        assert_eq!(user.device_id, "d9");
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("$2a$10$hash"));
        assert!(debug.contains("[REDACTED]"));
    }
}
