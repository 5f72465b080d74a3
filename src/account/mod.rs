/// Account management system
///
/// Holds user identities, credentials, roles and account status.

mod manager;

pub use manager::{hash_password, verify_password, AccountManager};

use crate::error::{KoiError, KoiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Organizer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Organizer => "organizer",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "organizer" => Ok(Role::Organizer),
            "admin" => Ok(Role::Admin),
            _ => Err(KoiError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Organizers and admins may submit events and propose categories
    pub fn can_organize(&self) -> bool {
        matches!(self, Role::Organizer | Role::Admin)
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Banned,
    Restricted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Banned => "banned",
            AccountStatus::Restricted => "restricted",
        }
    }

    pub fn from_str(s: &str) -> KoiResult<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "banned" => Ok(AccountStatus::Banned),
            "restricted" => Ok(AccountStatus::Restricted),
            _ => Err(KoiError::Validation(format!("Invalid account status: {}", s))),
        }
    }
}

/// User record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub account_status: AccountStatus,
    pub status_reason: Option<String>,
    pub status_changed_at: Option<DateTime<Utc>>,
    /// Admin who last changed the status (lookup only)
    pub status_changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Reject accounts that may not use the service
    pub fn ensure_usable(&self) -> KoiResult<()> {
        let reason = || {
            self.status_reason
                .clone()
                .unwrap_or_else(|| "No reason provided".to_string())
        };
        match self.account_status {
            AccountStatus::Banned => Err(KoiError::AccountBanned(reason())),
            AccountStatus::Suspended => Err(KoiError::AccountSuspended(reason())),
            AccountStatus::Active | AccountStatus::Restricted => Ok(()),
        }
    }
}

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Session response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("organizer").unwrap(), Role::Organizer);
        assert_eq!(Role::from_str("ADMIN").unwrap(), Role::Admin);
        assert!(Role::from_str("superadmin").is_err());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            AccountStatus::from_str("restricted").unwrap(),
            AccountStatus::Restricted
        );
        assert!(AccountStatus::from_str("deleted").is_err());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: "u1".to_string(),
            name: "Koi".to_string(),
            email: "koi@example.edu".to_string(),
            password_hash: "secret-hash".to_string(),
            role: Role::User,
            account_status: AccountStatus::Active,
            status_reason: None,
            status_changed_at: None,
            status_changed_by: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["accountStatus"], "active");
    }

    #[test]
    fn test_signup_validation() {
        let req = SignupRequest {
            name: "Koi".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            role: None,
        };
        assert!(req.validate().is_err());
    }
}
