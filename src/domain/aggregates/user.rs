//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Staff role. Names are the shop's own vocabulary and are stored verbatim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    /// Salesperson: runs the register.
    #[default]
    Vendedor,
    /// Inventory keeper: manages the catalog.
    Bodeguero,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Admin => "Admin", Self::Vendedor => "Vendedor", Self::Bodeguero => "Bodeguero" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = UnknownRole;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Self::Admin),
            "Vendedor" => Ok(Self::Vendedor),
            "Bodeguero" => Ok(Self::Bodeguero),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role {0:?}")]
pub struct UnknownRole(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(draft: &UserDraft, hashed_password: String) -> Self {
        Self {
            id: Uuid::now_v7(), email: normalize_email(&draft.email), hashed_password,
            full_name: draft.clean_full_name(), role: draft.role, is_active: draft.is_active, created_at: Utc::now(),
        }
    }

    /// Overwrite profile fields. The password is handled by the caller.
    pub fn apply(&mut self, draft: &UserDraft) {
        self.email = normalize_email(&draft.email);
        self.full_name = draft.clean_full_name();
        self.role = draft.role;
        self.is_active = draft.is_active;
    }

    /// Name shown on receipts and reports.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.email)
    }
}

/// Create/edit form for a user. `password` is required on creation and
/// optional on edit (absent keeps the current one).
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct UserDraft {
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 200))]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[validate(length(min = 6, max = 128, message = "password must have at least 6 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_active() -> bool { true }

impl UserDraft {
    fn clean_full_name(&self) -> Option<String> {
        self.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from)
    }
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> UserDraft {
        UserDraft { email: " Ana@Cafe.com ".into(), full_name: Some("  ".into()), role: Role::Vendedor, is_active: true, password: Some("secreto".into()) }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Bodeguero".parse::<Role>().unwrap(), Role::Bodeguero);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_user_normalizes_fields() {
        let user = User::new(&draft(), "hash".into());
        assert_eq!(user.email, "ana@cafe.com");
        assert_eq!(user.full_name, None);
        assert_eq!(user.display_name(), "ana@cafe.com");
    }

    #[test]
    fn test_draft_validation() {
        let mut d = draft();
        d.email = "ana@cafe.com".into();
        assert!(d.validate().is_ok());
        d.password = Some("123".into());
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User::new(&draft(), "$argon2id$secret".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
    }
}
