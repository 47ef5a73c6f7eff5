use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Result;
use crate::id::generate_id;
use crate::validation::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    Doctor,
    Nurse,
    #[default]
    Receptionist,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::Receptionist => "receptionist",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staff account as stored. Never serialized to clients; see [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: StaffRole,
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: StaffRole,
}

/// Registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: Option<StaffRole>,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        if errors.require("email", &self.email) && !looks_like_email(&self.email) {
            errors.invalid("email", "not an e-mail address");
        }
        if errors.require("password", &self.password) && self.password.len() < MIN_PASSWORD_LEN {
            errors.invalid("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
        }
        errors.require("fullName", &self.full_name);
        errors.into_result()
    }

    /// Builds the stored record around an already computed password hash.
    pub fn into_user(self, password_hash: String, now: OffsetDateTime) -> User {
        User {
            id: generate_id(),
            email: normalize_email(&self.email),
            full_name: self.full_name.trim().to_string(),
            role: self.role.unwrap_or_default(),
            password_hash,
            created_at: now,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now_utc;

    #[test]
    fn validates_registration() {
        let user = NewUser {
            email: "Nurse.Joy@Example.org ".into(),
            password: "correct horse".into(),
            full_name: "Joy".into(),
            role: Some(StaffRole::Nurse),
        };
        user.validate().unwrap();
        let stored = user.into_user("hash".into(), now_utc());
        assert_eq!(stored.email, "nurse.joy@example.org");
        assert_eq!(stored.profile().role, StaffRole::Nurse);
    }

    #[test]
    fn rejects_short_password_and_bad_email() {
        let user = NewUser {
            email: "joy".into(),
            password: "short".into(),
            full_name: String::new(),
            role: None,
        };
        let message = user.validate().unwrap_err().to_string();
        assert!(message.contains("fullName"));
        assert!(message.contains("email (not an e-mail address)"));
        assert!(message.contains("password"));
    }

    #[test]
    fn profile_hides_hash() {
        let user = NewUser {
            email: "a@b.io".into(),
            password: "12345678".into(),
            full_name: "A".into(),
            role: None,
        }
        .into_user("secret-hash".into(), now_utc());
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
