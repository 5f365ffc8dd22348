use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("first name cannot be empty")]
    EmptyFirstName,

    #[error("last name cannot be empty")]
    EmptyLastName,

    #[error("email address is not valid: {0}")]
    InvalidEmail(String),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("a password is required for new accounts")]
    MissingPassword,
}

/// Minimum password length accepted before a request is sent.
pub const MIN_PASSWORD_LEN: usize = 8;

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

/// Account role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    #[default]
    Driver,
}

impl Role {
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Login route a signed-out user of this role is sent to.
    #[must_use]
    pub fn login_route(self) -> &'static str {
        match self {
            Role::Admin => "/admin/login",
            Role::Driver => "/login",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Driver => "DRIVER",
        }
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// A user account, as returned by `userDto` and the user endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_exam_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_owned()
    }
}

/// Fields an admin can set when creating or editing a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserDraft {
    /// Prefill an editor from the authoritative user detail.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            password: None,
        }
    }

    /// Validate a draft for a new account.
    ///
    /// # Errors
    ///
    /// Returns `UserError` when a field fails validation or the password is missing.
    pub fn validate_for_create(&self) -> Result<(), UserError> {
        self.validate_common()?;
        match self.password.as_deref() {
            None => Err(UserError::MissingPassword),
            Some(password) => validate_password(password),
        }
    }

    /// Validate a draft for an existing account. The password is optional.
    ///
    /// # Errors
    ///
    /// Returns `UserError` when a field fails validation.
    pub fn validate_for_update(&self) -> Result<(), UserError> {
        self.validate_common()?;
        if let Some(password) = self.password.as_deref() {
            validate_password(password)?;
        }
        Ok(())
    }

    fn validate_common(&self) -> Result<(), UserError> {
        if self.first_name.trim().is_empty() {
            return Err(UserError::EmptyFirstName);
        }
        if self.last_name.trim().is_empty() {
            return Err(UserError::EmptyLastName);
        }
        validate_email(&self.email)
    }
}

/// Self-registration payload for a new driver account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

impl Registration {
    /// # Errors
    ///
    /// Returns `UserError` when a field fails validation.
    pub fn validate(&self) -> Result<(), UserError> {
        if self.first_name.trim().is_empty() {
            return Err(UserError::EmptyFirstName);
        }
        if self.last_name.trim().is_empty() {
            return Err(UserError::EmptyLastName);
        }
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

fn validate_email(raw: &str) -> Result<(), UserError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(UserError::InvalidEmail(email.to_owned()))
    }
}

fn validate_password(password: &str) -> Result<(), UserError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> UserDraft {
        UserDraft {
            first_name: "Ada".into(),
            last_name: "Driver".into(),
            email: "ada@example.com".into(),
            phone: None,
            role: Role::Driver,
            password: Some("correct-horse".into()),
        }
    }

    #[test]
    fn user_deserializes_backend_dto() {
        let json = r#"{
            "id": 7,
            "firstName": "Ada",
            "lastName": "Driver",
            "email": "ada@example.com",
            "role": "DRIVER",
            "isExamCompleted": true
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, UserId::new(7));
        assert!(user.is_exam_completed);
        assert_eq!(user.full_name(), "Ada Driver");
        assert_eq!(user.role.login_route(), "/login");
    }

    #[test]
    fn create_requires_password() {
        let mut d = draft();
        d.password = None;
        assert_eq!(d.validate_for_create(), Err(UserError::MissingPassword));
        assert_eq!(d.validate_for_update(), Ok(()));
    }

    #[test]
    fn rejects_bad_email_and_short_password() {
        let mut d = draft();
        d.email = "ada.example.com".into();
        assert!(matches!(
            d.validate_for_create(),
            Err(UserError::InvalidEmail(_))
        ));

        let mut d = draft();
        d.password = Some("short".into());
        assert_eq!(
            d.validate_for_create(),
            Err(UserError::WeakPassword { min: MIN_PASSWORD_LEN })
        );
    }

    #[test]
    fn email_domain_needs_no_dot() {
        let mut d = draft();
        d.email = "ops@localhost".into();
        assert_eq!(d.validate_for_create(), Ok(()));

        for bad in ["@localhost", "ops@", "ops@a@b"] {
            d.email = bad.into();
            assert!(
                matches!(d.validate_for_create(), Err(UserError::InvalidEmail(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn registration_rejects_blank_names() {
        let reg = Registration {
            first_name: "  ".into(),
            last_name: "Driver".into(),
            email: "ada@example.com".into(),
            phone: None,
            password: "long enough".into(),
        };
        assert_eq!(reg.validate(), Err(UserError::EmptyFirstName));
    }

    #[test]
    fn admin_login_route() {
        assert_eq!(Role::Admin.login_route(), "/admin/login");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
    }
}
