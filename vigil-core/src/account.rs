//! Account model
//!
//! The account row is the anchor of the security state machine: it carries
//! the MFA secret binding, the failed-login counter, and the lockout
//! timestamp. The password hash lives in the same storage row but is only
//! reachable through [`crate::repositories::PasswordRepository`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{generate_prefixed_id, validate_prefixed_id};

/// A unique, stable identifier for a specific account.
///
/// Treated as opaque by everything outside the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account as seen by the security services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The unique identifier for the account.
    pub id: UserId,

    /// The email the account authenticates with. Unique.
    pub email: String,

    /// Base32-encoded TOTP secret, present once MFA is enrolled.
    pub mfa_secret: Option<String>,

    /// Consecutive failed password verifications. Reset to 0 only by a
    /// successful password verification.
    pub failed_attempts: u32,

    /// When set and in the future, login attempts are denied before any
    /// password hash comparison takes place.
    pub locked_until: Option<DateTime<Utc>>,

    /// Stamped on each successful password verification.
    pub last_login_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the lockout window is still open at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Whether a TOTP secret is bound to this account.
    pub fn mfa_enabled(&self) -> bool {
        self.mfa_secret.is_some()
    }
}

/// The data required to create a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: UserId,
    pub email: String,
}

impl NewAccount {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: UserId::new_random(),
            email: email.into(),
        }
    }
}
