//! Mailbox selection
//!
//! Graph addresses a mailbox either as the signed-in user (`/me`) or
//! as an explicit user (`/users/{id}`). An empty `from` value in task
//! input means the signed-in user.

use std::fmt;

/// The mailbox a Graph request targets.
///
/// # Examples
///
/// ```
/// use exchange_mail::Mailbox;
///
/// assert_eq!(Mailbox::from("").path(), "me");
/// assert_eq!(
///     Mailbox::from("jane@example.com").path(),
///     "users/jane@example.com"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Mailbox {
    /// The user the access token was issued for.
    #[default]
    Me,
    /// A user id or user principal name.
    User(String),
}

impl Mailbox {
    /// Create a mailbox for an explicit user.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// The Graph path prefix for this mailbox, without slashes.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Me => "me".to_string(),
            Self::User(id) => format!("users/{id}"),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Me => f.write_str("me"),
            Self::User(id) => f.write_str(id),
        }
    }
}

impl From<&str> for Mailbox {
    fn from(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            Self::Me
        } else {
            Self::User(trimmed.to_string())
        }
    }
}

impl From<String> for Mailbox {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
