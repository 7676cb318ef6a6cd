//! Sender identity normalization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string does not contain a usable email address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not an email address: {0:?}")]
pub struct InvalidEmail(pub String);

/// A normalized email address, the natural key of a customer.
///
/// Accepts either a bare address or a mailbox of the form
/// `Display Name <addr@host>`. The stored form is trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and normalizes a sender identity.
    pub fn parse(raw: &str) -> Result<Self, InvalidEmail> {
        let candidate = match (raw.find('<'), raw.rfind('>')) {
            (Some(open), Some(close)) if open < close => &raw[open + 1..close],
            _ => raw,
        };
        let candidate = candidate.trim();

        let mut parts = candidate.split('@');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !candidate.chars().any(char::is_whitespace)
            }
            _ => false,
        };

        if !valid {
            return Err(InvalidEmail(raw.to_string()));
        }

        Ok(Self(candidate.to_lowercase()))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = InvalidEmail;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
