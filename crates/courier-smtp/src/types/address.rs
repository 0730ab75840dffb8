//! Envelope address types.

use crate::error::{Error, Result};

/// Email address for SMTP envelope.
///
/// Only addresses that can be placed inside `<...>` on a command line are
/// accepted: ASCII only (SMTPUTF8 is never requested), without whitespace,
/// control characters or angle brackets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates an email address (basic validation).
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {addr:?}"
            )));
        }

        if !addr.is_ascii() {
            return Err(Error::InvalidAddress(format!(
                "Non-ASCII address needs SMTPUTF8: {addr:?}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender and recipient of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path (MAIL FROM).
    pub from: Address,
    /// Forward path (RCPT TO).
    pub to: Address,
}

impl Envelope {
    /// Creates an envelope from raw addresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if either address is invalid.
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Ok(Self {
            from: Address::new(from)?,
            to: Address::new(to)?,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_parts() {
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_two_at() {
        assert!(Address::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_rejects_command_injection() {
        assert!(Address::new("user@example.com>\r\nRCPT TO:<x@evil.com").is_err());
        assert!(Address::new("user@example.com\n").is_err());
        assert!(Address::new("<user@example.com>").is_err());
        assert!(Address::new("us er@example.com").is_err());
    }

    #[test]
    fn test_rejects_non_ascii() {
        assert!(matches!(
            Address::new("jürgen@example.com"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(Address::new("user@bücher.example").is_err());
        assert!(Envelope::new("me@example.com", "δοκιμή@example.gr").is_err());
    }

    #[test]
    fn test_envelope() {
        let envelope = Envelope::new("me@example.com", "you@example.org").unwrap();
        assert_eq!(envelope.from.as_str(), "me@example.com");
        assert_eq!(envelope.to.as_str(), "you@example.org");
        assert!(matches!(
            Envelope::new("me@example.com", "nobody"),
            Err(Error::InvalidAddress(_))
        ));
    }
}
