//! SMTP extension types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SMTP extensions discovered from EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication, with the mechanisms this client knows
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining (never used)
    Pipelining,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// Unknown extension
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(parts.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism used to log in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMechanism {
    /// LOGIN - username and password, each base64 encoded
    #[default]
    Login,
    /// `XOAUTH2` - `OAuth2` bearer token (Google/Microsoft)
    XOAuth2,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("LOGIN") {
            Some(Self::Login)
        } else if s.eq_ignore_ascii_case("XOAUTH2") {
            Some(Self::XOAuth2)
        } else {
            None
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
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

    mod extension_parse_tests {
        use super::*;

        #[test]
        fn parse_starttls() {
            assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
            assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        }

        #[test]
        fn parse_auth_keeps_known_mechanisms() {
            let ext = Extension::parse("AUTH PLAIN LOGIN XOAUTH2 CRAM-MD5");
            assert_eq!(
                ext,
                Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::XOAuth2])
            );
        }

        #[test]
        fn parse_auth_without_known_mechanisms() {
            assert_eq!(Extension::parse("AUTH PLAIN"), Extension::Auth(vec![]));
        }

        #[test]
        fn parse_size() {
            assert_eq!(
                Extension::parse("SIZE 52428800"),
                Extension::Size(Some(52_428_800))
            );
            assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        }

        #[test]
        fn parse_simple_keywords() {
            assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
            assert_eq!(Extension::parse("PIPELINING"), Extension::Pipelining);
            assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(
                Extension::parse("ENHANCEDSTATUSCODES"),
                Extension::Unknown("ENHANCEDSTATUSCODES".to_string())
            );
            assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
        }
    }

    mod auth_mechanism_tests {
        use super::*;

        #[test]
        fn parse() {
            assert_eq!(AuthMechanism::parse("LOGIN"), Some(AuthMechanism::Login));
            assert_eq!(AuthMechanism::parse("login"), Some(AuthMechanism::Login));
            assert_eq!(
                AuthMechanism::parse("XOAUTH2"),
                Some(AuthMechanism::XOAuth2)
            );
            assert_eq!(AuthMechanism::parse("PLAIN"), None);
        }

        #[test]
        fn display() {
            assert_eq!(AuthMechanism::Login.to_string(), "LOGIN");
            assert_eq!(AuthMechanism::XOAuth2.as_str(), "XOAUTH2");
            assert_eq!(AuthMechanism::default(), AuthMechanism::Login);
        }

        #[test]
        fn deserialize_lowercase() {
            let mechanism: AuthMechanism = serde_json::from_str("\"xoauth2\"").unwrap();
            assert_eq!(mechanism, AuthMechanism::XOAuth2);
            assert_eq!(serde_json::to_string(&AuthMechanism::Login).unwrap(), "\"login\"");
        }
    }
}
