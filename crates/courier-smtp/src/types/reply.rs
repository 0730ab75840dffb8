//! Server replies.
//!
//! A reply is a three-digit code plus one or more text lines. Only the first
//! digit matters for flow control; the client compares exact codes where
//! RFC 5321 prescribes one (220 greeting, 354 for DATA, 334/235 during AUTH).

use std::fmt;

/// Outcome class of a reply, from the first digit of its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2xx: the command succeeded.
    Positive,
    /// 3xx: the server waits for more input.
    Intermediate,
    /// 4xx: failed, may succeed later.
    Transient,
    /// 5xx: failed, do not retry as is.
    Permanent,
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready, also the STARTTLS go-ahead.
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Closing channel.
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Completed.
    pub const OK: Self = Self(250);
    /// 334 Authentication challenge.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input.
    pub const START_DATA: Self = Self(354);
    /// 450 Mailbox busy.
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 454 Temporary authentication failure or TLS unavailable.
    pub const TEMPORARY_FAILURE: Self = Self(454);
    /// 535 Credentials rejected.
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable.
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the outcome class, or `None` outside 200..=599.
    #[must_use]
    pub const fn class(self) -> Option<ReplyClass> {
        match self.0 / 100 {
            2 => Some(ReplyClass::Positive),
            3 => Some(ReplyClass::Intermediate),
            4 => Some(ReplyClass::Transient),
            5 => Some(ReplyClass::Permanent),
            _ => None,
        }
    }

    /// 2xx.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self.class(), Some(ReplyClass::Positive))
    }

    /// 3xx.
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        matches!(self.class(), Some(ReplyClass::Intermediate))
    }

    /// 4xx.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self.class(), Some(ReplyClass::Transient))
    }

    /// 5xx.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        matches!(self.class(), Some(ReplyClass::Permanent))
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// A complete, possibly multi-line, reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Code shared by every line.
    pub code: ReplyCode,
    /// Text of each line without code and separator.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    pub const fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true for a 2xx reply.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the first text line, which names the server in greetings.
    #[must_use]
    pub fn first_line(&self) -> &str {
        self.message.first().map_or("", String::as_str)
    }

    /// Joins all text lines with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
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
    fn test_classes() {
        assert_eq!(ReplyCode::OK.class(), Some(ReplyClass::Positive));
        assert_eq!(ReplyCode::START_DATA.class(), Some(ReplyClass::Intermediate));
        assert_eq!(ReplyCode::TEMPORARY_FAILURE.class(), Some(ReplyClass::Transient));
        assert_eq!(ReplyCode::AUTH_FAILED.class(), Some(ReplyClass::Permanent));
        assert_eq!(ReplyCode::new(199).class(), None);
        assert_eq!(ReplyCode::new(600).class(), None);
    }

    #[test]
    fn test_predicates() {
        assert!(ReplyCode::CLOSING.is_success());
        assert!(ReplyCode::AUTH_SUCCESS.is_success());
        assert!(ReplyCode::AUTH_CONTINUE.is_intermediate());
        assert!(!ReplyCode::START_DATA.is_success());
        assert!(ReplyCode::MAILBOX_BUSY.is_transient());
        assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
        assert!(!ReplyCode::MAILBOX_UNAVAILABLE.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(ReplyCode::OK.to_string(), "250");
        assert_eq!(ReplyCode::new(7).to_string(), "007");
    }

    #[test]
    fn test_reply_text() {
        let reply = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["smtp.example.com ESMTP".to_string(), "Ready".to_string()],
        );
        assert_eq!(reply.first_line(), "smtp.example.com ESMTP");
        assert_eq!(reply.message_text(), "smtp.example.com ESMTP\nReady");
        assert!(reply.is_success());

        let empty = Reply::new(ReplyCode::OK, vec![]);
        assert_eq!(empty.first_line(), "");
        assert_eq!(empty.message_text(), "");
    }
}
