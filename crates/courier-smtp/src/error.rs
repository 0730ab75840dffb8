//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::ReplyCode;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Client configuration cannot be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server could not be resolved or reached.
    #[error("Cannot connect to {host}:{port}: {source}")]
    Connection {
        /// Server hostname.
        host: String,
        /// Server port.
        port: u16,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Server closed the connection unexpectedly.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// TLS handshake or setup failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Server answered a command with an unexpected reply.
    #[error("{command} rejected with {code}: {message}")]
    Protocol {
        /// Command that was rejected.
        command: String,
        /// Reply code (e.g., 550).
        code: u16,
        /// Reply text from server.
        message: String,
    },

    /// Authentication was rejected.
    #[error("Authentication failed ({code}): {message}")]
    Auth {
        /// Reply code (e.g., 535).
        code: u16,
        /// Reply text from server.
        message: String,
    },

    /// Message could not be composed.
    #[error(transparent)]
    Mime(#[from] courier_mime::Error),

    /// A connect, read or write did not finish in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Operation not valid in the current session state.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Message is larger than the server accepts.
    #[error("Message of {size} bytes exceeds the server limit of {limit} bytes")]
    MessageTooLarge {
        /// Composed message size.
        size: usize,
        /// Limit advertised with SIZE.
        limit: usize,
    },

    /// Reply could not be parsed.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unsupported port, missing field or invalid input.
    Config,
    /// Resolution, connect or socket failure.
    Connection,
    /// TLS handshake failure.
    Tls,
    /// Non-success reply or protocol violation.
    Protocol,
    /// Authentication rejected.
    Auth,
    /// Attachment source unreadable.
    AttachmentRead,
    /// Deadline expired.
    Timeout,
}

impl Error {
    /// Creates a protocol error from a command name and reply.
    #[must_use]
    pub fn protocol(command: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            command: command.into(),
            code,
            message: message.into(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::InvalidAddress(_) => ErrorKind::Config,
            Self::Mime(courier_mime::Error::AttachmentRead { .. }) => ErrorKind::AttachmentRead,
            Self::Mime(_) => ErrorKind::Config,
            Self::Io(_) | Self::Connection { .. } | Self::ConnectionClosed => ErrorKind::Connection,
            Self::Tls(_) => ErrorKind::Tls,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Protocol { .. }
            | Self::InvalidState(_)
            | Self::NotSupported(_)
            | Self::MessageTooLarge { .. }
            | Self::MalformedReply(_) => ErrorKind::Protocol,
        }
    }

    /// Returns the server reply code, if the error carries one.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Protocol { code, .. } | Self::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self.code() {
            Some(code) => ReplyCode::new(code).is_permanent(),
            None => false,
        }
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self.code() {
            Some(code) => ReplyCode::new(code).is_transient(),
            None => false,
        }
    }

    /// Returns true if the connection itself is unusable after this error.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectionClosed | Self::Timeout(_) | Self::Tls(_)
        )
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
    fn test_protocol_error_display() {
        let err = Error::protocol("RCPT TO", 550, "No such user");
        assert_eq!(err.to_string(), "RCPT TO rejected with 550: No such user");
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.code(), Some(550));
        assert!(err.is_permanent());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_auth_error() {
        let err = Error::Auth {
            code: 454,
            message: "Try again later".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.is_transient());
    }

    #[test]
    fn test_attachment_error_kind() {
        let err = Error::from(courier_mime::Error::AttachmentRead {
            path: "/tmp/missing".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        });
        assert_eq!(err.kind(), ErrorKind::AttachmentRead);
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_connection_kinds() {
        assert_eq!(Error::ConnectionClosed.kind(), ErrorKind::Connection);
        assert_eq!(
            Error::Timeout(Duration::from_secs(5)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::Tls("handshake".into()).kind(), ErrorKind::Tls);
        assert_eq!(Error::Config("port".into()).kind(), ErrorKind::Config);
        assert!(Error::Timeout(Duration::from_secs(5)).is_connection_lost());
        assert!(!Error::protocol("DATA", 554, "no").is_connection_lost());
    }
}
