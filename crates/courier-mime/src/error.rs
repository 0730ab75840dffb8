//! Error types for MIME operations.

use std::io;
use std::path::PathBuf;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header value would break the header block (contains CR or LF).
    #[error("Invalid MIME header {name}: {reason}")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
        /// What is wrong with the value.
        reason: String,
    },

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Attachment source could not be read.
    #[error("Cannot read attachment {}: {source}", path.display())]
    AttachmentRead {
        /// Path of the attachment source.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Invalid boundary token.
    #[error("Invalid multipart boundary: {0}")]
    InvalidBoundary(String),
}

impl Error {
    /// Creates an invalid header error.
    #[must_use]
    pub fn invalid_header(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name,
            reason: reason.into(),
        }
    }
}
