//! Byte transport under an SMTP session.
//!
//! The session engine only needs ordered bytes in both directions plus a
//! way to switch to TLS in place. [`SmtpStream`] provides that over TCP;
//! tests drive the engine with scripted in-memory transports.

mod stream;

pub use stream::{SmtpStream, connect, connect_tls, create_tls_connector};

use crate::error::Result;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream that can be upgraded to TLS.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sized {
    /// Performs a TLS handshake over this stream, verifying `hostname`.
    ///
    /// The stream is consumed; on failure it is dropped and closed.
    fn upgrade_to_tls(self, hostname: &str) -> impl Future<Output = Result<Self>> + Send;

    /// Returns true if the stream is TLS-encrypted.
    fn is_tls(&self) -> bool;
}
