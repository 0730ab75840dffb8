//! One-call message submission.

use crate::config::{ClientConfig, Posture};
use crate::error::Result;
use crate::session::deliver;
use crate::transport::{connect, connect_tls};
use crate::types::Envelope;
use courier_mime::{Composer, MailMessage};
use tracing::info;

/// Sends `message` with the server and credentials in `config`.
///
/// The message is composed before any connection is made, so a missing
/// attachment fails without touching the network. The port decides the
/// connection posture: 465 is implicit TLS, 587 and 2525 use STARTTLS
/// when `config.starttls` is set and plaintext otherwise. Any other port is
/// refused.
///
/// # Errors
///
/// Returns a configuration, attachment, connection, TLS, protocol,
/// authentication or timeout error; see [`crate::ErrorKind`].
pub async fn send_email(config: &ClientConfig, message: &MailMessage) -> Result<()> {
    config.validate()?;
    let posture = config.posture()?;
    let envelope = Envelope::new(&config.sender, &message.to)?;
    let composed = Composer::new(config.sender.as_str()).compose(message)?;

    info!(
        host = %config.host,
        port = config.port,
        ?posture,
        attachments = message.attachments.len(),
        bytes = composed.len(),
        "Sending message"
    );

    let stream = match posture {
        Posture::ImplicitTls => {
            connect_tls(&config.host, config.port, config.connect_timeout).await?
        }
        Posture::StartTls | Posture::Plaintext => {
            connect(&config.host, config.port, config.connect_timeout).await?
        }
    };

    deliver(stream, config, posture, &envelope, &composed).await
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
    use crate::error::ErrorKind;
    use courier_mime::Attachment;

    fn config(port: u16) -> ClientConfig {
        ClientConfig::builder("127.0.0.1", "me@example.com", "secret")
            .port(port)
            .build()
    }

    #[tokio::test]
    async fn test_port_25_is_refused_before_connecting() {
        let message = MailMessage::new("you@example.com", "Hi", "Body");
        let err = send_email(&config(25), &message).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_unknown_port_is_refused() {
        let message = MailMessage::new("you@example.com", "Hi", "Body");
        let err = send_email(&config(2526), &message).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_missing_attachment_fails_before_connecting() {
        let message = MailMessage::new("you@example.com", "Hi", "Body")
            .attach(Attachment::from_path("gone.pdf", "/nonexistent/courier/gone.pdf"));
        let err = send_email(&config(587), &message).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AttachmentRead);
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let message = MailMessage::new("not an address", "Hi", "Body");
        let err = send_email(&config(587), &message).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
