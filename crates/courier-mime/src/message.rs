//! Outgoing message description: recipient, text body and attachments.

use crate::error::{Error, Result};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where the bytes of an attachment come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// A file read when the message is composed.
    Path(PathBuf),
    /// Content already in memory.
    Bytes(Vec<u8>),
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    source: AttachmentSource,
}

impl Attachment {
    /// Creates an attachment whose content is read from `path`.
    ///
    /// `filename` is the name shown to the recipient and also decides the
    /// media type.
    #[must_use]
    pub fn from_path(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            source: AttachmentSource::Path(path.into()),
        }
    }

    /// Creates an attachment from in-memory content.
    #[must_use]
    pub fn from_bytes(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            source: AttachmentSource::Bytes(content.into()),
        }
    }

    /// Returns the display file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the content source.
    #[must_use]
    pub const fn source(&self) -> &AttachmentSource {
        &self.source
    }

    /// Reads the whole attachment into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentRead`] if the source file cannot be read.
    pub fn load(&self) -> Result<Cow<'_, [u8]>> {
        match &self.source {
            AttachmentSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            AttachmentSource::Path(path) => read_file(path).map(Cow::Owned),
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::AttachmentRead {
        path: path.to_path_buf(),
        source,
    })
}

/// An email to send: one recipient, a subject, a text or HTML body and any
/// number of attachments.
///
/// Attachments are emitted in the order they were added.
#[derive(Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Whether `body` is HTML.
    pub is_html: bool,
    /// Attachments in part order.
    pub attachments: Vec<Attachment>,
}

impl MailMessage {
    /// Creates a plain-text message without attachments.
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            is_html: false,
            attachments: Vec::new(),
        }
    }

    /// Marks the body as HTML (or plain text).
    #[must_use]
    pub const fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Appends an attachment in place.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Returns true if the message needs a multipart body.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.attachments.is_empty()
    }
}

impl fmt::Debug for MailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailMessage")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("body_len", &self.body.len())
            .field("is_html", &self.is_html)
            .field(
                "attachments",
                &self
                    .attachments
                    .iter()
                    .map(Attachment::filename)
                    .collect::<Vec<_>>(),
            )
            .finish()
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
    fn test_attachments_keep_insertion_order() {
        let mut message = MailMessage::new("to@example.com", "Hi", "Body")
            .attach(Attachment::from_bytes("first.txt", b"1".to_vec()))
            .attach(Attachment::from_bytes("second.txt", b"2".to_vec()));
        message.add_attachment(Attachment::from_bytes("third.txt", b"3".to_vec()));

        let names: Vec<&str> = message.attachments.iter().map(Attachment::filename).collect();
        assert_eq!(names, vec!["first.txt", "second.txt", "third.txt"]);
        assert!(message.is_multipart());
    }

    #[test]
    fn test_plain_message_defaults() {
        let message = MailMessage::new("to@example.com", "Hi", "Body");
        assert!(!message.is_html);
        assert!(!message.is_multipart());
        assert!(MailMessage::new("a@b.c", "s", "b").html(true).is_html);
    }

    #[test]
    fn test_load_bytes_borrows() {
        let attachment = Attachment::from_bytes("blob.bin", vec![0u8, 1, 2]);
        let content = attachment.load().unwrap();
        assert!(matches!(content, Cow::Borrowed(_)));
        assert_eq!(&*content, &[0u8, 1, 2]);
    }

    #[test]
    fn test_load_file() {
        let name = format!("courier-mime-load-{}.bin", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, [0u8, 0xff, 0, 7]).unwrap();

        let attachment = Attachment::from_path("data.bin", &path);
        let content = attachment.load().unwrap();
        assert_eq!(&*content, &[0u8, 0xff, 0, 7]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let attachment = Attachment::from_path("gone.pdf", "/nonexistent/courier/gone.pdf");
        let err = attachment.load().unwrap_err();
        match err {
            Error::AttachmentRead { path, source } => {
                assert_eq!(path, PathBuf::from("/nonexistent/courier/gone.pdf"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_hides_body() {
        let message = MailMessage::new("to@example.com", "Hi", "secret body text");
        let debug = format!("{message:?}");
        assert!(!debug.contains("secret body text"));
        assert!(debug.contains("body_len"));
    }
}
