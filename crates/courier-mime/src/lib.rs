//! # courier-mime
//!
//! MIME message generation for outgoing email.
//!
//! ## Features
//!
//! - **Message composition**: single-part text/HTML or `multipart/mixed`
//!   with attachments, in insertion order
//! - **Encoding**: Base64 (binary-safe), Quoted-Printable, RFC 2047 header words
//! - **Media types**: case-insensitive extension lookup with an
//!   `application/octet-stream` fallback
//!
//! ## Quick Start
//!
//! ```ignore
//! use courier_mime::{Attachment, Composer, MailMessage};
//!
//! let message = MailMessage::new("bob@example.com", "Quarterly report", "See attached.")
//!     .attach(Attachment::from_path("report.pdf", "/tmp/report.pdf"));
//!
//! let composed = Composer::new("alice@example.com").compose(&message)?;
//! for fragment in composed.fragments() {
//!     print!("{fragment}");
//! }
//! ```
//!
//! ## Encoding
//!
//! ```ignore
//! use courier_mime::encoding::{encode_base64, encode_quoted_printable, encoded_len};
//!
//! let encoded = encode_base64(b"\x00binary\x00");
//! assert_eq!(encoded.len(), encoded_len(8));
//!
//! let qp = encode_quoted_printable("Héllo, Wørld!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod media_type;
mod message;

pub mod compose;
pub mod encoding;

pub use compose::{ComposedMessage, Composer, TransferEncoding, compose_headers, format_date};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use media_type::{OCTET_STREAM, mime_type_for};
pub use message::{Attachment, AttachmentSource, MailMessage};
