//! # courier-smtp
//!
//! An SMTP submission client: one message, one recipient, one connection.
//!
//! ## Features
//!
//! - **Posture by port**: implicit TLS on 465; STARTTLS or plaintext on 587
//!   and 2525. Port 25 and anything else is refused.
//! - **Authentication**: LOGIN and XOAUTH2, with secrets kept out of logs
//! - **Strict dialogue**: one command in flight, every reply code checked,
//!   an explicit [`SessionState`] machine
//! - **Transparency**: bodies are dot-stuffed and streamed in 16 KiB chunks
//! - **Timeouts**: on connect, TLS handshake and every read and write
//!
//! ## Quick Start
//!
//! ```ignore
//! use courier_mime::MailMessage;
//! use courier_smtp::{AuthMechanism, ClientConfig, send_email};
//!
//! #[tokio::main]
//! async fn main() -> courier_smtp::Result<()> {
//!     let config = ClientConfig::builder("smtp.example.com", "me@example.com", "app-password")
//!         .port(587)
//!         .auth(AuthMechanism::Login)
//!         .build();
//!
//!     let message = MailMessage::new("you@example.com", "Hello", "Hi there!");
//!     send_email(&config, &message).await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Connected ─→ Greeted ─→ [TlsUpgraded ─→ Greeted] ─→ Authenticated
//!     ─→ SenderSet ─→ RecipientSet ─→ DataMode ─→ MessageSent ─→ Closed
//!
//! any live state ─→ Failed
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`parser`]: Response parser
//! - [`session`]: Session engine and [`deliver`]
//! - [`transport`]: TCP/TLS streams and the [`Transport`] seam
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod auth;
mod client;
mod error;

pub mod command;
pub mod config;
pub mod data;
pub mod parser;
pub mod sasl;
pub mod session;
pub mod transport;
pub mod types;

pub use client::send_email;
pub use config::{ClientConfig, ClientConfigBuilder, Posture};
pub use error::{Error, ErrorKind, Result};
pub use session::{ServerInfo, Session, SessionState, deliver};
pub use transport::{SmtpStream, Transport};
pub use types::{Address, AuthMechanism, Envelope, Extension, Reply, ReplyClass, ReplyCode};
