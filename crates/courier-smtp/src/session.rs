//! SMTP session engine.
//!
//! A [`Session`] drives one connection through the submission dialogue:
//! greeting, EHLO, optional STARTTLS, authentication, one transaction and
//! QUIT. Every step sends a single command, flushes, and waits for the
//! complete reply before going on; commands are never pipelined.
//!
//! Each step checks the current [`SessionState`] before touching the wire,
//! so an out-of-order call fails with [`Error::InvalidState`] without
//! sending anything.

use crate::command::Command;
use crate::config::{ClientConfig, Posture};
use crate::data::{CHUNK_SIZE, DotStuffer};
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::transport::Transport;
use crate::types::{Address, AuthMechanism, Envelope, Extension, Reply, ReplyCode};
use courier_mime::ComposedMessage;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Capacity of the read buffer in front of the transport.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Longest accepted reply line, CRLF included.
pub const MAX_REPLY_LINE_LENGTH: usize = 2048;

/// Most lines accepted in one multi-line reply.
pub const MAX_REPLY_LINES: usize = 256;

/// Position of a session in the submission dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, greeting not yet processed.
    Connected,
    /// Greeting and EHLO accepted.
    Greeted,
    /// TLS negotiated with STARTTLS; EHLO must be repeated.
    TlsUpgraded,
    /// Authentication accepted.
    Authenticated,
    /// MAIL FROM accepted.
    SenderSet,
    /// RCPT TO accepted.
    RecipientSet,
    /// DATA accepted with 354.
    DataMode,
    /// Message accepted after the end-of-data marker.
    MessageSent,
    /// QUIT sent after a successful dialogue, or closed early.
    Closed,
    /// A step failed. The session can only be shut down.
    Failed,
}

impl SessionState {
    /// Returns true if the session may move from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Self::Connected | Self::TlsUpgraded, Self::Greeted)
                | (Self::Greeted, Self::TlsUpgraded | Self::Authenticated)
                | (Self::Authenticated, Self::SenderSet)
                | (Self::SenderSet, Self::RecipientSet)
                | (Self::RecipientSet, Self::DataMode)
                | (Self::DataMode, Self::MessageSent)
                | (_, Self::Closed | Self::Failed)
        )
    }

    /// Returns true for [`SessionState::Closed`] and [`SessionState::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Server capabilities from EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if the SIZE extension is advertised, with or without a limit.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns the maximum message size, if advertised.
    ///
    /// A limit of zero means no limit and is reported as `None`.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns the advertised authentication mechanisms this client knows,
    /// or `None` if no AUTH line was advertised.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Option<&[AuthMechanism]> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
            _ => None,
        })
    }
}

/// One SMTP connection and its dialogue state.
#[derive(Debug)]
pub struct Session<T> {
    stream: BufReader<T>,
    state: SessionState,
    server_info: ServerInfo,
    io_timeout: Duration,
    greeting_read: bool,
    starttls_accepted: bool,
}

impl<T: Transport> Session<T> {
    /// Wraps a freshly opened transport.
    #[must_use]
    pub fn new(transport: T, io_timeout: Duration) -> Self {
        Self {
            stream: BufReader::with_capacity(READ_BUFFER_SIZE, transport),
            state: SessionState::Connected,
            server_info: ServerInfo::default(),
            io_timeout,
            greeting_read: false,
            starttls_accepted: false,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns what the server advertised in its last EHLO reply.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns true if the transport is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.stream.get_ref().is_tls()
    }

    /// Reads the greeting and sends EHLO.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the greeting is not 220 or EHLO is not
    /// accepted, or a connection error.
    pub async fn open(&mut self, client_name: &str) -> Result<()> {
        self.read_greeting().await?;
        self.ehlo(client_name).await
    }

    /// Reads the 220 greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for any other reply code.
    pub async fn read_greeting(&mut self) -> Result<()> {
        if self.greeting_read || self.state != SessionState::Connected {
            return Err(self.invalid_state("greeting"));
        }

        let reply = self.receive().await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(self.reject("greeting", &reply));
        }

        self.server_info.hostname = reply
            .first_line()
            .split_whitespace()
            .next()
            .unwrap_or("unknown")
            .to_string();
        self.greeting_read = true;
        debug!(server = %self.server_info.hostname, "Greeting received");
        Ok(())
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if EHLO is not accepted with 250.
    pub async fn ehlo(&mut self, client_name: &str) -> Result<()> {
        if !self.greeting_read {
            return Err(self.invalid_state("EHLO"));
        }
        self.check_transition(SessionState::Greeted)?;

        let cmd = Command::Ehlo {
            hostname: client_name.to_string(),
        };
        let reply = self.command(&cmd).await?;
        if reply.code != ReplyCode::OK {
            return Err(self.reject(cmd.name(), &reply));
        }

        // First line is the server's greeting text
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        debug!(extensions = ?self.server_info.extensions, "Server capabilities");

        self.state = SessionState::Greeted;
        Ok(())
    }

    /// Sends STARTTLS and waits for the server to agree.
    ///
    /// Call [`Session::upgrade`] next.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if STARTTLS was not advertised,
    /// [`Error::Protocol`] if it is refused, or
    /// [`Error::InvalidState`] if the connection is already encrypted.
    pub async fn request_starttls(&mut self) -> Result<()> {
        self.check_transition(SessionState::TlsUpgraded)?;
        if self.is_tls() {
            return Err(self.invalid_state("STARTTLS on an encrypted connection"));
        }
        if !self.server_info.supports_starttls() {
            self.state = SessionState::Failed;
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.command(&Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(self.reject(Command::StartTls.name(), &reply));
        }

        // Anything already buffered arrived before the handshake and could
        // have been injected in plaintext.
        if !self.stream.buffer().is_empty() {
            self.state = SessionState::Failed;
            return Err(Error::MalformedReply(
                "Server sent data after agreeing to STARTTLS".into(),
            ));
        }

        self.starttls_accepted = true;
        Ok(())
    }

    /// Performs the TLS handshake after STARTTLS was accepted.
    ///
    /// The extensions learned before the upgrade are discarded; send EHLO
    /// again before going on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] or [`Error::Timeout`]. The transport is closed
    /// on failure.
    pub async fn upgrade(self, hostname: &str) -> Result<Self> {
        if !self.starttls_accepted || self.state != SessionState::Greeted {
            return Err(Error::InvalidState(format!(
                "TLS upgrade without accepted STARTTLS in {:?}",
                self.state
            )));
        }

        let Self {
            stream,
            server_info,
            io_timeout,
            ..
        } = self;
        let transport = stream.into_inner();
        let transport = tokio::time::timeout(io_timeout, transport.upgrade_to_tls(hostname))
            .await
            .map_err(|_| Error::Timeout(io_timeout))??;
        info!(host = hostname, "Connection upgraded to TLS");

        Ok(Self {
            stream: BufReader::with_capacity(READ_BUFFER_SIZE, transport),
            state: SessionState::TlsUpgraded,
            server_info: ServerInfo {
                hostname: server_info.hostname,
                extensions: HashSet::new(),
            },
            io_timeout,
            greeting_read: true,
            starttls_accepted: false,
        })
    }

    /// Sends MAIL FROM, with the SIZE parameter when given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the sender is refused.
    pub async fn mail_from(&mut self, from: &Address, size: Option<usize>) -> Result<()> {
        self.check_transition(SessionState::SenderSet)?;
        let cmd = Command::MailFrom {
            from: from.clone(),
            size,
        };
        self.expect_success(&cmd).await?;
        self.state = SessionState::SenderSet;
        Ok(())
    }

    /// Sends RCPT TO.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the recipient is refused.
    pub async fn rcpt_to(&mut self, to: &Address) -> Result<()> {
        self.check_transition(SessionState::RecipientSet)?;
        let cmd = Command::RcptTo { to: to.clone() };
        self.expect_success(&cmd).await?;
        self.state = SessionState::RecipientSet;
        Ok(())
    }

    /// Sends DATA and waits for 354.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for any reply other than 354.
    pub async fn data(&mut self) -> Result<()> {
        self.check_transition(SessionState::DataMode)?;
        let reply = self.command(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(self.reject(Command::Data.name(), &reply));
        }
        self.state = SessionState::DataMode;
        Ok(())
    }

    /// Streams the message body, dot-stuffed, followed by the end-of-data
    /// marker, and waits for the server to accept it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the message is refused.
    pub async fn send_message(&mut self, message: &ComposedMessage) -> Result<()> {
        self.check_transition(SessionState::MessageSent)?;

        let reply = match self.transfer_body(message).await {
            Ok(reply) => reply,
            Err(error) => {
                self.state = SessionState::Failed;
                return Err(error);
            }
        };
        if !reply.is_success() {
            return Err(self.reject("end of data", &reply));
        }

        info!(bytes = message.len(), reply = %reply.message_text(), "Message accepted");
        self.state = SessionState::MessageSent;
        Ok(())
    }

    /// Sends QUIT.
    ///
    /// A failed session stays failed; any other session becomes closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply cannot be read or is not 2xx.
    pub async fn quit(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let reply = self.command(&Command::Quit).await?;
        if self.state != SessionState::Failed {
            self.state = SessionState::Closed;
        }
        if !reply.is_success() {
            return Err(Error::protocol(
                Command::Quit.name(),
                reply.code.as_u16(),
                reply.message_text(),
            ));
        }
        Ok(())
    }

    /// Shuts the transport down. Errors are logged and ignored.
    pub async fn close(mut self) {
        let limit = self.io_timeout;
        match tokio::time::timeout(limit, self.stream.get_mut().shutdown()).await {
            Ok(Ok(())) => debug!("Connection closed"),
            Ok(Err(e)) => debug!(error = %e, "Error while closing connection"),
            Err(_) => debug!("Timed out closing connection"),
        }
    }

    /// Marks the session failed, says QUIT if the connection is still
    /// usable, closes the transport and hands back `error`.
    pub async fn abort(mut self, error: Error) -> Error {
        warn!(error = %error, state = ?self.state, "SMTP session failed");
        self.state = SessionState::Failed;
        if !error.is_connection_lost()
            && let Err(e) = self.quit().await
        {
            debug!(error = %e, "QUIT after failure did not complete");
        }
        self.close().await;
        error
    }

    /// Says QUIT after a successful transaction and closes the transport.
    ///
    /// The message is already accepted at this point, so failures here are
    /// only logged.
    pub async fn finish(mut self) {
        if let Err(e) = self.quit().await {
            warn!(error = %e, "QUIT after delivery failed");
        }
        self.close().await;
    }

    async fn transfer_body(&mut self, message: &ComposedMessage) -> Result<Reply> {
        let mut stuffer = DotStuffer::new();
        let mut out = Vec::with_capacity(CHUNK_SIZE + CHUNK_SIZE / 16);

        for fragment in message.fragments() {
            for chunk in fragment.as_bytes().chunks(CHUNK_SIZE) {
                out.clear();
                stuffer.stuff(chunk, &mut out);
                self.write_all(&out).await?;
            }
        }

        out.clear();
        stuffer.finish(&mut out);
        self.write_all(&out).await?;
        self.flush().await?;
        debug!(bytes = message.len(), "Message body sent");

        self.read_reply().await
    }

    async fn expect_success(&mut self, cmd: &Command) -> Result<Reply> {
        let reply = self.command(cmd).await?;
        if !reply.is_success() {
            return Err(self.reject(cmd.name(), &reply));
        }
        Ok(reply)
    }

    /// Sends one command and reads its complete reply.
    pub(crate) async fn command(&mut self, cmd: &Command) -> Result<Reply> {
        debug!(command = %cmd.log_line(), "C:");
        let result = self.exchange(cmd).await;
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    async fn exchange(&mut self, cmd: &Command) -> Result<Reply> {
        self.write_all(&cmd.serialize()).await?;
        self.flush().await?;
        self.read_reply().await
    }

    async fn receive(&mut self) -> Result<Reply> {
        let result = self.read_reply().await;
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let limit = self.io_timeout;
        let lines = tokio::time::timeout(limit, self.read_reply_lines())
            .await
            .map_err(|_| Error::Timeout(limit))??;

        let reply = parse_reply(&lines)?;
        debug!(code = reply.code.as_u16(), text = %reply.message_text(), "S:");
        Ok(reply)
    }

    /// Reads lines up to and including the last line of one reply.
    async fn read_reply_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let n = (&mut self.stream)
                .take(MAX_REPLY_LINE_LENGTH as u64)
                .read_until(b'\n', &mut buf)
                .await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            if n == MAX_REPLY_LINE_LENGTH && buf.last() != Some(&b'\n') {
                return Err(Error::MalformedReply(format!(
                    "Reply line longer than {MAX_REPLY_LINE_LENGTH} bytes"
                )));
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(line);
            lines.push(line.to_string());
            if is_last {
                return Ok(lines);
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(Error::MalformedReply(format!(
                    "Reply longer than {MAX_REPLY_LINES} lines"
                )));
            }
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let limit = self.io_timeout;
        tokio::time::timeout(limit, self.stream.get_mut().write_all(bytes))
            .await
            .map_err(|_| Error::Timeout(limit))??;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let limit = self.io_timeout;
        tokio::time::timeout(limit, self.stream.get_mut().flush())
            .await
            .map_err(|_| Error::Timeout(limit))??;
        Ok(())
    }

    pub(crate) fn check_transition(&self, next: SessionState) -> Result<()> {
        if self.state.can_advance_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot move from {:?} to {next:?}",
                self.state
            )))
        }
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    fn invalid_state(&self, operation: &str) -> Error {
        Error::InvalidState(format!("{operation} not allowed in {:?}", self.state))
    }

    /// Marks the session failed and builds the error for `reply`.
    fn reject(&mut self, command: &str, reply: &Reply) -> Error {
        self.state = SessionState::Failed;
        Error::protocol(command, reply.code.as_u16(), reply.message_text())
    }

    async fn transact(
        &mut self,
        config: &ClientConfig,
        envelope: &Envelope,
        message: &ComposedMessage,
    ) -> Result<()> {
        self.authenticate(config.auth, config.username(), &config.secret)
            .await?;

        if let Some(limit) = self.server_info.max_message_size()
            && message.len() > limit
        {
            self.state = SessionState::Failed;
            return Err(Error::MessageTooLarge {
                size: message.len(),
                limit,
            });
        }
        let size = self.server_info.supports_size().then(|| message.len());

        self.mail_from(&envelope.from, size).await?;
        self.rcpt_to(&envelope.to).await?;
        self.data().await?;
        self.send_message(message).await
    }
}

/// Runs a whole submission over an already connected transport.
///
/// `posture` must match the transport: implicit TLS expects an encrypted
/// transport, STARTTLS and plaintext expect a plain one. On any failure
/// after the greeting the session says QUIT when the connection is still
/// usable, closes the transport, and returns the original error.
///
/// # Errors
///
/// Returns the first error of the dialogue.
pub async fn deliver<T: Transport>(
    transport: T,
    config: &ClientConfig,
    posture: Posture,
    envelope: &Envelope,
    message: &ComposedMessage,
) -> Result<()> {
    let mut session = Session::new(transport, config.io_timeout);

    // Nothing may cross an unencrypted transport here, not even QUIT
    if posture == Posture::ImplicitTls && !session.is_tls() {
        session.close().await;
        return Err(Error::InvalidState(
            "implicit TLS over an unencrypted transport".into(),
        ));
    }

    if let Err(error) = session.open(&config.client_name).await {
        return Err(session.abort(error).await);
    }

    match posture {
        Posture::StartTls => {
            if let Err(error) = session.request_starttls().await {
                return Err(session.abort(error).await);
            }
            session = session.upgrade(&config.host).await?;
            if let Err(error) = session.ehlo(&config.client_name).await {
                return Err(session.abort(error).await);
            }
        }
        Posture::Plaintext => {
            warn!(host = %config.host, "Connection is not encrypted; credentials are sent in the clear");
        }
        Posture::ImplicitTls => {}
    }

    match session.transact(config, envelope, message).await {
        Ok(()) => {
            session.finish().await;
            Ok(())
        }
        Err(error) => Err(session.abort(error).await),
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

    const ALL: [SessionState; 10] = [
        SessionState::Connected,
        SessionState::Greeted,
        SessionState::TlsUpgraded,
        SessionState::Authenticated,
        SessionState::SenderSet,
        SessionState::RecipientSet,
        SessionState::DataMode,
        SessionState::MessageSent,
        SessionState::Closed,
        SessionState::Failed,
    ];

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            SessionState::Connected,
            SessionState::Greeted,
            SessionState::TlsUpgraded,
            SessionState::Greeted,
            SessionState::Authenticated,
            SessionState::SenderSet,
            SessionState::RecipientSet,
            SessionState::DataMode,
            SessionState::MessageSent,
            SessionState::Closed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping_steps() {
        assert!(!SessionState::Connected.can_advance_to(SessionState::Authenticated));
        assert!(!SessionState::Greeted.can_advance_to(SessionState::SenderSet));
        assert!(!SessionState::TlsUpgraded.can_advance_to(SessionState::Authenticated));
        assert!(!SessionState::SenderSet.can_advance_to(SessionState::DataMode));
        assert!(!SessionState::RecipientSet.can_advance_to(SessionState::MessageSent));
        assert!(!SessionState::MessageSent.can_advance_to(SessionState::SenderSet));
    }

    #[test]
    fn test_any_live_state_can_fail() {
        for state in ALL {
            assert_eq!(
                state.can_advance_to(SessionState::Failed),
                !state.is_terminal(),
                "{state:?}"
            );
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in ALL {
            assert!(!SessionState::Closed.can_advance_to(next));
            assert!(!SessionState::Failed.can_advance_to(next));
        }
    }

    #[test]
    fn test_server_info_size() {
        let mut info = ServerInfo::default();
        assert!(!info.supports_size());
        assert_eq!(info.max_message_size(), None);

        info.extensions.insert(Extension::Size(Some(0)));
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), None);

        info.extensions.clear();
        info.extensions.insert(Extension::Size(Some(1000)));
        assert_eq!(info.max_message_size(), Some(1000));
    }

    #[test]
    fn test_server_info_auth() {
        let mut info = ServerInfo::default();
        assert_eq!(info.auth_mechanisms(), None);
        info.extensions
            .insert(Extension::Auth(vec![AuthMechanism::XOAuth2]));
        assert_eq!(info.auth_mechanisms(), Some(&[AuthMechanism::XOAuth2][..]));
    }
}
