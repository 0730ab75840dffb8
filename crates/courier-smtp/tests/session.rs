//! Session tests against a scripted in-memory server.
//!
//! The mock transport hands out the greeting immediately and then releases
//! one scripted reply each time the client flushes, which is exactly once
//! per command and once after the end-of-data marker.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names,
    missing_docs
)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use courier_mime::encoding::encode_base64;
use courier_mime::{ComposedMessage, Composer, MailMessage};
use courier_smtp::sasl::xoauth2_response;
use courier_smtp::{
    AuthMechanism, ClientConfig, Envelope, Error, ErrorKind, Posture, Session, SessionState,
    Transport, deliver,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
struct Wire {
    sent: Vec<u8>,
    tls_at: Option<usize>,
    shut_down: bool,
}

impl Wire {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }
}

#[derive(Debug)]
struct MockTransport {
    readable: VecDeque<u8>,
    script: VecDeque<String>,
    wire: Arc<Mutex<Wire>>,
    tls: bool,
    fail_upgrade: bool,
    stall: bool,
    pace: Option<Duration>,
    delay: Option<Pin<Box<tokio::time::Sleep>>>,
}

impl MockTransport {
    fn new(greeting: &str, replies: &[&str]) -> (Self, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let transport = Self {
            readable: greeting.bytes().collect(),
            script: replies.iter().map(|r| (*r).to_string()).collect(),
            wire: Arc::clone(&wire),
            tls: false,
            fail_upgrade: false,
            stall: false,
            pace: None,
            delay: None,
        };
        (transport, wire)
    }

    fn encrypted(mut self) -> Self {
        self.tls = true;
        self
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(delay) = this.delay.as_mut() {
            if delay.as_mut().poll(cx).is_pending() {
                return Poll::Pending;
            }
            this.delay = None;
        }
        if this.readable.is_empty() {
            if this.stall {
                return Poll::Pending;
            }
            // End of script reads as a closed connection
            return Poll::Ready(Ok(()));
        }
        let mut n = buf.remaining().min(this.readable.len());
        if let Some(pace) = this.pace {
            // One line per read, then wait
            if let Some(end) = this.readable.iter().position(|&b| b == b'\n') {
                n = n.min(end + 1);
            }
            this.delay = Some(Box::pin(tokio::time::sleep(pace)));
        }
        let chunk: Vec<u8> = this.readable.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.wire.lock().unwrap().sent.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(reply) = this.script.pop_front() {
            this.readable.extend(reply.bytes());
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.wire.lock().unwrap().shut_down = true;
        Poll::Ready(Ok(()))
    }
}

impl Transport for MockTransport {
    async fn upgrade_to_tls(mut self, _hostname: &str) -> courier_smtp::Result<Self> {
        if self.fail_upgrade {
            return Err(Error::Tls("certificate verify failed".into()));
        }
        {
            let mut wire = self.wire.lock().unwrap();
            wire.tls_at = Some(wire.sent.len());
        }
        self.tls = true;
        Ok(self)
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

const GREETING: &str = "220 smtp.example.com ESMTP ready\r\n";

fn config(port: u16, auth: AuthMechanism) -> ClientConfig {
    ClientConfig::builder("smtp.example.com", "me@example.com", "hunter2")
        .port(port)
        .starttls(port != 465)
        .auth(auth)
        .build()
}

fn plaintext_config() -> ClientConfig {
    ClientConfig::builder("smtp.example.com", "me@example.com", "hunter2")
        .port(587)
        .starttls(false)
        .build()
}

fn envelope() -> Envelope {
    Envelope::new("me@example.com", "you@example.org").unwrap()
}

fn compose(body: &str) -> ComposedMessage {
    let message = MailMessage::new("you@example.org", "Hello", body);
    Composer::new("me@example.com")
        .date(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        .compose(&message)
        .unwrap()
}

fn login_lines() -> String {
    format!(
        "AUTH LOGIN\r\n{}\r\n{}\r\n",
        encode_base64(b"me@example.com"),
        encode_base64(b"hunter2")
    )
}

#[tokio::test]
async fn test_login_over_plaintext() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250-AUTH LOGIN PLAIN\r\n250 8BITMIME\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 2.7.0 Authentication successful\r\n",
            "250 2.1.0 OK\r\n",
            "250 2.1.5 OK\r\n",
            "354 Go ahead\r\n",
            "250 2.0.0 OK queued as 12345\r\n",
            "221 2.0.0 Bye\r\n",
        ],
    );
    let message = compose("Hello there");

    deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &message,
    )
    .await
    .unwrap();

    let wire = wire.lock().unwrap();
    let text = wire.text();
    let expected_start = format!(
        "EHLO localhost\r\n{}MAIL FROM:<me@example.com>\r\nRCPT TO:<you@example.org>\r\nDATA\r\n",
        login_lines()
    );
    assert!(text.starts_with(&expected_start), "{text}");
    assert!(text.contains("Subject: Hello\r\n"));
    assert!(text.ends_with("Hello there\r\n.\r\nQUIT\r\n"), "{text}");
    assert!(wire.shut_down);
    assert!(wire.tls_at.is_none());
}

#[tokio::test]
async fn test_xoauth2_over_implicit_tls() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250 AUTH LOGIN XOAUTH2\r\n",
            "235 2.7.0 Accepted\r\n",
            "250 OK\r\n",
            "250 OK\r\n",
            "354 Go ahead\r\n",
            "250 OK\r\n",
            "221 Bye\r\n",
        ],
    );
    let config = ClientConfig::builder("smtp.example.com", "me@example.com", "ya29.token")
        .port(465)
        .auth(AuthMechanism::XOAuth2)
        .build();

    deliver(
        transport.encrypted(),
        &config,
        Posture::ImplicitTls,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap();

    let text = wire.lock().unwrap().text();
    let auth_line = format!(
        "EHLO localhost\r\nAUTH XOAUTH2 {}\r\nMAIL FROM:<me@example.com>\r\n",
        xoauth2_response("me@example.com", "ya29.token")
    );
    assert!(text.starts_with(&auth_line), "{text}");
    assert!(!text.contains("STARTTLS"));
}

#[tokio::test]
async fn test_starttls_upgrade_repeats_ehlo() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250-STARTTLS\r\n250 SIZE 1000000\r\n",
            "220 2.0.0 Ready to start TLS\r\n",
            "250-smtp.example.com\r\n250-AUTH LOGIN\r\n250 SIZE 1000000\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 Accepted\r\n",
            "250 OK\r\n",
            "250 OK\r\n",
            "354 Go ahead\r\n",
            "250 OK\r\n",
            "221 Bye\r\n",
        ],
    );
    let message = compose("Secret stuff");

    deliver(
        transport,
        &config(587, AuthMechanism::Login),
        Posture::StartTls,
        &envelope(),
        &message,
    )
    .await
    .unwrap();

    let wire = wire.lock().unwrap();
    let tls_at = wire.tls_at.expect("connection was upgraded");
    let (before, after) = wire.sent.split_at(tls_at);
    assert_eq!(before, b"EHLO localhost\r\nSTARTTLS\r\n");

    let after = String::from_utf8_lossy(after);
    let expected = format!(
        "EHLO localhost\r\n{}MAIL FROM:<me@example.com> SIZE={}\r\n",
        login_lines(),
        message.len()
    );
    assert!(after.starts_with(&expected), "{after}");
}

#[tokio::test]
async fn test_starttls_not_advertised() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &["250-smtp.example.com\r\n250 AUTH LOGIN\r\n", "221 Bye\r\n"],
    );

    let err = deliver(
        transport,
        &config(2525, AuthMechanism::Login),
        Posture::StartTls,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NotSupported(_)));
    assert_eq!(err.kind(), ErrorKind::Protocol);
    let wire = wire.lock().unwrap();
    assert_eq!(wire.text(), "EHLO localhost\r\nQUIT\r\n");
    assert!(wire.shut_down);
}

#[tokio::test]
async fn test_tls_upgrade_failure_closes_transport() {
    let (mut transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250 STARTTLS\r\n",
            "220 Ready to start TLS\r\n",
        ],
    );
    transport.fail_upgrade = true;

    let err = deliver(
        transport,
        &config(587, AuthMechanism::Login),
        Posture::StartTls,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Tls);
    assert_eq!(
        wire.lock().unwrap().text(),
        "EHLO localhost\r\nSTARTTLS\r\n"
    );
}

#[tokio::test]
async fn test_recipient_rejected_skips_data() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250 AUTH LOGIN\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 Accepted\r\n",
            "250 OK\r\n",
            "550 5.1.1 No such user here\r\n",
            "221 Bye\r\n",
        ],
    );

    let err = deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    match &err {
        Error::Protocol {
            command,
            code,
            message,
        } => {
            assert_eq!(command, "RCPT TO");
            assert_eq!(*code, 550);
            assert_eq!(message, "5.1.1 No such user here");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_permanent());

    let text = wire.lock().unwrap().text();
    assert!(!text.contains("DATA\r\n"));
    assert!(text.ends_with("RCPT TO:<you@example.org>\r\nQUIT\r\n"), "{text}");
}

#[tokio::test]
async fn test_login_rejected() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250 AUTH LOGIN\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "535 5.7.8 Authentication credentials invalid\r\n",
            "221 Bye\r\n",
        ],
    );

    let err = deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(err.code(), Some(535));
    let text = wire.lock().unwrap().text();
    assert!(!text.contains("MAIL FROM"));
    assert!(!text.contains("hunter2"));
    assert!(text.ends_with("QUIT\r\n"));
}

#[tokio::test]
async fn test_xoauth2_error_challenge() {
    let challenge = format!(
        "334 {}\r\n",
        encode_base64(br#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#)
    );
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250 AUTH XOAUTH2\r\n",
            &challenge,
            "535 5.7.8 Username and Password not accepted\r\n",
            "221 Bye\r\n",
        ],
    );

    let err = deliver(
        transport,
        &config(587, AuthMechanism::XOAuth2),
        Posture::Plaintext,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    match &err {
        Error::Auth { code, message } => {
            assert_eq!(*code, 535);
            assert!(message.contains("status 401"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let text = wire.lock().unwrap().text();
    assert!(text.ends_with("\r\n\r\nQUIT\r\n"), "{text}");
}

#[tokio::test]
async fn test_message_over_size_limit() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250-AUTH LOGIN\r\n250 SIZE 100\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 Accepted\r\n",
            "221 Bye\r\n",
        ],
    );
    let message = compose(&"x".repeat(500));

    let err = deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &message,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        Error::MessageTooLarge { limit: 100, size } if size == message.len()
    ));
    let text = wire.lock().unwrap().text();
    assert!(!text.contains("MAIL FROM"));
    assert!(text.ends_with("QUIT\r\n"));
}

#[tokio::test]
async fn test_body_is_dot_stuffed() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250 AUTH LOGIN\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 Accepted\r\n",
            "250 OK\r\n",
            "250 OK\r\n",
            "354 Go ahead\r\n",
            "250 OK\r\n",
            "221 Bye\r\n",
        ],
    );

    deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &compose("first\n.second\n."),
    )
    .await
    .unwrap();

    let text = wire.lock().unwrap().text();
    assert!(
        text.ends_with("\r\n\r\nfirst\r\n..second\r\n..\r\n.\r\nQUIT\r\n"),
        "{text}"
    );
}

#[tokio::test]
async fn test_large_body_streams_in_chunks() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250 AUTH LOGIN\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 Accepted\r\n",
            "250 OK\r\n",
            "250 OK\r\n",
            "354 Go ahead\r\n",
            "250 OK\r\n",
            "221 Bye\r\n",
        ],
    );
    let line = format!(".{}\n", "a".repeat(60));
    let message = compose(&line.repeat(2000));

    deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &message,
    )
    .await
    .unwrap();

    let text = wire.lock().unwrap().text();
    let stuffed_lines = text.matches("\r\n..aaaa").count();
    assert_eq!(stuffed_lines, 2000);
}

#[tokio::test]
async fn test_greeting_rejected() {
    let (transport, wire) = MockTransport::new(
        "554 5.3.2 No service for you\r\n",
        &["221 Bye\r\n"],
    );

    let err = deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Some(554));
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(wire.lock().unwrap().text(), "QUIT\r\n");
}

#[tokio::test]
async fn test_connection_dropped_mid_dialogue() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &["250-smtp.example.com\r\n250 AUTH LOGIN\r\n"],
    );

    let err = deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::ConnectionClosed));
    assert_eq!(err.kind(), ErrorKind::Connection);
    let wire = wire.lock().unwrap();
    assert_eq!(wire.text(), "EHLO localhost\r\nAUTH LOGIN\r\n");
    assert!(wire.shut_down);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_times_out() {
    let (mut transport, wire) = MockTransport::new(GREETING, &[]);
    transport.stall = true;
    let config = ClientConfig::builder("smtp.example.com", "me@example.com", "hunter2")
        .starttls(false)
        .io_timeout(Duration::from_secs(10))
        .build();

    let err = deliver(
        transport,
        &config,
        Posture::Plaintext,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(10)));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(wire.lock().unwrap().text(), "EHLO localhost\r\n");
}

#[tokio::test]
async fn test_multiline_ehlo_capabilities() {
    let (transport, _wire) = MockTransport::new(
        GREETING,
        &["250-smtp.example.com greets you\r\n250-SIZE 35882577\r\n250-8BITMIME\r\n250-AUTH LOGIN PLAIN XOAUTH2\r\n250-STARTTLS\r\n250 SMTPUTF8\r\n"],
    );
    let mut session = Session::new(transport, Duration::from_secs(5));

    session.open("client.example.com").await.unwrap();

    assert_eq!(session.state(), SessionState::Greeted);
    let info = session.server_info();
    assert_eq!(info.hostname, "smtp.example.com");
    assert!(info.supports_starttls());
    assert_eq!(info.max_message_size(), Some(35_882_577));
    assert_eq!(
        info.auth_mechanisms(),
        Some(&[AuthMechanism::Login, AuthMechanism::XOAuth2][..])
    );
}

#[tokio::test]
async fn test_out_of_order_step_sends_nothing() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &["250-smtp.example.com\r\n250 AUTH LOGIN\r\n"],
    );
    let mut session = Session::new(transport, Duration::from_secs(5));
    session.open("localhost").await.unwrap();

    let to = envelope().to;
    let err = session.rcpt_to(&to).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert!(session.data().await.is_err());
    assert_eq!(wire.lock().unwrap().text(), "EHLO localhost\r\n");
    assert_eq!(session.state(), SessionState::Greeted);
}

#[tokio::test]
async fn test_implicit_tls_posture_requires_encrypted_transport() {
    let (transport, wire) = MockTransport::new(GREETING, &["221 Bye\r\n"]);

    let err = deliver(
        transport,
        &config(465, AuthMechanism::Login),
        Posture::ImplicitTls,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::InvalidState(_)));
    let wire = wire.lock().unwrap();
    assert_eq!(wire.text(), "");
    assert!(wire.shut_down);
}

#[tokio::test]
async fn test_data_buffered_after_starttls_is_rejected() {
    let (transport, wire) = MockTransport::new(
        GREETING,
        &[
            "250-smtp.example.com\r\n250-STARTTLS\r\n250 AUTH LOGIN\r\n",
            "220 Go ahead\r\n250-AUTH LOGIN\r\n",
            "221 Bye\r\n",
        ],
    );

    let err = deliver(
        transport,
        &config(587, AuthMechanism::Login),
        Posture::StartTls,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::MalformedReply(_)));
    let wire = wire.lock().unwrap();
    assert_eq!(wire.tls_at, None);
    assert!(!wire.text().contains("AUTH"));
    assert_eq!(wire.text(), "EHLO localhost\r\nSTARTTLS\r\nQUIT\r\n");
    assert!(wire.shut_down);
}

#[tokio::test]
async fn test_overlong_reply_line_is_rejected() {
    let greeting = format!("220 {}\r\n", "a".repeat(5000));
    let (transport, _wire) = MockTransport::new(&greeting, &[]);
    let mut session = Session::new(transport, Duration::from_secs(5));

    let err = session.read_greeting().await.unwrap_err();
    assert!(matches!(err, Error::MalformedReply(_)));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_endless_multiline_reply_is_cut_off() {
    let mut ehlo = "250-smtp.example.com\r\n".to_string();
    for i in 0..1000 {
        ehlo.push_str(&format!("250-X-FILLER-{i}\r\n"));
    }
    ehlo.push_str("250 OK\r\n");
    let (transport, wire) = MockTransport::new(GREETING, &[ehlo.as_str(), "221 Bye\r\n"]);

    let err = deliver(
        transport,
        &plaintext_config(),
        Posture::Plaintext,
        &envelope(),
        &compose("Hi"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::MalformedReply(_)));
    assert_eq!(wire.lock().unwrap().text(), "EHLO localhost\r\nQUIT\r\n");
}

#[tokio::test(start_paused = true)]
async fn test_unfinished_multiline_reply_times_out() {
    let (mut transport, _wire) = MockTransport::new("220-smtp.example.com\r\n", &[]);
    transport.stall = true;
    let mut session = Session::new(transport, Duration::from_secs(3));

    let err = session.read_greeting().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(3)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_reply_lines_share_one_deadline() {
    // Every line arrives well within the timeout, the whole reply does not
    let greeting = "220-smtp.example.com\r\n".repeat(20) + "220 ready\r\n";
    let (mut transport, _wire) = MockTransport::new(&greeting, &[]);
    transport.pace = Some(Duration::from_secs(1));
    let mut session = Session::new(transport, Duration::from_secs(5));

    let started = tokio::time::Instant::now();
    let err = session.read_greeting().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
    assert!(started.elapsed() < Duration::from_secs(10));
}
