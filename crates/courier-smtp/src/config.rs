//! Client configuration and connection posture.

use crate::error::{Error, Result};
use crate::types::{Address, AuthMechanism};
use std::fmt;
use std::time::Duration;

/// Port for SMTP over implicit TLS (submissions).
pub const IMPLICIT_TLS_PORT: u16 = 465;
/// Port for message submission.
pub const SUBMISSION_PORT: u16 = 587;
/// Alternate submission port offered by many providers.
pub const ALTERNATE_SUBMISSION_PORT: u16 = 2525;
/// Port for relay between servers. Not supported for submission.
pub const RELAY_PORT: u16 = 25;

/// How the connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    /// TLS from the first byte (port 465).
    ImplicitTls,
    /// Plaintext greeting, then STARTTLS before authenticating.
    StartTls,
    /// No encryption at all. Credentials travel in the clear.
    Plaintext,
}

impl Posture {
    /// Derives the posture from the port and the STARTTLS flag.
    ///
    /// Port 465 is always implicit TLS and ignores the flag. Ports 587 and
    /// 2525 use STARTTLS when the flag is set and plaintext otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for port 25 and for any other port.
    pub fn select(port: u16, starttls: bool) -> Result<Self> {
        match port {
            IMPLICIT_TLS_PORT => Ok(Self::ImplicitTls),
            SUBMISSION_PORT | ALTERNATE_SUBMISSION_PORT if starttls => Ok(Self::StartTls),
            SUBMISSION_PORT | ALTERNATE_SUBMISSION_PORT => Ok(Self::Plaintext),
            RELAY_PORT => Err(Error::Config(
                "Port 25 is for server relay; use 465, 587 or 2525".into(),
            )),
            other => Err(Error::Config(format!(
                "Unsupported port {other}; use 465, 587 or 2525"
            ))),
        }
    }
}

/// SMTP client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Server hostname, also used for certificate verification.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Sender address, used for MAIL FROM and the From header.
    pub sender: String,
    /// Login name. Defaults to the sender address.
    pub username: Option<String>,
    /// Password for LOGIN or bearer token for XOAUTH2.
    pub secret: String,
    /// Authentication mechanism.
    pub auth: AuthMechanism,
    /// Upgrade with STARTTLS on ports 587 and 2525.
    pub starttls: bool,
    /// Name sent with EHLO.
    pub client_name: String,
    /// Connection timeout, covering the TLS handshake.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(
        host: impl Into<String>,
        sender: impl Into<String>,
        secret: impl Into<String>,
    ) -> ClientConfigBuilder {
        ClientConfigBuilder::new(host, sender, secret)
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.sender)
    }

    /// Returns the connection posture for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the port is not supported.
    pub fn posture(&self) -> Result<Posture> {
        Posture::select(self.port, self.starttls)
    }

    /// Checks that the configuration can be used to send.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first unusable field, or
    /// [`Error::InvalidAddress`] for a bad sender.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("Server host is empty".into()));
        }
        if self.secret.is_empty() {
            return Err(Error::Config("Secret is empty".into()));
        }
        if self.username().is_empty() {
            return Err(Error::Config("Username is empty".into()));
        }
        if self.client_name.is_empty()
            || self
                .client_name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::Config(format!(
                "Invalid client name: {:?}",
                self.client_name
            )));
        }
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err(Error::Config("Timeouts must be non-zero".into()));
        }
        Address::new(self.sender.as_str())?;
        self.posture().map(|_| ())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("auth", &self.auth)
            .field("starttls", &self.starttls)
            .field("client_name", &self.client_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

/// Builder for client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a new builder. Defaults to port 587 with STARTTLS and LOGIN.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        sender: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            config: ClientConfig {
                host: host.into(),
                port: SUBMISSION_PORT,
                sender: sender.into(),
                username: None,
                secret: secret.into(),
                auth: AuthMechanism::Login,
                starttls: true,
                client_name: "localhost".to_string(),
                connect_timeout: Duration::from_secs(30),
                io_timeout: Duration::from_secs(60),
            },
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the login name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    /// Sets the authentication mechanism.
    #[must_use]
    pub const fn auth(mut self, auth: AuthMechanism) -> Self {
        self.config.auth = auth;
        self
    }

    /// Enables or disables STARTTLS.
    #[must_use]
    pub const fn starttls(mut self, starttls: bool) -> Self {
        self.config.starttls = starttls;
        self
    }

    /// Sets the name sent with EHLO.
    #[must_use]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
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
    use crate::error::ErrorKind;

    fn config() -> ClientConfig {
        ClientConfig::builder("smtp.example.com", "me@example.com", "hunter2").build()
    }

    #[test]
    fn test_posture_for_supported_ports() {
        assert_eq!(Posture::select(465, false).unwrap(), Posture::ImplicitTls);
        assert_eq!(Posture::select(465, true).unwrap(), Posture::ImplicitTls);
        assert_eq!(Posture::select(587, true).unwrap(), Posture::StartTls);
        assert_eq!(Posture::select(587, false).unwrap(), Posture::Plaintext);
        assert_eq!(Posture::select(2525, true).unwrap(), Posture::StartTls);
        assert_eq!(Posture::select(2525, false).unwrap(), Posture::Plaintext);
    }

    #[test]
    fn test_posture_rejects_other_ports() {
        for port in [25, 26, 0, 143, 993, 2526, 65535] {
            for starttls in [true, false] {
                let err = Posture::select(port, starttls).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Config, "port {port}");
            }
        }
        let err = Posture::select(25, true).unwrap_err();
        assert!(err.to_string().contains("Port 25"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = config();
        assert_eq!(config.port, 587);
        assert!(config.starttls);
        assert_eq!(config.auth, AuthMechanism::Login);
        assert_eq!(config.client_name, "localhost");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(60));
        assert_eq!(config.username(), "me@example.com");
        assert_eq!(config.posture().unwrap(), Posture::StartTls);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::builder("smtp.example.com", "me@example.com", "token")
            .port(465)
            .auth(AuthMechanism::XOAuth2)
            .username("login-name")
            .client_name("client.example.com")
            .io_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.posture().unwrap(), Posture::ImplicitTls);
        assert_eq!(config.username(), "login-name");
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        config.validate().unwrap();
    }

    #[test]
    fn test_validate() {
        config().validate().unwrap();

        let mut bad = config();
        bad.port = 25;
        assert_eq!(bad.validate().unwrap_err().kind(), ErrorKind::Config);

        let mut bad = config();
        bad.secret = String::new();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.host = "  ".into();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.client_name = "bad name\r\n".into();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.sender = "not-an-address".into();
        assert!(matches!(bad.validate(), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("smtp.example.com"));
    }
}
