//! Server settings file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use courier_smtp::{AuthMechanism, ClientConfig};
use serde::{Deserialize, Serialize};

/// Server and account settings, stored as JSON.
///
/// ```json
/// {
///   "host": "smtp.example.com",
///   "port": 587,
///   "sender": "me@example.com",
///   "auth": "login",
///   "starttls": true
/// }
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sender address.
    pub sender: String,
    /// Login name, if different from the sender.
    #[serde(default)]
    pub username: Option<String>,
    /// Password or token. Prefer `COURIER_SECRET` over storing it here.
    #[serde(default)]
    pub secret: Option<String>,
    /// Authentication mechanism.
    #[serde(default)]
    pub auth: AuthMechanism,
    /// Upgrade with STARTTLS on ports 587 and 2525.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
    /// Name sent with EHLO.
    #[serde(default)]
    pub client_name: Option<String>,
    /// Connection timeout in seconds.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Read/write timeout in seconds.
    #[serde(default)]
    pub io_timeout_secs: Option<u64>,
}

const fn default_port() -> u16 {
    587
}

const fn default_starttls() -> bool {
    true
}

impl Settings {
    /// Returns the default settings location, `<config dir>/courier/settings.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("courier")
            .join("settings.json")
    }

    /// Loads settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        tracing::debug!("Settings loaded from {:?}", path);
        Ok(settings)
    }

    /// Builds the client configuration.
    ///
    /// `secret` takes precedence over the secret stored in the file.
    pub fn into_config(self, secret: Option<String>) -> Result<ClientConfig> {
        let Some(secret) = secret.or(self.secret) else {
            bail!("No secret configured; set COURIER_SECRET or \"secret\" in the settings file");
        };

        let mut builder = ClientConfig::builder(self.host, self.sender, secret)
            .port(self.port)
            .auth(self.auth)
            .starttls(self.starttls);
        if let Some(username) = self.username {
            builder = builder.username(username);
        }
        if let Some(name) = self.client_name {
            builder = builder.client_name(name);
        }
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.io_timeout_secs {
            builder = builder.io_timeout(Duration::from_secs(secs));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
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

    fn parse(json: &str) -> Settings {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = parse(r#"{"host":"smtp.example.com","sender":"me@example.com"}"#);
        assert_eq!(settings.port, 587);
        assert!(settings.starttls);
        assert_eq!(settings.auth, AuthMechanism::Login);
        assert!(settings.secret.is_none());
    }

    #[test]
    fn test_full_settings() {
        let settings = parse(
            r#"{
                "host": "smtp.gmail.com",
                "port": 465,
                "sender": "me@gmail.com",
                "username": "me",
                "auth": "xoauth2",
                "starttls": false,
                "client_name": "laptop.example.com",
                "io_timeout_secs": 20
            }"#,
        );
        let config = settings.into_config(Some("token".into())).unwrap();
        assert_eq!(config.port, 465);
        assert_eq!(config.auth, AuthMechanism::XOAuth2);
        assert_eq!(config.username(), "me");
        assert_eq!(config.client_name, "laptop.example.com");
        assert_eq!(config.io_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<Settings, _> = serde_json::from_str(
            r#"{"host":"h","sender":"me@example.com","pasword":"typo"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_secret_required() {
        let settings = parse(r#"{"host":"smtp.example.com","sender":"me@example.com"}"#);
        assert!(settings.clone().into_config(None).is_err());

        let mut stored = settings;
        stored.secret = Some("from-file".into());
        let config = stored.into_config(Some("from-env".into())).unwrap();
        assert_eq!(config.secret, "from-env");
    }

    #[test]
    fn test_port_25_rejected() {
        let settings = parse(r#"{"host":"smtp.example.com","port":25,"sender":"me@example.com"}"#);
        let err = settings.into_config(Some("pw".into())).unwrap_err();
        let smtp = err.downcast_ref::<courier_smtp::Error>().unwrap();
        assert_eq!(smtp.kind(), courier_smtp::ErrorKind::Config);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("courier-settings-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"host":"smtp.example.com","sender":"me@example.com"}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.host, "smtp.example.com");

        std::fs::remove_file(&path).unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
