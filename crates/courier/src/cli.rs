//! Command-line arguments.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use courier_mime::Attachment;
use courier_smtp::AuthMechanism;

use crate::settings::Settings;

/// Send one email through an SMTP submission server.
#[derive(Parser)]
#[command(name = "courier", about = "Send one email through an SMTP submission server", version)]
pub struct Cli {
    /// Settings file (default: <config dir>/courier/settings.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Recipient address
    #[arg(long)]
    pub to: String,

    /// Subject line
    #[arg(short, long)]
    pub subject: String,

    /// Message body
    #[arg(short, long, required_unless_present = "body_file", conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the message body from a file
    #[arg(long, value_name = "FILE")]
    pub body_file: Option<PathBuf>,

    /// Send the body as HTML
    #[arg(long)]
    pub html: bool,

    /// Attach a file, optionally under another name
    #[arg(short, long = "attach", value_name = "PATH[=NAME]")]
    pub attachments: Vec<String>,

    /// Override the server hostname
    #[arg(long)]
    pub host: Option<String>,

    /// Override the server port (465, 587 or 2525)
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the login name
    #[arg(long)]
    pub username: Option<String>,

    /// Override the authentication mechanism
    #[arg(long, value_enum)]
    pub auth: Option<AuthArg>,

    /// Do not upgrade with STARTTLS (ports 587 and 2525 only)
    #[arg(long)]
    pub no_starttls: bool,

    /// Password or `OAuth2` token
    #[arg(long, env = "COURIER_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

/// Authentication mechanism as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthArg {
    /// Username and password
    Login,
    /// `OAuth2` bearer token
    Xoauth2,
}

impl From<AuthArg> for AuthMechanism {
    fn from(arg: AuthArg) -> Self {
        match arg {
            AuthArg::Login => Self::Login,
            AuthArg::Xoauth2 => Self::XOAuth2,
        }
    }
}

impl Cli {
    /// Applies the server overrides given on the command line.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(username) = &self.username {
            settings.username = Some(username.clone());
        }
        if let Some(auth) = self.auth {
            settings.auth = auth.into();
        }
        if self.no_starttls {
            settings.starttls = false;
        }
    }
}

/// Parses an `--attach` value of the form `path` or `path=name`.
///
/// Without a name the file name of `path` is used.
pub fn parse_attachment(value: &str) -> Result<Attachment> {
    let (path, name) = match value.rsplit_once('=') {
        Some((path, name)) if !path.is_empty() && !name.is_empty() => (path, Some(name)),
        _ => (value, None),
    };

    let path = Path::new(path);
    let name = match name {
        Some(name) => name.to_string(),
        None => match path.file_name() {
            Some(file_name) => file_name.to_string_lossy().into_owned(),
            None => bail!("Attachment path has no file name: {value}"),
        },
    };

    Ok(Attachment::from_path(name, path))
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
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_attachment_without_name() {
        let attachment = parse_attachment("/tmp/reports/q3.pdf").unwrap();
        assert_eq!(attachment, Attachment::from_path("q3.pdf", "/tmp/reports/q3.pdf"));
    }

    #[test]
    fn test_attachment_with_name() {
        let attachment = parse_attachment("./out.bin=report.pdf").unwrap();
        assert_eq!(attachment, Attachment::from_path("report.pdf", "./out.bin"));
    }

    #[test]
    fn test_attachment_trailing_equals_keeps_path() {
        let attachment = parse_attachment("notes=").unwrap();
        assert_eq!(attachment.filename(), "notes=");
    }

    #[test]
    fn test_attachment_without_file_name() {
        assert!(parse_attachment("/").is_err());
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from([
            "courier",
            "--to",
            "you@example.com",
            "--subject",
            "Hi",
            "--body",
            "Hello",
            "--attach",
            "a.txt",
            "--attach",
            "b.bin=b.pdf",
            "--port",
            "465",
            "--auth",
            "xoauth2",
        ])
        .unwrap();
        assert_eq!(cli.to, "you@example.com");
        assert_eq!(cli.attachments.len(), 2);
        assert_eq!(cli.auth, Some(AuthArg::Xoauth2));
        assert!(!cli.html);
    }

    #[test]
    fn test_body_required() {
        let result = Cli::try_parse_from(["courier", "--to", "you@example.com", "--subject", "Hi"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "courier", "--to", "a@b.c", "--subject", "Hi", "--body", "x", "--body-file", "f",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "courier",
            "--to",
            "you@example.com",
            "--subject",
            "Hi",
            "--body-file",
            "body.txt",
            "--host",
            "mail.example.org",
            "--port",
            "2525",
            "--no-starttls",
        ])
        .unwrap();

        let mut settings: Settings =
            serde_json::from_str(r#"{"host":"smtp.example.com","sender":"me@example.com"}"#)
                .unwrap();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.host, "mail.example.org");
        assert_eq!(settings.port, 2525);
        assert!(!settings.starttls);
        assert_eq!(settings.auth, AuthMechanism::Login);
    }
}
