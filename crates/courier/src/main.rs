//! `courier` - send one email from the command line
//!
//! Reads server settings from a JSON file, composes the message and submits
//! it through `courier-smtp`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use courier_mime::MailMessage;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, parse_attachment};
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "courier=debug,courier_smtp=debug,courier_mime=debug"
    } else {
        "courier=info,courier_smtp=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&path)?;
    cli.apply_overrides(&mut settings);
    let config = settings.into_config(cli.secret.clone())?;

    let body = match (&cli.body, &cli.body_file) {
        (Some(body), _) => body.clone(),
        (None, Some(file)) => tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read body from {}", file.display()))?,
        (None, None) => String::new(),
    };

    let mut message = MailMessage::new(&cli.to, &cli.subject, body).html(cli.html);
    for value in &cli.attachments {
        message.add_attachment(parse_attachment(value)?);
    }

    courier_smtp::send_email(&config, &message)
        .await
        .with_context(|| format!("Failed to send message to {}", message.to))?;

    info!(to = %message.to, "Message sent");
    Ok(())
}
