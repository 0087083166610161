/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! `send-email`: send a message from the command line.
//!
//! ```bash
//!  $ send-email --to recipient@example.com --subject "Hello" --body "This is a test email"
//! ```
//!
//! Credentials come from `EMAIL_ADDRESS`/`EMAIL_PASSWORD` (and optionally
//! `EMAIL_SMTP_SERVER`, `EMAIL_SMTP_PORT`, `EMAIL_SMTP_SECURITY`), then from a
//! `.env` file in the current directory, then from `--config-file`.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context};
use clap::Parser;
use mail_courier::{message::split_recipients, ConfigLoader, Email, EmailConfig, EmailSender};

#[derive(Parser, Debug)]
#[command(name = "send-email")]
#[command(about = "Send an email through an SMTP provider", long_about = None)]
#[command(version)]
struct Cli {
    /// Recipient email address(es), comma-separated
    #[arg(long)]
    to: String,

    /// Email subject
    #[arg(long)]
    subject: String,

    /// Email body content
    #[arg(long)]
    body: String,

    /// Path to a JSON, INI or .env configuration file
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Send the email as HTML
    #[arg(long)]
    html: bool,

    /// Carbon copy recipient(s), comma-separated
    #[arg(long)]
    cc: Option<String>,

    /// Blind carbon copy recipient(s), comma-separated
    #[arg(long)]
    bcc: Option<String>,

    /// File to attach (can be used multiple times)
    #[arg(long = "attachment", value_name = "FILE")]
    attachments: Vec<PathBuf>,

    /// Template variable used to render the body (can be used multiple times)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,
}

fn parse_var(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {arg:?}")),
    }
}

fn load_config(config_file: Option<&PathBuf>) -> anyhow::Result<EmailConfig> {
    load_config_with(
        std::env::vars(),
        Path::new(".env"),
        config_file.map(PathBuf::as_path),
    )
}

/// Environment variables win over the `dotenv` file, which wins over
/// `config_file`.
fn load_config_with<K, V>(
    vars: impl IntoIterator<Item = (K, V)>,
    dotenv: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<EmailConfig>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut loader = ConfigLoader::new().dotenv(dotenv);
    if let Some(path) = config_file {
        loader = loader.file(path)?;
    }

    let config = loader.load_with_vars(vars)?;
    if !config.has_credentials() {
        bail!(concat!(
            "Missing email credentials.\n",
            "Please set EMAIL_ADDRESS and EMAIL_PASSWORD environment variables,\n",
            "create a .env file in the current directory,\n",
            "or provide a configuration file with --config-file."
        ));
    }
    Ok(config)
}

fn build_email(cli: &Cli) -> anyhow::Result<Email> {
    let mut email = Email::new(split_recipients(&cli.to), &cli.subject, &cli.body).html(cli.html);
    if email.to.is_empty() {
        bail!("No valid recipient in --to {:?}", cli.to);
    }
    if let Some(cc) = &cli.cc {
        email = email.cc(split_recipients(cc));
    }
    if let Some(bcc) = &cli.bcc {
        email = email.bcc(split_recipients(bcc));
    }
    for path in &cli.attachments {
        if !path.is_file() {
            bail!("Attachment file not found: {}", path.display());
        }
        email = email.attach_file(path);
    }
    Ok(email)
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(cli.config_file.as_ref())?;
    let sender = EmailSender::from_config(&config).context("Invalid sender configuration")?;
    let email = build_email(&cli)?;

    Ok(if cli.vars.is_empty() {
        sender.send_email(&email).await
    } else {
        sender.send_template_email(&email, &cli.vars).await
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(true) => {
            println!("Email sent successfully!");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("Failed to send email.");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
