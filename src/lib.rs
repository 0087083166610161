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

//! # mail-courier
//!
//! _mail-courier_ is a small library and command line tool to compose e-mail messages and
//! submit them to an SMTP provider (Gmail, Outlook, Fastmail, a local relay...). It includes the following features:
//!
//! - Plain text and **HTML** bodies.
//! - Templated bodies with `{placeholder}` substitution.
//! - File and in-memory **attachments** (_RFC 2045 - 2049_ MIME, built with [`mail-builder`](https://crates.io/crates/mail-builder)).
//! - CC and BCC recipients (BCC recipients only travel in the SMTP envelope).
//! - SMTP submission over implicit **TLS** (port 465) or **STARTTLS** (port 587, _RFC 3207_).
//! - SMTP authentication (_RFC 4954_) using CRAM-MD5, PLAIN or LOGIN.
//! - Layered credential loading from environment variables, `.env`, JSON and INI files.
//!
//! ## Usage Example
//!
//! ```rust
//!     let sender = EmailSender::new("john@example.com", "app-password");
//!
//!     let email = Email::new(["jane@example.com", "james@test.com"], "Hi!", "<h1>Hello, world!</h1>")
//!         .html(true)
//!         .cc("boss@example.com")
//!         .attach_file("./report.pdf");
//!
//!     if sender.send_email(&email).await {
//!         println!("Email sent successfully!");
//!     }
//! ```
//!
//! Load credentials from the environment (`EMAIL_ADDRESS`, `EMAIL_PASSWORD`,
//! `EMAIL_SMTP_SERVER`, `EMAIL_SMTP_PORT`) falling back to a JSON file:
//!
//! ```rust
//!     let config = ConfigLoader::new().json("email_config.json").load()?;
//!     let sender = EmailSender::from_config(&config)?;
//! ```
//!
//! ## Testing
//!
//! To run the testsuite:
//!
//! ```bash
//!  $ cargo test
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

pub mod config;
pub mod message;
pub mod sender;
pub mod smtp;
pub mod template;

use std::{fmt::Display, time::Duration};

use smtp_proto::{EhloResponse, Response};
use tokio_rustls::TlsConnector;

pub use config::{ConfigFormat, ConfigLoader, EmailConfig};
pub use mail_builder;
pub use message::{Attachment, BodyKind, Email, Envelope, IntoRecipients};
pub use sender::EmailSender;
pub use smtp::auth::{Credentials, Mechanism};

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(Box<rustls::Error>),

    /// Base64 decode error
    Base64(base64::DecodeError),

    /// SMTP authentication error.
    Auth(smtp::auth::Error),

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(Response<String>),

    /// SMTP authentication failure.
    AuthenticationFailed(Response<String>),

    /// Invalid TLS name provided.
    InvalidTLSName,

    /// Missing authentication credentials.
    MissingCredentials,

    /// Missing message sender.
    MissingMailFrom,

    /// Missing message recipients.
    MissingRcptTo,

    /// Address containing control characters.
    InvalidAddress(String),

    /// The server does no support any of the available authentication methods.
    UnsupportedAuthMechanism,

    /// Connection timeout.
    Timeout,

    /// STARTTLS not available
    MissingStartTls,

    /// Malformed configuration file.
    Config(String),

    /// Configuration file with an unknown extension.
    UnsupportedConfigFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How the connection to the SMTP server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// TLS from the first byte (usually port 465).
    ImplicitTls,
    /// Plain connection upgraded with STARTTLS after EHLO (usually port 587).
    StartTls,
    /// No TLS at all. Only meant for local relays and testing.
    Plain,
}

/// SMTP client session.
pub struct SmtpClient<T> {
    pub stream: T,
    pub timeout: Duration,
    pub capabilities: EhloResponse<String>,
}

/// Connection parameters used to open an [`SmtpClient`].
#[derive(Clone)]
pub struct SmtpClientBuilder {
    pub hostname: String,
    pub port: u16,
    pub security: Security,
    pub timeout: Duration,
    pub tls_connector: TlsConnector,
    pub local_host: String,
}

impl Security {
    /// Port 465 speaks TLS right away, anything else negotiates STARTTLS.
    pub fn from_port(port: u16) -> Self {
        if port == 465 {
            Security::ImplicitTls
        } else {
            Security::StartTls
        }
    }
}

impl std::str::FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "implicit" => Ok(Security::ImplicitTls),
            "starttls" => Ok(Security::StartTls),
            "plain" | "none" => Ok(Security::Plain),
            other => Err(Error::Config(format!("unknown SMTP security mode {other:?}"))),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Tls(e) => write!(f, "TLS error: {e}"),
            Error::Base64(e) => write!(f, "Base64 decode error: {e}"),
            Error::Auth(e) => write!(f, "SMTP authentication error: {e}"),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => {
                write!(f, "Unexpected reply: {} {}", e.code(), e.message())
            }
            Error::AuthenticationFailed(e) => {
                write!(f, "Authentication failed: {} {}", e.code(), e.message())
            }
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::MissingCredentials => write!(f, "Missing authentication credentials"),
            Error::MissingMailFrom => write!(f, "Missing message sender"),
            Error::MissingRcptTo => write!(f, "Missing message recipients"),
            Error::InvalidAddress(addr) => write!(f, "Invalid address {addr:?}"),
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does no support any of the available authentication methods"
            ),
            Error::Timeout => write!(f, "Connection timeout"),
            Error::MissingStartTls => write!(f, "STARTTLS extension unavailable"),
            Error::Config(e) => write!(f, "Configuration error: {e}"),
            Error::UnsupportedConfigFormat(path) => write!(
                f,
                "Unsupported configuration file format: {path} (supported formats: .json, .ini, .env)"
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}

impl From<smtp::auth::Error> for Error {
    fn from(err: smtp::auth::Error) -> Self {
        Error::Auth(err)
    }
}
