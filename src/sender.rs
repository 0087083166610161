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

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    message::{BodyKind, Email, Envelope},
    template::{self, Vars},
    Credentials, EmailConfig, Error, Security, SmtpClient, SmtpClientBuilder,
};

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Sends messages from a single account.
#[derive(Clone)]
pub struct EmailSender {
    email: String,
    credentials: Credentials,
    client: SmtpClientBuilder,
    security_override: Option<Security>,
}

impl EmailSender {
    /// Creates a sender for `email`, authenticating with `password` against
    /// `smtp.gmail.com:587`.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        let email = email.into();
        EmailSender {
            credentials: Credentials::new(email.clone(), password),
            email,
            client: SmtpClientBuilder::new(DEFAULT_SMTP_SERVER, DEFAULT_SMTP_PORT),
            security_override: None,
        }
    }

    /// Creates a sender from a loaded configuration. `email` and `password` are required.
    pub fn from_config(config: &EmailConfig) -> crate::Result<Self> {
        let (Some(email), Some(password)) = (&config.email, &config.password) else {
            return Err(Error::MissingCredentials);
        };

        let mut sender = EmailSender::new(email, password);
        if let Some(server) = &config.smtp_server {
            sender = sender.smtp_server(server);
        }
        if let Some(port) = config.smtp_port {
            sender = sender.smtp_port(port);
        }
        if let Some(security) = config.smtp_security {
            sender = sender.security(security);
        }
        Ok(sender)
    }

    pub fn smtp_server(mut self, hostname: impl Into<String>) -> Self {
        self.client.hostname = hostname.into();
        self
    }

    /// Sets the port. Unless a security mode was set explicitly, 465 switches
    /// to implicit TLS and any other port to STARTTLS.
    pub fn smtp_port(mut self, port: u16) -> Self {
        self.client.port = port;
        self.client.security = self
            .security_override
            .unwrap_or_else(|| Security::from_port(port));
        self
    }

    pub fn security(mut self, security: Security) -> Self {
        self.security_override = Some(security);
        self.client.security = security;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.client.timeout = timeout;
        self
    }

    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.client.local_host = host.into();
        self
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn client(&self) -> &SmtpClientBuilder {
        &self.client
    }

    /// Builds and submits the message, returning the first error encountered.
    pub async fn try_send(&self, email: &Email) -> crate::Result<()> {
        let envelope = email.to_envelope(&self.email)?;
        log::debug!(
            "Sending {:?} to {} recipient(s) via {}:{} ({:?})",
            email.subject,
            envelope.rcpt_to.len(),
            self.client.hostname,
            self.client.port,
            self.client.security
        );

        match self.client.security {
            Security::ImplicitTls => {
                self.deliver(self.client.connect_tls().await?, &envelope)
                    .await
            }
            Security::StartTls => {
                self.deliver(self.client.connect_starttls().await?, &envelope)
                    .await
            }
            Security::Plain => {
                self.deliver(self.client.connect_plain().await?, &envelope)
                    .await
            }
        }
    }

    async fn deliver<T: AsyncRead + AsyncWrite + Unpin>(
        &self,
        mut client: SmtpClient<T>,
        envelope: &Envelope,
    ) -> crate::Result<()> {
        client.authenticate(&self.credentials).await?;
        client.send(envelope).await?;

        // The message was accepted, a failed QUIT changes nothing.
        if let Err(err) = client.quit().await {
            log::debug!("QUIT failed after delivery: {err}");
        }
        Ok(())
    }

    /// Sends a message, returning `true` on success. Errors are logged.
    pub async fn send_email(&self, email: &Email) -> bool {
        match self.try_send(email).await {
            Ok(()) => {
                log::info!(
                    "Sent {:?} to {}",
                    email.subject,
                    email.recipients().join(", ")
                );
                true
            }
            Err(err) => {
                log_send_error(&err);
                false
            }
        }
    }

    /// Sends a message with an HTML body.
    pub async fn send_html_email(&self, email: &Email) -> bool {
        if email.kind == BodyKind::Html {
            self.send_email(email).await
        } else {
            self.send_email(&email.clone().html(true)).await
        }
    }

    /// Renders the message body as a template with `vars`, then sends it.
    /// Placeholders without a value are left untouched.
    ///
    /// The body kind is taken from `email` as is, so a template is sent as
    /// plain text unless the message was built with `Email::html(true)`.
    pub async fn send_template_email(&self, email: &Email, vars: &(impl Vars + ?Sized)) -> bool {
        let missing = template::missing(&email.body, vars);
        if !missing.is_empty() {
            log::warn!("Template placeholders without a value: {}", missing.join(", "));
        }

        let rendered = email.clone().body(template::render(&email.body, vars));
        self.send_email(&rendered).await
    }
}

fn log_send_error(err: &Error) {
    match err {
        Error::AuthenticationFailed(_) => {
            log::error!(
                "Error sending email: {err}. Please verify the email address and password (or app-specific password)."
            );
        }
        Error::Io(io_err)
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ) =>
        {
            log::error!(
                "Error sending email: {err}. The server closed the connection; use port 465 for implicit TLS or port 587 for STARTTLS."
            );
        }
        Error::UnparseableReply | Error::Timeout => {
            log::error!(
                "Error sending email: {err}. Check that the port matches the security mode (465 for implicit TLS, 587 for STARTTLS)."
            );
        }
        _ => log::error!("Error sending email: {err}"),
    }
}
