/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::time::Duration;

use smtp_proto::{EhloResponse, EXT_START_TLS};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::{Security, SmtpClient, SmtpClientBuilder};

use super::{tls::build_tls_connector, AssertReply};

impl SmtpClientBuilder {
    /// Creates a builder for `hostname:port`. The security mode is derived
    /// from the port (465 is implicit TLS, anything else STARTTLS).
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        SmtpClientBuilder {
            hostname: hostname.into(),
            port,
            security: Security::from_port(port),
            timeout: Duration::from_secs(60),
            tls_connector: build_tls_connector(),
            local_host: gethostname::gethostname()
                .to_str()
                .unwrap_or("[127.0.0.1]")
                .to_string(),
        }
    }

    /// Overrides the security mode derived from the port
    pub fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Set the EHLO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the SMTP connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    async fn connect_tcp(&self) -> crate::Result<SmtpClient<TcpStream>> {
        log::debug!("Connecting to {}", self.addr());
        Ok(SmtpClient {
            stream: TcpStream::connect(self.addr()).await?,
            timeout: self.timeout,
            capabilities: EhloResponse::default(),
        })
    }

    /// Connect over TLS (implicit TLS, usually port 465)
    pub async fn connect_tls(&self) -> crate::Result<SmtpClient<TlsStream<TcpStream>>> {
        tokio::time::timeout(self.timeout, async {
            let mut client = self
                .connect_tcp()
                .await?
                .into_tls(&self.tls_connector, &self.hostname)
                .await?;

            // Read greeting
            client.read().await?.assert_positive_completion()?;

            client.capabilities = client.ehlo(&self.local_host).await?;
            Ok(client)
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    /// Connect in clear text and upgrade with STARTTLS (usually port 587)
    pub async fn connect_starttls(&self) -> crate::Result<SmtpClient<TlsStream<TcpStream>>> {
        tokio::time::timeout(self.timeout, async {
            let mut client = self.connect_tcp().await?;

            // Read greeting
            client.read().await?.assert_positive_completion()?;

            let capabilities = client.ehlo(&self.local_host).await?;
            if !capabilities.has_capability(EXT_START_TLS) {
                return Err(crate::Error::MissingStartTls);
            }

            let mut client = client
                .start_tls(&self.tls_connector, &self.hostname)
                .await?;

            // Capabilities change once the channel is secure
            client.capabilities = client.ehlo(&self.local_host).await?;
            Ok(client)
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    /// Connect over clear text (should only be used with local relays)
    pub async fn connect_plain(&self) -> crate::Result<SmtpClient<TcpStream>> {
        tokio::time::timeout(self.timeout, async {
            let mut client = self.connect_tcp().await?;

            // Read greeting
            client.read().await?.assert_positive_completion()?;

            client.capabilities = client.ehlo(&self.local_host).await?;
            Ok(client)
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::{Security, SmtpClientBuilder};

    #[test]
    fn builder_defaults() {
        let builder = SmtpClientBuilder::new("smtp.gmail.com", 465);
        assert_eq!(builder.security, Security::ImplicitTls);
        assert_eq!(builder.addr(), "smtp.gmail.com:465");
        assert!(!builder.local_host.is_empty());

        let builder = SmtpClientBuilder::new("smtp.gmail.com", 587)
            .helo_host("client.example.com")
            .timeout(Duration::from_secs(5));
        assert_eq!(builder.security, Security::StartTls);
        assert_eq!(builder.local_host, "client.example.com");
        assert_eq!(builder.timeout, Duration::from_secs(5));

        let builder = SmtpClientBuilder::new("localhost", 465).security(Security::Plain);
        assert_eq!(builder.security, Security::Plain);
    }
}
