/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{convert::TryFrom, io, sync::Arc};

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{Error, SmtpClient};

use super::AssertReply;

impl SmtpClient<TcpStream> {
    /// Upgrade the connection to TLS.
    pub async fn start_tls(
        mut self,
        tls_connector: &TlsConnector,
        hostname: &str,
    ) -> crate::Result<SmtpClient<TlsStream<TcpStream>>> {
        self.cmd(b"STARTTLS\r\n")
            .await?
            .assert_positive_completion()?;

        self.into_tls(tls_connector, hostname).await
    }

    /// Runs the TLS handshake over the existing TCP stream.
    pub async fn into_tls(
        self,
        tls_connector: &TlsConnector,
        hostname: &str,
    ) -> crate::Result<SmtpClient<TlsStream<TcpStream>>> {
        let server_name = ServerName::try_from(hostname)
            .map_err(|_| Error::InvalidTLSName)?
            .to_owned();

        tokio::time::timeout(self.timeout, async {
            let stream = tls_connector
                .connect(server_name, self.stream)
                .await
                .map_err(|err| {
                    let kind = err.kind();
                    match err.into_inner() {
                        Some(inner) => match inner.downcast::<rustls::Error>() {
                            Ok(error) => Error::Tls(error),
                            Err(error) => Error::Io(io::Error::new(kind, error)),
                        },
                        None => Error::Io(io::Error::new(kind, "TLS handshake failed")),
                    }
                })?;
            log::debug!("TLS session established with {hostname}");

            Ok(SmtpClient {
                stream,
                timeout: self.timeout,
                capabilities: self.capabilities,
            })
        })
        .await
        .map_err(|_| Error::Timeout)?
    }
}

/// Builds a connector trusting the Mozilla root store shipped by `webpki-roots`.
pub fn build_tls_connector() -> TlsConnector {
    let root_cert_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    TlsConnector::from(Arc::new(
        ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth(),
    ))
}
