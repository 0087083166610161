/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    message::{check_address, Envelope},
    SmtpClient,
};

use super::AssertReply;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Sends a MAIL FROM command to the server.
    pub async fn mail_from(&mut self, addr: &str) -> crate::Result<()> {
        check_address(addr)?;
        self.cmd(format!("MAIL FROM:<{addr}>\r\n"))
            .await?
            .assert_positive_completion()
    }

    /// Sends a RCPT TO command to the server.
    pub async fn rcpt_to(&mut self, addr: &str) -> crate::Result<()> {
        check_address(addr)?;
        self.cmd(format!("RCPT TO:<{addr}>\r\n"))
            .await?
            .assert_positive_completion()
    }

    /// Sends a DATA command to the server.
    pub async fn data(&mut self, message: impl AsRef<[u8]>) -> crate::Result<()> {
        self.cmd(b"DATA\r\n").await?.assert_code(354)?;
        tokio::time::timeout(self.timeout, async {
            self.write_message(message.as_ref()).await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)??
        .assert_positive_completion()
    }

    /// Sends a QUIT command to the server.
    pub async fn quit(mut self) -> crate::Result<()> {
        self.cmd(b"QUIT\r\n").await?.assert_positive_completion()
    }

    /// Submits a message: MAIL FROM, one RCPT TO per recipient, then DATA.
    pub async fn send(&mut self, envelope: &Envelope) -> crate::Result<()> {
        if envelope.mail_from.is_empty() {
            return Err(crate::Error::MissingMailFrom);
        } else if envelope.rcpt_to.is_empty() {
            return Err(crate::Error::MissingRcptTo);
        }

        self.mail_from(&envelope.mail_from).await?;
        for rcpt in &envelope.rcpt_to {
            self.rcpt_to(rcpt).await?;
        }
        self.data(&envelope.body).await
    }
}
