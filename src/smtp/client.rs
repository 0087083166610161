/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use smtp_proto::{response::parser::ResponseReceiver, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::SmtpClient;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    pub(crate) async fn read(&mut self) -> crate::Result<Response<String>> {
        let mut buf = vec![0u8; 1024];
        let mut parser = ResponseReceiver::default();

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(crate::Error::UnparseableReply);
            }

            match parser.parse(&mut buf[..br].iter()) {
                Ok(reply) => {
                    log::debug!("<- {} {}", reply.code(), reply.message());
                    return Ok(reply);
                }
                Err(smtp_proto::Error::NeedsMoreData { .. }) => (),
                Err(_) => return Err(crate::Error::UnparseableReply),
            }
        }
    }

    /// Sends a command to the SMTP server and waits for a reply.
    pub async fn cmd(&mut self, cmd: impl AsRef<[u8]>) -> crate::Result<Response<String>> {
        tokio::time::timeout(self.timeout, async {
            self.stream.write_all(cmd.as_ref()).await?;
            self.stream.flush().await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    /// Writes the message applying the transparency procedure (RFC 5321 4.5.2)
    /// followed by the end of data marker. A final CRLF is only added when the
    /// message does not already end with one.
    pub(crate) async fn write_message(&mut self, message: &[u8]) -> tokio::io::Result<()> {
        let mut at_line_start = true;
        let mut last_pos = 0;

        for (pos, byte) in message.iter().enumerate() {
            if *byte == b'.' && at_line_start {
                self.stream.write_all(&message[last_pos..pos]).await?;
                self.stream.write_all(b".").await?;
                last_pos = pos;
            }
            at_line_start = *byte == b'\n' && pos > 0 && message[pos - 1] == b'\r';
        }

        self.stream.write_all(&message[last_pos..]).await?;
        if message.is_empty() || message.ends_with(b"\r\n") {
            self.stream.write_all(b".\r\n").await?;
        } else {
            self.stream.write_all(b"\r\n.\r\n").await?;
        }
        self.stream.flush().await
    }
}
