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

use std::path::{Path, PathBuf};

use mail_builder::{headers::address::Address, MessageBuilder};

/// Content type of the message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    #[default]
    Text,
    Html,
}

/// A message to be sent, before MIME assembly.
#[derive(Debug, Clone, Default)]
pub struct Email {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub kind: BodyKind,
    pub attachments: Vec<Attachment>,
    pub attachment_files: Vec<PathBuf>,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub contents: Vec<u8>,
}

/// A fully assembled message ready for SMTP submission.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
    pub body: Vec<u8>,
}

/// Anything that can be turned into a list of recipient addresses: a single
/// address or a collection of them.
pub trait IntoRecipients {
    fn into_recipients(self) -> Vec<String>;
}

impl IntoRecipients for &str {
    fn into_recipients(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoRecipients for String {
    fn into_recipients(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoRecipients for &String {
    fn into_recipients(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<T: Into<String>> IntoRecipients for Vec<T> {
    fn into_recipients(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: AsRef<str>> IntoRecipients for &[T] {
    fn into_recipients(self) -> Vec<String> {
        self.iter().map(|addr| addr.as_ref().to_string()).collect()
    }
}

impl<T: Into<String>, const N: usize> IntoRecipients for [T; N] {
    fn into_recipients(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

/// Splits a comma separated list of addresses, ignoring blanks.
pub fn split_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rejects addresses that would break out of an SMTP command line.
pub(crate) fn check_address(addr: &str) -> crate::Result<()> {
    if addr.chars().any(char::is_control) {
        Err(crate::Error::InvalidAddress(addr.to_string()))
    } else {
        Ok(())
    }
}

impl Email {
    /// Create a new plain text message
    pub fn new(
        to: impl IntoRecipients,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Email {
            to: to.into_recipients(),
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Marks the body as HTML (`true`) or plain text (`false`).
    pub fn html(mut self, html: bool) -> Self {
        self.kind = if html { BodyKind::Html } else { BodyKind::Text };
        self
    }

    /// Add carbon copy recipients.
    pub fn cc(mut self, cc: impl IntoRecipients) -> Self {
        self.cc.extend(cc.into_recipients());
        self
    }

    /// Add blind carbon copy recipients. These never appear in the headers.
    pub fn bcc(mut self, bcc: impl IntoRecipients) -> Self {
        self.bcc.extend(bcc.into_recipients());
        self
    }

    /// Replace the message body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach in-memory contents.
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Attach a file, read when the message is assembled.
    pub fn attach_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment_files.push(path.into());
        self
    }

    /// Envelope recipients: To, Cc and Bcc without duplicates, in that order.
    pub fn recipients(&self) -> Vec<String> {
        let mut rcpt_to: Vec<String> = Vec::with_capacity(
            self.to.len() + self.cc.len() + self.bcc.len(),
        );
        for addr in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            let addr = addr.trim();
            if !addr.is_empty() && !rcpt_to.iter().any(|a| a.eq_ignore_ascii_case(addr)) {
                rcpt_to.push(addr.to_string());
            }
        }
        rcpt_to
    }

    /// Assembles the MIME message sent by `from`.
    pub fn to_envelope(&self, from: &str) -> crate::Result<Envelope> {
        let from = from.trim();
        if from.is_empty() {
            return Err(crate::Error::MissingMailFrom);
        }
        check_address(from)?;
        let rcpt_to = self.recipients();
        if rcpt_to.is_empty() {
            return Err(crate::Error::MissingRcptTo);
        }
        for addr in &rcpt_to {
            check_address(addr)?;
        }

        let mut files = Vec::with_capacity(self.attachment_files.len());
        for path in &self.attachment_files {
            match Attachment::from_path(path) {
                Ok(attachment) => files.push(attachment),
                Err(err) => {
                    log::warn!("Skipping attachment {}: {}", path.display(), err);
                }
            }
        }

        let mut builder = MessageBuilder::new()
            .from(from)
            .subject(self.subject.as_str());
        if let Some(to) = address_list(&self.to) {
            builder = builder.to(to);
        }
        if let Some(cc) = address_list(&self.cc) {
            builder = builder.cc(cc);
        }
        builder = match self.kind {
            BodyKind::Text => builder.text_body(self.body.as_str()),
            BodyKind::Html => builder.html_body(self.body.as_str()),
        };
        for attachment in self.attachments.iter().chain(&files) {
            builder = builder.attachment(
                attachment.content_type.as_str(),
                attachment.filename.as_str(),
                attachment.contents.as_slice(),
            );
        }

        Ok(Envelope {
            mail_from: from.to_string(),
            rcpt_to,
            body: builder.write_to_vec()?,
        })
    }
}

fn address_list(addresses: &[String]) -> Option<Address<'_>> {
    let list: Vec<&str> = addresses
        .iter()
        .map(|addr| addr.trim())
        .filter(|addr| !addr.is_empty())
        .collect();
    (!list.is_empty()).then(|| Address::from(list))
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        Attachment {
            filename: filename.into(),
            content_type: content_type.into(),
            contents: contents.into(),
        }
    }

    /// Reads a file from disk. The content type is guessed from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        Ok(Attachment {
            content_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            filename,
            contents,
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use mail_parser::{MessageParser, MimeHeaders};

    use super::{split_recipients, Attachment, Email};

    #[test]
    fn recipients() {
        assert_eq!(
            split_recipients(" jane@example.com,james@test.com , ,"),
            vec!["jane@example.com", "james@test.com"]
        );

        let email = Email::new("jane@example.com", "Hi", "Hello")
            .cc(vec!["james@test.com", "Jane@example.com"])
            .bcc(["audit@example.com"].as_slice());
        assert_eq!(
            email.recipients(),
            vec!["jane@example.com", "james@test.com", "audit@example.com"]
        );

        assert!(matches!(
            Email::new(Vec::<String>::new(), "Hi", "Hello").to_envelope("john@example.com"),
            Err(crate::Error::MissingRcptTo)
        ));
        assert!(matches!(
            Email::new("jane@example.com", "Hi", "Hello").to_envelope(" "),
            Err(crate::Error::MissingMailFrom)
        ));

        // Line breaks in addresses would inject SMTP commands
        assert!(matches!(
            Email::new("jane@example.com>\r\nRCPT TO:<evil@attacker.com", "Hi", "Hello")
                .to_envelope("john@example.com"),
            Err(crate::Error::InvalidAddress(_))
        ));
        assert!(matches!(
            Email::new("jane@example.com", "Hi", "Hello")
                .bcc("audit@example.com\nDATA")
                .to_envelope("john@example.com"),
            Err(crate::Error::InvalidAddress(_))
        ));
        assert!(matches!(
            Email::new("jane@example.com", "Hi", "Hello")
                .to_envelope("john@example.com>\r\nRSET"),
            Err(crate::Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn build_text_message() {
        let envelope = Email::new(["jane@example.com", "james@test.com"], "Hi!", "Hello world!")
            .cc("boss@example.com")
            .bcc("secret@example.com")
            .to_envelope("john@example.com")
            .unwrap();

        assert_eq!(envelope.mail_from, "john@example.com");
        assert_eq!(
            envelope.rcpt_to,
            vec![
                "jane@example.com",
                "james@test.com",
                "boss@example.com",
                "secret@example.com"
            ]
        );

        let raw = String::from_utf8_lossy(&envelope.body);
        assert!(!raw.contains("secret@example.com"), "{raw}");

        let message = MessageParser::default().parse(&envelope.body).unwrap();
        assert_eq!(message.subject(), Some("Hi!"));
        assert_eq!(
            message.from().unwrap().first().unwrap().address(),
            Some("john@example.com")
        );
        assert_eq!(
            message
                .to()
                .unwrap()
                .iter()
                .filter_map(|addr| addr.address())
                .collect::<Vec<_>>(),
            vec!["jane@example.com", "james@test.com"]
        );
        assert_eq!(
            message.cc().unwrap().first().unwrap().address(),
            Some("boss@example.com")
        );
        assert!(message.bcc().is_none());
        assert_eq!(message.body_text(0).unwrap().trim_end(), "Hello world!");
        assert_eq!(message.attachment_count(), 0);
    }

    #[test]
    fn build_html_message() {
        let envelope = Email::new("jane@example.com", "Hi!", "<h1>Hello, world!</h1>")
            .html(true)
            .to_envelope("john@example.com")
            .unwrap();
        let message = MessageParser::default().parse(&envelope.body).unwrap();
        assert_eq!(message.html_body_count(), 1);
        assert_eq!(message.body_html(0).unwrap().trim_end(), "<h1>Hello, world!</h1>");
    }

    #[test]
    fn attachments_survive_encoding() {
        let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4 not really a pdf\r\n.\r\n\x00\xff").unwrap();
        file.flush().unwrap();
        let file_name = file
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();

        let envelope = Email::new("jane@example.com", "Files", "See attached.")
            .attach(Attachment::new("blob.bin", "application/octet-stream", binary.clone()))
            .attach_file(file.path())
            .attach_file("/this/file/does/not/exist.txt")
            .to_envelope("john@example.com")
            .unwrap();

        let message = MessageParser::default().parse(&envelope.body).unwrap();
        assert_eq!(message.attachment_count(), 2);

        let blob = message.attachment(0).unwrap();
        assert_eq!(blob.attachment_name(), Some("blob.bin"));
        assert_eq!(blob.contents(), binary.as_slice());

        let pdf = message.attachment(1).unwrap();
        assert_eq!(pdf.attachment_name(), Some(file_name.as_str()));
        assert_eq!(pdf.content_type().unwrap().subtype(), Some("pdf"));
        assert_eq!(pdf.contents(), b"%PDF-1.4 not really a pdf\r\n.\r\n\x00\xff");
    }

    #[test]
    fn attachment_from_path() {
        let mut file = tempfile::Builder::new().suffix(".zzunknown").tempfile().unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();

        let attachment = Attachment::from_path(file.path()).unwrap();
        assert_eq!(attachment.content_type, "application/octet-stream");
        assert_eq!(attachment.contents, vec![1, 2, 3, 4]);
        assert!(attachment.filename.ends_with(".zzunknown"));

        assert!(Attachment::from_path("/this/file/does/not/exist.txt").is_err());
    }
}
