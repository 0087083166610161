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

use std::fmt::{Debug, Display};

use base64::{engine::general_purpose::STANDARD, Engine};
use smtp_proto::{AUTH_LOGIN, AUTH_PLAIN};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidChallenge,
}

/// Authentication mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// Challenge-Response Authentication Mechanism (CRAM)
    #[cfg(feature = "cram-md5")]
    CramMd5,

    /// Plain
    Plain,

    /// Login
    Login,
}

/// Mechanisms in order of preference, paired with their EHLO flag.
const PREFERENCE: &[(u64, Mechanism)] = &[
    #[cfg(feature = "cram-md5")]
    (smtp_proto::AUTH_CRAM_MD5, Mechanism::CramMd5),
    (AUTH_PLAIN, Mechanism::Plain),
    (AUTH_LOGIN, Mechanism::Login),
];

impl Mechanism {
    /// Picks the preferred mechanism out of the ones advertised by the server.
    pub fn negotiate(advertised: u64) -> Option<Mechanism> {
        PREFERENCE
            .iter()
            .find(|(flag, _)| advertised & flag != 0)
            .map(|(_, mechanism)| *mechanism)
    }
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "cram-md5")]
            Mechanism::CramMd5 => write!(f, "CRAM-MD5"),
            Mechanism::Plain => write!(f, "PLAIN"),
            Mechanism::Login => write!(f, "LOGIN"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidChallenge => write!(f, "Invalid challenge received."),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl<T: Into<String>, U: Into<String>> From<(T, U)> for Credentials {
    fn from(credentials: (T, U)) -> Self {
        Credentials::new(credentials.0, credentials.1)
    }
}

impl Credentials {
    /// Creates a new `Credentials` instance.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Credentials {
        Credentials {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn encode(&self, mechanism: Mechanism, challenge: &str) -> crate::Result<String> {
        Ok(STANDARD.encode(
            match mechanism {
                Mechanism::Plain => {
                    format!("\u{0}{}\u{0}{}", self.username, self.secret)
                }

                Mechanism::Login => {
                    let challenge = STANDARD.decode(challenge)?;

                    if b"user name"
                        .eq_ignore_ascii_case(challenge.get(0..9).ok_or(Error::InvalidChallenge)?)
                        || b"username".eq_ignore_ascii_case(
                            challenge.get(0..8).ok_or(Error::InvalidChallenge)?,
                        )
                    {
                        &self.username
                    } else if b"password"
                        .eq_ignore_ascii_case(challenge.get(0..8).ok_or(Error::InvalidChallenge)?)
                    {
                        &self.secret
                    } else {
                        return Err(Error::InvalidChallenge.into());
                    }
                    .to_string()
                }

                #[cfg(feature = "cram-md5")]
                Mechanism::CramMd5 => {
                    let mut secret_opad: Vec<u8> = vec![0x5c; 64];
                    let mut secret_ipad: Vec<u8> = vec![0x36; 64];

                    let key = if self.secret.len() <= 64 {
                        self.secret.as_bytes().to_vec()
                    } else {
                        md5::compute(self.secret.as_bytes()).0.to_vec()
                    };
                    for (pos, byte) in key.iter().enumerate() {
                        secret_opad[pos] = *byte ^ 0x5c;
                        secret_ipad[pos] = *byte ^ 0x36;
                    }

                    secret_ipad.extend_from_slice(&STANDARD.decode(challenge)?);
                    secret_opad.extend_from_slice(&md5::compute(&secret_ipad).0);

                    format!("{} {:x}", self.username, md5::compute(&secret_opad))
                }
            }
            .as_bytes(),
        ))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Authenticates with the strongest mechanism advertised in the last EHLO reply.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> crate::Result<()> {
        let mechanism = Mechanism::negotiate(self.capabilities.auth_mechanisms)
            .ok_or(crate::Error::UnsupportedAuthMechanism)?;
        log::debug!("Authenticating as {} using {mechanism}", credentials.username);

        let mut reply = if mechanism == Mechanism::Plain {
            // Initial response (RFC 4954) saves a round trip
            self.cmd(format!("AUTH PLAIN {}\r\n", credentials.encode(mechanism, "")?))
                .await?
        } else {
            self.cmd(format!("AUTH {mechanism}\r\n")).await?
        };

        for _ in 0..3 {
            match reply.code() {
                334 => {
                    reply = self
                        .cmd(format!(
                            "{}\r\n",
                            credentials.encode(mechanism, reply.message())?
                        ))
                        .await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(crate::Error::AuthenticationFailed(reply));
                }
            }
        }

        Err(crate::Error::UnexpectedReply(reply))
    }
}

#[cfg(test)]
mod test {
    use smtp_proto::{AUTH_LOGIN, AUTH_PLAIN, AUTH_XOAUTH2};

    use crate::smtp::auth::{Credentials, Mechanism};

    #[test]
    fn auth_encode() {
        // Challenge-Response Authentication Mechanism (CRAM)
        #[cfg(feature = "cram-md5")]
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(
                    Mechanism::CramMd5,
                    "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+",
                )
                .unwrap(),
            "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw"
        );

        // Login
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Login, "VXNlciBOYW1lAA==",)
                .unwrap(),
            "dGlt"
        );
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Login, "UGFzc3dvcmQA",)
                .unwrap(),
            "dGFuc3RhYWZ0YW5zdGFhZg=="
        );
        assert!(Credentials::new("tim", "tanstaaftanstaaf")
            .encode(Mechanism::Login, "SGVsbG8=")
            .is_err());

        // Plain
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Plain, "",)
                .unwrap(),
            "AHRpbQB0YW5zdGFhZnRhbnN0YWFm"
        );
    }

    #[test]
    fn negotiate_mechanism() {
        assert_eq!(
            Mechanism::negotiate(AUTH_LOGIN | AUTH_PLAIN),
            Some(Mechanism::Plain)
        );
        assert_eq!(Mechanism::negotiate(AUTH_LOGIN), Some(Mechanism::Login));
        #[cfg(feature = "cram-md5")]
        assert_eq!(
            Mechanism::negotiate(AUTH_LOGIN | AUTH_PLAIN | smtp_proto::AUTH_CRAM_MD5),
            Some(Mechanism::CramMd5)
        );
        assert_eq!(Mechanism::negotiate(AUTH_XOAUTH2), None);
        assert_eq!(Mechanism::negotiate(0), None);
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let debug = format!("{:?}", Credentials::from(("tim", "tanstaaf")));
        assert!(debug.contains("tim"));
        assert!(!debug.contains("tanstaaf"));
    }
}
