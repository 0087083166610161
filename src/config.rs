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

//! Credential loading from the environment, `.env`, JSON and INI files.
//!
//! Environment variables and `.env` files use a prefix (`EMAIL_` by default):
//!
//! ```text
//! EMAIL_ADDRESS=your.email@example.com
//! EMAIL_PASSWORD=your-password
//! EMAIL_SMTP_SERVER=smtp.example.com
//! EMAIL_SMTP_PORT=587
//! EMAIL_SMTP_SECURITY=starttls
//! ```
//!
//! `.env` values are parsed by `dotenvy`, which expands `$VAR` references in
//! unquoted and double-quoted values. Passwords containing `$` must be
//! single-quoted (`EMAIL_PASSWORD='p4ss$word'`). Lines that cannot be parsed
//! are skipped with a warning.
//!
//! JSON files use the field names directly:
//!
//! ```text
//! { "email": "your.email@example.com", "password": "your-password",
//!   "smtp_server": "smtp.example.com", "smtp_port": 587 }
//! ```
//!
//! INI files read the `[email]` section unless told otherwise:
//!
//! ```text
//! [email]
//! email = your.email@example.com
//! password = your-password
//! smtp_server = smtp.example.com
//! smtp_port = 587
//! ```

use std::{
    ffi::OsStr,
    fmt::Debug,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::Security;

pub const DEFAULT_PREFIX: &str = "EMAIL_";
pub const DEFAULT_INI_SECTION: &str = "email";

/// Partial sender configuration. Every field is optional so that several
/// sources can be layered on top of each other.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EmailConfig {
    pub email: Option<String>,
    pub password: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_security: Option<Security>,
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Ini,
    Dotenv,
}

#[derive(Debug, Clone)]
enum Source {
    Json(PathBuf),
    Ini(PathBuf, String),
    Dotenv(PathBuf),
}

/// Layers configuration sources. Environment variables always take
/// precedence; files are consulted in the order they were added.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    prefix: String,
    use_env: bool,
    sources: Vec<Source>,
}

#[derive(Deserialize)]
struct JsonConfig {
    email: Option<String>,
    password: Option<String>,
    smtp_server: Option<String>,
    smtp_port: Option<JsonPort>,
    smtp_security: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPort {
    Number(i64),
    Text(String),
}

impl EmailConfig {
    /// Sets a field from its textual form. Returns `false` for unknown keys.
    /// Empty values are ignored; unparseable ports or security modes are
    /// logged and ignored.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let value = value.trim();
        let key = key.trim().to_ascii_lowercase();

        if !matches!(
            key.as_str(),
            "email" | "address" | "password" | "smtp_server" | "smtp_port" | "smtp_security"
        ) {
            return false;
        } else if value.is_empty() {
            return true;
        }

        match key.as_str() {
            "email" | "address" => self.email = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "smtp_server" => self.smtp_server = Some(value.to_string()),
            "smtp_port" => match value.parse::<u16>() {
                Ok(port) => self.smtp_port = Some(port),
                Err(_) => log::warn!("Ignoring invalid SMTP port {value:?}"),
            },
            _ => match value.parse::<Security>() {
                Ok(security) => self.smtp_security = Some(security),
                Err(err) => log::warn!("Ignoring SMTP security setting: {err}"),
            },
        }
        true
    }

    /// Fills every unset field from `lower`.
    pub fn merge(self, lower: EmailConfig) -> EmailConfig {
        EmailConfig {
            email: self.email.or(lower.email),
            password: self.password.or(lower.password),
            smtp_server: self.smtp_server.or(lower.smtp_server),
            smtp_port: self.smtp_port.or(lower.smtp_port),
            smtp_security: self.smtp_security.or(lower.smtp_security),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }

    /// Reads `{prefix}ADDRESS`, `{prefix}PASSWORD`, `{prefix}SMTP_SERVER`,
    /// `{prefix}SMTP_PORT` and `{prefix}SMTP_SECURITY` from the process environment.
    pub fn from_env(prefix: &str) -> EmailConfig {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Same as [`EmailConfig::from_env`] over an arbitrary list of variables.
    pub fn from_vars<K, V>(prefix: &str, vars: impl IntoIterator<Item = (K, V)>) -> EmailConfig
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = EmailConfig::default();
        for (key, value) in vars {
            if let Some(key) = key.as_ref().strip_prefix(prefix) {
                config.set(key, value.as_ref());
            }
        }
        config
    }

    /// Loads a `.env` file. A missing file yields an empty configuration and
    /// malformed lines are skipped.
    pub fn from_dotenv(path: impl AsRef<Path>, prefix: &str) -> crate::Result<EmailConfig> {
        let path = path.as_ref();
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(err) if err.not_found() => return Ok(EmailConfig::default()),
            Err(err) => {
                return Err(crate::Error::Config(format!("{}: {err}", path.display())));
            }
        };

        let mut vars = Vec::new();
        for item in iter {
            match item {
                Ok(var) => vars.push(var),
                // The line may hold a secret, so it is not logged
                Err(dotenvy::Error::LineParse(..)) => {
                    log::warn!("{}: skipping malformed line", path.display());
                }
                Err(err) => {
                    return Err(crate::Error::Config(format!("{}: {err}", path.display())));
                }
            }
        }
        Ok(Self::from_vars(prefix, vars))
    }

    /// Loads a JSON file. A missing file yields an empty configuration.
    pub fn from_json(path: impl AsRef<Path>) -> crate::Result<EmailConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(EmailConfig::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let json: JsonConfig = serde_json::from_str(&contents)
            .map_err(|err| crate::Error::Config(format!("{}: {err}", path.display())))?;

        let mut config = EmailConfig::default();
        for (key, value) in [
            ("email", json.email),
            ("password", json.password),
            ("smtp_server", json.smtp_server),
            ("smtp_security", json.smtp_security),
            (
                "smtp_port",
                json.smtp_port.map(|port| match port {
                    JsonPort::Number(port) => port.to_string(),
                    JsonPort::Text(port) => port,
                }),
            ),
        ] {
            if let Some(value) = value {
                config.set(key, &value);
            }
        }
        Ok(config)
    }

    /// Loads a section of an INI file. A missing file or section yields an
    /// empty configuration. Keys are case-insensitive.
    pub fn from_ini(path: impl AsRef<Path>, section: &str) -> crate::Result<EmailConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(EmailConfig::default());
        }

        let ini = ini::Ini::load_from_file(path)
            .map_err(|err| crate::Error::Config(format!("{}: {err}", path.display())))?;

        let mut config = EmailConfig::default();
        if let Some(properties) = ini.section(Some(section)) {
            for (key, value) in properties.iter() {
                config.set(key, value);
            }
        }
        Ok(config)
    }
}

impl Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_security", &self.smtp_security)
            .finish()
    }
}

impl ConfigFormat {
    /// Detects the format from the file extension. A file named `.env` is a dotenv file.
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<ConfigFormat> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .or_else(|| path.file_name().filter(|name| *name == ".env").map(|_| OsStr::new("env")))
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("ini") => Ok(ConfigFormat::Ini),
            Some("env") => Ok(ConfigFormat::Dotenv),
            _ => Err(crate::Error::UnsupportedConfigFormat(
                path.display().to_string(),
            )),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        ConfigLoader {
            prefix: DEFAULT_PREFIX.to_string(),
            use_env: true,
            sources: Vec::new(),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix of the environment variables (and `.env` keys).
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Whether process environment variables are consulted.
    pub fn use_env(mut self, use_env: bool) -> Self {
        self.use_env = use_env;
        self
    }

    pub fn json(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(Source::Json(path.into()));
        self
    }

    pub fn dotenv(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(Source::Dotenv(path.into()));
        self
    }

    pub fn ini(self, path: impl Into<PathBuf>) -> Self {
        self.ini_section(path, DEFAULT_INI_SECTION)
    }

    pub fn ini_section(mut self, path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        self.sources.push(Source::Ini(path.into(), section.into()));
        self
    }

    /// Adds a file whose format is detected from its extension.
    pub fn file(self, path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        Ok(match ConfigFormat::from_path(&path)? {
            ConfigFormat::Json => self.json(path),
            ConfigFormat::Ini => self.ini(path),
            ConfigFormat::Dotenv => self.dotenv(path),
        })
    }

    /// Merges every source, highest priority first.
    pub fn load(&self) -> crate::Result<EmailConfig> {
        if self.use_env {
            self.load_with_vars(std::env::vars())
        } else {
            self.load_with_vars(std::iter::empty::<(String, String)>())
        }
    }

    /// Like [`ConfigLoader::load`], taking the environment from `vars`.
    pub fn load_with_vars<K, V>(
        &self,
        vars: impl IntoIterator<Item = (K, V)>,
    ) -> crate::Result<EmailConfig>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = EmailConfig::from_vars(&self.prefix, vars);

        for source in &self.sources {
            let layer = match source {
                Source::Json(path) => EmailConfig::from_json(path)?,
                Source::Ini(path, section) => EmailConfig::from_ini(path, section)?,
                Source::Dotenv(path) => EmailConfig::from_dotenv(path, &self.prefix)?,
            };
            log::debug!("Loaded configuration layer {source:?}: {layer:?}");
            config = config.merge(layer);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use crate::{ConfigFormat, ConfigLoader, EmailConfig, Security};

    fn write_file(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const NO_VARS: [(&str, &str); 0] = [];

    #[test]
    fn load_from_vars() {
        let config = EmailConfig::from_vars(
            "EMAIL_",
            [
                ("EMAIL_ADDRESS", "env.example@gmail.com"),
                ("EMAIL_PASSWORD", "env-password"),
                ("EMAIL_SMTP_SERVER", "smtp.gmail.com"),
                ("EMAIL_SMTP_PORT", "465"),
                ("EMAIL_UNRELATED", "ignored"),
                ("HOME", "/root"),
            ],
        );
        assert_eq!(
            config,
            EmailConfig {
                email: Some("env.example@gmail.com".into()),
                password: Some("env-password".into()),
                smtp_server: Some("smtp.gmail.com".into()),
                smtp_port: Some(465),
                smtp_security: None,
            }
        );

        // Invalid ports and empty values are ignored
        let config = EmailConfig::from_vars(
            "MAIL_",
            [
                ("MAIL_ADDRESS", ""),
                ("MAIL_SMTP_PORT", "not-a-port"),
                ("MAIL_SMTP_SECURITY", "plain"),
            ],
        );
        assert_eq!(config.email, None);
        assert_eq!(config.smtp_port, None);
        assert_eq!(config.smtp_security, Some(Security::Plain));
        assert!(!config.has_credentials());
    }

    #[test]
    fn load_from_json() {
        let file = write_file(
            ".json",
            r#"{"email": "json.example@gmail.com", "password": "json-password",
                "smtp_server": "smtp.gmail.com", "smtp_port": 587, "extra": true}"#,
        );
        let config = EmailConfig::from_json(file.path()).unwrap();
        assert_eq!(config.email.as_deref(), Some("json.example@gmail.com"));
        assert_eq!(config.password.as_deref(), Some("json-password"));
        assert_eq!(config.smtp_server.as_deref(), Some("smtp.gmail.com"));
        assert_eq!(config.smtp_port, Some(587));

        let file = write_file(".json", r#"{"smtp_port": "2525"}"#);
        assert_eq!(
            EmailConfig::from_json(file.path()).unwrap().smtp_port,
            Some(2525)
        );

        let file = write_file(".json", r#"{"email": "#);
        assert!(matches!(
            EmailConfig::from_json(file.path()),
            Err(crate::Error::Config(_))
        ));

        assert_eq!(
            EmailConfig::from_json("/does/not/exist.json").unwrap(),
            EmailConfig::default()
        );
    }

    #[test]
    fn load_from_ini() {
        let file = write_file(
            ".ini",
            "[other]\nemail = other@example.com\n\n[email]\nEmail = ini.example@gmail.com\npassword = ini-password\nsmtp_server = smtp.gmail.com\nsmtp_port = 587\n",
        );
        let config = EmailConfig::from_ini(file.path(), "email").unwrap();
        assert_eq!(config.email.as_deref(), Some("ini.example@gmail.com"));
        assert_eq!(config.password.as_deref(), Some("ini-password"));
        assert_eq!(config.smtp_port, Some(587));

        let config = EmailConfig::from_ini(file.path(), "other").unwrap();
        assert_eq!(config.email.as_deref(), Some("other@example.com"));
        assert_eq!(config.password, None);

        assert_eq!(
            EmailConfig::from_ini(file.path(), "missing").unwrap(),
            EmailConfig::default()
        );
    }

    #[test]
    fn load_from_dotenv() {
        let file = write_file(
            ".env",
            "# Credentials\nEMAIL_ADDRESS=dotenv.example@gmail.com\nEMAIL_PASSWORD=\"dotenv password\"\nEMAIL_SMTP_SERVER=smtp.gmail.com\nEMAIL_SMTP_PORT=587\nRUST_LOG=debug\n",
        );
        let config = EmailConfig::from_dotenv(file.path(), "EMAIL_").unwrap();
        assert_eq!(config.email.as_deref(), Some("dotenv.example@gmail.com"));
        assert_eq!(config.password.as_deref(), Some("dotenv password"));
        assert_eq!(config.smtp_server.as_deref(), Some("smtp.gmail.com"));
        assert_eq!(config.smtp_port, Some(587));

        assert_eq!(
            EmailConfig::from_dotenv("/does/not/exist/.env", "EMAIL_").unwrap(),
            EmailConfig::default()
        );

        // Single quotes keep `$` literal
        let file = write_file(
            ".env",
            "EMAIL_ADDRESS=dotenv.example@gmail.com\nEMAIL_PASSWORD='p4ss$word9'\n",
        );
        let config = EmailConfig::from_dotenv(file.path(), "EMAIL_").unwrap();
        assert_eq!(config.password.as_deref(), Some("p4ss$word9"));

        // Malformed lines are skipped, the rest of the file still loads
        let file = write_file(
            ".env",
            "EMAIL_ADDRESS=dotenv.example@gmail.com\nthis line is not valid\nEMAIL_PASSWORD=secret\n",
        );
        let config = EmailConfig::from_dotenv(file.path(), "EMAIL_").unwrap();
        assert_eq!(config.email.as_deref(), Some("dotenv.example@gmail.com"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn precedence() {
        let json = write_file(
            ".json",
            r#"{"email": "json@example.com", "password": "json-password"}"#,
        );
        let dotenv = write_file(
            ".env",
            "EMAIL_ADDRESS=dotenv@example.com\nEMAIL_SMTP_SERVER=smtp.dotenv.com\n",
        );
        let ini = write_file(
            ".ini",
            "[email]\nemail = ini@example.com\nsmtp_server = smtp.ini.com\nsmtp_port = 465\n",
        );

        let loader = ConfigLoader::new()
            .json(json.path())
            .dotenv(dotenv.path())
            .ini(ini.path());

        let config = loader
            .load_with_vars([("EMAIL_ADDRESS", "env@example.com")])
            .unwrap();
        assert_eq!(config.email.as_deref(), Some("env@example.com"));
        assert_eq!(config.password.as_deref(), Some("json-password"));
        assert_eq!(config.smtp_server.as_deref(), Some("smtp.dotenv.com"));
        assert_eq!(config.smtp_port, Some(465));

        let config = loader.load_with_vars(NO_VARS).unwrap();
        assert_eq!(config.email.as_deref(), Some("json@example.com"));

        let config = ConfigLoader::new()
            .dotenv(dotenv.path())
            .ini(ini.path())
            .load_with_vars(NO_VARS)
            .unwrap();
        assert_eq!(config.email.as_deref(), Some("dotenv@example.com"));

        let config = ConfigLoader::new()
            .file(ini.path())
            .unwrap()
            .load_with_vars(NO_VARS)
            .unwrap();
        assert_eq!(config.email.as_deref(), Some("ini@example.com"));
    }

    #[test]
    fn detect_format() {
        assert_eq!(
            ConfigFormat::from_path("email_config.JSON").unwrap(),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path("conf/email_config.ini").unwrap(),
            ConfigFormat::Ini
        );
        assert_eq!(
            ConfigFormat::from_path("email_config.env").unwrap(),
            ConfigFormat::Dotenv
        );
        assert_eq!(
            ConfigFormat::from_path("/home/jdoe/.env").unwrap(),
            ConfigFormat::Dotenv
        );
        assert!(matches!(
            ConfigFormat::from_path("email_config.yaml"),
            Err(crate::Error::UnsupportedConfigFormat(_))
        ));
        assert!(ConfigFormat::from_path("config").is_err());
    }

    #[test]
    fn debug_hides_password() {
        let config = EmailConfig {
            email: Some("jdoe@example.com".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("jdoe@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
