//! Module dedicated to the SMTP session configuration.
//!
//! This module contains the configuration a [`SmtpSession`] is
//! derived from.
//!
//! [`SmtpSession`]: super::SmtpSession

use std::fmt;
#[cfg(feature = "derive")]
use std::result;

#[cfg(feature = "derive")]
use serde::{Deserialize, Deserializer};

/// The SMTP session configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct SmtpConfig {
    /// The SMTP server host name.
    pub host: String,

    /// The SMTP server host port.
    pub port: u16,

    /// The SMTP encryption protocol to use.
    ///
    /// Supported encryption: SSL/TLS or STARTTLS.
    #[cfg_attr(
        feature = "derive",
        serde(default, deserialize_with = "some_bool_or_kind")
    )]
    pub encryption: Option<SmtpEncryptionKind>,

    /// The SMTP server login.
    ///
    /// Usually, the login is either the email address or its left
    /// part (before @).
    #[cfg_attr(feature = "derive", serde(default))]
    pub login: String,

    /// The SMTP server password.
    ///
    /// Authentication is skipped when no password is defined.
    #[cfg_attr(feature = "derive", serde(default))]
    pub passwd: Option<String>,

    /// The domain used to generate message identifiers, when the
    /// message being sent does not define one.
    #[cfg_attr(feature = "derive", serde(default))]
    pub domain: Option<String>,

    /// The SMTP connection timeout, in seconds.
    #[cfg_attr(feature = "derive", serde(default))]
    pub timeout: Option<u64>,
}

impl SmtpConfig {
    /// Returns the encryption in use.
    ///
    /// An unset encryption means SSL/TLS.
    pub fn encryption_kind(&self) -> SmtpEncryptionKind {
        self.encryption.unwrap_or_default()
    }

    /// Return `true` if TLS or StartTLS is enabled.
    pub fn is_encryption_enabled(&self) -> bool {
        match self.encryption_kind() {
            SmtpEncryptionKind::Tls | SmtpEncryptionKind::StartTls => true,
            SmtpEncryptionKind::None => false,
        }
    }

    /// Return `true` if StartTLS is enabled.
    pub fn is_start_tls_encryption_enabled(&self) -> bool {
        self.encryption_kind() == SmtpEncryptionKind::StartTls
    }

    /// Return `true` if encryption is disabled.
    pub fn is_encryption_disabled(&self) -> bool {
        !self.is_encryption_enabled()
    }
}

/// The encryption protocol of the SMTP connection.
///
/// Besides its name, the encryption can be configured with a boolean:
/// `true` means SSL/TLS, `false` means no encryption.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum SmtpEncryptionKind {
    /// Implicit TLS, usually on port 465.
    #[default]
    #[cfg_attr(feature = "derive", serde(alias = "ssl"))]
    Tls,

    /// Plain connection upgraded with STARTTLS, usually on port 587.
    #[cfg_attr(feature = "derive", serde(alias = "starttls"))]
    StartTls,

    /// Plain connection, for local relays and tests only.
    None,
}

impl fmt::Display for SmtpEncryptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
            Self::None => "plain",
        };
        f.write_str(kind)
    }
}

impl From<bool> for SmtpEncryptionKind {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Tls
        } else {
            Self::None
        }
    }
}

/// The accepted shapes of the `encryption` option.
#[cfg(feature = "derive")]
#[derive(Deserialize)]
#[serde(untagged)]
enum EncryptionOption {
    Enabled(bool),
    Kind(SmtpEncryptionKind),
}

#[cfg(feature = "derive")]
impl From<EncryptionOption> for SmtpEncryptionKind {
    fn from(option: EncryptionOption) -> Self {
        match option {
            EncryptionOption::Enabled(enabled) => enabled.into(),
            EncryptionOption::Kind(kind) => kind,
        }
    }
}

#[cfg(feature = "derive")]
fn some_bool_or_kind<'de, D>(
    deserializer: D,
) -> result::Result<Option<SmtpEncryptionKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let option = Option::<EncryptionOption>::deserialize(deserializer)?;
    Ok(option.map(SmtpEncryptionKind::from))
}

#[cfg(test)]
mod tests {
    use super::{SmtpConfig, SmtpEncryptionKind};

    #[test]
    fn encryption_defaults_to_tls() {
        let config = SmtpConfig::default();
        assert!(config.is_encryption_enabled());
        assert!(!config.is_start_tls_encryption_enabled());
    }

    #[test]
    fn encryption_kinds() {
        let mut config = SmtpConfig {
            encryption: Some(SmtpEncryptionKind::StartTls),
            ..Default::default()
        };
        assert!(config.is_encryption_enabled());
        assert!(config.is_start_tls_encryption_enabled());

        config.encryption = Some(false.into());
        assert!(config.is_encryption_disabled());
        assert!(!config.is_encryption_enabled());
    }

    #[test]
    fn encryption_kind_resolution() {
        let mut config = SmtpConfig::default();
        assert_eq!(config.encryption_kind(), SmtpEncryptionKind::Tls);

        config.encryption = Some(true.into());
        assert_eq!(config.encryption_kind(), SmtpEncryptionKind::Tls);
        assert_eq!(config.encryption_kind().to_string(), "SSL/TLS");

        config.encryption = Some(SmtpEncryptionKind::None);
        assert_eq!(config.encryption_kind().to_string(), "plain");
    }

    #[cfg(feature = "derive")]
    #[test]
    fn deserialize_config() {
        let config: SmtpConfig = serde_json::from_value(serde_json::json!({
            "host": "localhost",
            "port": 587,
            "encryption": "starttls",
            "login": "alice",
            "passwd": "secret",
            "domain": "localhost",
        }))
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 587);
        assert_eq!(config.encryption, Some(SmtpEncryptionKind::StartTls));
        assert_eq!(config.passwd.as_deref(), Some("secret"));
        assert_eq!(config.timeout, None);

        let config: SmtpConfig = serde_json::from_value(serde_json::json!({
            "host": "localhost",
            "port": 25,
            "encryption": false,
        }))
        .unwrap();

        assert_eq!(config.encryption, Some(SmtpEncryptionKind::None));
        assert!(config.login.is_empty());

        let config: SmtpConfig = serde_json::from_value(serde_json::json!({
            "host": "localhost",
            "port": 465,
            "encryption": "ssl",
        }))
        .unwrap();
        assert_eq!(config.encryption, Some(SmtpEncryptionKind::Tls));

        let config: SmtpConfig = serde_json::from_value(serde_json::json!({
            "host": "localhost",
            "port": 465,
            "encryption": null,
        }))
        .unwrap();
        assert_eq!(config.encryption, None);
    }
}
