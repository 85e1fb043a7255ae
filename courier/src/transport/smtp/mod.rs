//! Module dedicated to the SMTP transport.
//!
//! A [`SmtpSession`] is derived from a [`SmtpConfig`]. The
//! [`SmtpTransporter`] wraps a session and opens a short-lived SMTP
//! connection for each message it sends.

pub mod config;

use std::{any::Any, fmt, result, sync::Arc, time::Duration};

use async_trait::async_trait;
use mail_send::{
    smtp::message::{Address as SmtpAddress, Message as SmtpMessage},
    Credentials, SmtpClientBuilder,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[doc(inline)]
pub use self::config::{SmtpConfig, SmtpEncryptionKind};
use crate::{message::mime, AnyBoxedError, AnyError, AnyResult, EmailMessage};

use super::Transporter;

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot send message without a sender")]
    SendMessageMissingSenderError,
    #[error("cannot send message without a recipient")]
    SendMessageMissingRecipientError,
    #[error("cannot send message")]
    SendMessageError(#[source] mail_send::Error),
    #[error("cannot connect to smtp server using tcp")]
    ConnectTcpError(#[source] mail_send::Error),
    #[error("cannot connect to smtp server using tls")]
    ConnectTlsError(#[source] mail_send::Error),
}

impl AnyError for Error {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Error> for AnyBoxedError {
    fn from(err: Error) -> Self {
        Box::new(err)
    }
}

/// The SMTP session.
///
/// Holds the configuration and the client builder derived from it.
/// Cloning a session is cheap.
#[derive(Clone)]
pub struct SmtpSession {
    config: Arc<SmtpConfig>,
    client_builder: SmtpClientBuilder<String>,
}

impl SmtpSession {
    pub fn new(config: impl Into<Arc<SmtpConfig>>) -> Self {
        let config = config.into();

        let encryption = config.encryption_kind();
        debug!(host = %config.host, port = config.port, %encryption, "building smtp session");

        let mut client_builder = SmtpClientBuilder::new(config.host.clone(), config.port)
            .implicit_tls(encryption == SmtpEncryptionKind::Tls);

        if encryption == SmtpEncryptionKind::None {
            client_builder = client_builder.allow_invalid_certs();
        }

        if let Some(passwd) = &config.passwd {
            client_builder =
                client_builder.credentials(Credentials::new(config.login.clone(), passwd.clone()));
        }

        if let Some(secs) = config.timeout {
            client_builder = client_builder.timeout(Duration::from_secs(secs));
        }

        Self {
            config,
            client_builder,
        }
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    async fn send(&self, msg: SmtpMessage<'_>) -> Result<()> {
        if self.config.is_encryption_enabled() {
            let mut client = self
                .client_builder
                .connect()
                .await
                .map_err(Error::ConnectTlsError)?;
            client.send(msg).await.map_err(Error::SendMessageError)?;
            if let Err(err) = client.quit().await {
                warn!("cannot quit smtp session: {err}");
            }
        } else {
            let mut client = self
                .client_builder
                .connect_plain()
                .await
                .map_err(Error::ConnectTcpError)?;
            client.send(msg).await.map_err(Error::SendMessageError)?;
            if let Err(err) = client.quit().await {
                warn!("cannot quit smtp session: {err}");
            }
        }

        Ok(())
    }
}

impl fmt::Debug for SmtpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSession")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("encryption", &self.config.encryption)
            .finish()
    }
}

impl From<SmtpConfig> for SmtpSession {
    fn from(config: SmtpConfig) -> Self {
        Self::new(config)
    }
}

/// The default transporter, backed by an SMTP session.
#[derive(Clone, Debug)]
pub struct SmtpTransporter {
    session: SmtpSession,
}

impl SmtpTransporter {
    pub fn new(session: SmtpSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Transporter for SmtpTransporter {
    async fn send(&self, msg: &EmailMessage) -> AnyResult<()> {
        info!("sending smtp message");

        let mut builder = msg.to_mime_builder()?;

        if msg.message_id.is_none() {
            if let Some(domain) = &self.session.config.domain {
                builder = builder.message_id(format!("{}@{domain}", Uuid::new_v4()));
            }
        }

        let body = builder
            .write_to_vec()
            .map_err(mime::Error::WriteMessageError)?;

        self.session.send(into_smtp_msg(msg, body)?).await?;

        Ok(())
    }
}

/// Builds the SMTP envelope of the given message.
///
/// This function returns an error if no sender or no recipient is
/// found in the message.
fn into_smtp_msg(msg: &EmailMessage, body: Vec<u8>) -> Result<SmtpMessage<'_>> {
    let sender = msg.sender().ok_or(Error::SendMessageMissingSenderError)?;

    let rcpt_to: Vec<SmtpAddress<'_>> = msg
        .recipients()
        .into_iter()
        .map(|contact| SmtpAddress {
            email: contact.addr.as_str().into(),
            ..Default::default()
        })
        .collect();

    if rcpt_to.is_empty() {
        return Err(Error::SendMessageMissingRecipientError);
    }

    Ok(SmtpMessage {
        mail_from: sender.addr.clone().into(),
        rcpt_to,
        body: body.into(),
    })
}
