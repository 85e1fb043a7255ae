//! Module dedicated to transporters.
//!
//! A [`Transporter`] delivers finalized messages. The builder resolves
//! which transporter to use from its [`TransportSources`], in the
//! following priority order: explicit transporter, SMTP session then
//! SMTP session configuration.

pub mod memory;
pub mod smtp;

use std::{fmt, sync::Arc};

use async_trait::async_trait;

#[doc(inline)]
pub use self::{
    memory::{MemoryTransporter, SentMessage},
    smtp::{SmtpConfig, SmtpEncryptionKind, SmtpSession, SmtpTransporter},
};
use crate::{AnyResult, EmailMessage};

#[async_trait]
pub trait Transporter: Send + Sync {
    /// Deliver the given finalized message.
    async fn send(&self, msg: &EmailMessage) -> AnyResult<()>;
}

/// The transport source selected to send a message.
#[derive(Clone)]
pub enum TransportSource {
    Transporter(Arc<dyn Transporter>),
    Session(SmtpSession),
    Config(SmtpConfig),
}

impl TransportSource {
    /// Turns the source into a transporter.
    ///
    /// Sessions and configurations are wrapped into a short-lived
    /// [`SmtpTransporter`].
    pub fn into_transporter(self) -> Arc<dyn Transporter> {
        match self {
            Self::Transporter(transporter) => transporter,
            Self::Session(session) => Arc::new(SmtpTransporter::new(session)),
            Self::Config(config) => Arc::new(SmtpTransporter::new(SmtpSession::new(config))),
        }
    }
}

impl fmt::Debug for TransportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transporter(_) => f.write_str("Transporter"),
            Self::Session(session) => f.debug_tuple("Session").field(session).finish(),
            Self::Config(config) => f.debug_tuple("Config").field(config).finish(),
        }
    }
}

/// The transport sources a builder was configured with.
#[derive(Clone, Default)]
pub struct TransportSources {
    pub transporter: Option<Arc<dyn Transporter>>,
    pub session: Option<SmtpSession>,
    pub config: Option<SmtpConfig>,
}

impl TransportSources {
    /// Selects the source to send with.
    ///
    /// An explicit transporter wins over a session, which wins over
    /// a session configuration.
    pub fn select(&self) -> Option<TransportSource> {
        match (&self.transporter, &self.session, &self.config) {
            (Some(transporter), _, _) => Some(TransportSource::Transporter(transporter.clone())),
            (None, Some(session), _) => Some(TransportSource::Session(session.clone())),
            (None, None, Some(config)) => Some(TransportSource::Config(config.clone())),
            (None, None, None) => None,
        }
    }
}

impl fmt::Debug for TransportSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSources")
            .field("transporter", &self.transporter.is_some())
            .field("session", &self.session)
            .field("config", &self.config)
            .finish()
    }
}
