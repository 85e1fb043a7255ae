#![doc = include_str!("../README.md")]

pub mod builder;
pub mod contact;
pub mod error;
pub mod message;
pub mod template;
pub mod transport;

use std::any::Any;

#[doc(inline)]
pub use self::{
    builder::MailMessageBuilder,
    contact::{Contact, IntoContacts},
    error::{AnyBoxedError, AnyError, AnyResult},
    message::{
        Attachment, CalendarMethod, ContentDisposition, EmailMessage, EmailMessageType, Header,
        MessagePriority, RootContentType,
    },
    template::{TemplateContext, TemplateField, TemplateProvider, TextTemplate},
    transport::{
        MemoryTransporter, SmtpConfig, SmtpEncryptionKind, SmtpSession, SmtpTransporter,
        Transporter,
    },
};

/// The global `Error` enum of the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot send message: no transporter, session or session configuration available")]
    NoTransportSourceError,
    #[error("cannot send message")]
    SendFailedError(#[source] AnyBoxedError),
    #[error("cannot merge {0} template")]
    MergeTemplateError(TemplateField, #[source] AnyBoxedError),
    #[error(transparent)]
    ParseContactError(#[from] contact::Error),
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

/// The global `Result` alias of the library.
pub type Result<T> = std::result::Result<T, Error>;
