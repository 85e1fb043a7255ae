//! Module dedicated to email messages.
//!
//! The [`EmailMessage`] is the value accumulated by the
//! [`MailMessageBuilder`](crate::MailMessageBuilder) and handed to a
//! [`Transporter`](crate::transport::Transporter) once finalized.

pub mod attachment;
pub mod mime;

use std::fmt;

#[doc(inline)]
pub use self::attachment::{
    Attachment, AttachmentSource, CalendarMethod, ContentDisposition, CALENDAR_CONTENT_ID,
};
use crate::Contact;

/// The default charset of text parts.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// The free-form message header.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// The kind of message being composed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum EmailMessageType {
    #[default]
    Standard,

    /// The message is a calendar invite: its calendar part is
    /// rendered as an alternative of the html body.
    InviteIcal,
}

/// The message priority.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
}

impl MessagePriority {
    /// Returns the `X-Priority` header value.
    pub fn x_priority(&self) -> &'static str {
        match self {
            Self::Low => "5",
            Self::Normal => "3",
            Self::High => "1",
        }
    }

    /// Returns the `Importance` header value.
    pub fn importance(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// The subtype of the root multipart.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum RootContentType {
    #[default]
    Mixed,
    Alternative,
    Related,
}

impl fmt::Display for RootContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mixed => write!(f, "multipart/mixed"),
            Self::Alternative => write!(f, "multipart/alternative"),
            Self::Related => write!(f, "multipart/related"),
        }
    }
}

/// The email message.
#[derive(Debug)]
pub struct EmailMessage {
    pub from: Vec<Contact>,
    pub reply_to: Vec<Contact>,
    pub to: Vec<Contact>,
    pub cc: Vec<Contact>,
    pub bcc: Vec<Contact>,

    /// Addresses requesting a delivery receipt.
    pub delivery_receipt: Vec<Contact>,

    /// Addresses requesting a read receipt.
    pub read_receipt: Vec<Contact>,

    /// Custom headers, in insertion order. Duplicates are allowed.
    pub headers: Vec<Header>,

    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,

    pub message_type: EmailMessageType,
    pub importance: MessagePriority,

    /// The charset of text parts.
    pub charset: String,

    /// The subtype of the root multipart, if any.
    pub root_content_type: Option<RootContentType>,

    pub attachments: Vec<Attachment>,
    pub message_id: Option<String>,
}

impl Default for EmailMessage {
    fn default() -> Self {
        Self {
            from: Vec::new(),
            reply_to: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            delivery_receipt: Vec::new(),
            read_receipt: Vec::new(),
            headers: Vec::new(),
            subject: None,
            text_body: None,
            html_body: None,
            message_type: EmailMessageType::default(),
            importance: MessagePriority::default(),
            charset: DEFAULT_CHARSET.to_owned(),
            root_content_type: None,
            attachments: Vec::new(),
            message_id: None,
        }
    }
}

impl EmailMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first sender, used as the envelope sender.
    pub fn sender(&self) -> Option<&Contact> {
        self.from.first()
    }

    /// Returns all recipients (to, cc then bcc), without duplicates.
    pub fn recipients(&self) -> Vec<&Contact> {
        let mut recipients: Vec<&Contact> = Vec::new();

        for contact in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            if !recipients.iter().any(|r| r.addr == contact.addr) {
                recipients.push(contact);
            }
        }

        recipients
    }

    /// Returns the attachment matching the given content-id.
    pub fn find_attachment(&self, content_id: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.content_id.as_deref() == Some(content_id))
    }
}
