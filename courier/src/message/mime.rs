//! # Email message to MIME rendering module
//!
//! Module dedicated to the rendering of a finalized [`EmailMessage`]
//! into a MIME message. Rendering is not needed to compose a message:
//! transporters use it right before delivery.

use std::{any::Any, borrow::Cow, io, result};

use mail_builder::{
    headers::{address::Address, content_type::ContentType, raw::Raw},
    mime::{BodyPart, MimePart},
    MessageBuilder,
};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    message::{
        attachment, Attachment, ContentDisposition, EmailMessage, EmailMessageType,
        DEFAULT_CHARSET,
    },
    AnyBoxedError, AnyError, Contact, MessagePriority,
};

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot render attachment")]
    ReadAttachmentError(#[from] attachment::Error),
    #[error("cannot write mime message")]
    WriteMessageError(#[source] io::Error),
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

impl EmailMessage {
    /// Renders the message into a MIME message builder.
    ///
    /// Attachments are read at this moment, which drains stream
    /// attachments.
    pub fn to_mime_builder(&self) -> Result<MessageBuilder<'_>> {
        let mut builder = MessageBuilder::new();

        if !self.from.is_empty() {
            builder = builder.from(to_address_list(&self.from));
        }

        if !self.reply_to.is_empty() {
            builder = builder.reply_to(to_address_list(&self.reply_to));
        }

        if !self.to.is_empty() {
            builder = builder.to(to_address_list(&self.to));
        }

        if !self.cc.is_empty() {
            builder = builder.cc(to_address_list(&self.cc));
        }

        if let Some(subject) = &self.subject {
            builder = builder.subject(subject.as_str());
        }

        if let Some(id) = &self.message_id {
            builder = builder.message_id(id.trim_matches(&['<', '>'][..]));
        }

        for header in &self.headers {
            builder = builder.header(header.name.as_str(), Raw::new(header.value.as_str()));
        }

        if !self.delivery_receipt.is_empty() {
            let contacts = join_contacts(&self.delivery_receipt);
            builder = builder.header("Return-Receipt-To", Raw::new(contacts));
        }

        if !self.read_receipt.is_empty() {
            let contacts = join_contacts(&self.read_receipt);
            builder = builder.header("Disposition-Notification-To", Raw::new(contacts));
        }

        if self.importance != MessagePriority::Normal {
            builder = builder
                .header("X-Priority", Raw::new(self.importance.x_priority()))
                .header("Importance", Raw::new(self.importance.importance()));
        }

        if self.message_type == EmailMessageType::InviteIcal {
            builder = builder.header(
                "Content-Class",
                Raw::new(attachment::CALENDAR_CONTENT_ID),
            );
        }

        Ok(builder.body(self.to_mime_body()?))
    }

    /// Renders the message into raw MIME bytes.
    pub fn to_mime_vec(&self) -> Result<Vec<u8>> {
        let bytes = self
            .to_mime_builder()?
            .write_to_vec()
            .map_err(Error::WriteMessageError)?;
        trace!("rendered mime message of {} bytes", bytes.len());
        Ok(bytes)
    }

    fn to_mime_body(&self) -> Result<MimePart<'_>> {
        let mut alternatives = Vec::new();
        let mut inlines = Vec::new();
        let mut attachments = Vec::new();

        if let Some(text) = &self.text_body {
            alternatives.push(self.text_part("text/plain", text));
        }

        if let Some(html) = &self.html_body {
            alternatives.push(self.text_part("text/html", html));
        }

        for attachment in &self.attachments {
            let part = to_attachment_part(attachment)?;

            if self.message_type == EmailMessageType::InviteIcal && attachment.is_calendar() {
                alternatives.push(part);
            } else if attachment.disposition == ContentDisposition::Inline {
                inlines.push(part);
            } else {
                attachments.push(part);
            }
        }

        debug!(
            alternatives = alternatives.len(),
            inlines = inlines.len(),
            attachments = attachments.len(),
            "rendering mime body"
        );

        let content = match alternatives.len() {
            0 => self.text_part("text/plain", ""),
            1 => alternatives.remove(0),
            _ => MimePart::new("multipart/alternative", alternatives),
        };

        if let Some(root) = self.root_content_type {
            if inlines.is_empty() && attachments.is_empty() {
                return Ok(content);
            }

            let mut parts = vec![content];
            parts.extend(inlines);
            parts.extend(attachments);
            return Ok(MimePart::new(ContentType::new(root.to_string()), parts));
        }

        let content = if inlines.is_empty() {
            content
        } else {
            let mut parts = vec![content];
            parts.extend(inlines);
            MimePart::new("multipart/related", parts)
        };

        let content = if attachments.is_empty() {
            content
        } else {
            let mut parts = vec![content];
            parts.extend(attachments);
            MimePart::new("multipart/mixed", parts)
        };

        Ok(content)
    }

    fn text_part<'a>(&'a self, mime: &'static str, body: &'a str) -> MimePart<'a> {
        let ctype = ContentType::new(mime).attribute("charset", self.text_charset(body));
        MimePart::new(ctype, BodyPart::Text(Cow::Borrowed(body)))
    }

    /// Returns the charset label matching the bytes of the given body.
    ///
    /// Bodies are always written as UTF-8. The requested charset is
    /// only kept when it describes these bytes: any UTF-8 alias, or
    /// an ASCII label for a pure ASCII body.
    fn text_charset<'a>(&'a self, body: &str) -> &'a str {
        let charset = self.charset.trim();
        let lowercase = charset.to_ascii_lowercase();

        match lowercase.as_str() {
            "utf-8" | "utf8" => charset,
            "us-ascii" | "ascii" if body.is_ascii() => charset,
            _ => {
                debug!("cannot encode text part using charset {charset}, using {DEFAULT_CHARSET}");
                DEFAULT_CHARSET
            }
        }
    }
}

fn to_address_list(contacts: &[Contact]) -> Address<'_> {
    let addrs = contacts
        .iter()
        .map(|contact| Address::new_address(contact.name.as_deref(), contact.addr.as_str()))
        .collect();
    Address::new_list(addrs)
}

fn join_contacts(contacts: &[Contact]) -> String {
    contacts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses a MIME type with its parameters, for example
/// `text/calendar;method=CANCEL`.
fn parse_content_type(mime: &str) -> ContentType<'_> {
    let mut params = mime.split(';');
    let mut ctype = ContentType::new(params.next().unwrap_or_default().trim());

    for param in params {
        if let Some((key, val)) = param.split_once('=') {
            ctype = ctype.attribute(key.trim(), val.trim().trim_matches('"'));
        }
    }

    ctype
}

fn to_attachment_part(attachment: &Attachment) -> Result<MimePart<'_>> {
    let mut ctype = parse_content_type(&attachment.mime);

    if let Some(filename) = &attachment.filename {
        ctype = ctype.attribute("name", filename.as_str());
    }

    let mut part = MimePart::new(ctype, BodyPart::Binary(attachment.read_content()?));

    part = match (attachment.disposition, &attachment.filename) {
        (ContentDisposition::Inline, _) => part.inline(),
        (ContentDisposition::Attachment, Some(filename)) => part.attachment(filename.as_str()),
        (ContentDisposition::Attachment, None) => part.attachment("noname"),
    };

    if let Some(cid) = &attachment.content_id {
        part = part.cid(cid.as_str());
    }

    Ok(part)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use mail_parser::{MessageParser, MimeHeaders};

    use crate::{
        message::{
            Attachment, CalendarMethod, ContentDisposition, EmailMessageType, Header,
            RootContentType,
        },
        Contact, EmailMessage, MessagePriority,
    };

    fn contact(addr: &str) -> Contact {
        Contact::parse(addr).unwrap()
    }

    #[test]
    fn plain_message() {
        let msg = EmailMessage {
            from: vec![contact("Alice <alice@localhost.com>")],
            to: vec![contact("bob@localhost.com")],
            bcc: vec![contact("eve@localhost.com")],
            subject: Some("Hello".into()),
            text_body: Some("Hello, world!".into()),
            message_id: Some("<id@localhost.com>".into()),
            headers: vec![Header::new("X-Custom", "1"), Header::new("X-Custom", "2")],
            ..Default::default()
        };

        let raw = msg.to_mime_vec().unwrap();
        let raw_str = String::from_utf8_lossy(&raw);
        let parsed = MessageParser::new().parse(&raw).unwrap();

        assert_eq!(parsed.subject(), Some("Hello"));
        assert_eq!(parsed.message_id(), Some("id@localhost.com"));
        assert_eq!(parsed.body_text(0).as_deref(), Some("Hello, world!"));
        assert!(raw_str.contains("X-Custom: 1"));
        assert!(raw_str.contains("X-Custom: 2"));
        assert!(!raw_str.contains("eve@localhost.com"));

        let from = parsed.from().and_then(|from| from.first()).unwrap();
        assert_eq!(from.address(), Some("alice@localhost.com"));
        assert_eq!(from.name(), Some("Alice"));
    }

    #[test]
    fn alternative_message_with_attachments() {
        let msg = EmailMessage {
            from: vec![contact("alice@localhost.com")],
            to: vec![contact("bob@localhost.com")],
            text_body: Some("text".into()),
            html_body: Some("<p>html</p>".into()),
            attachments: vec![
                Attachment::new_bytes(
                    Some("logo.png"),
                    "image/png",
                    ContentDisposition::Inline,
                    vec![0x89, 0x50, 0x4e, 0x47],
                )
                .with_content_id("logo"),
                Attachment::new_stream(
                    Some("notes.txt"),
                    "text/plain",
                    ContentDisposition::Attachment,
                    Cursor::new(b"some notes".to_vec()),
                ),
            ],
            ..Default::default()
        };

        let raw = msg.to_mime_vec().unwrap();
        let raw_str = String::from_utf8_lossy(&raw);
        let parsed = MessageParser::new().parse(&raw).unwrap();

        assert!(raw_str.contains("multipart/mixed"));
        assert!(raw_str.contains("multipart/related"));
        assert!(raw_str.contains("multipart/alternative"));
        assert!(raw_str.contains("<logo>"));
        assert_eq!(parsed.body_text(0).as_deref(), Some("text"));
        assert_eq!(parsed.body_html(0).as_deref(), Some("<p>html</p>"));

        let names: Vec<_> = parsed
            .attachments()
            .filter_map(|part| part.attachment_name())
            .collect();
        assert!(names.contains(&"notes.txt"));

        // the stream attachment cannot be rendered twice
        assert!(msg.to_mime_vec().is_err());
    }

    #[test]
    fn root_content_type_overrides_outer_multipart() {
        let msg = EmailMessage {
            text_body: Some("text".into()),
            root_content_type: Some(RootContentType::Related),
            attachments: vec![Attachment::new_bytes(
                Some("a.txt"),
                "text/plain",
                ContentDisposition::Attachment,
                "a",
            )],
            ..Default::default()
        };

        let raw = msg.to_mime_vec().unwrap();
        let raw_str = String::from_utf8_lossy(&raw);

        assert!(raw_str.contains("multipart/related"));
        assert!(!raw_str.contains("multipart/mixed"));
    }

    #[test]
    fn calendar_invite() {
        let msg = EmailMessage {
            html_body: Some("<p>meeting</p>".into()),
            message_type: EmailMessageType::InviteIcal,
            importance: MessagePriority::High,
            attachments: vec![Attachment::new_calendar(
                CalendarMethod::Cancel,
                "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
            )],
            ..Default::default()
        };

        let raw = msg.to_mime_vec().unwrap();
        let raw_str = String::from_utf8_lossy(&raw);

        assert!(raw_str.contains("Content-Class: urn:content-classes:calendarmessage"));
        assert!(raw_str.contains("multipart/alternative"));
        assert!(raw_str.contains("text/calendar"));
        assert!(raw_str.contains("method=CANCEL") || raw_str.contains("method=\"CANCEL\""));
        assert!(raw_str.contains("X-Priority: 1"));
        assert!(raw_str.contains("Importance: high"));
        assert!(!raw_str.contains("multipart/mixed"));
    }

    #[test]
    fn text_charset_matches_body_bytes() {
        let msg = EmailMessage {
            charset: "iso-8859-1".into(),
            text_body: Some("café".into()),
            ..Default::default()
        };

        let raw = msg.to_mime_vec().unwrap();
        let raw_str = String::from_utf8_lossy(&raw);
        let parsed = MessageParser::new().parse(&raw).unwrap();

        assert!(!raw_str.contains("iso-8859-1"));
        assert!(raw_str.contains("utf-8"));
        assert_eq!(parsed.body_text(0).as_deref(), Some("café"));
    }

    #[test]
    fn text_charset_keeps_compatible_labels() {
        let ascii = EmailMessage {
            charset: "us-ascii".into(),
            text_body: Some("cafe".into()),
            ..Default::default()
        };
        let raw = ascii.to_mime_vec().unwrap();
        assert!(String::from_utf8_lossy(&raw).contains("us-ascii"));

        let non_ascii = EmailMessage {
            charset: "us-ascii".into(),
            text_body: Some("café".into()),
            ..Default::default()
        };
        let raw = non_ascii.to_mime_vec().unwrap();
        let parsed = MessageParser::new().parse(&raw).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("us-ascii"));
        assert_eq!(parsed.body_text(0).as_deref(), Some("café"));
    }

    #[test]
    fn receipts() {
        let msg = EmailMessage {
            text_body: Some("text".into()),
            delivery_receipt: vec![contact("a@localhost.com")],
            read_receipt: vec![contact("b@localhost.com")],
            ..Default::default()
        };

        let raw = msg.to_mime_vec().unwrap();
        let raw_str = String::from_utf8_lossy(&raw);

        assert!(raw_str.contains("Return-Receipt-To: a@localhost.com"));
        assert!(raw_str.contains("Disposition-Notification-To: b@localhost.com"));
    }
}
