//! Module dedicated to the message builder.
//!
//! The [`MailMessageBuilder`] accumulates an [`EmailMessage`] through
//! chained calls, resolves its templates against a binding context
//! then hands the finalized message to a [`Transporter`].

use std::{fmt, io::Read, path::PathBuf, sync::Arc};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    contact,
    message::{Attachment, CalendarMethod, ContentDisposition, EmailMessageType, Header},
    template::{MailContext, TemplateContext, TemplateField, TemplateProvider, MAIL_CONTEXT_KEY},
    transport::{SmtpConfig, SmtpSession, SmtpTransporter, TransportSources, Transporter},
    Contact, EmailMessage, Error, IntoContacts, MessagePriority, Result, RootContentType,
};

/// The fluent email message builder.
///
/// Configuration calls consume and return the builder. Merging and
/// sending take the builder by mutable reference, so that it keeps
/// its state (the merged flag in particular) across sends.
#[derive(Default)]
pub struct MailMessageBuilder {
    msg: EmailMessage,
    sources: TransportSources,
    subject_tpl: Option<Box<dyn TemplateProvider>>,
    text_tpl: Option<Box<dyn TemplateProvider>>,
    html_tpl: Option<Box<dyn TemplateProvider>>,
    ctx: TemplateContext,
    merged: bool,
    error: Option<contact::Error>,
}

impl MailMessageBuilder {
    /// Creates a builder without any transport source.
    ///
    /// Such builder can still send messages using
    /// [`send_with`](Self::send_with) and friends, but
    /// [`send`](Self::send) fails.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transporter(transporter: impl Transporter + 'static) -> Self {
        Self::new().set_transporter(transporter)
    }

    pub fn with_session(session: SmtpSession) -> Self {
        Self::new().set_session(session)
    }

    pub fn with_config(config: SmtpConfig) -> Self {
        Self::new().set_config(config)
    }

    pub fn set_transporter(mut self, transporter: impl Transporter + 'static) -> Self {
        self.sources.transporter = Some(Arc::new(transporter));
        self
    }

    pub fn set_session(mut self, session: SmtpSession) -> Self {
        self.sources.session = Some(session);
        self
    }

    pub fn set_config(mut self, config: SmtpConfig) -> Self {
        self.sources.config = Some(config);
        self
    }

    fn push_contacts(
        mut self,
        contacts: impl IntoContacts,
        list: fn(&mut EmailMessage) -> &mut Vec<Contact>,
    ) -> Self {
        match contacts.into_contacts() {
            Ok(contacts) => list(&mut self.msg).extend(contacts),
            Err(err) => {
                warn!("{err}, skipping it");
                self.error.get_or_insert(err);
            }
        }
        self
    }

    pub fn from(self, contacts: impl IntoContacts) -> Self {
        self.push_contacts(contacts, |msg| &mut msg.from)
    }

    pub fn reply_to(self, contacts: impl IntoContacts) -> Self {
        self.push_contacts(contacts, |msg| &mut msg.reply_to)
    }

    pub fn to(self, contacts: impl IntoContacts) -> Self {
        self.push_contacts(contacts, |msg| &mut msg.to)
    }

    pub fn cc(self, contacts: impl IntoContacts) -> Self {
        self.push_contacts(contacts, |msg| &mut msg.cc)
    }

    pub fn bcc(self, contacts: impl IntoContacts) -> Self {
        self.push_contacts(contacts, |msg| &mut msg.bcc)
    }

    /// Appends a custom header. Duplicates are kept.
    pub fn add_header(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.msg.headers.push(Header::new(name, value));
        self
    }

    pub fn subject(mut self, subject: impl ToString) -> Self {
        self.msg.subject = Some(subject.to_string());
        self
    }

    pub fn body_text(mut self, text: impl ToString) -> Self {
        self.msg.text_body = Some(text.to_string());
        self
    }

    pub fn body_html(mut self, html: impl ToString) -> Self {
        self.msg.html_body = Some(html.to_string());
        self
    }

    /// Sets both the html body and its plain text alternative.
    pub fn body_html_text_alt(self, html: impl ToString, text: impl ToString) -> Self {
        self.body_html(html).body_text(text)
    }

    /// Sets the subject template.
    ///
    /// Once merged, the template overrides any literal subject.
    pub fn subject_template(mut self, tpl: impl TemplateProvider + 'static) -> Self {
        self.subject_tpl = Some(Box::new(tpl));
        self
    }

    pub fn body_text_template(mut self, tpl: impl TemplateProvider + 'static) -> Self {
        self.text_tpl = Some(Box::new(tpl));
        self
    }

    pub fn body_html_template(mut self, tpl: impl TemplateProvider + 'static) -> Self {
        self.html_tpl = Some(Box::new(tpl));
        self
    }

    pub fn body_html_text_alt_template(
        self,
        html: impl TemplateProvider + 'static,
        text: impl TemplateProvider + 'static,
    ) -> Self {
        self.body_html_template(html).body_text_template(text)
    }

    /// Requests a delivery receipt to the given address.
    pub fn delivery_receipt(self, contact: impl IntoContacts) -> Self {
        self.push_contacts(contact, |msg| &mut msg.delivery_receipt)
    }

    /// Requests a read receipt to the given address.
    pub fn read_receipt(self, contact: impl IntoContacts) -> Self {
        self.push_contacts(contact, |msg| &mut msg.read_receipt)
    }

    pub fn importance(mut self, importance: MessagePriority) -> Self {
        self.msg.importance = importance;
        self
    }

    pub fn message_id(mut self, id: impl ToString) -> Self {
        self.msg.message_id = Some(id.to_string());
        self
    }

    pub fn charset(mut self, charset: impl ToString) -> Self {
        self.msg.charset = charset.to_string();
        self
    }

    pub fn content_type(mut self, content_type: RootContentType) -> Self {
        self.msg.root_content_type = Some(content_type);
        self
    }

    pub fn add_attachment(mut self, attachment: Attachment) -> Self {
        self.msg.attachments.push(attachment);
        self
    }

    pub fn add_attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.msg.attachments.extend(attachments);
        self
    }

    pub fn add_bytes_attachment(
        self,
        filename: impl ToString,
        mime: impl ToString,
        disposition: ContentDisposition,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.add_attachment(Attachment::new_bytes(
            Some(filename),
            mime,
            disposition,
            bytes,
        ))
    }

    /// Adds an attachment read from the given stream.
    ///
    /// The stream is drained by the first send: a builder holding a
    /// stream attachment cannot send its message twice.
    pub fn add_stream_attachment(
        self,
        filename: impl ToString,
        mime: impl ToString,
        disposition: ContentDisposition,
        reader: impl Read + Send + 'static,
    ) -> Self {
        self.add_attachment(Attachment::new_stream(
            Some(filename),
            mime,
            disposition,
            reader,
        ))
    }

    pub fn add_file_attachment(
        self,
        disposition: ContentDisposition,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.add_attachment(Attachment::new_file(disposition, path))
    }

    /// Turns the message into a calendar invite cancellation.
    ///
    /// See [`ical_with_method`](Self::ical_with_method).
    pub fn ical(self, html: impl ToString, bytes: impl Into<Vec<u8>>) -> Self {
        self.ical_with_method(CalendarMethod::Cancel, html, bytes)
    }

    /// Turns the message into a calendar invite.
    ///
    /// Sets the message type, the html body and attaches the inline
    /// `text/calendar` part using the given method.
    pub fn ical_with_method(
        mut self,
        method: CalendarMethod,
        html: impl ToString,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.msg.message_type = EmailMessageType::InviteIcal;
        self.body_html(html)
            .add_attachment(Attachment::new_calendar(method, bytes))
    }

    /// Binds a value to the given key of the template context.
    pub fn put(mut self, key: impl ToString, value: impl Into<Value>) -> Self {
        self.ctx.insert(key.to_string(), value.into());
        self
    }

    pub fn put_all<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: ToString,
        V: Into<Value>,
    {
        self.ctx.extend(
            entries
                .into_iter()
                .map(|(key, val)| (key.to_string(), val.into())),
        );
        self
    }

    /// Resolves templates into the message.
    ///
    /// The `mailContext` binding is refreshed from the current
    /// attachments, then subject, text and html templates are merged
    /// in that order. Fields without template keep their literal
    /// value. Calling this function always merges again, even if
    /// templates were already merged.
    pub fn merge_templates(&mut self) -> Result<&EmailMessage> {
        debug!("merging message templates");

        let mail_ctx = MailContext::new(&self.msg.attachments);
        self.ctx
            .insert(MAIL_CONTEXT_KEY.to_owned(), mail_ctx.to_value());

        if let Some(tpl) = &self.subject_tpl {
            let subject = tpl
                .merge(&self.ctx)
                .map_err(|err| Error::MergeTemplateError(TemplateField::Subject, err))?;
            self.msg.subject = Some(subject);
        }

        if let Some(tpl) = &self.text_tpl {
            let text = tpl
                .merge(&self.ctx)
                .map_err(|err| Error::MergeTemplateError(TemplateField::Text, err))?;
            self.msg.text_body = Some(text);
        }

        if let Some(tpl) = &self.html_tpl {
            let html = tpl
                .merge(&self.ctx)
                .map_err(|err| Error::MergeTemplateError(TemplateField::Html, err))?;
            self.msg.html_body = Some(html);
        }

        self.merged = true;

        Ok(&self.msg)
    }

    /// Sends the message using the given transporter.
    ///
    /// Templates are merged first unless they were already merged.
    /// Any template or transporter error is wrapped into
    /// [`Error::SendFailedError`].
    pub async fn send_with(&mut self, transporter: &dyn Transporter) -> Result<&EmailMessage> {
        if let Some(err) = &self.error {
            return Err(Error::ParseContactError(err.clone()));
        }

        if !self.merged {
            self.merge_templates()
                .map_err(|err| Error::SendFailedError(Box::new(err)))?;
        }

        info!(subject = ?self.msg.subject, "sending message");

        transporter
            .send(&self.msg)
            .await
            .map_err(Error::SendFailedError)?;

        Ok(&self.msg)
    }

    /// Sends the message through a short-lived SMTP transporter
    /// wrapping the given session.
    pub async fn send_with_session(&mut self, session: SmtpSession) -> Result<&EmailMessage> {
        let transporter = SmtpTransporter::new(session);
        self.send_with(&transporter).await
    }

    /// Sends the message through a short-lived SMTP transporter
    /// derived from the given session configuration.
    pub async fn send_with_config(&mut self, config: SmtpConfig) -> Result<&EmailMessage> {
        self.send_with_session(SmtpSession::new(config)).await
    }

    /// Sends the message using the transport source the builder was
    /// configured with.
    ///
    /// An explicit transporter is used first, then a session, then a
    /// session configuration. Fails with
    /// [`Error::NoTransportSourceError`] when none is available.
    pub async fn send(&mut self) -> Result<&EmailMessage> {
        let Some(source) = self.sources.select() else {
            return Err(Error::NoTransportSourceError);
        };

        debug!(?source, "resolved transport source");

        let transporter = source.into_transporter();
        self.send_with(transporter.as_ref()).await
    }

    /// Returns the message being built.
    pub fn message(&self) -> &EmailMessage {
        &self.msg
    }

    pub fn into_message(self) -> EmailMessage {
        self.msg
    }

    pub fn context(&self) -> &TemplateContext {
        &self.ctx
    }

    /// Returns `true` if templates have been merged at least once.
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    /// Returns the first address parsing error, if any.
    pub fn error(&self) -> Option<&contact::Error> {
        self.error.as_ref()
    }
}

impl fmt::Debug for MailMessageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailMessageBuilder")
            .field("msg", &self.msg)
            .field("sources", &self.sources)
            .field("subject_tpl", &self.subject_tpl.is_some())
            .field("text_tpl", &self.text_tpl.is_some())
            .field("html_tpl", &self.html_tpl.is_some())
            .field("ctx", &self.ctx)
            .field("merged", &self.merged)
            .field("error", &self.error)
            .finish()
    }
}
