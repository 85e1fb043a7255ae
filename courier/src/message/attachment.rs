//! Module dedicated to email message attachments.
//!
//! An [`Attachment`] is a closed set of content sources (inline
//! bytes, file reference or stream handle) decorated with the MIME
//! metadata needed to render it as a message part.

use std::{
    any::Any,
    borrow::Cow,
    fmt, fs,
    io::{self, Read},
    path::{Path, PathBuf},
    result,
    sync::Mutex,
};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{AnyBoxedError, AnyError};

/// The content-id used by calendar invites.
pub const CALENDAR_CONTENT_ID: &str = "urn:content-classes:calendarmessage";

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read attachment at {1:?}")]
    ReadFileError(#[source] io::Error, PathBuf),
    #[error("cannot read attachment stream {1:?}")]
    ReadStreamError(#[source] io::Error, Option<String>),
    #[error("cannot read attachment stream {0:?}: stream already consumed")]
    StreamConsumedError(Option<String>),
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

/// The content disposition of an attachment.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ContentDisposition {
    #[default]
    Attachment,
    Inline,
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attachment => write!(f, "attachment"),
            Self::Inline => write!(f, "inline"),
        }
    }
}

/// The iCalendar method carried by a calendar invite.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum CalendarMethod {
    Publish,
    Request,
    Reply,
    #[default]
    Cancel,
}

impl CalendarMethod {
    /// Returns the `text/calendar` MIME type bound to this method.
    pub fn mime(&self) -> String {
        format!("text/calendar;method={self}")
    }
}

impl fmt::Display for CalendarMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish => write!(f, "PUBLISH"),
            Self::Request => write!(f, "REQUEST"),
            Self::Reply => write!(f, "REPLY"),
            Self::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// A readable stream that can be drained only once.
pub struct StreamSource(Mutex<Option<Box<dyn Read + Send>>>);

impl StreamSource {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self(Mutex::new(Some(Box::new(reader))))
    }

    /// Returns `true` if the stream has already been drained.
    pub fn is_consumed(&self) -> bool {
        match self.0.lock() {
            Ok(reader) => reader.is_none(),
            Err(_) => true,
        }
    }

    fn take(&self) -> Option<Box<dyn Read + Send>> {
        self.0.lock().ok().and_then(|mut reader| reader.take())
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// The content source of an attachment.
#[derive(Debug)]
pub enum AttachmentSource {
    /// Content held in memory.
    Bytes(Vec<u8>),

    /// Content read from the file system when the message is
    /// rendered.
    File(PathBuf),

    /// Content drained from a stream when the message is rendered.
    ///
    /// A stream can be read only once, which means a message holding
    /// a stream attachment can be sent only once.
    Stream(StreamSource),
}

/// The email message attachment.
#[derive(Debug)]
pub struct Attachment {
    /// The optional attachment filename.
    pub filename: Option<String>,

    /// The attachment MIME type, parameters included.
    pub mime: String,

    /// The attachment content disposition.
    pub disposition: ContentDisposition,

    /// The attachment content-id, used to reference inline parts.
    pub content_id: Option<String>,

    /// The attachment content source.
    pub source: AttachmentSource,
}

impl Attachment {
    fn new(
        filename: Option<String>,
        mime: impl ToString,
        disposition: ContentDisposition,
        source: AttachmentSource,
    ) -> Self {
        Self {
            filename,
            mime: mime.to_string(),
            disposition,
            content_id: Some(Uuid::new_v4().to_string()),
            source,
        }
    }

    /// Creates an attachment from bytes held in memory.
    pub fn new_bytes(
        filename: Option<impl ToString>,
        mime: impl ToString,
        disposition: ContentDisposition,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let filename = filename.map(|f| f.to_string());
        Self::new(
            filename,
            mime,
            disposition,
            AttachmentSource::Bytes(bytes.into()),
        )
    }

    /// Creates an attachment from a stream.
    pub fn new_stream(
        filename: Option<impl ToString>,
        mime: impl ToString,
        disposition: ContentDisposition,
        reader: impl Read + Send + 'static,
    ) -> Self {
        let filename = filename.map(|f| f.to_string());
        Self::new(
            filename,
            mime,
            disposition,
            AttachmentSource::Stream(StreamSource::new(reader)),
        )
    }

    /// Creates an attachment from a file path.
    ///
    /// The filename is taken from the path. The MIME type is guessed
    /// from the file content, and falls back to
    /// `application/octet-stream` if the file cannot be inspected.
    pub fn new_file(disposition: ContentDisposition, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned);
        let mime = guess_mime(&path);
        Self::new(filename, mime, disposition, AttachmentSource::File(path))
    }

    /// Creates the calendar part of a calendar invite.
    pub fn new_calendar(method: CalendarMethod, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new_bytes(None::<String>, method.mime(), ContentDisposition::Inline, bytes)
            .with_content_id(CALENDAR_CONTENT_ID)
    }

    /// Sets the content-id following the builder pattern.
    pub fn with_content_id(mut self, content_id: impl ToString) -> Self {
        self.content_id = Some(content_id.to_string());
        self
    }

    /// Returns `true` if the attachment is a `text/calendar` part.
    pub fn is_calendar(&self) -> bool {
        self.mime
            .split(';')
            .next()
            .map(|mime| mime.trim().eq_ignore_ascii_case("text/calendar"))
            .unwrap_or_default()
    }

    /// Reads the attachment content.
    ///
    /// In-memory content is borrowed, file content is read from disk
    /// and stream content is drained. Reading a drained stream fails.
    pub fn read_content(&self) -> Result<Cow<'_, [u8]>> {
        match &self.source {
            AttachmentSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            AttachmentSource::File(path) => {
                debug!("reading attachment from {}", path.display());
                let bytes = fs::read(path).map_err(|err| Error::ReadFileError(err, path.clone()))?;
                Ok(Cow::Owned(bytes))
            }
            AttachmentSource::Stream(stream) => {
                let mut reader = stream
                    .take()
                    .ok_or_else(|| Error::StreamConsumedError(self.filename.clone()))?;
                let mut bytes = Vec::new();
                reader
                    .read_to_end(&mut bytes)
                    .map_err(|err| Error::ReadStreamError(err, self.filename.clone()))?;
                Ok(Cow::Owned(bytes))
            }
        }
    }
}

fn guess_mime(path: &Path) -> String {
    match tree_magic_mini::from_filepath(path) {
        Some(mime) => mime.to_owned(),
        None => {
            debug!("cannot guess mime type of {}", path.display());
            String::from("application/octet-stream")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use tempfile::NamedTempFile;

    use super::{Attachment, CalendarMethod, ContentDisposition, Error, CALENDAR_CONTENT_ID};

    #[test]
    fn bytes_attachment() {
        let attachment = Attachment::new_bytes(
            Some("hello.txt"),
            "text/plain",
            ContentDisposition::Attachment,
            "Hello, world!",
        );

        assert_eq!(attachment.filename.as_deref(), Some("hello.txt"));
        assert!(attachment.content_id.is_some());
        assert_eq!(attachment.read_content().unwrap().as_ref(), b"Hello, world!");
        assert_eq!(attachment.read_content().unwrap().as_ref(), b"Hello, world!");
    }

    #[test]
    fn generated_content_ids_differ() {
        let a = Attachment::new_bytes(None::<&str>, "text/plain", Default::default(), "a");
        let b = Attachment::new_bytes(None::<&str>, "text/plain", Default::default(), "b");
        assert_ne!(a.content_id, b.content_id);
    }

    #[test]
    fn stream_attachment_is_read_once() {
        let attachment = Attachment::new_stream(
            Some("data.bin"),
            "application/octet-stream",
            ContentDisposition::Attachment,
            Cursor::new(vec![1, 2, 3]),
        );

        assert_eq!(attachment.read_content().unwrap().as_ref(), &[1, 2, 3]);

        let err = attachment.read_content().unwrap_err();
        assert!(matches!(err, Error::StreamConsumedError(Some(ref f)) if f == "data.bin"));
    }

    #[test]
    fn file_attachment() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Hello, file!").unwrap();

        let attachment = Attachment::new_file(ContentDisposition::Inline, file.path());

        assert_eq!(
            attachment.filename.as_deref(),
            file.path().file_name().and_then(|f| f.to_str())
        );
        assert!(!attachment.mime.is_empty());
        assert_eq!(attachment.read_content().unwrap().as_ref(), b"Hello, file!");
    }

    #[test]
    fn missing_file_attachment() {
        let attachment = Attachment::new_file(ContentDisposition::Attachment, "/does/not/exist");
        assert_eq!(attachment.mime, "application/octet-stream");
        assert!(matches!(
            attachment.read_content().unwrap_err(),
            Error::ReadFileError(..)
        ));
    }

    #[test]
    fn calendar_attachment() {
        let attachment = Attachment::new_calendar(CalendarMethod::Request, "BEGIN:VCALENDAR");

        assert_eq!(attachment.mime, "text/calendar;method=REQUEST");
        assert_eq!(attachment.disposition, ContentDisposition::Inline);
        assert_eq!(attachment.content_id.as_deref(), Some(CALENDAR_CONTENT_ID));
        assert_eq!(attachment.filename, None);
        assert!(attachment.is_calendar());
    }
}
