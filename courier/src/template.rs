//! Module dedicated to templates.
//!
//! A [`TemplateProvider`] renders the subject or a body of a message
//! against a [`TemplateContext`]. The library ships a minimal
//! [`TextTemplate`] provider; any other engine can be plugged by
//! implementing the trait, and plain closures implement it too.

use std::{
    any::Any,
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    result,
};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::{message::Attachment, AnyBoxedError, AnyError, AnyResult};

/// The name of the binding holding the [`MailContext`].
pub const MAIL_CONTEXT_KEY: &str = "mailContext";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\{\{\s*(",
        r#"(?:[A-Za-z0-9_\-]+|\["[^"]*"\]|\['[^']*'\])"#,
        r#"(?:\.[A-Za-z0-9_\-]+|\["[^"]*"\]|\['[^']*'\])*"#,
        r")\s*\}\}",
    ))
    .expect("placeholder regex should be valid")
});

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\.)([A-Za-z0-9_\-]+)|\["([^"]*)"\]|\['([^']*)'\]"#)
        .expect("segment regex should be valid")
});

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read template at {1:?}")]
    ReadTemplateError(#[source] io::Error, PathBuf),
    #[error("cannot find template binding {0}")]
    MissingBindingError(String),
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

/// The binding context templates are resolved against.
pub type TemplateContext = serde_json::Map<String, Value>;

/// The message field a template resolves into.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TemplateField {
    Subject,
    Text,
    Html,
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject => write!(f, "subject"),
            Self::Text => write!(f, "text body"),
            Self::Html => write!(f, "html body"),
        }
    }
}

/// The template provider.
///
/// Renders some content against the given binding context.
pub trait TemplateProvider: Send + Sync {
    fn merge(&self, ctx: &TemplateContext) -> AnyResult<String>;
}

impl<F> TemplateProvider for F
where
    F: Fn(&TemplateContext) -> AnyResult<String> + Send + Sync,
{
    fn merge(&self, ctx: &TemplateContext) -> AnyResult<String> {
        self(ctx)
    }
}

/// The attachment lookup exposed to templates.
///
/// Templates reference inline attachments (embedded images for
/// example) by content-id:
/// `<img src="{{ mailContext.attachments.logo.url }}">`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MailContext {
    attachments: BTreeMap<String, AttachmentRef>,
}

/// The template view of an attachment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttachmentRef {
    pub filename: Option<String>,
    pub mime: String,
    pub disposition: String,
    pub content_id: String,
}

impl AttachmentRef {
    /// Returns the `cid:` URL of the attachment.
    pub fn url(&self) -> String {
        format!("cid:{}", self.content_id)
    }
}

impl MailContext {
    /// Builds the lookup from a list of attachments.
    ///
    /// Attachments without content-id are not reachable from
    /// templates.
    pub fn new<'a>(attachments: impl IntoIterator<Item = &'a Attachment>) -> Self {
        let attachments = attachments
            .into_iter()
            .filter_map(|attachment| {
                let cid = attachment.content_id.clone()?;
                let attachment = AttachmentRef {
                    filename: attachment.filename.clone(),
                    mime: attachment.mime.clone(),
                    disposition: attachment.disposition.to_string(),
                    content_id: cid.clone(),
                };
                Some((cid, attachment))
            })
            .collect();

        Self { attachments }
    }

    pub fn get(&self, content_id: &str) -> Option<&AttachmentRef> {
        self.attachments.get(content_id)
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// Converts the lookup into its template binding value.
    pub fn to_value(&self) -> Value {
        let attachments = self
            .attachments
            .iter()
            .map(|(cid, attachment)| {
                let mut obj = serde_json::Map::new();
                obj.insert("filename".into(), attachment.filename.clone().into());
                obj.insert("mime".into(), attachment.mime.clone().into());
                obj.insert("disposition".into(), attachment.disposition.clone().into());
                obj.insert("content-id".into(), attachment.content_id.clone().into());
                obj.insert("url".into(), attachment.url().into());
                (cid.clone(), Value::Object(obj))
            })
            .collect();

        let mut ctx = serde_json::Map::new();
        ctx.insert("attachments".into(), Value::Object(attachments));
        Value::Object(ctx)
    }
}

/// The built-in text template.
///
/// Placeholders take the form `{{ path }}`, where the path is a
/// sequence of keys separated by dots. Keys containing other
/// characters, like content-ids, are quoted inside brackets:
/// `{{ mailContext.attachments["logo.png"].url }}`. Strings are
/// rendered as they are, other values are rendered as JSON.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TextTemplate {
    content: String,
}

impl TextTemplate {
    pub fn new(content: impl ToString) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Reads the template content from the given file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|err| Error::ReadTemplateError(err, path.into()))?;
        Ok(Self { content })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Renders the template against the given context.
    pub fn render(&self, ctx: &TemplateContext) -> Result<String> {
        let mut missing = None;

        let output = PLACEHOLDER.replace_all(&self.content, |caps: &Captures| {
            let path = &caps[1];
            match lookup(ctx, path) {
                Some(Value::String(s)) => s.clone(),
                Some(val) => val.to_string(),
                None => {
                    missing.get_or_insert_with(|| path.to_owned());
                    String::new()
                }
            }
        });

        match missing {
            Some(path) => Err(Error::MissingBindingError(path)),
            None => {
                trace!("rendered template of {} bytes", output.len());
                Ok(output.into_owned())
            }
        }
    }
}

impl TemplateProvider for TextTemplate {
    fn merge(&self, ctx: &TemplateContext) -> AnyResult<String> {
        Ok(self.render(ctx)?)
    }
}

fn lookup<'a>(ctx: &'a TemplateContext, path: &str) -> Option<&'a Value> {
    let mut keys = SEGMENT.captures_iter(path).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|key| key.as_str())
    });
    let mut val = ctx.get(keys.next()?)?;

    for key in keys {
        val = match val {
            Value::Object(obj) => obj.get(key)?,
            Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(val)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use crate::{
        message::{Attachment, CalendarMethod, ContentDisposition},
        AnyResult,
    };

    use super::{Error, MailContext, TemplateContext, TemplateProvider, TextTemplate};

    fn ctx(val: serde_json::Value) -> TemplateContext {
        match val {
            serde_json::Value::Object(obj) => obj,
            _ => unreachable!(),
        }
    }

    #[test]
    fn render_flat_binding() {
        let tpl = TextTemplate::new("Hi {{ name }}");
        let out = tpl.render(&ctx(json!({ "name": "Bob" }))).unwrap();
        assert_eq!(out, "Hi Bob");
    }

    #[test]
    fn render_nested_bindings() {
        let tpl = TextTemplate::new("{{user.name}} has {{ user.orders.1 }} and {{count}}");
        let out = tpl
            .render(&ctx(json!({
                "user": { "name": "Alice", "orders": ["a", "b"] },
                "count": 3,
            })))
            .unwrap();
        assert_eq!(out, "Alice has b and 3");
    }

    #[test]
    fn render_missing_binding() {
        let tpl = TextTemplate::new("Hi {{ name }}");
        let err = tpl.render(&TemplateContext::new()).unwrap_err();
        assert!(matches!(err, Error::MissingBindingError(ref key) if key == "name"));
    }

    #[test]
    fn render_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Dear {{{{ name }}}},").unwrap();

        let tpl = TextTemplate::from_path(file.path()).unwrap();
        let out = tpl.merge(&ctx(json!({ "name": "Carol" }))).unwrap();
        assert_eq!(out, "Dear Carol,");
    }

    #[test]
    fn closure_provider() {
        let provider =
            |ctx: &TemplateContext| -> AnyResult<String> { Ok(format!("{} keys", ctx.len())) };
        let out = provider.merge(&ctx(json!({ "a": 1, "b": 2 }))).unwrap();
        assert_eq!(out, "2 keys");
    }

    #[test]
    fn mail_context_lookup() {
        let attachments = [
            Attachment::new_bytes(Some("logo.png"), "image/png", ContentDisposition::Inline, "x")
                .with_content_id("logo"),
            Attachment::new_bytes(Some("doc.pdf"), "application/pdf", Default::default(), "y"),
        ];

        let mail_ctx = MailContext::new(&attachments);
        assert_eq!(mail_ctx.len(), 2);
        assert_eq!(mail_ctx.get("logo").unwrap().url(), "cid:logo");

        let mut bindings = TemplateContext::new();
        bindings.insert("mailContext".into(), mail_ctx.to_value());

        let tpl = TextTemplate::new(r#"<img src="{{ mailContext.attachments.logo.url }}">"#);
        assert_eq!(tpl.render(&bindings).unwrap(), r#"<img src="cid:logo">"#);
    }

    #[test]
    fn render_quoted_keys() {
        let bindings = ctx(json!({
            "attachments": {
                "logo.png": { "url": "cid:logo.png" },
                "part1.x@host": { "url": "cid:part1.x@host" },
            },
            "urn:a": ["zero", "one"],
        }));

        let tpl = TextTemplate::new(concat!(
            r#"{{ attachments["logo.png"].url }} "#,
            r#"{{ attachments['part1.x@host'].url }} "#,
            r#"{{ ["urn:a"].1 }}"#,
        ));

        assert_eq!(
            tpl.render(&bindings).unwrap(),
            "cid:logo.png cid:part1.x@host one"
        );
    }

    #[test]
    fn mail_context_lookup_by_dotted_content_id() {
        let attachments = [
            Attachment::new_bytes(Some("logo.png"), "image/png", ContentDisposition::Inline, "x")
                .with_content_id("logo.png"),
            Attachment::new_calendar(CalendarMethod::Cancel, "BEGIN:VCALENDAR"),
        ];

        let mut bindings = TemplateContext::new();
        bindings.insert("mailContext".into(), MailContext::new(&attachments).to_value());

        let tpl = TextTemplate::new(concat!(
            r#"<img src="{{ mailContext.attachments["logo.png"].url }}">"#,
            r#"{{ mailContext.attachments["urn:content-classes:calendarmessage"].mime }}"#,
        ));

        assert_eq!(
            tpl.render(&bindings).unwrap(),
            r#"<img src="cid:logo.png">text/calendar;method=CANCEL"#
        );
    }
}
