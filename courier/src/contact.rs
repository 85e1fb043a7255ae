//! Module dedicated to email contacts.
//!
//! A [`Contact`] is the name/address pair stored in every address
//! list of an [`EmailMessage`](crate::message::EmailMessage). The
//! [`IntoContacts`] trait normalizes the various shapes accepted by
//! the builder address operations into the same list of contacts.

use std::{any::Any, fmt, result, str::FromStr};

use email_address::EmailAddress;
use thiserror::Error;

use crate::{AnyBoxedError, AnyError};

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("cannot parse email address {1:?}")]
    ParseAddressError(#[source] email_address::Error, String),
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

/// The email contact.
///
/// Represents an optional display name associated to a bare email
/// address.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct Contact {
    /// The optional display name of the contact.
    pub name: Option<String>,

    /// The bare email address of the contact.
    pub addr: String,
}

impl Contact {
    pub fn new(name: Option<impl ToString>, addr: impl ToString) -> Self {
        Self {
            name: name.map(|name| name.to_string()),
            addr: addr.to_string(),
        }
    }

    /// Parses a raw address.
    ///
    /// Both the bare `addr@host` and the `Display Name <addr@host>`
    /// forms are accepted.
    pub fn parse(addr: impl AsRef<str>) -> Result<Self> {
        let addr = addr.as_ref().trim();
        let email = EmailAddress::from_str(addr)
            .map_err(|err| Error::ParseAddressError(err, addr.to_owned()))?;
        Ok(Self::from(email))
    }

    /// Checks that the bare address is well-formed.
    ///
    /// Contacts built by hand (through [`Contact::new`] or the public
    /// fields) skip parsing, so they are validated before joining an
    /// address list.
    pub fn validate(self) -> Result<Self> {
        match EmailAddress::from_str(&self.addr) {
            Ok(_) => Ok(self),
            Err(err) => Err(Error::ParseAddressError(err, self.addr)),
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}

impl From<EmailAddress> for Contact {
    fn from(email: EmailAddress) -> Self {
        let name = email.display_part().trim().trim_matches('"');
        let name = if name.is_empty() {
            None
        } else {
            Some(name.to_owned())
        };

        Self {
            name,
            addr: email.email(),
        }
    }
}

impl FromStr for Contact {
    type Err = Error;

    fn from_str(addr: &str) -> Result<Self> {
        Self::parse(addr)
    }
}

/// Conversion into an ordered list of contacts.
///
/// Raw strings are parsed, structured contacts are validated and
/// `None` contributes nothing.
pub trait IntoContacts {
    fn into_contacts(self) -> Result<Vec<Contact>>;
}

fn parse_all<T: AsRef<str>>(addrs: impl IntoIterator<Item = T>) -> Result<Vec<Contact>> {
    addrs.into_iter().map(Contact::parse).collect()
}

impl IntoContacts for &str {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        Ok(vec![Contact::parse(self)?])
    }
}

impl IntoContacts for String {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        self.as_str().into_contacts()
    }
}

impl IntoContacts for &String {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        self.as_str().into_contacts()
    }
}

impl<const N: usize> IntoContacts for [&str; N] {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        parse_all(self)
    }
}

impl IntoContacts for &[&str] {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        parse_all(self)
    }
}

impl IntoContacts for Vec<&str> {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        parse_all(self)
    }
}

impl IntoContacts for Vec<String> {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        parse_all(self)
    }
}

impl IntoContacts for Contact {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        Ok(vec![self.validate()?])
    }
}

impl IntoContacts for Option<Contact> {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        self.into_iter().map(Contact::validate).collect()
    }
}

impl IntoContacts for Vec<Contact> {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        self.into_iter().map(Contact::validate).collect()
    }
}

impl IntoContacts for &[Contact] {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        self.iter().cloned().map(Contact::validate).collect()
    }
}

impl IntoContacts for EmailAddress {
    fn into_contacts(self) -> Result<Vec<Contact>> {
        Ok(vec![Contact::from(self)])
    }
}
