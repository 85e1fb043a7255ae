//! Module dedicated to the in-memory transport.
//!
//! The [`MemoryTransporter`] renders messages the same way the SMTP
//! transporter does, but keeps them in memory instead of delivering
//! them. It is mostly useful for tests and development.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::info;

use crate::{AnyResult, EmailMessage};

use super::Transporter;

/// A message kept by the [`MemoryTransporter`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SentMessage {
    /// The envelope sender, if any.
    pub sender: Option<String>,

    /// The envelope recipients.
    pub recipients: Vec<String>,

    /// The rendered MIME message.
    pub raw: Vec<u8>,
}

/// The in-memory transporter.
///
/// Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransporter {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl MemoryTransporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SentMessage>> {
        match self.sent.lock() {
            Ok(sent) => sent,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns a copy of all messages sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear()
    }
}

#[async_trait]
impl Transporter for MemoryTransporter {
    async fn send(&self, msg: &EmailMessage) -> AnyResult<()> {
        info!("storing message in memory");

        let sent = SentMessage {
            sender: msg.sender().map(|contact| contact.addr.clone()),
            recipients: msg
                .recipients()
                .into_iter()
                .map(|contact| contact.addr.clone())
                .collect(),
            raw: msg.to_mime_vec()?,
        };

        self.lock().push(sent);

        Ok(())
    }
}
