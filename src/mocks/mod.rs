//! Mock implementations for testing.
//!
//! Provides a recording transport and template fixtures.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::errors::{MailError, MailResult};
use crate::render::TemplateRenderer;
use crate::transport::MailTransport;
use crate::types::{Envelope, OutgoingMail, TransportReceipt};

/// Mock transport that records every delivered message.
#[derive(Debug, Clone)]
pub struct MockTransport {
    name: &'static str,
    /// Recorded messages.
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    /// Queued failures, consumed one per delivery.
    failures: Arc<Mutex<VecDeque<MailError>>>,
    /// Preview URL reported with each receipt.
    preview_url: Option<String>,
    /// Reports no message id when set.
    omit_message_id: bool,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Creates a mock transport reporting `name`.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            preview_url: None,
            omit_message_id: false,
        }
    }

    /// Reports `url` as the preview of every message.
    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }

    /// Reports success without a message id.
    pub fn without_message_id(mut self) -> Self {
        self.omit_message_id = true;
        self
    }

    /// Makes the next delivery fail with `error`.
    pub fn fail_next_with(&self, error: MailError) -> &Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    /// Returns recorded messages.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the most recently recorded message.
    pub fn last_sent(&self) -> Option<OutgoingMail> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Clears recorded messages and queued failures.
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.failures.lock().unwrap().clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<TransportReceipt> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.sent.lock().unwrap().push(mail.clone());
        Ok(TransportReceipt {
            message_id: (!self.omit_message_id).then(|| mail.message_id.clone()),
            preview_url: self.preview_url.clone(),
            response: "250 OK: queued".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Creates a test envelope.
pub fn test_envelope() -> MailResult<Envelope> {
    Envelope::builder()
        .from("App <noreply@example.com>")?
        .to("user@example.com")?
        .subject("Welcome")
        .build()
}

/// Writes `content` to the template file for `name` under `root`.
pub fn write_template(root: &Path, name: &str, content: &str) -> std::io::Result<PathBuf> {
    let path = TemplateRenderer::template_file_path(root, name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    Ok(path)
}
