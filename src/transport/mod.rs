//! Transport layer for outgoing mail.
//!
//! A [`MailTransport`] delivers one composed [`OutgoingMail`] and reports what
//! the server said. Two families are provided:
//! - [`SmtpRelayTransport`]: SMTP relay via `lettre`, used by the SMTP and Gmail providers
//! - [`MailgunApiTransport`]: Mailgun HTTP API via `reqwest`

use async_trait::async_trait;
use std::fmt;

use crate::errors::MailResult;
use crate::types::{OutgoingMail, TransportReceipt};

pub mod mailgun;
pub mod oauth2;
pub mod smtp;

pub use mailgun::MailgunApiTransport;
pub use oauth2::GoogleTokenSource;
pub use smtp::{SmtpAuth, SmtpRelayTransport};

/// Trait for mail transport abstraction.
#[async_trait]
pub trait MailTransport: Send + Sync + fmt::Debug {
    /// Delivers one message.
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<TransportReceipt>;

    /// Returns a short name for logs.
    fn name(&self) -> &'static str;
}
