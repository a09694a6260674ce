//! # LemurMail
//!
//! Templated email delivery behind one `template(name).send(envelope, data)` call:
//! - Providers: generic SMTP, Gmail (app password or OAuth2), Mailgun HTTP API
//! - Template root from configuration or a discovered `lemur-mail.config.json`
//! - Mustache templates, with optional regex extraction
//! - Structured `tracing` events and in-process metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_lemur_mail::{Envelope, LemurMail};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mail = LemurMail::builder()
//!         .provider("smtp", json!({
//!             "host": "smtp.example.com",
//!             "port": 587,
//!             "auth": {"user": "user@example.com", "pass": "password"}
//!         }))
//!         .path("./templates")
//!         .build()
//!         .await?;
//!
//!     let envelope = Envelope::builder()
//!         .from("App <noreply@example.com>")?
//!         .to("jane@example.com")?
//!         .subject("Welcome")
//!         .build()?;
//!
//!     // renders ./templates/welcome.mustache
//!     let response = mail
//!         .template("welcome")?
//!         .send(&envelope, &json!({"userName": "Jane"}))
//!         .await?;
//!     println!("Message sent with ID: {}", response.message_id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Template root and rendering
pub mod paths;
pub mod render;

// Transport layer
pub mod transport;

// Providers
pub mod providers;

// Observability
pub mod observability;

// Session and one-shot sends
pub mod client;
pub mod trigger;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use client::{LemurMail, LemurMailBuilder, SessionState, TemplateSend};
pub use config::{
    BasicAuth, Environment, GmailAuth, GmailConfig, LemurMailConfig, MailgunAuth, MailgunConfig,
    OAuth2Auth, ProviderKind, ProviderSettings, SmtpConfig, SmtpConfigBuilder, TemplatePathConfig,
    TransportConfig,
};
pub use errors::{MailError, MailErrorKind, MailResult};
pub use observability::{MailMetrics, MetricsSnapshot};
pub use paths::{find_up, PathResolver, TemplateRootState, MARKER_FILE};
pub use providers::{
    ComposedMailSender, GmailAdapter, MailgunAdapter, ProviderFactory, SmtpAdapter,
    TransportAdapter,
};
pub use render::{body_pattern, MustacheEngine, TemplateEngine, TemplateRenderer, BODY_PATTERN};
pub use transport::{MailTransport, MailgunApiTransport, SmtpRelayTransport};
pub use trigger::{SendTrigger, TriggerSend, TriggerTemplate};
pub use types::{
    Address, Attachment, Envelope, EnvelopeBuilder, ListHeaders, OutgoingMail, RenderedContent,
    SendResponse, TransportReceipt,
};
