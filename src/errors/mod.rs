//! Error types for templated mail delivery.
//!
//! Every failure carries a [`MailErrorKind`], a human-readable message that
//! names the template, provider or path involved, and optionally the
//! underlying cause.

use std::fmt;
use thiserror::Error;

/// Result type for mail operations.
pub type MailResult<T> = Result<T, MailError>;

/// Mail error kinds categorizing different failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailErrorKind {
    /// Missing or invalid provider/path configuration, or an unresolved
    /// template root.
    Configuration,
    /// Provider name outside the supported set.
    UnknownProvider,
    /// Template file does not exist.
    TemplateNotFound,
    /// Template file exists but could not be read.
    TemplateRead,
    /// Data could not be interpolated into the template.
    TemplateRender,
    /// The underlying transport failed to send.
    Transport,
    /// The transport reported success but its result could not be mapped.
    ResponseMapping,
    /// Operation invoked before a required lifecycle step.
    State,
}

impl fmt::Display for MailErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailErrorKind::Configuration => write!(f, "Configuration error"),
            MailErrorKind::UnknownProvider => write!(f, "Unknown provider"),
            MailErrorKind::TemplateNotFound => write!(f, "Template not found"),
            MailErrorKind::TemplateRead => write!(f, "Template read error"),
            MailErrorKind::TemplateRender => write!(f, "Template render error"),
            MailErrorKind::Transport => write!(f, "Transport error"),
            MailErrorKind::ResponseMapping => write!(f, "Response mapping error"),
            MailErrorKind::State => write!(f, "State error"),
        }
    }
}

/// Mail error with detailed information.
#[derive(Error, Debug)]
pub struct MailError {
    /// Error kind.
    kind: MailErrorKind,
    /// Human-readable message.
    message: String,
    /// Underlying cause.
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl MailError {
    /// Creates a new mail error.
    pub fn new(kind: MailErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Sets the underlying cause.
    pub fn with_cause<E: std::error::Error + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Prefixes the message with additional context, keeping kind and cause.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> MailErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    // Convenience constructors

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::Configuration, message)
    }

    /// Creates an unknown provider error naming the offending value.
    pub fn unknown_provider(name: &str) -> Self {
        Self::new(
            MailErrorKind::UnknownProvider,
            format!(
                "unknown mail provider \"{}\"; expected one of smtp, gmail, mailgun",
                name
            ),
        )
    }

    /// Creates a template-not-found error.
    pub fn template_not_found(template: &str, path: &std::path::Path) -> Self {
        Self::new(
            MailErrorKind::TemplateNotFound,
            format!("template \"{}\" not found at \"{}\"", template, path.display()),
        )
    }

    /// Creates a template read error wrapping the I/O cause.
    pub fn template_read(template: &str, cause: std::io::Error) -> Self {
        Self::new(
            MailErrorKind::TemplateRead,
            format!("failed to read template \"{}\": {}", template, cause),
        )
        .with_cause(cause)
    }

    /// Creates a template render error.
    pub fn template_render(template: &str, message: impl fmt::Display) -> Self {
        Self::new(
            MailErrorKind::TemplateRender,
            format!("failed to render template \"{}\": {}", template, message),
        )
    }

    /// Creates a transport error.
    pub fn transport(provider: &str, message: impl fmt::Display) -> Self {
        Self::new(
            MailErrorKind::Transport,
            format!("{} transport failed: {}", provider, message),
        )
    }

    /// Creates a response mapping error.
    pub fn response_mapping(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::ResponseMapping, message)
    }

    /// Creates a state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::State, message)
    }
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
