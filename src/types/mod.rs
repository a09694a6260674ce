//! Core types for templated mail.
//!
//! This module provides:
//! - Address types with validation
//! - The caller-supplied [`Envelope`] and its builder
//! - Rendered content and normalized send results
//! - The composed [`OutgoingMail`] handed to transports

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::{MailError, MailResult};

/// Email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Display name (e.g., "John Doe").
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com").
    pub email: String,
}

impl Address {
    /// Creates a new address with just an email.
    pub fn new(email: impl Into<String>) -> MailResult<Self> {
        let email = email.into();
        Self::validate_email(&email)?;
        Ok(Self { name: None, email })
    }

    /// Creates a new address with display name and email.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> MailResult<Self> {
        let email = email.into();
        Self::validate_email(&email)?;
        Ok(Self {
            name: Some(name.into()),
            email,
        })
    }

    /// Parses an address from a string (e.g., "John Doe <john@example.com>").
    pub fn parse(s: &str) -> MailResult<Self> {
        let s = s.trim();

        if let (Some(start), Some(end)) = (s.find('<'), s.rfind('>')) {
            if start < end {
                let name = s[..start].trim().trim_matches('"');
                let email = s[start + 1..end].trim();
                if name.is_empty() {
                    return Self::new(email);
                }
                return Self::with_name(name, email);
            }
        }

        Self::new(s)
    }

    fn validate_email(email: &str) -> MailResult<()> {
        let invalid = |reason: &str| {
            MailError::configuration(format!("invalid email address \"{}\": {}", email, reason))
        };

        if email.is_empty() {
            return Err(invalid("address cannot be empty"));
        }
        if email.len() > 254 {
            return Err(invalid("address too long (max 254 characters)"));
        }
        if email.chars().any(|c| c.is_control()) {
            return Err(invalid("address cannot contain control characters"));
        }

        let (local, domain) = match email.split_once('@') {
            Some((local, domain)) if !domain.contains('@') => (local, domain),
            _ => return Err(invalid("address must contain exactly one @")),
        };
        if local.is_empty() || local.len() > 64 {
            return Err(invalid("local part must be 1-64 characters"));
        }
        if domain.is_empty() {
            return Err(invalid("domain cannot be empty"));
        }

        Ok(())
    }

    /// Returns the email part only.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the domain part of the email.
    pub fn domain(&self) -> &str {
        self.email.rsplit('@').next().unwrap_or_default()
    }

    /// Returns the display name if present.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Formats the address for email headers.
    pub fn to_header(&self) -> String {
        match &self.name {
            Some(name) => {
                if name.contains(|c: char| !c.is_alphanumeric() && c != ' ') {
                    format!("\"{}\" <{}>", name.replace('"', "\\\""), self.email)
                } else {
                    format!("{} <{}>", name, self.email)
                }
            }
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header())
    }
}

impl TryFrom<&str> for Address {
    type Error = MailError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = MailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Address::parse(&s)
    }
}

impl TryFrom<&String> for Address {
    type Error = MailError;

    fn try_from(s: &String) -> Result<Self, Self::Error> {
        Address::parse(s)
    }
}

/// File attachment, passed to the transport unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename.
    pub filename: String,
    /// MIME content type.
    pub content_type: String,
    /// Binary content.
    pub content: Vec<u8>,
}

impl Attachment {
    /// Creates a new attachment.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }
}

/// RFC 2369 / RFC 2919 list headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListHeaders {
    /// `List-Help`.
    pub help: Option<String>,
    /// `List-Unsubscribe`.
    pub unsubscribe: Option<String>,
    /// `List-Subscribe`.
    pub subscribe: Option<String>,
    /// `List-Post`.
    pub post: Option<String>,
    /// `List-Owner`.
    pub owner: Option<String>,
    /// `List-Archive`.
    pub archive: Option<String>,
    /// `List-ID`.
    pub id: Option<String>,
}

impl ListHeaders {
    /// Returns `(header name, header value)` pairs for every set field.
    ///
    /// URL values are wrapped in angle brackets unless already bracketed.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let fields = [
            ("List-Help", &self.help),
            ("List-Unsubscribe", &self.unsubscribe),
            ("List-Subscribe", &self.subscribe),
            ("List-Post", &self.post),
            ("List-Owner", &self.owner),
            ("List-Archive", &self.archive),
            ("List-ID", &self.id),
        ];

        fields
            .into_iter()
            .filter_map(|(name, value)| {
                value.as_ref().map(|v| {
                    let v = v.trim();
                    if v.contains('<') {
                        (name, v.to_string())
                    } else {
                        (name, format!("<{}>", v))
                    }
                })
            })
            .collect()
    }

    /// Returns true when no header is set.
    pub fn is_empty(&self) -> bool {
        self.headers().is_empty()
    }
}

/// Caller-supplied addressing fields for one email, excluding the HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Recipients (at least one).
    pub to: Vec<Address>,
    /// Sender.
    pub from: Address,
    /// Subject, may be absent.
    pub subject: Option<String>,
    /// Plain-text body.
    pub text: Option<String>,
    /// AMP HTML body.
    pub amp: Option<String>,
    /// Attachments.
    pub attachments: Vec<Attachment>,
    /// List headers.
    pub list: Option<ListHeaders>,
}

impl Envelope {
    /// Creates a new envelope builder.
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }

    /// Returns a copy with the plain-text field replaced.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Builder for [`Envelope`].
#[derive(Debug, Default)]
pub struct EnvelopeBuilder {
    to: Vec<Address>,
    from: Option<Address>,
    subject: Option<String>,
    text: Option<String>,
    amp: Option<String>,
    attachments: Vec<Attachment>,
    list: Option<ListHeaders>,
}

impl EnvelopeBuilder {
    /// Sets the sender address.
    pub fn from(mut self, address: impl TryInto<Address, Error = MailError>) -> MailResult<Self> {
        self.from = Some(address.try_into()?);
        Ok(self)
    }

    /// Adds a recipient.
    pub fn to(mut self, address: impl TryInto<Address, Error = MailError>) -> MailResult<Self> {
        self.to.push(address.try_into()?);
        Ok(self)
    }

    /// Adds multiple recipients.
    pub fn to_many<I, A>(mut self, addresses: I) -> MailResult<Self>
    where
        I: IntoIterator<Item = A>,
        A: TryInto<Address, Error = MailError>,
    {
        for addr in addresses {
            self.to.push(addr.try_into()?);
        }
        Ok(self)
    }

    /// Sets the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the plain-text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the AMP HTML body.
    pub fn amp(mut self, amp: impl Into<String>) -> Self {
        self.amp = Some(amp.into());
        self
    }

    /// Adds an attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the list headers.
    pub fn list(mut self, list: ListHeaders) -> Self {
        self.list = Some(list);
        self
    }

    /// Builds the envelope.
    pub fn build(self) -> MailResult<Envelope> {
        let from = self
            .from
            .ok_or_else(|| MailError::configuration("envelope sender (from) is required"))?;

        if self.to.is_empty() {
            return Err(MailError::configuration(
                "envelope requires at least one recipient (to)",
            ));
        }

        Ok(Envelope {
            to: self.to,
            from,
            subject: self.subject,
            text: self.text,
            amp: self.amp,
            attachments: self.attachments,
            list: self.list,
        })
    }
}

/// Output of the template renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    /// Interpolated template.
    pub html: String,
    /// Plain-text alternative; never produced by the renderer.
    pub text: Option<String>,
}

impl RenderedContent {
    /// Wraps rendered HTML.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            text: None,
        }
    }
}

/// Normalized result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Message identifier assigned for this send.
    pub message_id: String,
    /// Web preview of the sent message, when the transport offers one.
    pub preview_url: Option<String>,
}

/// Raw result reported by a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportReceipt {
    /// Message id, when the transport reports one.
    pub message_id: Option<String>,
    /// Preview URL, when the transport offers one.
    pub preview_url: Option<String>,
    /// Raw server response text.
    pub response: String,
}

impl TransportReceipt {
    /// Maps the receipt into a [`SendResponse`].
    pub fn into_response(self) -> MailResult<SendResponse> {
        let message_id = self
            .message_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                MailError::response_mapping(format!(
                    "transport reported success without a message id (response: \"{}\")",
                    self.response
                ))
            })?;

        Ok(SendResponse {
            message_id,
            preview_url: self.preview_url,
        })
    }
}

/// Fully composed message handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Generated `Message-ID` header value, including angle brackets.
    pub message_id: String,
    /// Sender.
    pub from: Address,
    /// Recipients.
    pub to: Vec<Address>,
    /// Subject.
    pub subject: Option<String>,
    /// Plain-text body, omitted when empty.
    pub text: Option<String>,
    /// Rendered HTML body.
    pub html: String,
    /// AMP HTML body.
    pub amp: Option<String>,
    /// Attachments.
    pub attachments: Vec<Attachment>,
    /// Additional headers.
    pub headers: Vec<(String, String)>,
}

impl OutgoingMail {
    /// Merges rendered HTML into the envelope and assigns a message id.
    pub fn compose(envelope: &Envelope, html: impl Into<String>) -> Self {
        let headers = envelope
            .list
            .as_ref()
            .map(|list| {
                list.headers()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            message_id: generate_message_id(envelope.from.domain()),
            from: envelope.from.clone(),
            to: envelope.to.clone(),
            subject: envelope.subject.clone(),
            text: envelope.text.clone().filter(|t| !t.is_empty()),
            html: html.into(),
            amp: envelope.amp.clone(),
            attachments: envelope.attachments.clone(),
            headers,
        }
    }

    /// Returns the comma-joined recipient header value.
    pub fn to_header(&self) -> String {
        self.to
            .iter()
            .map(Address::to_header)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Generates a `Message-ID` value for `domain`.
pub fn generate_message_id(domain: &str) -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("<{}.{}@{}>", uuid, chrono::Utc::now().timestamp(), domain)
}
