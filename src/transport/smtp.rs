//! SMTP relay transport built on `lettre`.
//!
//! Each delivery opens a connection, authenticates when configured, sends one
//! message and closes. Implicit TLS is used when `secure` is set, STARTTLS
//! otherwise.

use async_trait::async_trait;
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::fmt;
use std::sync::Arc;

use super::oauth2::GoogleTokenSource;
use super::MailTransport;
use crate::config::{BasicAuth, GmailAuth, GmailConfig, SmtpConfig};
use crate::errors::{MailError, MailResult};
use crate::types::{Address, OutgoingMail, TransportReceipt};

/// Gmail SMTP host.
pub const GMAIL_HOST: &str = "smtp.gmail.com";

/// Gmail implicit-TLS port.
pub const GMAIL_PORT: u16 = 465;

const AMP_CONTENT_TYPE: &str = "text/x-amp-html; charset=utf-8";

/// SMTP login strategy.
#[derive(Debug, Clone)]
pub enum SmtpAuth {
    /// No login.
    None,
    /// Username and password (PLAIN/LOGIN).
    Basic(BasicAuth),
    /// XOAUTH2 with tokens from a [`GoogleTokenSource`].
    OAuth2(Arc<GoogleTokenSource>),
}

/// SMTP relay transport.
pub struct SmtpRelayTransport {
    label: &'static str,
    host: String,
    port: u16,
    secure: bool,
    auth: SmtpAuth,
    /// Transport reused across sends when credentials are static.
    relay: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl fmt::Debug for SmtpRelayTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpRelayTransport")
            .field("label", &self.label)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl SmtpRelayTransport {
    /// Creates a transport for a generic SMTP server.
    pub fn from_smtp_config(config: &SmtpConfig) -> MailResult<Self> {
        config.validate()?;
        let auth = match &config.auth {
            Some(auth) => SmtpAuth::Basic(auth.clone()),
            None => SmtpAuth::None,
        };
        Self::new("smtp", config.host.clone(), config.port, config.secure, auth)
    }

    /// Creates a transport for Gmail.
    pub fn from_gmail_config(config: &GmailConfig) -> MailResult<Self> {
        config.validate()?;
        let auth = match &config.auth {
            GmailAuth::Basic(auth) => SmtpAuth::Basic(auth.clone()),
            GmailAuth::OAuth2(auth) => {
                SmtpAuth::OAuth2(Arc::new(GoogleTokenSource::new(auth.clone())))
            }
        };
        Self::new("gmail", GMAIL_HOST.to_string(), GMAIL_PORT, true, auth)
    }

    /// Creates a transport. No connection is opened.
    pub fn new(
        label: &'static str,
        host: String,
        port: u16,
        secure: bool,
        auth: SmtpAuth,
    ) -> MailResult<Self> {
        let mut transport = Self {
            label,
            host,
            port,
            secure,
            auth,
            relay: None,
        };

        let relay = match &transport.auth {
            SmtpAuth::None => Some(transport.relay_builder(None)?.build()),
            SmtpAuth::Basic(auth) => Some(
                transport
                    .relay_builder(Some(Credentials::new(
                        auth.user.clone(),
                        auth.pass.expose_secret().clone(),
                    )))?
                    .build(),
            ),
            SmtpAuth::OAuth2(_) => {
                // Token is fetched per send; only check that the host is usable.
                transport.relay_builder(None)?;
                None
            }
        };
        transport.relay = relay;

        tracing::debug!(
            transport = label,
            host = %transport.host,
            port = transport.port,
            secure = transport.secure,
            "SMTP transport created"
        );
        Ok(transport)
    }

    /// Returns the server host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns true when implicit TLS is used.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    fn relay_builder(
        &self,
        credentials: Option<Credentials>,
    ) -> MailResult<lettre::transport::smtp::AsyncSmtpTransportBuilder> {
        let builder = if self.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
        }
        .map_err(|e| {
            MailError::configuration(format!("invalid SMTP host \"{}\": {}", self.host, e))
                .with_cause(e)
        })?;

        let builder = builder.port(self.port);
        Ok(match credentials {
            Some(credentials) => builder.credentials(credentials),
            None => builder,
        })
    }

    async fn oauth2_relay(
        &self,
        source: &GoogleTokenSource,
    ) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let token = source.access_token().await?;
        let credentials = Credentials::new(source.user().to_string(), token.expose_secret().clone());
        Ok(self
            .relay_builder(Some(credentials))?
            .authentication(vec![Mechanism::Xoauth2])
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpRelayTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<TransportReceipt> {
        let message = build_message(mail).map_err(|e| e.context(self.label))?;

        let result = match (&self.relay, &self.auth) {
            (Some(relay), _) => relay.send(message).await,
            (None, SmtpAuth::OAuth2(source)) => {
                let relay = self.oauth2_relay(source).await?;
                let result = relay.send(message).await;
                if result.is_err() {
                    source.invalidate().await;
                }
                result
            }
            (None, _) => {
                return Err(MailError::state(format!(
                    "{} transport has no relay configured",
                    self.label
                )))
            }
        };

        let response = result.map_err(|e| {
            MailError::transport(self.label, format!("{}:{}: {}", self.host, self.port, e))
                .with_cause(e)
        })?;

        let text = response.message().collect::<Vec<_>>().join(" ");
        tracing::debug!(
            transport = self.label,
            code = %response.code(),
            response = %text,
            "SMTP server accepted message"
        );

        Ok(TransportReceipt {
            message_id: Some(mail.message_id.clone()),
            preview_url: None,
            response: text,
        })
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

fn mailbox(address: &Address) -> MailResult<Mailbox> {
    let email: lettre::Address = address.email().parse().map_err(|e| {
        MailError::configuration(format!("invalid address \"{}\": {}", address.email(), e))
    })?;
    Ok(Mailbox::new(address.name.clone(), email))
}

fn build_error(e: impl fmt::Display) -> MailError {
    MailError::configuration(format!("failed to build message: {}", e))
}

/// Builds a MIME message from a composed mail.
///
/// The body is `multipart/alternative` (text, HTML, AMP) wrapped in
/// `multipart/mixed` when attachments are present.
pub fn build_message(mail: &OutgoingMail) -> MailResult<Message> {
    let mut builder = Message::builder()
        .from(mailbox(&mail.from)?)
        .message_id(Some(mail.message_id.clone()));

    for to in &mail.to {
        builder = builder.to(mailbox(to)?);
    }
    if let Some(subject) = &mail.subject {
        builder = builder.subject(subject.as_str());
    }
    for (name, value) in &mail.headers {
        let name = HeaderName::new_from_ascii(name.clone()).map_err(build_error)?;
        builder = builder.raw_header(HeaderValue::new(name, value.clone()));
    }

    let mut alternative = MultiPart::alternative().build();
    if let Some(text) = &mail.text {
        alternative = alternative.singlepart(SinglePart::plain(text.clone()));
    }
    alternative = alternative.singlepart(SinglePart::html(mail.html.clone()));
    if let Some(amp) = &mail.amp {
        let content_type = ContentType::parse(AMP_CONTENT_TYPE).map_err(build_error)?;
        alternative = alternative.singlepart(
            SinglePart::builder()
                .header(content_type)
                .body(amp.clone()),
        );
    }

    let body = if mail.attachments.is_empty() {
        alternative
    } else {
        let mut mixed = MultiPart::mixed().multipart(alternative);
        for attachment in &mail.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                MailError::configuration(format!(
                    "invalid content type \"{}\" for attachment \"{}\": {}",
                    attachment.content_type, attachment.filename, e
                ))
            })?;
            mixed = mixed.singlepart(
                LettreAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        mixed
    };

    builder.multipart(body).map_err(build_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attachment, Envelope, ListHeaders};

    fn envelope() -> Envelope {
        Envelope::builder()
            .from("Lemur <noreply@example.com>")
            .unwrap()
            .to("user@example.com")
            .unwrap()
            .subject("Welcome")
            .text("Hi Jane")
            .build()
            .unwrap()
    }

    fn formatted(mail: &OutgoingMail) -> String {
        String::from_utf8(build_message(mail).unwrap().formatted()).unwrap()
    }

    #[test]
    fn test_build_message_headers() {
        let mail = OutgoingMail::compose(&envelope(), "<p>Hi Jane</p>");
        let raw = formatted(&mail);

        assert!(raw.contains("From: Lemur <noreply@example.com>"));
        assert!(raw.contains("To: user@example.com"));
        assert!(raw.contains("Subject: Welcome"));
        assert!(raw.contains(&format!("Message-ID: {}", mail.message_id)));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_build_message_with_attachment_and_list_headers() {
        let envelope = Envelope::builder()
            .from("noreply@example.com")
            .unwrap()
            .to("user@example.com")
            .unwrap()
            .attachment(Attachment::new("report.txt", "text/plain", b"data".to_vec()))
            .list(ListHeaders {
                unsubscribe: Some("https://example.com/unsub".to_string()),
                ..Default::default()
            })
            .build()
            .unwrap();

        let raw = formatted(&OutgoingMail::compose(&envelope, "<p>Report</p>"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("report.txt"));
        assert!(raw.contains("List-Unsubscribe: <https://example.com/unsub>"));
    }

    #[test]
    fn test_invalid_attachment_content_type() {
        let envelope = Envelope::builder()
            .from("noreply@example.com")
            .unwrap()
            .to("user@example.com")
            .unwrap()
            .attachment(Attachment::new("x.bin", "not a type", vec![0u8]))
            .build()
            .unwrap();

        let err = build_message(&OutgoingMail::compose(&envelope, "x")).unwrap_err();
        assert_eq!(err.kind(), crate::errors::MailErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_transport_creation_does_not_connect() {
        let config = SmtpConfig::builder()
            .host("smtp.invalid")
            .port(2525)
            .credentials("user", "pass")
            .build()
            .unwrap();

        let transport = SmtpRelayTransport::from_smtp_config(&config).unwrap();
        assert_eq!(transport.name(), "smtp");
        assert_eq!(transport.port(), 2525);
        assert!(!transport.is_secure());
    }

    #[tokio::test]
    async fn test_gmail_uses_implicit_tls() {
        let transport =
            SmtpRelayTransport::from_gmail_config(&GmailConfig::basic("me@gmail.com", "app"))
                .unwrap();
        assert_eq!(transport.host(), GMAIL_HOST);
        assert_eq!(transport.port(), GMAIL_PORT);
        assert!(transport.is_secure());
        assert_eq!(transport.name(), "gmail");
    }
}
