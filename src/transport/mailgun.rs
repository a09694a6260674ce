//! Mailgun HTTP API transport.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::MailTransport;
use crate::config::MailgunConfig;
use crate::errors::{MailError, MailResult};
use crate::types::{OutgoingMail, TransportReceipt};

/// Body of a successful `POST /{domain}/messages`.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends mail through the Mailgun messages endpoint.
#[derive(Debug)]
pub struct MailgunApiTransport {
    http: reqwest::Client,
    config: MailgunConfig,
    endpoint: String,
}

impl MailgunApiTransport {
    /// Creates a transport. No request is made.
    pub fn new(config: MailgunConfig) -> MailResult<Self> {
        config.validate()?;
        let endpoint = config.messages_endpoint();
        reqwest::Url::parse(&endpoint).map_err(|e| {
            MailError::configuration(format!("invalid Mailgun endpoint \"{}\": {}", endpoint, e))
                .with_cause(e)
        })?;

        tracing::debug!(endpoint = %endpoint, "Mailgun transport created");
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            endpoint,
        })
    }

    /// Returns the messages endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn form(mail: &OutgoingMail) -> MailResult<Form> {
        let mut form = Form::new()
            .text("from", mail.from.to_header())
            .text("to", mail.to_header())
            .text("html", mail.html.clone())
            .text("h:Message-Id", mail.message_id.clone());

        if let Some(subject) = &mail.subject {
            form = form.text("subject", subject.clone());
        }
        if let Some(text) = &mail.text {
            form = form.text("text", text.clone());
        }
        if let Some(amp) = &mail.amp {
            form = form.text("amp-html", amp.clone());
        }
        for (name, value) in &mail.headers {
            form = form.text(format!("h:{}", name), value.clone());
        }
        for attachment in &mail.attachments {
            let part = Part::bytes(attachment.content.clone())
                .file_name(attachment.filename.clone())
                .mime_str(&attachment.content_type)
                .map_err(|e| {
                    MailError::configuration(format!(
                        "invalid content type \"{}\" for attachment \"{}\": {}",
                        attachment.content_type, attachment.filename, e
                    ))
                })?;
            form = form.part("attachment", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl MailTransport for MailgunApiTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> MailResult<TransportReceipt> {
        let form = Self::form(mail)?;

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth("api", Some(self.config.auth.api_key.expose_secret()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| MailError::transport("mailgun", e.to_string()).with_cause(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MailError::transport("mailgun", e.to_string()).with_cause(e))?;

        if !status.is_success() {
            return Err(MailError::transport(
                "mailgun",
                format!("{} returned {}: {}", self.endpoint, status, body),
            ));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            MailError::response_mapping(format!("unexpected Mailgun response \"{}\": {}", body, e))
                .with_cause(e)
        })?;

        tracing::debug!(
            domain = %self.config.auth.domain,
            id = parsed.id.as_deref().unwrap_or_default(),
            "Mailgun accepted message"
        );

        Ok(TransportReceipt {
            message_id: parsed.id,
            preview_url: None,
            response: parsed.message.unwrap_or(body),
        })
    }

    fn name(&self) -> &'static str {
        "mailgun"
    }
}
