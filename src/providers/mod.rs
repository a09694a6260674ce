//! Provider adapters and the provider factory.
//!
//! Every provider family is wrapped in an adapter exposing the same
//! [`ComposedMailSender`] capability: merge rendered HTML into an envelope,
//! hand it to the transport, and normalize the result into a [`SendResponse`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{GmailConfig, MailgunConfig, ProviderKind, SmtpConfig, TransportConfig};
use crate::errors::{MailError, MailErrorKind, MailResult};
use crate::observability::Timer;
use crate::transport::{MailTransport, MailgunApiTransport, SmtpRelayTransport};
use crate::types::{Envelope, OutgoingMail, SendResponse};

/// Sends an envelope with an already-rendered HTML body.
#[async_trait]
pub trait ComposedMailSender: Send + Sync {
    /// Composes and sends one message.
    async fn send_composed_mail(&self, envelope: &Envelope, html: &str)
        -> MailResult<SendResponse>;
}

/// Transport plus the provider it serves.
#[derive(Debug, Clone)]
struct Dispatcher {
    kind: ProviderKind,
    transport: Arc<dyn MailTransport>,
}

impl Dispatcher {
    async fn send(&self, envelope: &Envelope, html: &str) -> MailResult<SendResponse> {
        let provider = self.kind.name();
        let mail = OutgoingMail::compose(envelope, html);
        let timer = Timer::start(format!("{}.send", provider));

        let receipt = match self.transport.deliver(&mail).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(
                    provider,
                    transport = self.transport.name(),
                    message_id = %mail.message_id,
                    error = %e,
                    "Failed to send email"
                );
                return Err(match e.kind() {
                    MailErrorKind::Transport | MailErrorKind::ResponseMapping => e,
                    _ => MailError::transport(provider, e.message().to_string()).with_cause(e),
                });
            }
        };

        let response = receipt.into_response()?;
        let elapsed = timer.stop();
        tracing::info!(
            provider,
            message_id = %response.message_id,
            recipients = mail.to.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Email sent"
        );
        Ok(response)
    }
}

/// Generic SMTP provider.
#[derive(Debug, Clone)]
pub struct SmtpAdapter {
    config: SmtpConfig,
    dispatcher: Dispatcher,
}

impl SmtpAdapter {
    /// Creates an adapter backed by an SMTP relay transport.
    pub fn new(config: SmtpConfig) -> MailResult<Self> {
        let transport = SmtpRelayTransport::from_smtp_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates an adapter backed by `transport`.
    pub fn with_transport(config: SmtpConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher {
                kind: ProviderKind::Smtp,
                transport,
            },
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }
}

#[async_trait]
impl ComposedMailSender for SmtpAdapter {
    async fn send_composed_mail(&self, envelope: &Envelope, html: &str) -> MailResult<SendResponse> {
        self.dispatcher.send(envelope, html).await
    }
}

/// Gmail provider (SMTP with the Gmail service settings).
#[derive(Debug, Clone)]
pub struct GmailAdapter {
    config: GmailConfig,
    dispatcher: Dispatcher,
}

impl GmailAdapter {
    /// Creates an adapter backed by the Gmail SMTP relay.
    pub fn new(config: GmailConfig) -> MailResult<Self> {
        let transport = SmtpRelayTransport::from_gmail_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates an adapter backed by `transport`.
    pub fn with_transport(config: GmailConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher {
                kind: ProviderKind::Gmail,
                transport,
            },
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GmailConfig {
        &self.config
    }
}

#[async_trait]
impl ComposedMailSender for GmailAdapter {
    async fn send_composed_mail(&self, envelope: &Envelope, html: &str) -> MailResult<SendResponse> {
        self.dispatcher.send(envelope, html).await
    }
}

/// Mailgun HTTP API provider.
#[derive(Debug, Clone)]
pub struct MailgunAdapter {
    config: MailgunConfig,
    dispatcher: Dispatcher,
}

impl MailgunAdapter {
    /// Creates an adapter backed by the Mailgun API.
    pub fn new(config: MailgunConfig) -> MailResult<Self> {
        let transport = MailgunApiTransport::new(config.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates an adapter backed by `transport`.
    pub fn with_transport(config: MailgunConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher {
                kind: ProviderKind::Mailgun,
                transport,
            },
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MailgunConfig {
        &self.config
    }
}

#[async_trait]
impl ComposedMailSender for MailgunAdapter {
    async fn send_composed_mail(&self, envelope: &Envelope, html: &str) -> MailResult<SendResponse> {
        self.dispatcher.send(envelope, html).await
    }
}

/// A configured provider.
#[derive(Debug, Clone)]
pub enum TransportAdapter {
    /// Generic SMTP.
    Smtp(SmtpAdapter),
    /// Gmail.
    Gmail(GmailAdapter),
    /// Mailgun.
    Mailgun(MailgunAdapter),
}

impl TransportAdapter {
    /// Returns the provider family.
    pub fn provider_kind(&self) -> ProviderKind {
        match self {
            TransportAdapter::Smtp(_) => ProviderKind::Smtp,
            TransportAdapter::Gmail(_) => ProviderKind::Gmail,
            TransportAdapter::Mailgun(_) => ProviderKind::Mailgun,
        }
    }

    /// Returns the lowercase provider name.
    pub fn provider_name(&self) -> &'static str {
        self.provider_kind().name()
    }
}

#[async_trait]
impl ComposedMailSender for TransportAdapter {
    async fn send_composed_mail(&self, envelope: &Envelope, html: &str) -> MailResult<SendResponse> {
        match self {
            TransportAdapter::Smtp(adapter) => adapter.send_composed_mail(envelope, html).await,
            TransportAdapter::Gmail(adapter) => adapter.send_composed_mail(envelope, html).await,
            TransportAdapter::Mailgun(adapter) => adapter.send_composed_mail(envelope, html).await,
        }
    }
}

/// Builds adapters from provider names and configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderFactory;

impl ProviderFactory {
    /// Builds the adapter for `name` (case-insensitive) from a JSON config.
    ///
    /// No network I/O is performed.
    pub fn get_provider(name: &str, config: serde_json::Value) -> MailResult<TransportAdapter> {
        Self::from_config(TransportConfig::from_parts(name, config)?)
    }

    /// Builds the adapter for a typed configuration.
    pub fn from_config(config: TransportConfig) -> MailResult<TransportAdapter> {
        config.validate()?;
        let adapter = match config {
            TransportConfig::Smtp(c) => TransportAdapter::Smtp(SmtpAdapter::new(c)?),
            TransportConfig::Gmail(c) => TransportAdapter::Gmail(GmailAdapter::new(c)?),
            TransportConfig::Mailgun(c) => TransportAdapter::Mailgun(MailgunAdapter::new(c)?),
        };
        tracing::debug!(provider = adapter.provider_name(), "Provider created");
        Ok(adapter)
    }

    /// Builds the adapter for `config` backed by a caller-supplied transport.
    pub fn with_transport(
        config: TransportConfig,
        transport: Arc<dyn MailTransport>,
    ) -> MailResult<TransportAdapter> {
        config.validate()?;
        Ok(match config {
            TransportConfig::Smtp(c) => {
                TransportAdapter::Smtp(SmtpAdapter::with_transport(c, transport))
            }
            TransportConfig::Gmail(c) => {
                TransportAdapter::Gmail(GmailAdapter::with_transport(c, transport))
            }
            TransportConfig::Mailgun(c) => {
                TransportAdapter::Mailgun(MailgunAdapter::with_transport(c, transport))
            }
        })
    }
}
