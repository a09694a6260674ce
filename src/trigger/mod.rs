//! One-shot sends without a session.
//!
//! Each call builds a provider adapter and captures the resolver's current
//! template root; nothing is cached between calls.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{GmailConfig, MailgunConfig, SmtpConfig, TransportConfig};
use crate::errors::MailResult;
use crate::paths::PathResolver;
use crate::providers::{ComposedMailSender, ProviderFactory, TransportAdapter};
use crate::render::TemplateRenderer;
use crate::types::{Envelope, RenderedContent, SendResponse};

/// Entry points for one-shot sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendTrigger;

impl SendTrigger {
    /// Binds `template` to a generic SMTP provider.
    pub fn smtp(
        config: SmtpConfig,
        template: impl Into<String>,
        resolver: &PathResolver,
    ) -> MailResult<TriggerSend> {
        Self::with_config(config.into(), template, resolver)
    }

    /// Binds `template` to Gmail.
    pub fn gmail(
        config: GmailConfig,
        template: impl Into<String>,
        resolver: &PathResolver,
    ) -> MailResult<TriggerSend> {
        Self::with_config(config.into(), template, resolver)
    }

    /// Binds `template` to Mailgun.
    pub fn mailgun(
        config: MailgunConfig,
        template: impl Into<String>,
        resolver: &PathResolver,
    ) -> MailResult<TriggerSend> {
        Self::with_config(config.into(), template, resolver)
    }

    /// Binds `template` to the provider named `name`.
    pub fn provider(
        name: &str,
        config: serde_json::Value,
        template: impl Into<String>,
        resolver: &PathResolver,
    ) -> MailResult<TriggerSend> {
        let template = Self::template(template, resolver)?;
        let adapter = ProviderFactory::get_provider(name, config)?;
        Ok(TriggerSend { template, adapter })
    }

    /// Binds `template` for rendering only.
    pub fn template(
        template: impl Into<String>,
        resolver: &PathResolver,
    ) -> MailResult<TriggerTemplate> {
        Ok(TriggerTemplate {
            name: template.into(),
            root: resolver.get_path()?.to_path_buf(),
            renderer: TemplateRenderer::default(),
        })
    }

    /// Binds `template` to an already-built adapter.
    pub fn with_adapter(
        adapter: TransportAdapter,
        template: impl Into<String>,
        resolver: &PathResolver,
    ) -> MailResult<TriggerSend> {
        Ok(TriggerSend {
            template: Self::template(template, resolver)?,
            adapter,
        })
    }

    fn with_config(
        config: TransportConfig,
        template: impl Into<String>,
        resolver: &PathResolver,
    ) -> MailResult<TriggerSend> {
        let template = Self::template(template, resolver)?;
        let adapter = ProviderFactory::from_config(config)?;
        Ok(TriggerSend { template, adapter })
    }
}

/// A template bound to a root, without a provider.
#[derive(Debug, Clone)]
pub struct TriggerTemplate {
    name: String,
    root: PathBuf,
    renderer: TemplateRenderer,
}

impl TriggerTemplate {
    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the captured template root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Renders the template.
    pub async fn render<T: Serialize + ?Sized>(
        &self,
        data: &T,
        extraction_pattern: Option<&Regex>,
    ) -> MailResult<RenderedContent> {
        self.renderer
            .render(&self.root, &self.name, data, extraction_pattern)
            .await
    }
}

/// A template bound to a root and a provider.
#[derive(Debug, Clone)]
pub struct TriggerSend {
    template: TriggerTemplate,
    adapter: TransportAdapter,
}

impl TriggerSend {
    /// Returns the bound template.
    pub fn template(&self) -> &TriggerTemplate {
        &self.template
    }

    /// Returns the provider adapter.
    pub fn provider(&self) -> &TransportAdapter {
        &self.adapter
    }

    /// Renders the template.
    pub async fn render<T: Serialize + ?Sized>(
        &self,
        data: &T,
        extraction_pattern: Option<&Regex>,
    ) -> MailResult<RenderedContent> {
        self.template.render(data, extraction_pattern).await
    }

    /// Renders the template with `data` and sends it.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        envelope: &Envelope,
        data: &T,
    ) -> MailResult<SendResponse> {
        let rendered = self.template.render(data, None).await?;
        let envelope = envelope
            .clone()
            .with_text(rendered.text.unwrap_or_default());
        self.adapter.send_composed_mail(&envelope, &rendered.html).await
    }
}
