//! Mail session.
//!
//! A [`LemurMail`] session owns one provider adapter and one template root.
//! Sessions created without a root start in [`SessionState::PathPending`] and
//! must be initialized before templates can be bound.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{LemurMailConfig, ProviderSettings, TemplatePathConfig, TransportConfig};
use crate::errors::{MailError, MailResult};
use crate::observability::MailMetrics;
use crate::paths::PathResolver;
use crate::providers::{ComposedMailSender, ProviderFactory, TransportAdapter};
use crate::render::{TemplateEngine, TemplateRenderer};
use crate::transport::MailTransport;
use crate::types::{Envelope, RenderedContent, SendResponse};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Provider and path are being set up.
    Constructing,
    /// Provider is ready; the template root awaits [`LemurMail::init`].
    PathPending,
    /// Templates can be bound and sent.
    Ready,
}

/// Templated mail session.
#[derive(Debug)]
pub struct LemurMail {
    adapter: Arc<TransportAdapter>,
    resolver: PathResolver,
    renderer: TemplateRenderer,
    extraction_pattern: Option<Regex>,
    metrics: Arc<MailMetrics>,
    state: SessionState,
}

impl LemurMail {
    /// Creates a session without touching the network.
    ///
    /// With an explicit path the session is [`SessionState::Ready`]; otherwise
    /// it is [`SessionState::PathPending`] until [`LemurMail::init`] completes.
    pub fn new(config: LemurMailConfig) -> MailResult<Self> {
        let adapter = provider_from_settings(&config.provider)?;
        let mut session = Self::assemble(adapter, TemplateRenderer::default(), None);

        match &config.path {
            Some(path) => {
                session.resolver.set_path(path)?;
                session.state = SessionState::Ready;
            }
            None => {
                tracing::warn!(
                    provider = session.adapter.provider_name(),
                    "No template path configured; await init() before calling template()"
                );
                session.state = SessionState::PathPending;
            }
        }

        Ok(session)
    }

    /// Creates a session and resolves its template root.
    pub async fn connect(config: LemurMailConfig) -> MailResult<Self> {
        let mut session = Self::new(config)?;
        session.init().await?;
        Ok(session)
    }

    /// Creates a new session builder.
    pub fn builder() -> LemurMailBuilder {
        LemurMailBuilder::default()
    }

    fn assemble(
        adapter: TransportAdapter,
        renderer: TemplateRenderer,
        extraction_pattern: Option<Regex>,
    ) -> Self {
        Self {
            adapter: Arc::new(adapter),
            resolver: PathResolver::new(),
            renderer,
            extraction_pattern,
            metrics: Arc::new(MailMetrics::new()),
            state: SessionState::Constructing,
        }
    }

    /// Auto-detects the template root from the working directory.
    ///
    /// Does nothing when the session is already ready.
    pub async fn init(&mut self) -> MailResult<()> {
        if self.state == SessionState::Ready {
            return Ok(());
        }
        let result = self.resolver.auto_detect_path().await.map(|_| ());
        self.finish_init(result)
    }

    /// Auto-detects the template root, searching upward from `start`.
    pub async fn init_from(&mut self, start: impl AsRef<Path>) -> MailResult<()> {
        if self.state == SessionState::Ready {
            return Ok(());
        }
        let result = self.resolver.auto_detect_path_from(start).await.map(|_| ());
        self.finish_init(result)
    }

    fn finish_init(&mut self, result: MailResult<()>) -> MailResult<()> {
        result.map_err(|e| {
            e.context("failed to initialize LemurMail; set \"path\" in the configuration or add a lemur-mail.config.json")
        })?;
        self.state = SessionState::Ready;
        tracing::debug!(
            provider = self.adapter.provider_name(),
            path = ?self.resolver.get_path().ok(),
            "Session ready"
        );
        Ok(())
    }

    /// Binds a template for sending.
    pub fn template(&self, name: impl Into<String>) -> MailResult<TemplateSend> {
        let name = name.into();
        if self.state != SessionState::Ready {
            return Err(MailError::state(format!(
                "cannot bind template \"{}\": session is {:?}; await init() first",
                name, self.state
            )));
        }

        Ok(TemplateSend {
            name,
            root: self.resolver.get_path()?.to_path_buf(),
            adapter: Arc::clone(&self.adapter),
            renderer: self.renderer.clone(),
            extraction_pattern: self.extraction_pattern.clone(),
            metrics: Arc::clone(&self.metrics),
        })
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the resolved template root.
    pub fn template_root(&self) -> MailResult<&Path> {
        self.resolver.get_path()
    }

    /// Returns the provider adapter.
    pub fn provider(&self) -> &TransportAdapter {
        &self.adapter
    }

    /// Returns the session metrics.
    pub fn metrics(&self) -> &MailMetrics {
        &self.metrics
    }
}

fn provider_from_settings(settings: &ProviderSettings) -> MailResult<TransportAdapter> {
    settings.validate()?;
    ProviderFactory::get_provider(&settings.name, settings.config.clone())
        .map_err(|e| e.context(format!("failed to initialize provider \"{}\"", settings.name)))
}

/// Builder producing a ready [`LemurMail`] session.
#[derive(Default)]
pub struct LemurMailBuilder {
    provider: Option<ProviderSettings>,
    transport_config: Option<TransportConfig>,
    transport: Option<Arc<dyn MailTransport>>,
    path: Option<TemplatePathConfig>,
    search_from: Option<PathBuf>,
    extraction_pattern: Option<Regex>,
    engine: Option<Arc<dyn TemplateEngine>>,
}

impl LemurMailBuilder {
    /// Sets the provider by name and JSON configuration.
    pub fn provider(mut self, name: impl Into<String>, config: serde_json::Value) -> Self {
        self.provider = Some(ProviderSettings::new(name, config));
        self
    }

    /// Sets a typed provider configuration.
    pub fn transport_config(mut self, config: impl Into<TransportConfig>) -> Self {
        self.transport_config = Some(config.into());
        self
    }

    /// Uses `transport` instead of the provider's default transport.
    pub fn transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the template root.
    pub fn path(mut self, path: impl Into<TemplatePathConfig>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Auto-detects the template root starting at `dir` instead of the working directory.
    pub fn search_from(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_from = Some(dir.into());
        self
    }

    /// Renders only the first capture group of `pattern`.
    pub fn extraction_pattern(mut self, pattern: Regex) -> Self {
        self.extraction_pattern = Some(pattern);
        self
    }

    /// Sets the template engine.
    pub fn engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Builds a ready session, resolving the template root.
    pub async fn build(self) -> MailResult<LemurMail> {
        let adapter = match (self.transport_config, self.provider, self.transport) {
            (Some(config), _, Some(transport)) => {
                ProviderFactory::with_transport(config, transport)?
            }
            (Some(config), _, None) => ProviderFactory::from_config(config)?,
            (None, Some(settings), Some(transport)) => {
                settings.validate()?;
                let name = settings.name.clone();
                let config = TransportConfig::from_parts(&settings.name, settings.config)
                    .map_err(|e| e.context(format!("failed to initialize provider \"{}\"", name)))?;
                ProviderFactory::with_transport(config, transport)?
            }
            (None, Some(settings), None) => provider_from_settings(&settings)?,
            (None, None, _) => {
                return Err(MailError::configuration(
                    "invalid configuration: a provider is required",
                ))
            }
        };

        let renderer = match self.engine {
            Some(engine) => TemplateRenderer::new(engine),
            None => TemplateRenderer::default(),
        };
        let mut session = LemurMail::assemble(adapter, renderer, self.extraction_pattern);

        match (&self.path, self.search_from) {
            (Some(path), _) => {
                session.resolver.set_path(path)?;
                session.state = SessionState::Ready;
            }
            (None, Some(dir)) => session.init_from(dir).await?,
            (None, None) => session.init().await?,
        }

        Ok(session)
    }
}

/// A template bound to a session's provider and template root.
#[derive(Debug, Clone)]
pub struct TemplateSend {
    name: String,
    root: PathBuf,
    adapter: Arc<TransportAdapter>,
    renderer: TemplateRenderer,
    extraction_pattern: Option<Regex>,
    metrics: Arc<MailMetrics>,
}

impl TemplateSend {
    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the template root captured at bind time.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Renders the template without sending.
    pub async fn render<T: Serialize + ?Sized>(&self, data: &T) -> MailResult<RenderedContent> {
        let result = self
            .renderer
            .render(&self.root, &self.name, data, self.extraction_pattern.as_ref())
            .await;

        match &result {
            Ok(_) => self.metrics.record_render_success(),
            Err(e) => {
                self.metrics.record_render_failure();
                tracing::error!(template = %self.name, error = %e, "Failed to render template");
            }
        }
        result
    }

    /// Renders the template with `data` and sends it.
    ///
    /// The envelope's plain-text field is replaced by the rendered text, which
    /// is empty for the built-in renderer.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        envelope: &Envelope,
        data: &T,
    ) -> MailResult<SendResponse> {
        let rendered = self.render(data).await?;
        let envelope = envelope
            .clone()
            .with_text(rendered.text.unwrap_or_default());

        let result = self.adapter.send_composed_mail(&envelope, &rendered.html).await;
        match &result {
            Ok(_) => self.metrics.record_send_success(),
            Err(_) => self.metrics.record_send_failure(),
        }
        result
    }
}
