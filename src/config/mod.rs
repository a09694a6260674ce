//! Configuration types for providers and sessions.
//!
//! Provides:
//! - Per-provider transport configuration (SMTP, Gmail, Mailgun)
//! - Template root configuration with per-environment selection
//! - Session configuration loadable from JSON

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use secrecy::SecretString;
use serde::Deserialize;

use crate::errors::{MailError, MailResult};

/// Default SMTP port (submission with STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default Mailgun API base URL.
pub const DEFAULT_MAILGUN_URL: &str = "https://api.mailgun.net/v3/";

/// Default Google OAuth2 token endpoint.
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Environment variable selecting between develop and production template roots.
pub const ENVIRONMENT_VAR: &str = "LEMUR_MAIL_ENV";

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Generic SMTP relay.
    Smtp,
    /// Gmail over SMTP with basic or OAuth2 credentials.
    Gmail,
    /// Mailgun HTTP API.
    Mailgun,
}

impl ProviderKind {
    /// Returns the lowercase provider name.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Smtp => "smtp",
            ProviderKind::Gmail => "gmail",
            ProviderKind::Mailgun => "mailgun",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smtp" => Ok(ProviderKind::Smtp),
            "gmail" => Ok(ProviderKind::Gmail),
            "mailgun" => Ok(ProviderKind::Mailgun),
            _ => Err(MailError::unknown_provider(s)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Username/password pair.
#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuth {
    /// Login user.
    pub user: String,
    /// Password (never serialized back).
    pub pass: SecretString,
}

impl BasicAuth {
    /// Creates a new credential pair.
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: SecretString::new(pass.into()),
        }
    }
}

/// Generic SMTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise.
    #[serde(default)]
    pub secure: bool,
    /// Optional login credentials.
    #[serde(default)]
    pub auth: Option<BasicAuth>,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl SmtpConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SmtpConfigBuilder {
        SmtpConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> MailResult<()> {
        if self.host.trim().is_empty() {
            return Err(MailError::configuration("SMTP host is required"));
        }
        if self.port == 0 {
            return Err(MailError::configuration("SMTP port must be non-zero"));
        }
        if let Some(auth) = &self.auth {
            if auth.user.is_empty() {
                return Err(MailError::configuration("SMTP auth user is required"));
            }
        }
        Ok(())
    }
}

/// Builder for SMTP configuration.
#[derive(Debug, Default)]
pub struct SmtpConfigBuilder {
    host: Option<String>,
    port: u16,
    secure: bool,
    auth: Option<BasicAuth>,
}

impl SmtpConfigBuilder {
    /// Sets the SMTP server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the SMTP server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Uses implicit TLS.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets login credentials.
    pub fn credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth::new(user, pass));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> MailResult<SmtpConfig> {
        let config = SmtpConfig {
            host: self
                .host
                .ok_or_else(|| MailError::configuration("SMTP host is required"))?,
            port: if self.port == 0 { DEFAULT_SMTP_PORT } else { self.port },
            secure: self.secure,
            auth: self.auth,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Marker for the `"type": "OAuth2"` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OAuth2Type {
    /// Three-legged OAuth2 with a refresh token.
    OAuth2,
}

/// Gmail OAuth2 credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Auth {
    /// Must be `"OAuth2"`.
    #[serde(rename = "type")]
    pub auth_type: OAuth2Type,
    /// Mailbox the token belongs to.
    pub user: String,
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: SecretString,
    /// Long-lived refresh token.
    pub refresh_token: SecretString,
    /// Pre-issued access token, used until it is rejected or refreshed.
    #[serde(default)]
    pub access_token: Option<SecretString>,
    /// Token endpoint override.
    #[serde(default)]
    pub access_url: Option<String>,
}

impl OAuth2Auth {
    /// Returns the token endpoint to use.
    pub fn token_url(&self) -> &str {
        self.access_url.as_deref().unwrap_or(DEFAULT_GOOGLE_TOKEN_URL)
    }
}

/// Gmail credentials: OAuth2 or plain (app password).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GmailAuth {
    /// OAuth2 refresh-token credentials.
    OAuth2(OAuth2Auth),
    /// Username and app password.
    Basic(BasicAuth),
}

impl GmailAuth {
    /// Returns the mailbox user.
    pub fn user(&self) -> &str {
        match self {
            GmailAuth::OAuth2(auth) => &auth.user,
            GmailAuth::Basic(auth) => &auth.user,
        }
    }
}

/// Gmail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GmailConfig {
    /// Credentials.
    pub auth: GmailAuth,
}

impl GmailConfig {
    /// Gmail with a username and app password.
    pub fn basic(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            auth: GmailAuth::Basic(BasicAuth::new(user, pass)),
        }
    }

    /// Gmail with OAuth2 refresh-token credentials.
    pub fn oauth2(
        user: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            auth: GmailAuth::OAuth2(OAuth2Auth {
                auth_type: OAuth2Type::OAuth2,
                user: user.into(),
                client_id: client_id.into(),
                client_secret: SecretString::new(client_secret.into()),
                refresh_token: SecretString::new(refresh_token.into()),
                access_token: None,
                access_url: None,
            }),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> MailResult<()> {
        if self.auth.user().trim().is_empty() {
            return Err(MailError::configuration("Gmail auth user is required"));
        }
        if let GmailAuth::OAuth2(auth) = &self.auth {
            if auth.client_id.trim().is_empty() {
                return Err(MailError::configuration("Gmail OAuth2 clientId is required"));
            }
        }
        Ok(())
    }
}

/// Mailgun API credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct MailgunAuth {
    /// Private API key.
    pub api_key: SecretString,
    /// Sending domain.
    pub domain: String,
    /// API base URL.
    #[serde(default = "default_mailgun_url")]
    pub url: String,
}

fn default_mailgun_url() -> String {
    DEFAULT_MAILGUN_URL.to_string()
}

/// Mailgun configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailgunConfig {
    /// Credentials.
    pub auth: MailgunAuth,
}

impl MailgunConfig {
    /// Creates a Mailgun configuration against the default API URL.
    pub fn new(api_key: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            auth: MailgunAuth {
                api_key: SecretString::new(api_key.into()),
                domain: domain.into(),
                url: default_mailgun_url(),
            },
        }
    }

    /// Overrides the API base URL (EU region, test servers).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.auth.url = url.into();
        self
    }

    /// Returns the messages endpoint for the configured domain.
    pub fn messages_endpoint(&self) -> String {
        let base = self.auth.url.trim_end_matches('/');
        format!("{}/{}/messages", base, self.auth.domain)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> MailResult<()> {
        if self.auth.domain.trim().is_empty() {
            return Err(MailError::configuration("Mailgun domain is required"));
        }
        if self.auth.url.trim().is_empty() {
            return Err(MailError::configuration("Mailgun url must not be empty"));
        }
        Ok(())
    }
}

/// Transport configuration, one variant per provider family.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    /// Generic SMTP.
    Smtp(SmtpConfig),
    /// Gmail.
    Gmail(GmailConfig),
    /// Mailgun.
    Mailgun(MailgunConfig),
}

impl TransportConfig {
    /// Parses a provider name and its JSON configuration into a typed config.
    pub fn from_parts(name: &str, config: serde_json::Value) -> MailResult<Self> {
        let kind: ProviderKind = name.parse()?;
        let shape_error = |e: serde_json::Error| {
            MailError::configuration(format!("invalid {} configuration: {}", kind, e))
                .with_cause(e)
        };

        let config = match kind {
            ProviderKind::Smtp => {
                TransportConfig::Smtp(serde_json::from_value(config).map_err(shape_error)?)
            }
            ProviderKind::Gmail => {
                TransportConfig::Gmail(serde_json::from_value(config).map_err(shape_error)?)
            }
            ProviderKind::Mailgun => {
                TransportConfig::Mailgun(serde_json::from_value(config).map_err(shape_error)?)
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the provider family.
    pub fn kind(&self) -> ProviderKind {
        match self {
            TransportConfig::Smtp(_) => ProviderKind::Smtp,
            TransportConfig::Gmail(_) => ProviderKind::Gmail,
            TransportConfig::Mailgun(_) => ProviderKind::Mailgun,
        }
    }

    /// Validates the wrapped configuration.
    pub fn validate(&self) -> MailResult<()> {
        match self {
            TransportConfig::Smtp(c) => c.validate(),
            TransportConfig::Gmail(c) => c.validate(),
            TransportConfig::Mailgun(c) => c.validate(),
        }
    }
}

impl From<SmtpConfig> for TransportConfig {
    fn from(config: SmtpConfig) -> Self {
        TransportConfig::Smtp(config)
    }
}

impl From<GmailConfig> for TransportConfig {
    fn from(config: GmailConfig) -> Self {
        TransportConfig::Gmail(config)
    }
}

impl From<MailgunConfig> for TransportConfig {
    fn from(config: MailgunConfig) -> Self {
        TransportConfig::Mailgun(config)
    }
}

/// Deployment environment used to pick a template root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Development (default).
    #[default]
    Development,
    /// Production.
    Production,
}

impl Environment {
    /// Reads the environment from [`ENVIRONMENT_VAR`].
    pub fn current() -> Self {
        Self::from_value(std::env::var(ENVIRONMENT_VAR).ok().as_deref())
    }

    /// Parses a discriminator value: `production` (any case, surrounding
    /// whitespace ignored) selects production, anything else development.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("production") => {
                Environment::Production
            }
            _ => Environment::Development,
        }
    }
}

/// Template root: one directory, or one per environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TemplatePathConfig {
    /// Same directory in every environment.
    Single(String),
    /// Directory chosen by [`Environment`].
    PerEnvironment {
        /// Used outside production.
        develop: String,
        /// Used in production.
        production: String,
    },
}

impl TemplatePathConfig {
    /// Returns the raw directory selected for `environment`.
    pub fn select(&self, environment: Environment) -> &str {
        match self {
            TemplatePathConfig::Single(path) => path,
            TemplatePathConfig::PerEnvironment { develop, production } => match environment {
                Environment::Production => production,
                Environment::Development => develop,
            },
        }
    }
}

impl From<&str> for TemplatePathConfig {
    fn from(path: &str) -> Self {
        TemplatePathConfig::Single(path.to_string())
    }
}

impl From<String> for TemplatePathConfig {
    fn from(path: String) -> Self {
        TemplatePathConfig::Single(path)
    }
}

impl From<&Path> for TemplatePathConfig {
    fn from(path: &Path) -> Self {
        TemplatePathConfig::Single(path.to_string_lossy().into_owned())
    }
}

/// Provider selection inside a session configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSettings {
    /// Provider name (case-insensitive).
    #[serde(default)]
    pub name: String,
    /// Provider-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ProviderSettings {
    /// Creates provider settings.
    pub fn new(name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Fails when the name or configuration is missing.
    pub fn validate(&self) -> MailResult<()> {
        if self.name.trim().is_empty() || self.config.is_null() {
            return Err(MailError::configuration(
                "invalid configuration: \"provider.name\" and \"provider.config\" are required",
            ));
        }
        Ok(())
    }
}

/// Session configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LemurMailConfig {
    /// Template root; auto-detected when absent.
    #[serde(default)]
    pub path: Option<TemplatePathConfig>,
    /// Mail provider.
    #[serde(default)]
    pub provider: ProviderSettings,
}

impl LemurMailConfig {
    /// Creates a configuration for `provider` without a template root.
    pub fn new(provider: ProviderSettings) -> Self {
        Self { path: None, provider }
    }

    /// Sets the template root.
    pub fn with_path(mut self, path: impl Into<TemplatePathConfig>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Parses a configuration from JSON text.
    pub fn from_json_str(json: &str) -> MailResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            MailError::configuration(format!("invalid mail configuration: {}", e)).with_cause(e)
        })
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> MailResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MailError::configuration(format!(
                "failed to read mail configuration \"{}\": {}",
                path.display(),
                e
            ))
            .with_cause(e)
        })?;
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MailErrorKind;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn test_provider_kind_case_insensitive() {
        assert_eq!("SMTP".parse::<ProviderKind>().unwrap(), ProviderKind::Smtp);
        assert_eq!("Gmail".parse::<ProviderKind>().unwrap(), ProviderKind::Gmail);
        assert_eq!("mailgun".parse::<ProviderKind>().unwrap(), ProviderKind::Mailgun);

        let err = "sendgrid".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.kind(), MailErrorKind::UnknownProvider);
    }

    #[test]
    fn test_environment_from_value() {
        assert_eq!(Environment::from_value(Some("production")), Environment::Production);
        assert_eq!(Environment::from_value(Some("PRODUCTION")), Environment::Production);
        assert_eq!(Environment::from_value(Some(" Production\n")), Environment::Production);
        assert_eq!(Environment::from_value(None), Environment::Development);
        assert_eq!(Environment::from_value(Some("")), Environment::Development);
        assert_eq!(Environment::from_value(Some("staging")), Environment::Development);
        assert_eq!(Environment::from_value(Some("prod")), Environment::Development);
    }

    #[test]
    fn test_smtp_builder_defaults() {
        let config = SmtpConfig::builder()
            .host("smtp.example.com")
            .credentials("user", "pass")
            .build()
            .unwrap();

        assert_eq!(config.port, DEFAULT_SMTP_PORT);
        assert!(!config.secure);
        assert_eq!(config.auth.unwrap().pass.expose_secret(), "pass");

        assert!(SmtpConfig::builder().build().is_err());
    }

    #[test]
    fn test_gmail_auth_shapes() {
        let basic = TransportConfig::from_parts(
            "gmail",
            json!({"auth": {"user": "me@gmail.com", "pass": "app-password"}}),
        )
        .unwrap();
        match basic {
            TransportConfig::Gmail(GmailConfig { auth: GmailAuth::Basic(auth) }) => {
                assert_eq!(auth.user, "me@gmail.com");
            }
            other => panic!("Expected basic Gmail auth, got {:?}", other),
        }

        let oauth = TransportConfig::from_parts(
            "gmail",
            json!({"auth": {
                "type": "OAuth2",
                "user": "me@gmail.com",
                "clientId": "client",
                "clientSecret": "secret",
                "refreshToken": "refresh"
            }}),
        )
        .unwrap();
        match oauth {
            TransportConfig::Gmail(GmailConfig { auth: GmailAuth::OAuth2(auth) }) => {
                assert_eq!(auth.client_id, "client");
                assert_eq!(auth.token_url(), DEFAULT_GOOGLE_TOKEN_URL);
            }
            other => panic!("Expected OAuth2 Gmail auth, got {:?}", other),
        }
    }

    #[test]
    fn test_mailgun_default_url() {
        let config = TransportConfig::from_parts(
            "MAILGUN",
            json!({"auth": {"api_key": "key-123", "domain": "mg.example.com"}}),
        )
        .unwrap();
        match config {
            TransportConfig::Mailgun(config) => {
                assert_eq!(config.auth.url, DEFAULT_MAILGUN_URL);
                assert_eq!(
                    config.messages_endpoint(),
                    "https://api.mailgun.net/v3/mg.example.com/messages"
                );
            }
            other => panic!("Expected Mailgun config, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_mismatch_is_configuration_error() {
        let err = TransportConfig::from_parts("smtp", json!({"port": 25})).unwrap_err();
        assert_eq!(err.kind(), MailErrorKind::Configuration);
    }

    #[test]
    fn test_template_path_selection() {
        let paths = TemplatePathConfig::PerEnvironment {
            develop: "./dev".to_string(),
            production: "./dist".to_string(),
        };
        assert_eq!(paths.select(Environment::Development), "./dev");
        assert_eq!(paths.select(Environment::Production), "./dist");
        assert_eq!(
            TemplatePathConfig::from("./t").select(Environment::Production),
            "./t"
        );
    }

    #[test]
    fn test_session_config_from_json() {
        let config = LemurMailConfig::from_json_str(
            r#"{
                "path": {"develop": "./src/templates", "production": "./dist/templates"},
                "provider": {"name": "smtp", "config": {"host": "smtp.example.com", "port": 2525}}
            }"#,
        )
        .unwrap();

        assert!(matches!(
            config.path,
            Some(TemplatePathConfig::PerEnvironment { .. })
        ));
        assert_eq!(config.provider.name, "smtp");
        assert!(config.provider.validate().is_ok());

        let missing = LemurMailConfig::from_json_str(r#"{"provider": {"name": "smtp"}}"#).unwrap();
        let err = missing.provider.validate().unwrap_err();
        assert_eq!(err.kind(), MailErrorKind::Configuration);
    }
}
