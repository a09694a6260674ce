//! Google OAuth2 access tokens for Gmail XOAUTH2 logins.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::OAuth2Auth;
use crate::errors::{MailError, MailResult};

/// Seconds before expiry at which a cached token is refreshed.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    value: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_expiring_soon(&self) -> bool {
        self.expires_at
            .map(|exp| exp <= Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS))
            .unwrap_or(false)
    }
}

/// Exchanges a refresh token for access tokens and caches the result.
pub struct GoogleTokenSource {
    http: reqwest::Client,
    auth: OAuth2Auth,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleTokenSource {
    /// Creates a token source. A pre-issued access token is used until it is
    /// invalidated.
    pub fn new(auth: OAuth2Auth) -> Self {
        let cached = auth.access_token.clone().map(|value| CachedToken {
            value,
            expires_at: None,
        });

        Self {
            http: reqwest::Client::new(),
            auth,
            cached: Mutex::new(cached),
        }
    }

    /// Returns the mailbox user.
    pub fn user(&self) -> &str {
        &self.auth.user
    }

    /// Returns a valid access token, refreshing when needed.
    pub async fn access_token(&self) -> MailResult<SecretString> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expiring_soon() {
                return Ok(token.value.clone());
            }
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drops the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn refresh(&self) -> MailResult<CachedToken> {
        let url = self.auth.token_url();
        tracing::debug!(user = %self.auth.user, url, "Refreshing Gmail access token");

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.auth.client_id.as_str()),
            ("client_secret", self.auth.client_secret.expose_secret().as_str()),
            ("refresh_token", self.auth.refresh_token.expose_secret().as_str()),
        ];

        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                MailError::transport("gmail", format!("token request failed: {}", e)).with_cause(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::transport(
                "gmail",
                format!("token endpoint returned {}: {}", status, body),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            MailError::transport("gmail", format!("invalid token response: {}", e)).with_cause(e)
        })?;

        Ok(CachedToken {
            value: SecretString::new(token.access_token),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs as i64)),
        })
    }
}

impl std::fmt::Debug for GoogleTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTokenSource")
            .field("user", &self.auth.user)
            .field("token_url", &self.auth.token_url())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GmailAuth, GmailConfig};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth_auth(url: &str) -> OAuth2Auth {
        match GmailConfig::oauth2("me@gmail.com", "client", "secret", "refresh").auth {
            GmailAuth::OAuth2(mut auth) => {
                auth.access_url = Some(url.to_string());
                auth
            }
            GmailAuth::Basic(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_refreshes_and_caches_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = GoogleTokenSource::new(oauth_auth(&format!("{}/token", server.uri())));
        let first = source.access_token().await.unwrap();
        let second = source.access_token().await.unwrap();

        assert_eq!(first.expose_secret(), "ya29.fresh");
        assert_eq!(second.expose_secret(), "ya29.fresh");
    }

    #[tokio::test]
    async fn test_preissued_token_skips_refresh() {
        let mut auth = oauth_auth("http://127.0.0.1:9/token");
        auth.access_token = Some(SecretString::new("ya29.given".to_string()));

        let source = GoogleTokenSource::new(auth);
        assert_eq!(source.access_token().await.unwrap().expose_secret(), "ya29.given");
    }

    #[tokio::test]
    async fn test_token_endpoint_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let source = GoogleTokenSource::new(oauth_auth(&format!("{}/token", server.uri())));
        let err = source.access_token().await.unwrap_err();

        assert_eq!(err.kind(), crate::errors::MailErrorKind::Transport);
        assert!(err.message().contains("invalid_grant"));
    }
}
