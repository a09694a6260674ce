//! Tests for sessions, the provider factory and one-shot sends.

use integrations_lemur_mail::mocks::{test_envelope, write_template, MockTransport};
use integrations_lemur_mail::{
    body_pattern, Environment, LemurMail, LemurMailConfig, MailError, MailErrorKind,
    PathResolver, ProviderFactory, ProviderKind, ProviderSettings, SendTrigger, SessionState,
    SmtpConfig, TransportConfig, MARKER_FILE,
};
use serde_json::json;
use std::sync::Arc;

fn smtp_config() -> TransportConfig {
    SmtpConfig::builder()
        .host("smtp.example.com")
        .credentials("user", "pass")
        .build()
        .unwrap()
        .into()
}

#[tokio::test]
async fn test_smtp_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "welcome", "Hi {{userName}}").unwrap();
    let transport = Arc::new(MockTransport::new());

    let mail = LemurMail::builder()
        .transport_config(smtp_config())
        .transport(transport.clone())
        .path(dir.path())
        .build()
        .await
        .unwrap();

    let response = mail
        .template("welcome")
        .unwrap()
        .send(&test_envelope().unwrap(), &json!({"userName": "Jane"}))
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].html, "Hi Jane");
    assert_eq!(sent[0].subject.as_deref(), Some("Welcome"));
    assert_eq!(sent[0].to_header(), "user@example.com");
    assert!(!response.message_id.is_empty());
    assert_eq!(response.message_id, sent[0].message_id);
    assert!(response.preview_url.is_none());
}

#[tokio::test]
async fn test_preview_url_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "welcome", "Hi").unwrap();
    let transport = Arc::new(MockTransport::new().with_preview_url("https://preview.test/1"));

    let mail = LemurMail::builder()
        .transport_config(smtp_config())
        .transport(transport)
        .path(dir.path())
        .build()
        .await
        .unwrap();

    let response = mail
        .template("welcome")
        .unwrap()
        .send(&test_envelope().unwrap(), &json!({}))
        .await
        .unwrap();
    assert_eq!(response.preview_url.as_deref(), Some("https://preview.test/1"));
}

#[tokio::test]
async fn test_body_extraction_in_session() {
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "newsletter",
        "<!doctype html><html><head><title>x</title></head><body>\n<h1>Hello {{name}}</h1>\n</body></html>",
    )
    .unwrap();
    let transport = Arc::new(MockTransport::new());

    let mail = LemurMail::builder()
        .transport_config(smtp_config())
        .transport(transport.clone())
        .path(dir.path())
        .extraction_pattern(body_pattern())
        .build()
        .await
        .unwrap();

    mail.template("newsletter")
        .unwrap()
        .send(&test_envelope().unwrap(), &json!({"name": "Ana"}))
        .await
        .unwrap();

    assert_eq!(transport.last_sent().unwrap().html, "<h1>Hello Ana</h1>");
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "welcome", "Hi").unwrap();
    let transport = Arc::new(MockTransport::new());
    transport.fail_next_with(MailError::transport("smtp", "connection refused"));

    let mail = LemurMail::builder()
        .transport_config(smtp_config())
        .transport(transport.clone())
        .path(dir.path())
        .build()
        .await
        .unwrap();

    let err = mail
        .template("welcome")
        .unwrap()
        .send(&test_envelope().unwrap(), &json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), MailErrorKind::Transport);
    assert!(err.message().contains("connection refused"));
    assert_eq!(mail.metrics().snapshot().emails_failed, 1);
}

#[tokio::test]
async fn test_pending_session_then_init() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("service").join("src");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(
        root.path().join(MARKER_FILE),
        r#"{"path": "templates"}"#,
    )
    .unwrap();
    write_template(&root.path().join("templates"), "welcome", "Hi {{userName}}").unwrap();

    let mut mail = LemurMail::new(LemurMailConfig::new(ProviderSettings::new(
        "smtp",
        json!({"host": "smtp.example.com"}),
    )))
    .unwrap();
    assert_eq!(mail.state(), SessionState::PathPending);
    assert_eq!(
        mail.template("welcome").unwrap_err().kind(),
        MailErrorKind::State
    );

    mail.init_from(&nested).await.unwrap();
    assert_eq!(mail.state(), SessionState::Ready);
    assert_eq!(mail.template_root().unwrap(), root.path().join("templates"));

    // second init is a no-op
    mail.init_from(root.path().join("elsewhere")).await.unwrap();
    assert_eq!(mail.template_root().unwrap(), root.path().join("templates"));
}

#[tokio::test]
async fn test_builder_auto_detects_path() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(
        root.path().join(MARKER_FILE),
        r#"{"path": "./mail"}"#,
    )
    .unwrap();

    let mail = LemurMail::builder()
        .provider("Mailgun", json!({"auth": {"api_key": "key", "domain": "mg.example.com"}}))
        .search_from(root.path())
        .build()
        .await
        .unwrap();

    assert_eq!(mail.state(), SessionState::Ready);
    assert_eq!(mail.provider().provider_kind(), ProviderKind::Mailgun);
    assert_eq!(mail.template_root().unwrap(), root.path().join("mail"));
}

#[tokio::test]
async fn test_builder_without_provider_fails() {
    let err = LemurMail::builder().path("/tmp").build().await.unwrap_err();
    assert_eq!(err.kind(), MailErrorKind::Configuration);
}

#[test]
fn test_session_from_json_config() {
    let config = LemurMailConfig::from_json_str(
        r#"{
            "path": {"develop": "/srv/mail/dev", "production": "/srv/mail/prod"},
            "provider": {"name": "GMAIL", "config": {"auth": {"user": "me@gmail.com", "pass": "app"}}}
        }"#,
    )
    .unwrap();

    let mail = LemurMail::new(config).unwrap();
    assert_eq!(mail.state(), SessionState::Ready);
    assert_eq!(mail.provider().provider_name(), "gmail");

    let root = mail.template_root().unwrap();
    match Environment::current() {
        Environment::Production => assert_eq!(root, std::path::Path::new("/srv/mail/prod")),
        Environment::Development => assert_eq!(root, std::path::Path::new("/srv/mail/dev")),
    }
}

#[test]
fn test_factory_names() {
    let smtp = json!({"host": "smtp.example.com"});
    assert!(ProviderFactory::get_provider("SMTP", smtp.clone()).is_ok());
    assert!(ProviderFactory::get_provider("smtp", smtp.clone()).is_ok());

    let err = ProviderFactory::get_provider("sendgrid", smtp).unwrap_err();
    assert_eq!(err.kind(), MailErrorKind::UnknownProvider);
    assert!(err.to_string().contains("sendgrid"));
}

#[test]
fn test_factory_shape_mismatch() {
    let err = ProviderFactory::get_provider("mailgun", json!({"host": "x"})).unwrap_err();
    assert_eq!(err.kind(), MailErrorKind::Configuration);
}

#[tokio::test]
async fn test_trigger_uses_current_path() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "receipt", "Total: {{total}}").unwrap();

    let mut resolver = PathResolver::new();
    assert_eq!(
        SendTrigger::template("receipt", &resolver).unwrap_err().kind(),
        MailErrorKind::Configuration
    );

    resolver
        .set_path_for(&dir.path().into(), Environment::Development)
        .unwrap();
    let rendered = SendTrigger::template("receipt", &resolver)
        .unwrap()
        .render(&json!({"total": "9.99"}), None)
        .await
        .unwrap();
    assert_eq!(rendered.html, "Total: 9.99");
}

#[tokio::test]
async fn test_trigger_provider_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut resolver = PathResolver::new();
    resolver
        .set_path_for(&dir.path().into(), Environment::Development)
        .unwrap();

    let handle = SendTrigger::provider(
        "gmail",
        json!({"auth": {"user": "me@gmail.com", "pass": "app"}}),
        "welcome",
        &resolver,
    )
    .unwrap();
    assert_eq!(handle.provider().provider_kind(), ProviderKind::Gmail);

    let err = handle
        .send(&test_envelope().unwrap(), &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), MailErrorKind::TemplateNotFound);
}
