//! Tests for the Mailgun provider against a mock HTTP server.

use integrations_lemur_mail::mocks::{test_envelope, write_template};
use integrations_lemur_mail::{
    Attachment, ComposedMailSender, Environment, Envelope, LemurMail, ListHeaders, MailErrorKind,
    MailgunConfig, PathResolver, ProviderFactory, SendTrigger,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> MailgunConfig {
    MailgunConfig::new("key-123", "mg.example.com").with_url(format!("{}/v3/", server.uri()))
}

#[tokio::test]
async fn test_mailgun_session_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mg.example.com/messages"))
        .and(header("authorization", "Basic YXBpOmtleS0xMjM="))
        .and(body_string_contains("name=\"from\""))
        .and(body_string_contains("App <noreply@example.com>"))
        .and(body_string_contains("name=\"to\""))
        .and(body_string_contains("Hi Jane"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "<20240102.abc@mg.example.com>",
            "message": "Queued. Thank you."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "welcome", "Hi {{userName}}").unwrap();

    let mail = LemurMail::builder()
        .transport_config(config(&server))
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

    assert_eq!(response.message_id, "<20240102.abc@mg.example.com>");
    assert!(response.preview_url.is_none());
}

#[tokio::test]
async fn test_mailgun_forwards_attachments_and_list_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("name=\"attachment\"; filename=\"invoice.txt\""))
        .and(body_string_contains("invoice body"))
        .and(body_string_contains("name=\"h:List-Unsubscribe\""))
        .and(body_string_contains("<mailto:unsubscribe@example.com>"))
        .and(body_string_contains("name=\"amp-html\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "<1@mg>"})))
        .expect(1)
        .mount(&server)
        .await;

    let envelope = Envelope::builder()
        .from("noreply@example.com")
        .unwrap()
        .to("user@example.com")
        .unwrap()
        .amp("<html amp4email></html>")
        .attachment(Attachment::new("invoice.txt", "text/plain", b"invoice body".to_vec()))
        .list(ListHeaders {
            unsubscribe: Some("mailto:unsubscribe@example.com".to_string()),
            ..Default::default()
        })
        .build()
        .unwrap();

    let adapter = ProviderFactory::from_config(config(&server).into()).unwrap();
    let response = adapter.send_composed_mail(&envelope, "<p>Invoice</p>").await.unwrap();
    assert_eq!(response.message_id, "<1@mg>");
}

#[tokio::test]
async fn test_mailgun_response_without_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Queued."})))
        .mount(&server)
        .await;

    let adapter = ProviderFactory::from_config(config(&server).into()).unwrap();
    let err = adapter
        .send_composed_mail(&test_envelope().unwrap(), "<p>x</p>")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), MailErrorKind::ResponseMapping);
}

#[tokio::test]
async fn test_mailgun_non_json_success_is_mapping_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    let adapter = ProviderFactory::from_config(config(&server).into()).unwrap();
    let err = adapter
        .send_composed_mail(&test_envelope().unwrap(), "<p>x</p>")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), MailErrorKind::ResponseMapping);
    assert!(err.message().contains("\"OK\""));
}

#[tokio::test]
async fn test_mailgun_rejection_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "'to' parameter is not a valid address"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "welcome", "Hi").unwrap();
    let mut resolver = PathResolver::new();
    resolver
        .set_path_for(&dir.path().into(), Environment::Development)
        .unwrap();

    let err = SendTrigger::mailgun(config(&server), "welcome", &resolver)
        .unwrap()
        .send(&test_envelope().unwrap(), &json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), MailErrorKind::Transport);
    assert!(err.message().contains("not a valid address"));
}
