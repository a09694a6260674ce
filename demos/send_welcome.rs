//! Sends the `welcome` template through a configured provider.
//!
//! This example demonstrates:
//! - Loading a session configuration from JSON
//! - Auto-detecting the template root when the configuration has no path
//! - Sending a template and printing the message id
//!
//! # Usage
//!
//! ```bash
//! cat > lemur-mail.json <<'EOF'
//! {
//!   "path": "./templates",
//!   "provider": {"name": "smtp", "config": {"host": "localhost", "port": 1025}}
//! }
//! EOF
//! echo 'Hi {{userName}}' > templates/welcome.mustache
//!
//! RUST_LOG=debug cargo run --example send_welcome -- lemur-mail.json jane@example.com
//! ```

use integrations_lemur_mail::{Envelope, LemurMail, LemurMailConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "lemur-mail.json".to_string());
    let recipient = args.next().unwrap_or_else(|| "jane@example.com".to_string());

    println!("Loading configuration from {}...", config_path);
    let config = LemurMailConfig::from_file(&config_path)?;
    let mail = LemurMail::connect(config).await?;
    println!("  Provider: {}", mail.provider().provider_name());
    println!("  Templates: {}", mail.template_root()?.display());

    let envelope = Envelope::builder()
        .from("LemurMail Demo <noreply@example.com>")?
        .to(recipient.as_str())?
        .subject("Welcome aboard")
        .build()?;

    match mail
        .template("welcome")?
        .send(&envelope, &json!({"userName": "Jane"}))
        .await
    {
        Ok(response) => {
            println!("Email sent successfully!");
            println!("  Message ID: {}", response.message_id);
            if let Some(url) = response.preview_url {
                println!("  Preview: {}", url);
            }
        }
        Err(e) => {
            eprintln!("Failed to send email: {}", e);
            return Err(e.into());
        }
    }

    let snapshot = mail.metrics().snapshot();
    println!(
        "Rendered: {}, sent: {}, failed: {}",
        snapshot.templates_rendered, snapshot.emails_sent, snapshot.emails_failed
    );

    Ok(())
}
