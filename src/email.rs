use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, client::TlsParametersBuilder},
};
use tracing::info;

use crate::notifier::Notifier;

/// Prefix on every alert subject line
const SUBJECT_PREFIX: &str = "Seawatch Alert: ";

/// Get the environment name for display purposes
fn get_environment_name() -> &'static str {
    match std::env::var("SEAWATCH_ENV").unwrap_or_default().as_str() {
        "production" => "Production",
        "staging" => "Staging",
        _ => "Development",
    }
}

/// Returns "[STAGING] " if SEAWATCH_ENV=staging, empty string otherwise
fn get_staging_prefix() -> &'static str {
    match std::env::var("SEAWATCH_ENV").unwrap_or_default().as_str() {
        "staging" => "[STAGING] ",
        _ => "",
    }
}

/// Create a properly formatted Mailbox with display name
fn create_mailbox(name: Option<&str>, email: &str) -> Result<Mailbox> {
    let address = email
        .parse()
        .with_context(|| format!("Invalid email address '{}'", email))?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

/// Simple HTML escaping
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// SMTP-backed alert notifier
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl EmailNotifier {
    /// Build the notifier from `SMTP_*` / `FROM_*` environment variables
    pub fn from_env() -> Result<Self> {
        let smtp_server = std::env::var("SMTP_SERVER")
            .map_err(|_| anyhow::anyhow!("SMTP_SERVER environment variable not set"))?;

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid SMTP_PORT"))?;

        let smtp_username = std::env::var("SMTP_USERNAME")
            .map_err(|_| anyhow::anyhow!("SMTP_USERNAME environment variable not set"))?;

        let smtp_password = std::env::var("SMTP_PASSWORD")
            .map_err(|_| anyhow::anyhow!("SMTP_PASSWORD environment variable not set"))?;

        let from_email = std::env::var("FROM_EMAIL")
            .map_err(|_| anyhow::anyhow!("FROM_EMAIL environment variable not set"))?;

        let from_name =
            std::env::var("FROM_NAME").unwrap_or_else(|_| "Seawatch Maritime Alert".to_string());

        let creds = Credentials::new(smtp_username, smtp_password);

        // Port 1025: plain (local Mailpit), 465: implicit TLS, anything else: STARTTLS
        let mailer = if smtp_port == 1025 {
            info!("Using insecure SMTP connection for port 1025 without TLS");
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_server)
                .port(smtp_port)
                .tls(lettre::transport::smtp::client::Tls::None)
                .build()
        } else if smtp_port == 465 {
            info!("Using implicit TLS (SMTPS) for port 465");
            let tls_params = TlsParametersBuilder::new(smtp_server.clone())
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create TLS parameters: {}", e))?;
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_server)?
                .port(smtp_port)
                .credentials(creds)
                .tls(lettre::transport::smtp::client::Tls::Wrapper(tls_params))
                .build()
        } else {
            info!("Using STARTTLS for port {}", smtp_port);
            let tls_params = TlsParametersBuilder::new(smtp_server.clone())
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create TLS parameters: {}", e))?;
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_server)?
                .port(smtp_port)
                .credentials(creds)
                .tls(lettre::transport::smtp::client::Tls::Required(tls_params))
                .build()
        };

        Ok(Self {
            mailer,
            from_email,
            from_name,
        })
    }

    fn build_message(&self, subject: &str, body: &str, recipients: &[String]) -> Result<Message> {
        let mut builder = Message::builder()
            .from(create_mailbox(Some(&self.from_name), &self.from_email)?)
            .subject(full_subject(subject));
        for recipient in recipients {
            builder = builder.to(create_mailbox(None, recipient)?);
        }

        let message = builder.multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(build_alert_text(subject, body)))
                .singlepart(SinglePart::html(build_alert_html(
                    subject,
                    body,
                    get_environment_name(),
                ))),
        )?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()> {
        if recipients.is_empty() {
            anyhow::bail!("No recipients configured for alerts");
        }

        let message = self.build_message(subject, body, recipients)?;
        let response = self
            .mailer
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        info!(
            "Alert email '{}' sent to {} recipient(s) (code {})",
            subject,
            recipients.len(),
            response.code()
        );
        Ok(())
    }
}

fn full_subject(subject: &str) -> String {
    format!("{}{}{}", get_staging_prefix(), SUBJECT_PREFIX, subject)
}

/// Wrap an alert body (already HTML) in the alert email template
fn build_alert_html(subject: &str, body: &str, environment: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; margin: 0; padding: 20px; background-color: #f5f5f5; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; background-color: white; border: 1px solid #e0e0e0; border-radius: 5px; overflow: hidden; }}
        .header {{ color: #3366cc; border-bottom: 1px solid #e0e0e0; padding: 20px; }}
        .header h2 {{ margin: 0; }}
        .alert-type {{ color: #d32f2f; font-weight: bold; padding: 0 20px; }}
        .content {{ margin: 20px 0; padding: 0 20px; }}
        .footer {{ background-color: #f5f5f5; padding: 10px 20px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header"><h2>Maritime Alert Notification</h2></div>
        <p class="alert-type">ALERT TYPE: {subject}</p>
        <div class="content">
            {body}
        </div>
        <div class="footer">
            <p>This is an automated alert from the Seawatch Maritime Monitoring System.</p>
            <p>Environment: {environment}</p>
        </div>
    </div>
</body>
</html>"#,
        subject = html_escape(subject),
        body = body,
        environment = environment,
    )
}

/// Plain text fallback: the alert body with tags stripped
fn build_alert_text(subject: &str, body: &str) -> String {
    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let text = lines.join("\n");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    format!(
        "MARITIME ALERT NOTIFICATION\n===========================\n\nALERT TYPE: {}\n\n{}\n\n---\nThis is an automated alert from the Seawatch Maritime Monitoring System.",
        subject, text
    )
}

/// Body of the operator test notification
pub fn test_notification() -> (&'static str, &'static str) {
    (
        "Test Notification",
        "<p>This is a test alert from the Seawatch Maritime Monitoring System.</p>\n\
         <p>If you received this message, your alert notifications are configured correctly.</p>",
    )
}
