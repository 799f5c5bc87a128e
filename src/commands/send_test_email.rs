use anyhow::Result;
use seawatch::config::{MonitorConfig, monitor_config_path};
use seawatch::email::{EmailNotifier, test_notification};
use seawatch::notifier::Notifier;
use std::path::PathBuf;
use tracing::info;

/// Send the test notification to `to`, or to the configured recipients
pub async fn handle_send_test_email(config_path: Option<PathBuf>, to: Vec<String>) -> Result<()> {
    let recipients = if to.is_empty() {
        let config_path = config_path.unwrap_or_else(monitor_config_path);
        MonitorConfig::load_or_default(&config_path)?.recipients
    } else {
        to
    };

    let notifier = EmailNotifier::from_env()?;
    let (subject, body) = test_notification();
    notifier.send(subject, body, &recipients).await?;

    info!("Test email sent to {}", recipients.join(", "));
    Ok(())
}
