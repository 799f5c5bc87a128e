use anyhow::Result;
use seawatch::config::{MonitorConfig, monitor_config_path};
use std::path::PathBuf;
use tracing::{info, warn};

const REQUIRED_ENV: &[&str] = &[
    "DATALASTIC_API_KEY",
    "SMTP_SERVER",
    "SMTP_USERNAME",
    "SMTP_PASSWORD",
    "FROM_EMAIL",
];

/// Load and validate the configuration, then report which secrets are missing
pub fn handle_check_config(config_path: Option<PathBuf>) -> Result<()> {
    let config_path = config_path.unwrap_or_else(monitor_config_path);
    let config = MonitorConfig::load_or_default(&config_path)?;
    config.validate()?;

    info!("Configuration at {:?} is valid", config_path);
    info!(
        "  Poll every {}s (timeout {}s), watchlist every {}s",
        config.poll_interval_secs, config.fetch_timeout_secs, config.watchlist_interval_secs
    );
    info!(
        "  Deviation threshold {} nm, stationary below {} kn, {} positions per track",
        config.deviation_threshold_nm, config.stationary_speed_knots, config.track_capacity
    );
    match config.track_retention_hours {
        Some(hours) => info!("  Tracks reaped after {} hours without a position", hours),
        None => info!("  Tracks kept for the life of the process"),
    }
    info!(
        "  Provider {} (country {})",
        config.provider.base_url, config.provider.country_iso
    );
    info!("  {} recipients, {} watched vessels", config.recipients.len(), config.watchlist.len());

    let missing: Vec<&str> = REQUIRED_ENV
        .iter()
        .copied()
        .filter(|name| std::env::var(name).map(|v| v.is_empty()).unwrap_or(true))
        .collect();
    if missing.is_empty() {
        info!("All required environment variables are set");
    } else {
        warn!("Missing environment variables: {}", missing.join(", "));
    }
    Ok(())
}
