use anyhow::Result;
use seawatch::config::{MonitorConfig, monitor_config_path};
use seawatch::email::EmailNotifier;
use seawatch::monitor::Monitor;
use seawatch::notifier::{DisabledNotifier, Notifier};
use seawatch::vessel_source::{DatalasticClient, PositionSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn handle_run(
    config_path: Option<PathBuf>,
    metrics_port: Option<u16>,
    api_port: Option<u16>,
) -> Result<()> {
    let config_path = config_path.unwrap_or_else(monitor_config_path);
    let config = MonitorConfig::load_or_default(&config_path)?;

    // The recorder has to exist before metrics are zeroed, and both before the
    // first scrape
    if let Some(port) = metrics_port.or(config.metrics_port) {
        let handle = seawatch::metrics::init_metrics()?;
        seawatch::metrics::initialize_monitor_metrics();
        tokio::spawn(async move {
            if let Err(e) = seawatch::metrics::start_metrics_server(port, handle).await {
                error!("Metrics server stopped: {:#}", e);
            }
        });
    }

    let source: Arc<dyn PositionSource> = Arc::new(DatalasticClient::from_config(
        &config.provider,
        config.fetch_timeout(),
    )?);

    let notifier: Arc<dyn Notifier> = match EmailNotifier::from_env() {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            warn!("Email alerts disabled: {:#}", e);
            Arc::new(DisabledNotifier::new(format!("{:#}", e)))
        }
    };

    if config.recipients.is_empty() {
        warn!("No alert recipients configured; anomalies will be logged but not delivered");
    }

    info!("Starting seawatch monitor with:");
    info!("  Config: {:?}", config_path);
    info!(
        "  Region: {} vertices, deviation threshold {} nm",
        config.region.vertices.len(),
        config.deviation_threshold_nm
    );
    info!("  Watchlist: {} vessels", config.watchlist.len());

    let monitor = Monitor::new(source, notifier, &config)?;

    if let Some(port) = api_port.or(config.api_port) {
        let handle = monitor.handle();
        tokio::spawn(async move {
            if let Err(e) = seawatch::actions::start_api_server(port, handle).await {
                error!("Operator API server stopped: {:#}", e);
            }
        });
    } else {
        info!("Operator API disabled (no api_port configured)");
    }

    let tasks = monitor.spawn();

    info!("Monitor running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, exiting...");
    tasks.abort();
    Ok(())
}
