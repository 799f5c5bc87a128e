use anyhow::{Context, Result};
use axum::{Router, extract::State, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::info;

/// Initialize Prometheus metrics exporter
/// Returns a handle that can be used to render metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        // Fetch latency buckets: 50ms .. 30s (provider timeouts sit at the top end)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("detection.fetch_duration_seconds".to_string()),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0],
        )
        .context("failed to set buckets for detection.fetch_duration_seconds")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Background task to update process metrics
/// Updates uptime and memory usage metrics every 5 seconds
pub async fn process_metrics_task() {
    let start_time = Instant::now();

    loop {
        metrics::gauge!("process.uptime.seconds").set(start_time.elapsed().as_secs() as f64);
        metrics::gauge!("process.is_up").set(1.0);

        // RSS from procfs (Linux only)
        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
                for line in status.lines() {
                    if line.starts_with("VmRSS:") {
                        if let Some(kb_str) = line.split_whitespace().nth(1)
                            && let Ok(kb) = kb_str.parse::<f64>()
                        {
                            metrics::gauge!("process.memory.bytes").set(kb * 1024.0);
                        }
                        break;
                    }
                }
            }
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Initialize monitor metrics to zero/default values
/// This ensures metrics always appear in Prometheus queries even if no events have occurred
pub fn initialize_monitor_metrics() {
    // Detection cycle
    metrics::counter!("detection.cycles_total").absolute(0);
    metrics::counter!("detection.fetch_failures_total").absolute(0);
    metrics::counter!("detection.skipped_ticks_total").absolute(0);
    metrics::counter!("detection.malformed_reports_total").absolute(0);
    metrics::counter!("detection.missing_entities_total").absolute(0);
    metrics::gauge!("detection.entities_in_region").set(0.0);
    metrics::gauge!("detection.tracked_histories").set(0.0);

    // Alerts
    metrics::counter!("detection.route_deviation_alerts_total").absolute(0);
    metrics::counter!("detection.signal_shutoff_alerts_total").absolute(0);
    metrics::counter!("notification.sent_total").absolute(0);
    metrics::counter!("notification.failed_total").absolute(0);

    // Watchlist
    metrics::counter!("watchlist.refreshes_total").absolute(0);
    metrics::counter!("watchlist.fetch_failures_total").absolute(0);
    metrics::gauge!("watchlist.tracked_entities").set(0.0);
}

/// Router serving `/metrics` from the given handle
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(|State(handle): State<PrometheusHandle>| async move { handle.render() }),
        )
        .route("/health", get(|| async { "ok" }))
        .with_state(handle)
}

/// Start a standalone metrics server on the specified port
/// The recorder must already be installed (see [`init_metrics`]) so that metrics
/// zeroed at startup are rendered from the first scrape.
pub async fn start_metrics_server(port: u16, handle: PrometheusHandle) -> Result<()> {
    tokio::spawn(process_metrics_task());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {}", addr))?;

    axum::serve(listener, metrics_router(handle))
        .await
        .context("Metrics server failed")
}
