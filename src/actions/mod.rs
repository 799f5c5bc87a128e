//! Operator HTTP API
//!
//! Thin axum handlers over a [`MonitorHandle`]: read the latest snapshot,
//! replace the region, re-arm alerts, edit the watchlist and recipients.

mod alerts;
mod geofence;
mod vessels;
mod watchlist;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get},
};
use serde::Serialize;
use std::net::SocketAddr;
use tracing::info;

use crate::monitor::MonitorHandle;

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct DataListResponse<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> impl IntoResponse {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn api_router(handle: MonitorHandle) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        .route("/api/vessels", get(vessels::list_vessels))
        .route("/api/vessels/{mmsi}", get(vessels::get_vessel))
        .route("/api/anomalies", get(vessels::get_anomalies))
        .route(
            "/api/geofence",
            get(geofence::get_geofence).post(geofence::set_geofence),
        )
        .route(
            "/api/alerts",
            get(alerts::list_alerts).delete(alerts::reset_alerts),
        )
        .route("/api/alerts/{kind}/{mmsi}", delete(alerts::clear_alert))
        .route(
            "/api/recipients",
            get(alerts::get_recipients).put(alerts::set_recipients),
        )
        .route(
            "/api/watchlist",
            get(watchlist::get_watchlist).post(watchlist::add_to_watchlist),
        )
        .route(
            "/api/watchlist/positions",
            get(watchlist::get_tracked_positions),
        )
        .route(
            "/api/watchlist/{mmsi}",
            delete(watchlist::remove_from_watchlist),
        )
        .with_state(handle)
}

/// Serve the operator API until the listener fails
pub async fn start_api_server(port: u16, handle: MonitorHandle) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting operator API on http://{}/api", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind operator API to {}", addr))?;

    axum::serve(listener, api_router(handle))
        .await
        .context("Operator API server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly_tracker::{AnomalyKind, AnomalySnapshot, CacheEntry, SharedState};
    use crate::geofence::GeoRegion;
    use crate::position::PositionReport;
    use crate::watchlist::Watchlist;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    fn handle() -> (MonitorHandle, SharedState) {
        let region = GeoRegion::new(&[(38.4, -77.5), (39.4, -77.5), (39.4, -76.5), (38.4, -76.5)])
            .unwrap();
        let shared = SharedState::new(region, vec!["ops@example.com".to_string()]);
        (
            MonitorHandle::new(shared.clone(), Watchlist::default()),
            shared,
        )
    }

    async fn serve(handle: MonitorHandle) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, api_router(handle)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_vessels_and_lookup_by_mmsi() {
        let (handle, shared) = handle();
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        *shared.snapshot.write().await = AnomalySnapshot {
            entities_in_region: vec![CacheEntry {
                latest: PositionReport::new("366998410", 38.9, -77.0, 9.5, at),
                first_seen: at,
                last_seen: at,
            }],
            last_updated: Some(at),
            ..Default::default()
        };
        let base = serve(handle).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .get(format!("{base}/api/vessels"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["vessels"].as_array().unwrap().len(), 1);

        let found = client
            .get(format!("{base}/api/vessels/366998410"))
            .send()
            .await
            .unwrap();
        assert_eq!(found.status(), 200);

        let missing = client
            .get(format!("{base}/api/vessels/000000000"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn test_geofence_replacement_and_rejection() {
        let (handle, _shared) = handle();
        let base = serve(handle.clone()).await;
        let client = reqwest::Client::new();

        let created = client
            .post(format!("{base}/api/geofence"))
            .json(&json!({ "coordinates": [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]] }))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), 201);
        assert_eq!(handle.region().await.vertices.len(), 5);

        // Collinear points enclose nothing; the previous region stays
        let rejected = client
            .post(format!("{base}/api/geofence"))
            .json(&json!({ "coordinates": [[0.0, 0.0], [0.0, 1.0], [0.0, 2.0]] }))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), 400);
        let body: Value = rejected.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("no area"));
        assert_eq!(handle.region().await.vertices[2], [1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_alerts_can_be_cleared_and_reset() {
        let (handle, shared) = handle();
        shared.ledger.should_alert(AnomalyKind::RouteDeviation, "A");
        shared.ledger.should_alert(AnomalyKind::SignalShutoff, "B");
        let base = serve(handle).await;
        let client = reqwest::Client::new();

        let cleared = client
            .delete(format!("{base}/api/alerts/route-deviation/A"))
            .send()
            .await
            .unwrap();
        assert_eq!(cleared.status(), 204);
        assert!(!shared.ledger.is_alerted(AnomalyKind::RouteDeviation, "A"));

        let again = client
            .delete(format!("{base}/api/alerts/route-deviation/A"))
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), 404);

        let bad_kind = client
            .delete(format!("{base}/api/alerts/bogus/A"))
            .send()
            .await
            .unwrap();
        assert_eq!(bad_kind.status(), 400);

        let reset = client
            .delete(format!("{base}/api/alerts"))
            .send()
            .await
            .unwrap();
        assert_eq!(reset.status(), 204);
        assert!(!shared.ledger.is_alerted(AnomalyKind::SignalShutoff, "B"));
    }

    #[tokio::test]
    async fn test_watchlist_and_recipients_edits() {
        let (handle, _shared) = handle();
        let base = serve(handle.clone()).await;
        let client = reqwest::Client::new();

        let added = client
            .post(format!("{base}/api/watchlist"))
            .json(&json!({ "mmsi": "366998410" }))
            .send()
            .await
            .unwrap();
        assert_eq!(added.status(), 201);
        assert_eq!(handle.watchlist(), vec!["366998410".to_string()]);

        let blank = client
            .post(format!("{base}/api/watchlist"))
            .json(&json!({ "mmsi": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(blank.status(), 400);

        let removed = client
            .delete(format!("{base}/api/watchlist/366998410"))
            .send()
            .await
            .unwrap();
        assert_eq!(removed.status(), 204);
        assert!(handle.watchlist().is_empty());

        let body: Value = client
            .put(format!("{base}/api/recipients"))
            .json(&json!({ "emails": ["watch@uscg.example", ""] }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["data"], json!(["watch@uscg.example"]));
        assert_eq!(handle.recipients().await, vec!["watch@uscg.example".to_string()]);
    }
}
