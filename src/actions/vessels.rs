use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::actions::{DataResponse, json_error};
use crate::anomaly_tracker::CacheEntry;
use crate::monitor::MonitorHandle;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselListResponse {
    pub vessels: Vec<CacheEntry>,
    pub count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// GET /api/vessels - Vessels inside the region as of the last tick
pub async fn list_vessels(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    let snapshot = handle.anomaly_snapshot().await;
    let count = snapshot.entities_in_region.len();
    Json(VesselListResponse {
        vessels: snapshot.entities_in_region,
        count,
        last_updated: snapshot.last_updated,
    })
}

/// GET /api/vessels/{mmsi} - One vessel, from the region or the watchlist
pub async fn get_vessel(
    State(handle): State<MonitorHandle>,
    Path(mmsi): Path<String>,
) -> impl IntoResponse {
    match handle.entity(&mmsi).await {
        Some(entry) => Json(DataResponse { data: entry }).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Vessel not found").into_response(),
    }
}

/// GET /api/anomalies - Full result of the last successful tick
pub async fn get_anomalies(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    Json(DataResponse {
        data: handle.anomaly_snapshot().await,
    })
}
