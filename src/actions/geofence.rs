use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;

use crate::actions::{DataResponse, json_error};
use crate::monitor::MonitorHandle;

#[derive(Debug, Deserialize)]
pub struct SetGeofenceRequest {
    /// `[lat, lon]` pairs
    pub coordinates: Vec<[f64; 2]>,
}

/// GET /api/geofence - Active monitoring region
pub async fn get_geofence(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    Json(DataResponse {
        data: handle.region().await,
    })
}

/// POST /api/geofence - Replace the region; applies from the next tick
pub async fn set_geofence(
    State(handle): State<MonitorHandle>,
    Json(req): Json<SetGeofenceRequest>,
) -> impl IntoResponse {
    let vertices: Vec<(f64, f64)> = req.coordinates.iter().map(|c| (c[0], c[1])).collect();

    match handle.set_region(&vertices).await {
        Ok(definition) => {
            (StatusCode::CREATED, Json(DataResponse { data: definition })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Rejected geofence update");
            json_error(StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}
