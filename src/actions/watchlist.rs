use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use crate::actions::{DataListResponse, json_error};
use crate::monitor::MonitorHandle;

#[derive(Debug, Deserialize)]
pub struct AddToWatchlistRequest {
    pub mmsi: String,
}

/// GET /api/watchlist - Watched vessel ids
pub async fn get_watchlist(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    Json(DataListResponse {
        data: handle.watchlist(),
    })
}

/// POST /api/watchlist - Start following a vessel
pub async fn add_to_watchlist(
    State(handle): State<MonitorHandle>,
    Json(req): Json<AddToWatchlistRequest>,
) -> impl IntoResponse {
    if req.mmsi.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "mmsi is required").into_response();
    }

    let status = if handle.watch(&req.mmsi) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(DataListResponse {
            data: handle.watchlist(),
        }),
    )
        .into_response()
}

/// DELETE /api/watchlist/{mmsi} - Stop following a vessel
pub async fn remove_from_watchlist(
    State(handle): State<MonitorHandle>,
    Path(mmsi): Path<String>,
) -> impl IntoResponse {
    if handle.unwatch(&mmsi) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        json_error(StatusCode::NOT_FOUND, "Vessel is not on the watchlist").into_response()
    }
}

/// GET /api/watchlist/positions - Last refreshed state of watched vessels
pub async fn get_tracked_positions(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    Json(DataListResponse {
        data: handle.tracked_positions().await,
    })
}
