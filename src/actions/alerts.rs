use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::actions::{DataListResponse, json_error};
use crate::anomaly_tracker::AnomalyKind;
use crate::monitor::MonitorHandle;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaisedAlert {
    pub kind: AnomalyKind,
    pub entity_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRecipientsRequest {
    pub emails: Vec<String>,
}

/// GET /api/alerts - Alerts raised and not yet cleared
pub async fn list_alerts(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    let data: Vec<RaisedAlert> = handle
        .alerts()
        .into_iter()
        .map(|(kind, entity_id)| RaisedAlert { kind, entity_id })
        .collect();
    Json(DataListResponse { data })
}

/// DELETE /api/alerts - Re-arm every alert
pub async fn reset_alerts(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    handle.reset_alerts();
    StatusCode::NO_CONTENT
}

/// DELETE /api/alerts/{kind}/{mmsi} - Re-arm one alert
pub async fn clear_alert(
    State(handle): State<MonitorHandle>,
    Path((kind, mmsi)): Path<(String, String)>,
) -> impl IntoResponse {
    let kind: AnomalyKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, format!("{}", e)).into_response(),
    };

    if handle.clear_alert(kind, &mmsi) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        json_error(StatusCode::NOT_FOUND, "No such alert").into_response()
    }
}

/// GET /api/recipients
pub async fn get_recipients(State(handle): State<MonitorHandle>) -> impl IntoResponse {
    Json(DataListResponse {
        data: handle.recipients().await,
    })
}

/// PUT /api/recipients - Replace the alert recipient list
pub async fn set_recipients(
    State(handle): State<MonitorHandle>,
    Json(req): Json<SetRecipientsRequest>,
) -> impl IntoResponse {
    Json(DataListResponse {
        data: handle.set_recipients(req.emails).await,
    })
}
