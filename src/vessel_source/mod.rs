mod datalastic;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::position::{PositionReport, normalize_report};

pub use datalastic::DatalasticClient;

/// Positions returned by one upstream request
#[derive(Debug, Clone, Default)]
pub struct FetchedPositions {
    pub reports: Vec<PositionReport>,
    /// Records dropped by the ingestion adapter as malformed
    pub rejected: usize,
}

impl From<Vec<PositionReport>> for FetchedPositions {
    fn from(reports: Vec<PositionReport>) -> Self {
        Self {
            reports,
            rejected: 0,
        }
    }
}

/// Upstream vessel-position provider
///
/// A transport or provider error is an `Err`, never an empty list: callers rely
/// on the difference to keep their last good snapshot.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Current positions for the monitored fleet
    async fn fetch_positions(&self) -> Result<FetchedPositions>;

    /// Current positions for specific entity ids (operator watchlist)
    async fn fetch_entities(&self, entity_ids: &[String]) -> Result<FetchedPositions>;
}

#[async_trait]
impl<T: PositionSource + ?Sized> PositionSource for Arc<T> {
    async fn fetch_positions(&self) -> Result<FetchedPositions> {
        (**self).fetch_positions().await
    }

    async fn fetch_entities(&self, entity_ids: &[String]) -> Result<FetchedPositions> {
        (**self).fetch_entities(entity_ids).await
    }
}

/// Pull the vessel records out of a provider response
///
/// Accepts a bare array, a `{"data": [...]}` envelope, or a `{"data": {...}}`
/// single-vessel envelope.
pub(crate) fn extract_records(response: Value) -> Result<Vec<Value>> {
    match response {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(records)) => Ok(records),
            Some(record @ Value::Object(_)) => Ok(vec![record]),
            Some(Value::Null) | None => Err(anyhow!("response has no vessel data")),
            Some(other) => Err(anyhow!("unexpected vessel data: {}", other)),
        },
        other => Err(anyhow!("unexpected response shape: {}", other)),
    }
}

/// Run every record through the ingestion adapter, skipping malformed ones
pub(crate) fn normalize_records(records: &[Value], fetched_at: DateTime<Utc>) -> FetchedPositions {
    let mut fetched = FetchedPositions::default();
    for record in records {
        match normalize_report(record, fetched_at) {
            Ok(report) => fetched.reports.push(report),
            Err(e) => {
                warn!("Skipping malformed vessel record: {}", e);
                fetched.rejected += 1;
            }
        }
    }
    fetched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_bare_array() {
        let records = extract_records(json!([{ "mmsi": "1" }, { "mmsi": "2" }])).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_extract_envelopes() {
        let records =
            extract_records(json!({ "data": [{ "mmsi": "1" }], "meta": { "success": true } }))
                .unwrap();
        assert_eq!(records.len(), 1);

        let records = extract_records(json!({ "data": { "mmsi": "1" } })).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_extract_rejects_unexpected_shapes() {
        assert!(extract_records(json!({ "error": "quota exceeded" })).is_err());
        assert!(extract_records(json!("nope")).is_err());
        assert!(extract_records(json!({ "data": 3 })).is_err());
    }

    #[test]
    fn test_empty_list_is_not_an_error() {
        assert!(extract_records(json!({ "data": [] })).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_skips_malformed() {
        let records = vec![
            json!({ "mmsi": "1", "lat": 38.9, "lon": -77.0, "speed": 4.0 }),
            json!({ "mmsi": "2", "lat": 38.9 }),
            json!({ "lat": 38.9, "lon": -77.0 }),
        ];
        let fetched = normalize_records(&records, Utc::now());
        assert_eq!(fetched.reports.len(), 1);
        assert_eq!(fetched.reports[0].entity_id, "1");
        assert_eq!(fetched.rejected, 2);
    }
}
