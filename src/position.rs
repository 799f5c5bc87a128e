//! Vessel position reports and the ingestion adapter
//!
//! Upstream providers use several property names for the same concept (`lat` vs
//! `latitude`, `mmsi` vs `uuid`, ...). [`normalize_report`] folds them into the
//! single [`PositionReport`] shape so nothing downstream has to care.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single vessel position, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    /// Stable, non-empty entity identifier (MMSI)
    pub entity_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground in knots, never negative
    pub speed_knots: f64,
    /// Course over ground in degrees [0, 360)
    pub course_degrees: Option<f64>,
    pub observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "VesselMetadata::is_empty")]
    pub metadata: VesselMetadata,
}

/// Descriptive fields passed through from the provider unmodified
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselMetadata {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub vessel_type: Option<String>,
}

impl VesselMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.destination.is_none() && self.vessel_type.is_none()
    }
}

impl PositionReport {
    pub fn new(
        entity_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        speed_knots: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            latitude,
            longitude,
            speed_knots,
            course_degrees: None,
            observed_at,
            metadata: VesselMetadata::default(),
        }
    }

    pub fn with_course(mut self, course_degrees: f64) -> Self {
        self.course_degrees = Some(course_degrees);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = Some(name.into());
        self
    }

    pub fn observed_at_epoch_millis(&self) -> i64 {
        self.observed_at.timestamp_millis()
    }

    /// Name for display: vessel name when known, otherwise the MMSI
    pub fn display_name(&self) -> String {
        match self.metadata.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{} ({})", name, self.entity_id),
            _ => self.entity_id.clone(),
        }
    }

    /// Check the invariants a report must satisfy to enter the detection core
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.entity_id.trim().is_empty() {
            return Err(IngestError::MissingField("entity id"));
        }
        check_coordinate("latitude", self.latitude, 90.0)?;
        check_coordinate("longitude", self.longitude, 180.0)?;
        if !self.speed_knots.is_finite() || self.speed_knots < 0.0 {
            return Err(IngestError::InvalidValue {
                field: "speed",
                value: self.speed_knots.to_string(),
            });
        }
        Ok(())
    }
}

/// Why an upstream record could not become a [`PositionReport`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("record is missing {0}")]
    MissingField(&'static str),
    #[error("record has invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

fn check_coordinate(field: &'static str, value: f64, limit: f64) -> Result<(), IngestError> {
    if !value.is_finite() || value.abs() > limit {
        return Err(IngestError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

const ID_KEYS: &[&str] = &["mmsi", "uuid", "id", "entityId"];
const LATITUDE_KEYS: &[&str] = &["lat", "latitude"];
const LONGITUDE_KEYS: &[&str] = &["lon", "lng", "longitude"];
const SPEED_KEYS: &[&str] = &["speed", "speed_knots", "speedKnots", "sog"];
const COURSE_KEYS: &[&str] = &["course", "cog", "courseDegrees", "heading"];
const TYPE_KEYS: &[&str] = &["type", "type_specific", "vessel_type"];

/// Build a [`PositionReport`] from one provider record
///
/// `fetched_at` stands in for the observation time when the record carries none.
pub fn normalize_report(record: &Value, fetched_at: DateTime<Utc>) -> Result<PositionReport, IngestError> {
    let entity_id = first_string(record, ID_KEYS)
        .filter(|id| !id.trim().is_empty())
        .ok_or(IngestError::MissingField("entity id"))?;

    let latitude =
        first_number(record, LATITUDE_KEYS)?.ok_or(IngestError::MissingField("latitude"))?;
    let longitude =
        first_number(record, LONGITUDE_KEYS)?.ok_or(IngestError::MissingField("longitude"))?;

    // Providers omit speed for vessels that have not reported motion
    let speed_knots = first_number(record, SPEED_KEYS)?.unwrap_or(0.0).max(0.0);

    let course_degrees = first_number(record, COURSE_KEYS)
        .ok()
        .flatten()
        .filter(|c| (0.0..=360.0).contains(c))
        .map(|c| c % 360.0);

    let report = PositionReport {
        entity_id: entity_id.trim().to_string(),
        latitude,
        longitude,
        speed_knots,
        course_degrees,
        observed_at: observation_time(record).unwrap_or(fetched_at),
        metadata: VesselMetadata {
            name: first_string(record, &["name"]),
            destination: first_string(record, &["destination"]),
            vessel_type: first_string(record, TYPE_KEYS),
        },
    };
    report.validate()?;
    Ok(report)
}

fn first_string(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First present numeric field; numeric strings are accepted, anything else is an error
fn first_number(record: &Value, keys: &[&str]) -> Result<Option<f64>, IngestError> {
    for key in keys {
        match record.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => return Ok(n.as_f64()),
            Some(Value::String(s)) => {
                return s
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| IngestError::InvalidValue {
                        field: key_field(key),
                        value: s.clone(),
                    });
            }
            Some(other) => {
                return Err(IngestError::InvalidValue {
                    field: key_field(key),
                    value: other.to_string(),
                });
            }
        }
    }
    Ok(None)
}

fn key_field(key: &str) -> &'static str {
    if LATITUDE_KEYS.contains(&key) {
        "latitude"
    } else if LONGITUDE_KEYS.contains(&key) {
        "longitude"
    } else if SPEED_KEYS.contains(&key) {
        "speed"
    } else {
        "course"
    }
}

fn observation_time(record: &Value) -> Option<DateTime<Utc>> {
    if let Some(secs) = record.get("last_position_epoch").and_then(Value::as_i64) {
        return Utc.timestamp_opt(secs, 0).single();
    }
    if let Some(millis) = record
        .get("observed_at_epoch_millis")
        .or_else(|| record.get("observedAtEpochMillis"))
        .and_then(Value::as_i64)
    {
        return Utc.timestamp_millis_opt(millis).single();
    }
    record
        .get("last_position_UTC")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}
