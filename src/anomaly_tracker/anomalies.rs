use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alert_ledger::AnomalyKind;
use super::snapshot_cache::{CacheEntry, MissingEntity};
use crate::email::html_escape;
use crate::position::PositionReport;

/// A vessel whose latest position fell off its recent track
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDeviation {
    pub position: PositionReport,
    pub distance_nm: f64,
    pub threshold_nm: f64,
    /// Track the position was measured against, oldest first
    pub expected_route: Vec<[f64; 2]>,
}

/// A vessel that stopped reporting while inside the watched region
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalShutoff {
    pub last_known: PositionReport,
    pub last_seen: DateTime<Utc>,
    pub missing_at: DateTime<Utc>,
}

impl From<MissingEntity> for SignalShutoff {
    fn from(missing: MissingEntity) -> Self {
        Self {
            last_known: missing.last_known,
            last_seen: missing.last_seen,
            missing_at: missing.missing_at,
        }
    }
}

/// Subject and HTML body handed to the notifier
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub kind: AnomalyKind,
    pub entity_id: String,
    pub subject: String,
    pub body: String,
}

fn format_course(course: Option<f64>) -> String {
    course
        .map(|c| format!("{:.0}&deg;", c))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

impl RouteDeviation {
    pub fn entity_id(&self) -> &str {
        &self.position.entity_id
    }

    pub fn alert_message(&self) -> AlertMessage {
        let p = &self.position;
        let name = html_escape(&p.display_name());
        let body = format!(
            "<p>Vessel <strong>{name}</strong> has deviated {distance:.1} nm from its recent track \
             (threshold {threshold:.1} nm).</p>\n\
             <ul>\n\
             <li>Position: {lat:.4}, {lon:.4}</li>\n\
             <li>Speed: {speed:.1} kn</li>\n\
             <li>Course: {course}</li>\n\
             <li>Destination: {destination}</li>\n\
             <li>Observed: {observed}</li>\n\
             </ul>",
            name = name,
            distance = self.distance_nm,
            threshold = self.threshold_nm,
            lat = p.latitude,
            lon = p.longitude,
            speed = p.speed_knots,
            course = format_course(p.course_degrees),
            destination = html_escape(p.metadata.destination.as_deref().unwrap_or("Unknown")),
            observed = format_time(&p.observed_at),
        );

        AlertMessage {
            kind: AnomalyKind::RouteDeviation,
            entity_id: p.entity_id.clone(),
            subject: format!("Route Deviation - {}", p.display_name()),
            body,
        }
    }
}

impl SignalShutoff {
    pub fn entity_id(&self) -> &str {
        &self.last_known.entity_id
    }

    pub fn alert_message(&self) -> AlertMessage {
        let p = &self.last_known;
        let body = format!(
            "<p>Vessel <strong>{name}</strong> stopped reporting its position inside the monitored area.</p>\n\
             <ul>\n\
             <li>Last known position: {lat:.4}, {lon:.4}</li>\n\
             <li>Last speed: {speed:.1} kn</li>\n\
             <li>Last course: {course}</li>\n\
             <li>Last seen: {last_seen}</li>\n\
             <li>Detected missing: {missing_at}</li>\n\
             </ul>",
            name = html_escape(&p.display_name()),
            lat = p.latitude,
            lon = p.longitude,
            speed = p.speed_knots,
            course = format_course(p.course_degrees),
            last_seen = format_time(&self.last_seen),
            missing_at = format_time(&self.missing_at),
        );

        AlertMessage {
            kind: AnomalyKind::SignalShutoff,
            entity_id: p.entity_id.clone(),
            subject: format!("AIS Signal Shutoff - {}", p.display_name()),
            body,
        }
    }
}

/// Result of the most recent successful detection tick
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalySnapshot {
    pub entities_in_region: Vec<CacheEntry>,
    pub missing: Vec<MissingEntity>,
    pub route_deviations: Vec<RouteDeviation>,
    pub signal_shutoffs: Vec<SignalShutoff>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl AnomalySnapshot {
    pub fn entity(&self, entity_id: &str) -> Option<&CacheEntry> {
        self.entities_in_region
            .iter()
            .find(|e| e.latest.entity_id == entity_id)
    }

    pub fn anomaly_count(&self) -> usize {
        self.route_deviations.len() + self.signal_shutoffs.len()
    }
}
