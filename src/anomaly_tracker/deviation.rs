//! Route deviation detection
//!
//! A moving vessel's new position is compared against the polyline through its
//! recent track. Measuring against every segment, not just the last point,
//! tolerates ordinary turns while still catching a jump off the corridor.

use serde::Serialize;

use super::geometry::distance_to_polyline_nm;
use super::track_store::TrackStore;
use crate::position::PositionReport;

/// Default distance from the recent track beyond which a position is a deviation
pub const DEFAULT_DEVIATION_THRESHOLD_NM: f64 = 5.0;

/// Below this speed a vessel is treated as moored and never deviates
pub const DEFAULT_STATIONARY_SPEED_KNOTS: f64 = 1.0;

/// Minimum prior points needed before a track counts as established
const MIN_TRACK_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationResult {
    pub has_deviated: bool,
    /// Present iff `has_deviated`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_nautical_miles: Option<f64>,
}

impl DeviationResult {
    fn on_track() -> Self {
        Self {
            has_deviated: false,
            distance_nautical_miles: None,
        }
    }

    fn deviated(distance_nm: f64) -> Self {
        Self {
            has_deviated: true,
            distance_nautical_miles: Some(distance_nm),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeviationDetector {
    threshold_nm: f64,
    stationary_speed_knots: f64,
}

impl Default for DeviationDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DEVIATION_THRESHOLD_NM, DEFAULT_STATIONARY_SPEED_KNOTS)
    }
}

impl DeviationDetector {
    pub fn new(threshold_nm: f64, stationary_speed_knots: f64) -> Self {
        Self {
            threshold_nm,
            stationary_speed_knots,
        }
    }

    pub fn threshold_nm(&self) -> f64 {
        self.threshold_nm
    }

    /// Decide whether `position` is an outlier relative to the entity's recent track
    ///
    /// Accepted positions are appended to `tracks`; a deviating position is not,
    /// so the established corridor is not dragged toward the outlier.
    pub fn evaluate(&self, tracks: &mut TrackStore, position: &PositionReport) -> DeviationResult {
        if position.speed_knots < self.stationary_speed_knots {
            return DeviationResult::on_track();
        }

        let history = tracks.history_of(&position.entity_id);
        if history.len() >= MIN_TRACK_POINTS {
            let polyline: Vec<(f64, f64)> = history
                .iter()
                .map(|p| (p.latitude, p.longitude))
                .collect();

            if let Some(distance_nm) =
                distance_to_polyline_nm((position.latitude, position.longitude), &polyline)
                && distance_nm > self.threshold_nm
            {
                return DeviationResult::deviated(distance_nm);
            }
        }

        tracks.observe(&position.entity_id, position.clone());
        DeviationResult::on_track()
    }
}
