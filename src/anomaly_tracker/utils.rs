use metrics::{counter, gauge};

use super::CycleReport;

/// Export per-tick detection metrics
/// Called at the end of every successful tick, even when nothing was alerted
pub(crate) fn update_detection_metrics(report: &CycleReport, tracked_entities: usize) {
    gauge!("detection.entities_in_region").set(report.entities_in_region as f64);
    gauge!("detection.tracked_histories").set(tracked_entities as f64);
    if report.missing_entities > 0 {
        counter!("detection.missing_entities_total").increment(report.missing_entities as u64);
    }
}
