mod alert_ledger;
mod anomalies;
mod deviation;
pub(crate) mod geometry;
mod snapshot_cache;
mod track_store;
pub(crate) mod utils;

pub use alert_ledger::{AlertLedger, AnomalyKind};
pub use anomalies::{AlertMessage, AnomalySnapshot, RouteDeviation, SignalShutoff};
pub use deviation::{
    DEFAULT_DEVIATION_THRESHOLD_NM, DEFAULT_STATIONARY_SPEED_KNOTS, DeviationDetector,
    DeviationResult,
};
pub use snapshot_cache::{CacheEntry, MissingEntity, SnapshotCache, SnapshotDiff};
pub use track_store::{DEFAULT_TRACK_CAPACITY, TrackStore};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::geofence::GeoRegion;
use crate::notifier::{Notifier, Recipients};
use crate::vessel_source::{FetchedPositions, PositionSource};

/// Where a detection cycle is within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Diffing,
    Analyzing,
    Dispatching,
}

/// Tunables for the detection pipeline
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub deviation_threshold_nm: f64,
    pub stationary_speed_knots: f64,
    pub track_capacity: usize,
    /// Upstream fetches slower than this count as failures
    pub fetch_timeout: Duration,
    /// Drop track histories not appended to within this window; `None` keeps them forever
    pub track_retention: Option<chrono::Duration>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            deviation_threshold_nm: DEFAULT_DEVIATION_THRESHOLD_NM,
            stationary_speed_knots: DEFAULT_STATIONARY_SPEED_KNOTS,
            track_capacity: DEFAULT_TRACK_CAPACITY,
            fetch_timeout: Duration::from_secs(20),
            track_retention: None,
        }
    }
}

/// State the detection cycle shares with operator requests
///
/// Everything here is behind its own synchronisation; the cycle's caches are not.
#[derive(Debug, Clone)]
pub struct SharedState {
    pub region: Arc<RwLock<GeoRegion>>,
    pub ledger: AlertLedger,
    pub recipients: Recipients,
    pub snapshot: Arc<RwLock<AnomalySnapshot>>,
}

impl SharedState {
    pub fn new(region: GeoRegion, recipients: Vec<String>) -> Self {
        Self {
            region: Arc::new(RwLock::new(region)),
            ledger: AlertLedger::new(),
            recipients: Recipients::new(recipients),
            snapshot: Arc::new(RwLock::new(AnomalySnapshot::default())),
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the upstream fetch failed or timed out; nothing else ran
    pub fetch_error: Option<String>,
    pub entities_fetched: usize,
    pub malformed_reports: usize,
    pub arrivals: usize,
    pub entities_in_region: usize,
    pub missing_entities: usize,
    pub route_deviations: usize,
    pub signal_shutoffs: usize,
    pub alerts_sent: Vec<(AnomalyKind, String)>,
    /// Candidates already in the ledger
    pub alerts_suppressed: usize,
    pub notification_failures: Vec<(AnomalyKind, String, String)>,
    pub tracks_reaped: usize,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.fetch_error.is_none()
    }

    /// Alerts the ledger allowed through, whether or not delivery worked
    pub fn alerts_attempted(&self) -> usize {
        self.alerts_sent.len() + self.notification_failures.len()
    }
}

/// Fetch, diff, analyze and dispatch, one tick at a time
///
/// The cycle exclusively owns its snapshot cache and track store. Ticks take
/// `&mut self`, so two ticks of the same cycle can never interleave.
pub struct DetectionCycle {
    source: Arc<dyn PositionSource>,
    notifier: Arc<dyn Notifier>,
    shared: SharedState,
    detector: DeviationDetector,
    fetch_timeout: Duration,
    track_retention: Option<chrono::Duration>,
    cache: SnapshotCache,
    tracks: TrackStore,
    phase: CyclePhase,
}

impl DetectionCycle {
    pub fn new(
        source: Arc<dyn PositionSource>,
        notifier: Arc<dyn Notifier>,
        shared: SharedState,
        settings: DetectionSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            shared,
            detector: DeviationDetector::new(
                settings.deviation_threshold_nm,
                settings.stationary_speed_knots,
            ),
            fetch_timeout: settings.fetch_timeout,
            track_retention: settings.track_retention,
            cache: SnapshotCache::new(),
            tracks: TrackStore::new(settings.track_capacity),
            phase: CyclePhase::Idle,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub async fn run_tick(&mut self) -> CycleReport {
        self.run_tick_at(Utc::now()).await
    }

    /// Run one full tick, stamping cache entries with `now`
    pub async fn run_tick_at(&mut self, now: DateTime<Utc>) -> CycleReport {
        counter!("detection.cycles_total").increment(1);
        let mut report = CycleReport {
            started_at: Some(now),
            ..Default::default()
        };

        self.phase = CyclePhase::Fetching;
        let fetched = match self.fetch().await {
            Ok(fetched) => fetched,
            Err(reason) => {
                warn!("Position fetch failed, keeping previous snapshot: {}", reason);
                counter!("detection.fetch_failures_total").increment(1);
                report.fetch_error = Some(reason);
                self.phase = CyclePhase::Idle;
                return report;
            }
        };

        self.phase = CyclePhase::Diffing;
        report.entities_fetched = fetched.reports.len();
        report.malformed_reports = fetched.rejected;
        let mut accepted = Vec::with_capacity(fetched.reports.len());
        for position in fetched.reports {
            match position.validate() {
                Ok(()) => accepted.push(position),
                Err(e) => {
                    warn!("Skipping report for '{}': {}", position.entity_id, e);
                    report.malformed_reports += 1;
                }
            }
        }
        if report.malformed_reports > 0 {
            counter!("detection.malformed_reports_total").increment(report.malformed_reports as u64);
        }
        let diff = self.cache.update_and_diff(accepted, now);
        report.arrivals = diff.arrivals.len();
        report.missing_entities = diff.missing.len();
        let missing = diff.missing.clone();
        let present: Vec<String> = diff
            .current
            .iter()
            .map(|entry| entry.latest.entity_id.clone())
            .collect();

        self.phase = CyclePhase::Analyzing;
        // One region for the whole tick; a replacement applies from the next tick
        let region = self.shared.region.read().await.clone();
        let (deviations, shutoffs, in_region) = self.analyze(&region, diff);
        self.tracks.mark_seen(present.iter().map(String::as_str), now);
        report.entities_in_region = in_region.len();
        report.route_deviations = deviations.len();
        report.signal_shutoffs = shutoffs.len();

        self.phase = CyclePhase::Dispatching;
        let messages: Vec<AlertMessage> = deviations
            .iter()
            .map(RouteDeviation::alert_message)
            .chain(shutoffs.iter().map(SignalShutoff::alert_message))
            .collect();
        if !messages.is_empty() {
            let recipients = self.shared.recipients.get().await;
            for message in &messages {
                self.dispatch(message, &recipients, &mut report).await;
            }
        }

        *self.shared.snapshot.write().await = AnomalySnapshot {
            entities_in_region: in_region,
            missing,
            route_deviations: deviations,
            signal_shutoffs: shutoffs,
            last_updated: Some(now),
        };

        if let Some(retention) = self.track_retention {
            report.tracks_reaped = self.tracks.reap_older_than(retention, now);
            if report.tracks_reaped > 0 {
                info!("Reaped {} stale vessel tracks", report.tracks_reaped);
            }
        }

        utils::update_detection_metrics(&report, self.tracks.len());
        self.phase = CyclePhase::Idle;

        info!(
            "Detection tick: {} fetched, {} in region, {} missing, {} deviations, {} shutoffs, {} alerts sent",
            report.entities_fetched,
            report.entities_in_region,
            report.missing_entities,
            report.route_deviations,
            report.signal_shutoffs,
            report.alerts_sent.len()
        );
        report
    }

    async fn fetch(&self) -> Result<FetchedPositions, String> {
        let start = std::time::Instant::now();
        let result = tokio::time::timeout(self.fetch_timeout, self.source.fetch_positions()).await;
        histogram!("detection.fetch_duration_seconds").record(start.elapsed().as_secs_f64());
        match result {
            Ok(Ok(fetched)) => Ok(fetched),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(_) => Err(format!(
                "upstream fetch timed out after {}s",
                self.fetch_timeout.as_secs_f64()
            )),
        }
    }

    /// Geofence filter, deviation pass and shutoff classification
    fn analyze(
        &mut self,
        region: &GeoRegion,
        diff: SnapshotDiff,
    ) -> (Vec<RouteDeviation>, Vec<SignalShutoff>, Vec<CacheEntry>) {
        let in_region: Vec<CacheEntry> = diff
            .current
            .into_iter()
            .filter(|entry| region.contains(entry.latest.latitude, entry.latest.longitude))
            .collect();

        let mut deviations = Vec::new();
        for entry in &in_region {
            let position = &entry.latest;
            let result = self.detector.evaluate(&mut self.tracks, position);
            if let Some(distance_nm) = result.distance_nautical_miles
                && result.has_deviated
            {
                debug!(
                    "{} is {:.2} nm off its recent track",
                    position.entity_id, distance_nm
                );
                deviations.push(RouteDeviation {
                    position: position.clone(),
                    distance_nm,
                    threshold_nm: self.detector.threshold_nm(),
                    expected_route: self
                        .tracks
                        .history_of(&position.entity_id)
                        .iter()
                        .map(|p| [p.latitude, p.longitude])
                        .collect(),
                });
            }
        }

        // Vessels that left the region before going dark are not our concern
        let shutoffs = diff
            .missing
            .into_iter()
            .filter(|missing| {
                region.contains(missing.last_known.latitude, missing.last_known.longitude)
            })
            .map(SignalShutoff::from)
            .collect();

        (deviations, shutoffs, in_region)
    }

    async fn dispatch(&self, message: &AlertMessage, recipients: &[String], report: &mut CycleReport) {
        if !self.shared.ledger.should_alert(message.kind, &message.entity_id) {
            debug!(
                "{} alert for {} already raised, not re-sending",
                message.kind, message.entity_id
            );
            report.alerts_suppressed += 1;
            return;
        }

        match message.kind {
            AnomalyKind::RouteDeviation => {
                counter!("detection.route_deviation_alerts_total").increment(1)
            }
            AnomalyKind::SignalShutoff => counter!("detection.signal_shutoff_alerts_total").increment(1),
        }

        // The ledger mark stays even if delivery fails; an operator clear re-arms it
        match self
            .notifier
            .send(&message.subject, &message.body, recipients)
            .await
        {
            Ok(()) => {
                counter!("notification.sent_total").increment(1);
                info!("Sent {} alert for {}", message.kind, message.entity_id);
                report
                    .alerts_sent
                    .push((message.kind, message.entity_id.clone()));
            }
            Err(e) => {
                counter!("notification.failed_total").increment(1);
                error!(
                    "Failed to send {} alert for {}: {:#}",
                    message.kind, message.entity_id, e
                );
                report.notification_failures.push((
                    message.kind,
                    message.entity_id.clone(),
                    format!("{:#}", e),
                ));
            }
        }
    }
}
