//! Scheduler and operator control surface
//!
//! [`Monitor`] owns the detection cycle and the watchlist poller and drives
//! each from its own interval timer. [`MonitorHandle`] is the cloneable
//! operator view onto the state those loops share.

use anyhow::Result;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, info, warn};

use crate::anomaly_tracker::{
    AnomalyKind, AnomalySnapshot, CacheEntry, DetectionCycle, SharedState,
};
use crate::config::MonitorConfig;
use crate::geofence::{GeoRegion, RegionDefinition, RegionError};
use crate::notifier::Notifier;
use crate::vessel_source::PositionSource;
use crate::watchlist::{TrackedVessel, Watchlist, WatchlistPoller};

/// Cloneable operator handle onto a running monitor
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    shared: SharedState,
    watchlist: Watchlist,
}

impl MonitorHandle {
    pub fn new(shared: SharedState, watchlist: Watchlist) -> Self {
        Self { shared, watchlist }
    }

    /// Replace the monitored region; on error the current region stays active
    ///
    /// Track history is untouched. Entities are re-evaluated against the new
    /// region from the next detection tick.
    pub async fn set_region(&self, vertices: &[(f64, f64)]) -> Result<RegionDefinition, RegionError> {
        let region = GeoRegion::new(vertices)?;
        let definition = RegionDefinition::from(&region);
        *self.shared.region.write().await = region;
        info!(
            "Monitoring region replaced ({} vertices)",
            definition.vertices.len()
        );
        Ok(definition)
    }

    pub async fn region(&self) -> RegionDefinition {
        RegionDefinition::from(&*self.shared.region.read().await)
    }

    /// Result of the last successful detection tick
    pub async fn anomaly_snapshot(&self) -> AnomalySnapshot {
        self.shared.snapshot.read().await.clone()
    }

    /// Latest in-region state for one entity, falling back to the watchlist
    pub async fn entity(&self, entity_id: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.shared.snapshot.read().await.entity(entity_id) {
            return Some(entry.clone());
        }
        self.watchlist
            .positions()
            .await
            .into_iter()
            .find(|v| v.entry.latest.entity_id == entity_id)
            .map(|v| v.entry)
    }

    /// Re-arm one alert; true if it had been raised
    pub fn clear_alert(&self, kind: AnomalyKind, entity_id: &str) -> bool {
        let cleared = self.shared.ledger.clear(kind, entity_id);
        if cleared {
            info!("Cleared {} alert for {}", kind, entity_id);
        }
        cleared
    }

    pub fn reset_alerts(&self) {
        self.shared.ledger.reset_all();
        info!("All alerts re-armed");
    }

    /// Raised alerts, sorted
    pub fn alerts(&self) -> Vec<(AnomalyKind, String)> {
        self.shared.ledger.entries()
    }

    pub fn watch(&self, entity_id: &str) -> bool {
        self.watchlist.add(entity_id)
    }

    pub fn unwatch(&self, entity_id: &str) -> bool {
        self.watchlist.remove(entity_id)
    }

    pub fn watchlist(&self) -> Vec<String> {
        self.watchlist.ids()
    }

    pub async fn tracked_positions(&self) -> Vec<TrackedVessel> {
        self.watchlist.positions().await
    }

    /// Replace the alert recipients; returns the list actually stored
    pub async fn set_recipients(&self, recipients: Vec<String>) -> Vec<String> {
        let stored = self.shared.recipients.replace(recipients).await;
        info!("Alert recipients updated ({} addresses)", stored.len());
        stored
    }

    pub async fn recipients(&self) -> Vec<String> {
        self.shared.recipients.get().await
    }
}

/// Join handles for the two background loops
pub struct MonitorTasks {
    pub detection: JoinHandle<()>,
    pub watchlist: JoinHandle<()>,
}

impl MonitorTasks {
    pub fn abort(&self) {
        self.detection.abort();
        self.watchlist.abort();
    }
}

/// Detection cycle plus watchlist poller, ready to be scheduled
pub struct Monitor {
    cycle: DetectionCycle,
    poller: WatchlistPoller,
    poll_interval: Duration,
    watchlist_interval: Duration,
    handle: MonitorHandle,
}

impl Monitor {
    /// Wire a monitor from configuration
    pub fn new(
        source: Arc<dyn PositionSource>,
        notifier: Arc<dyn Notifier>,
        config: &MonitorConfig,
    ) -> Result<Self> {
        let shared = SharedState::new(config.region()?, config.recipients.clone());
        let watchlist = Watchlist::new(config.watchlist.iter().cloned());
        let cycle = DetectionCycle::new(
            source.clone(),
            notifier,
            shared,
            config.detection_settings(),
        );
        let poller = WatchlistPoller::new(
            source,
            watchlist,
            config.track_capacity,
            config.fetch_timeout(),
        );
        Ok(Self::from_parts(
            cycle,
            poller,
            config.poll_interval(),
            config.watchlist_interval(),
        ))
    }

    pub fn from_parts(
        cycle: DetectionCycle,
        poller: WatchlistPoller,
        poll_interval: Duration,
        watchlist_interval: Duration,
    ) -> Self {
        let handle = MonitorHandle::new(cycle.shared().clone(), poller.watchlist().clone());
        Self {
            cycle,
            poller,
            poll_interval,
            watchlist_interval,
            handle,
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Start both loops; the first tick of each runs immediately
    pub fn spawn(self) -> MonitorTasks {
        let detection = tokio::spawn(
            detection_loop(self.cycle, self.poll_interval)
                .instrument(tracing::info_span!("detection_cycle")),
        );
        let watchlist = tokio::spawn(
            watchlist_loop(self.poller, self.watchlist_interval)
                .instrument(tracing::info_span!("watchlist_refresh")),
        );
        info!(
            "Started monitor (detection every {}s, watchlist every {}s)",
            self.poll_interval.as_secs(),
            self.watchlist_interval.as_secs()
        );
        MonitorTasks {
            detection,
            watchlist,
        }
    }
}

/// Each loop owns its state and awaits a tick to completion before asking for
/// the next one; ticks that came due meanwhile are dropped, not queued.
fn skipping_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Deadlines that came due during a tick of length `elapsed` and will never fire.
/// Under `Skip` the first overdue deadline still fires late, so it is not counted.
fn missed_ticks(elapsed: Duration, period: Duration) -> u64 {
    if period.is_zero() {
        return 0;
    }
    let due = elapsed.as_nanos() / period.as_nanos();
    due.saturating_sub(1) as u64
}

async fn detection_loop(mut cycle: DetectionCycle, period: Duration) {
    let mut interval = skipping_interval(period);
    loop {
        interval.tick().await;
        let started = Instant::now();
        cycle.run_tick().await;

        let skipped = missed_ticks(started.elapsed(), period);
        if skipped > 0 {
            warn!(
                "Detection tick took {:.1}s, skipping {} scheduled tick(s)",
                started.elapsed().as_secs_f64(),
                skipped
            );
            counter!("detection.skipped_ticks_total").increment(skipped);
        }
    }
}

async fn watchlist_loop(mut poller: WatchlistPoller, period: Duration) {
    let mut interval = skipping_interval(period);
    loop {
        interval.tick().await;
        // Failures are logged and counted inside; the previous state stays published
        let _ = poller.run_refresh().await;
    }
}
