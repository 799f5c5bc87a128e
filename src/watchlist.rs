//! Operator watchlist
//!
//! Explicitly tracked vessels are refreshed on their own timer and cached the
//! same way as the monitored fleet, but never pass through the geofence or the
//! anomaly pipeline.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::anomaly_tracker::{CacheEntry, SnapshotCache, TrackStore};
use crate::position::PositionReport;
use crate::vessel_source::PositionSource;

/// Latest state of one watched vessel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedVessel {
    #[serde(flatten)]
    pub entry: CacheEntry,
    /// Recent positions, oldest first
    pub history: Vec<PositionReport>,
}

/// Set of entity ids an operator asked to follow, plus their last refreshed state
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    ids: Arc<DashSet<String>>,
    positions: Arc<RwLock<Vec<TrackedVessel>>>,
}

impl Watchlist {
    pub fn new<I: IntoIterator<Item = String>>(ids: I) -> Self {
        let watchlist = Self::default();
        for id in ids {
            watchlist.add(&id);
        }
        watchlist
    }

    /// Start following an entity; false if blank or already watched
    pub fn add(&self, entity_id: &str) -> bool {
        let entity_id = entity_id.trim();
        if entity_id.is_empty() {
            return false;
        }
        let added = self.ids.insert(entity_id.to_string());
        gauge!("watchlist.tracked_entities").set(self.ids.len() as f64);
        added
    }

    /// Stop following an entity; its cached state goes on the next refresh
    pub fn remove(&self, entity_id: &str) -> bool {
        let removed = self.ids.remove(entity_id.trim()).is_some();
        gauge!("watchlist.tracked_entities").set(self.ids.len() as f64);
        removed
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.ids.contains(entity_id)
    }

    /// Watched ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().map(|id| id.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// State published by the last successful refresh
    pub async fn positions(&self) -> Vec<TrackedVessel> {
        self.positions.read().await.clone()
    }
}

/// Outcome of one watchlist refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchlistRefresh {
    pub requested: usize,
    pub received: usize,
    /// Watched ids that were reported last refresh but not this one
    pub missing: Vec<String>,
}

/// Refreshes the watchlist; owns its own cache and track history
pub struct WatchlistPoller {
    source: Arc<dyn PositionSource>,
    watchlist: Watchlist,
    cache: SnapshotCache,
    tracks: TrackStore,
    fetch_timeout: Duration,
}

impl WatchlistPoller {
    pub fn new(
        source: Arc<dyn PositionSource>,
        watchlist: Watchlist,
        track_capacity: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            watchlist,
            cache: SnapshotCache::new(),
            tracks: TrackStore::new(track_capacity),
            fetch_timeout,
        }
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    pub async fn run_refresh(&mut self) -> Result<WatchlistRefresh> {
        self.run_refresh_at(Utc::now()).await
    }

    /// Fetch every watched id and publish the result
    ///
    /// On failure the previously published state is left untouched.
    pub async fn run_refresh_at(&mut self, now: DateTime<Utc>) -> Result<WatchlistRefresh> {
        counter!("watchlist.refreshes_total").increment(1);
        let ids = self.watchlist.ids();

        let reports = if ids.is_empty() {
            Vec::new()
        } else {
            let fetched =
                match tokio::time::timeout(self.fetch_timeout, self.source.fetch_entities(&ids)).await {
                    Ok(Ok(fetched)) => fetched,
                    Ok(Err(e)) => {
                        counter!("watchlist.fetch_failures_total").increment(1);
                        warn!("Watchlist refresh failed: {:#}", e);
                        return Err(e.context("watchlist refresh failed"));
                    }
                    Err(_) => {
                        counter!("watchlist.fetch_failures_total").increment(1);
                        warn!("Watchlist refresh timed out");
                        return Err(anyhow!(
                            "watchlist refresh timed out after {}s",
                            self.fetch_timeout.as_secs_f64()
                        ));
                    }
                };
            // An id removed while the request was in flight is not re-published
            fetched
                .reports
                .into_iter()
                .filter(|report| report.validate().is_ok() && self.watchlist.contains(&report.entity_id))
                .collect()
        };

        let diff = self.cache.update_and_diff(reports, now);
        let pruned = self
            .tracks
            .retain_entities(|entity_id| self.watchlist.contains(entity_id));
        if pruned > 0 {
            debug!("Dropped {} track histories for unwatched vessels", pruned);
        }
        let mut published = Vec::with_capacity(diff.current.len());
        for entry in diff.current {
            self.tracks.observe(&entry.latest.entity_id, entry.latest.clone());
            published.push(TrackedVessel {
                history: self.tracks.history_of(&entry.latest.entity_id),
                entry,
            });
        }

        let refresh = WatchlistRefresh {
            requested: ids.len(),
            received: published.len(),
            missing: diff.missing.into_iter().map(|m| m.entity_id).collect(),
        };
        if !refresh.missing.is_empty() {
            info!("Watched vessels no longer reporting: {:?}", refresh.missing);
        }
        debug!(
            "Watchlist refresh: {}/{} vessels reported",
            refresh.received, refresh.requested
        );

        *self.watchlist.positions.write().await = published;
        gauge!("watchlist.tracked_entities").set(ids.len() as f64);
        Ok(refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vessel_source::FetchedPositions;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Reports every requested id at a fixed spot, or fails when told to
    struct EchoSource {
        fail: AtomicBool,
    }

    #[async_trait]
    impl PositionSource for EchoSource {
        async fn fetch_positions(&self) -> Result<FetchedPositions> {
            Ok(FetchedPositions::default())
        }

        async fn fetch_entities(&self, entity_ids: &[String]) -> Result<FetchedPositions> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("provider unavailable");
            }
            Ok(entity_ids
                .iter()
                .map(|id| PositionReport::new(id.clone(), 38.9, -77.0, 6.0, Utc::now()))
                .collect::<Vec<_>>()
                .into())
        }
    }

    fn poller(ids: &[&str]) -> (WatchlistPoller, Arc<EchoSource>) {
        let source = Arc::new(EchoSource {
            fail: AtomicBool::new(false),
        });
        let watchlist = Watchlist::new(ids.iter().map(|s| s.to_string()));
        let poller = WatchlistPoller::new(source.clone(), watchlist, 5, Duration::from_secs(5));
        (poller, source)
    }

    #[test]
    fn test_add_and_remove() {
        let watchlist = Watchlist::default();
        assert!(watchlist.add(" 366998410 "));
        assert!(!watchlist.add("366998410"));
        assert!(!watchlist.add("   "));
        assert!(watchlist.contains("366998410"));
        assert!(watchlist.remove("366998410"));
        assert!(!watchlist.remove("366998410"));
        assert!(watchlist.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_publishes_positions_and_history() {
        let (mut poller, _) = poller(&["b", "a"]);
        poller.run_refresh().await.unwrap();
        let refresh = poller.run_refresh().await.unwrap();

        assert_eq!(refresh.requested, 2);
        assert_eq!(refresh.received, 2);
        let positions = poller.watchlist().positions().await;
        assert_eq!(positions.len(), 2);
        assert!(positions.iter().all(|v| v.history.len() == 2));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_state() {
        let (mut poller, source) = poller(&["a"]);
        poller.run_refresh().await.unwrap();

        source.fail.store(true, Ordering::SeqCst);
        assert!(poller.run_refresh().await.is_err());
        assert_eq!(poller.watchlist().positions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unwatched_entity_dropped_on_next_refresh() {
        let (mut poller, _) = poller(&["a", "b"]);
        poller.run_refresh().await.unwrap();

        poller.watchlist().remove("b");
        let refresh = poller.run_refresh().await.unwrap();
        assert_eq!(refresh.missing, vec!["b".to_string()]);
        let positions = poller.watchlist().positions().await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].entry.latest.entity_id, "a");
    }

    #[tokio::test]
    async fn test_unwatched_entity_history_is_released() {
        let (mut poller, _) = poller(&["a", "b"]);
        poller.run_refresh().await.unwrap();
        poller.run_refresh().await.unwrap();
        assert_eq!(poller.tracks().history_of("b").len(), 2);

        poller.watchlist().remove("b");
        poller.run_refresh().await.unwrap();
        assert!(poller.tracks().history_of("b").is_empty());
        assert_eq!(poller.tracks().len(), 1);

        // Watching it again starts a fresh history
        poller.watchlist().add("b");
        poller.run_refresh().await.unwrap();
        assert_eq!(poller.tracks().history_of("b").len(), 1);
        assert_eq!(poller.tracks().history_of("a").len(), 4);
    }
}
