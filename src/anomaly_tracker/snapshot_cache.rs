use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::position::PositionReport;

/// Live cache state for one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub latest: PositionReport,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// An entity present in the previous fetch but absent from the current one
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingEntity {
    pub entity_id: String,
    pub last_known: PositionReport,
    pub last_seen: DateTime<Utc>,
    pub missing_at: DateTime<Utc>,
}

/// Result of diffing a fresh fetch against the cache
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiff {
    /// Every entity in the new fetch, in fetch order
    pub current: Vec<CacheEntry>,
    /// Ids seen for the first time (or re-appearing after a gap)
    pub arrivals: Vec<String>,
    pub missing: Vec<MissingEntity>,
}

/// Most recent full position set
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    entries: HashMap<String, CacheEntry>,
    last_fetch: Option<DateTime<Utc>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache with `positions` and report what changed
    ///
    /// Entities not re-seen are dropped, so an entity that comes back later is
    /// stamped as newly first-seen. If the same id appears more than once in a
    /// fetch, the last record wins.
    pub fn update_and_diff(&mut self, positions: Vec<PositionReport>, fetched_at: DateTime<Utc>) -> SnapshotDiff {
        let mut order: Vec<String> = Vec::with_capacity(positions.len());
        let mut fresh: HashMap<String, CacheEntry> = HashMap::with_capacity(positions.len());
        let mut arrivals = Vec::new();

        for report in positions {
            let id = report.entity_id.clone();
            let first_seen = match self.entries.get(&id) {
                Some(previous) => previous.first_seen,
                None => fetched_at,
            };
            let entry = CacheEntry {
                latest: report,
                first_seen,
                last_seen: fetched_at,
            };
            if fresh.insert(id.clone(), entry).is_none() {
                if !self.entries.contains_key(&id) {
                    arrivals.push(id.clone());
                }
                order.push(id);
            }
        }

        let mut missing: Vec<MissingEntity> = self
            .entries
            .drain()
            .filter(|(id, _)| !fresh.contains_key(id))
            .map(|(id, entry)| MissingEntity {
                entity_id: id,
                last_known: entry.latest,
                last_seen: entry.last_seen,
                missing_at: fetched_at,
            })
            .collect();
        missing.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let current = order
            .iter()
            .filter_map(|id| fresh.get(id).cloned())
            .collect();

        self.entries = fresh;
        self.last_fetch = Some(fetched_at);

        SnapshotDiff {
            current,
            arrivals,
            missing,
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&CacheEntry> {
        self.entries.get(entity_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time of the last successful fetch applied to this cache
    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.last_fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn report(id: &str, lon: f64, at: DateTime<Utc>) -> PositionReport {
        PositionReport::new(id, 38.9, lon, 8.0, at)
    }

    #[test]
    fn test_first_fetch_reports_arrivals_and_no_missing() {
        let mut cache = SnapshotCache::new();
        let diff = cache.update_and_diff(vec![report("a", -77.0, t(0)), report("b", -76.9, t(0))], t(0));

        assert_eq!(diff.current.len(), 2);
        assert_eq!(diff.arrivals, vec!["a".to_string(), "b".to_string()]);
        assert!(diff.missing.is_empty());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.last_fetch(), Some(t(0)));
    }

    #[test]
    fn test_absent_entity_reported_missing_exactly_once_with_last_position() {
        let mut cache = SnapshotCache::new();
        cache.update_and_diff(vec![report("a", -77.0, t(0)), report("b", -76.9, t(0))], t(0));
        cache.update_and_diff(vec![report("a", -77.0, t(1)), report("b", -76.8, t(1))], t(1));

        let diff = cache.update_and_diff(vec![report("a", -77.0, t(2))], t(2));
        assert_eq!(diff.missing.len(), 1);
        let missing = &diff.missing[0];
        assert_eq!(missing.entity_id, "b");
        // Position from the cycle before it vanished
        assert_eq!(missing.last_known.longitude, -76.8);
        assert_eq!(missing.last_seen, t(1));
        assert_eq!(missing.missing_at, t(2));
        assert!(cache.get("b").is_none());

        // Not reported again on the next cycle
        let diff = cache.update_and_diff(vec![report("a", -77.0, t(3))], t(3));
        assert!(diff.missing.is_empty());
    }

    #[test]
    fn test_first_seen_preserved_and_last_seen_updated() {
        let mut cache = SnapshotCache::new();
        cache.update_and_diff(vec![report("a", -77.0, t(0))], t(0));
        let diff = cache.update_and_diff(vec![report("a", -76.99, t(1))], t(1));

        assert!(diff.arrivals.is_empty());
        let entry = cache.get("a").unwrap();
        assert_eq!(entry.first_seen, t(0));
        assert_eq!(entry.last_seen, t(1));
        assert_eq!(entry.latest.longitude, -76.99);
    }

    #[test]
    fn test_reappearing_entity_is_first_seen_again() {
        let mut cache = SnapshotCache::new();
        cache.update_and_diff(vec![report("a", -77.0, t(0))], t(0));
        cache.update_and_diff(vec![], t(1));
        let diff = cache.update_and_diff(vec![report("a", -77.0, t(2))], t(2));

        assert_eq!(diff.arrivals, vec!["a".to_string()]);
        assert_eq!(cache.get("a").unwrap().first_seen, t(2));
    }

    #[test]
    fn test_duplicate_ids_last_record_wins() {
        let mut cache = SnapshotCache::new();
        let diff = cache.update_and_diff(
            vec![report("a", -77.0, t(0)), report("a", -76.5, t(0))],
            t(0),
        );
        assert_eq!(diff.current.len(), 1);
        assert_eq!(diff.arrivals.len(), 1);
        assert_eq!(diff.current[0].latest.longitude, -76.5);
    }
}
