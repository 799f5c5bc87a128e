use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::position::PositionReport;

/// Default number of recent positions kept per entity
pub const DEFAULT_TRACK_CAPACITY: usize = 5;

/// Recent positions for one entity, oldest first
#[derive(Debug, Clone)]
struct TrackHistory {
    positions: VecDeque<PositionReport>,
    /// Local clock time of the last cycle whose fetch contained this entity
    last_seen: Option<DateTime<Utc>>,
}

/// Per-entity bounded history of recent positions
#[derive(Debug, Clone)]
pub struct TrackStore {
    capacity: usize,
    tracks: HashMap<String, TrackHistory>,
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRACK_CAPACITY)
    }
}

impl TrackStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tracks: HashMap::new(),
        }
    }

    /// Append a position to the entity's history, evicting the oldest beyond capacity
    pub fn observe(&mut self, entity_id: &str, position: PositionReport) {
        let capacity = self.capacity;
        let track = self
            .tracks
            .entry(entity_id.to_string())
            .or_insert_with(|| TrackHistory {
                positions: VecDeque::with_capacity(capacity),
                last_seen: None,
            });

        if track.positions.len() >= capacity {
            track.positions.pop_front();
        }
        track.positions.push_back(position);
    }

    /// Stamp every listed entity that has a history as seen at `now`
    pub fn mark_seen<'a>(&mut self, entity_ids: impl IntoIterator<Item = &'a str>, now: DateTime<Utc>) {
        for entity_id in entity_ids {
            if let Some(track) = self.tracks.get_mut(entity_id) {
                track.last_seen = Some(now);
            }
        }
    }

    /// Ordered history for an entity (oldest first); empty if never seen
    pub fn history_of(&self, entity_id: &str) -> Vec<PositionReport> {
        self.tracks
            .get(entity_id)
            .map(|t| t.positions.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, entity_id: &str) -> Option<&PositionReport> {
        self.tracks.get(entity_id)?.positions.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entities with any history
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Keep only histories whose entity passes `keep`; returns how many were removed
    pub fn retain_entities(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|entity_id, _| keep(entity_id));
        before - self.tracks.len()
    }

    /// Drop histories not seen by any cycle within `retention`; returns how many were removed
    ///
    /// Age is measured from [`TrackStore::mark_seen`], not from the provider's fix
    /// time. Histories that were never marked are kept.
    pub fn reap_older_than(&mut self, retention: chrono::Duration, now: DateTime<Utc>) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|entity_id, track| {
            let Some(last_seen) = track.last_seen else {
                return true;
            };
            let age = now.signed_duration_since(last_seen);
            if age > retention {
                debug!(
                    "Reaping track for {} (last seen {} minutes ago)",
                    entity_id,
                    age.num_minutes()
                );
                return false;
            }
            true
        });
        before - self.tracks.len()
    }
}
