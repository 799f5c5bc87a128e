use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of anomaly an alert was raised for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnomalyKind {
    RouteDeviation,
    SignalShutoff,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::RouteDeviation => write!(f, "route-deviation"),
            AnomalyKind::SignalShutoff => write!(f, "signal-shutoff"),
        }
    }
}

impl std::str::FromStr for AnomalyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "route-deviation" | "routedeviation" | "deviation" => Ok(AnomalyKind::RouteDeviation),
            "signal-shutoff" | "signalshutoff" | "shutoff" | "ais-shutoff" => {
                Ok(AnomalyKind::SignalShutoff)
            }
            other => anyhow::bail!("unknown anomaly kind '{}'", other),
        }
    }
}

/// Deduplicates alerts per (kind, entity) until explicitly cleared
///
/// Cloning shares the same underlying set, so the detection loop and operator
/// clear requests see one ledger. Every operation is a single atomic set
/// operation; there is no separate check followed by a write.
#[derive(Debug, Clone, Default)]
pub struct AlertLedger {
    alerted: Arc<DashSet<(AnomalyKind, String)>>,
}

impl AlertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark (kind, entity) as alerted; true only if it was not already marked
    pub fn should_alert(&self, kind: AnomalyKind, entity_id: &str) -> bool {
        self.alerted.insert((kind, entity_id.to_string()))
    }

    /// Re-arm (kind, entity); true if an entry was present and removed
    pub fn clear(&self, kind: AnomalyKind, entity_id: &str) -> bool {
        self.alerted.remove(&(kind, entity_id.to_string())).is_some()
    }

    pub fn reset_all(&self) {
        self.alerted.clear();
    }

    pub fn is_alerted(&self, kind: AnomalyKind, entity_id: &str) -> bool {
        self.alerted.contains(&(kind, entity_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.alerted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerted.is_empty()
    }

    /// Outstanding entries, sorted for stable display
    pub fn entries(&self) -> Vec<(AnomalyKind, String)> {
        let mut entries: Vec<(AnomalyKind, String)> =
            self.alerted.iter().map(|e| e.key().clone()).collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then((a.0 as u8).cmp(&(b.0 as u8))));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_alert_true_exactly_once_until_cleared() {
        let ledger = AlertLedger::new();
        assert!(ledger.should_alert(AnomalyKind::RouteDeviation, "366998410"));
        assert!(!ledger.should_alert(AnomalyKind::RouteDeviation, "366998410"));
        assert!(!ledger.should_alert(AnomalyKind::RouteDeviation, "366998410"));

        assert!(ledger.clear(AnomalyKind::RouteDeviation, "366998410"));
        assert!(ledger.should_alert(AnomalyKind::RouteDeviation, "366998410"));
    }

    #[test]
    fn test_kinds_are_independent() {
        let ledger = AlertLedger::new();
        assert!(ledger.should_alert(AnomalyKind::RouteDeviation, "a"));
        assert!(ledger.should_alert(AnomalyKind::SignalShutoff, "a"));
        assert!(ledger.should_alert(AnomalyKind::SignalShutoff, "b"));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_clear_missing_entry_returns_false() {
        let ledger = AlertLedger::new();
        assert!(!ledger.clear(AnomalyKind::SignalShutoff, "a"));
        ledger.should_alert(AnomalyKind::SignalShutoff, "a");
        assert!(ledger.clear(AnomalyKind::SignalShutoff, "a"));
        assert!(!ledger.clear(AnomalyKind::SignalShutoff, "a"));
    }

    #[test]
    fn test_reset_all() {
        let ledger = AlertLedger::new();
        ledger.should_alert(AnomalyKind::SignalShutoff, "a");
        ledger.should_alert(AnomalyKind::RouteDeviation, "b");
        ledger.reset_all();
        assert!(ledger.is_empty());
        assert!(ledger.should_alert(AnomalyKind::SignalShutoff, "a"));
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = AlertLedger::new();
        let operator_view = ledger.clone();
        ledger.should_alert(AnomalyKind::RouteDeviation, "a");
        assert!(operator_view.is_alerted(AnomalyKind::RouteDeviation, "a"));
        assert!(operator_view.clear(AnomalyKind::RouteDeviation, "a"));
        assert!(!ledger.is_alerted(AnomalyKind::RouteDeviation, "a"));
    }

    #[test]
    fn test_concurrent_should_alert_has_single_winner() {
        let ledger = AlertLedger::new();
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let ledger = ledger.clone();
                    scope.spawn(move || ledger.should_alert(AnomalyKind::SignalShutoff, "a") as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("route-deviation".parse::<AnomalyKind>().unwrap(), AnomalyKind::RouteDeviation);
        assert_eq!("SIGNAL_SHUTOFF".parse::<AnomalyKind>().unwrap(), AnomalyKind::SignalShutoff);
        assert!("bogus".parse::<AnomalyKind>().is_err());
    }
}
