pub mod actions;
pub mod anomaly_tracker;
pub mod config;
pub mod email;
pub mod geofence;
pub mod log_format;
pub mod metrics;
pub mod monitor;
pub mod notifier;
pub mod position;
pub mod vessel_source;
pub mod watchlist;

pub use anomaly_tracker::{
    AlertLedger, AnomalyKind, AnomalySnapshot, CycleReport, DetectionCycle, DetectionSettings,
    SharedState,
};
pub use geofence::{GeoRegion, RegionError};
pub use monitor::{Monitor, MonitorHandle};
pub use position::{IngestError, PositionReport};
