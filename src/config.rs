use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::anomaly_tracker::{
    DEFAULT_DEVIATION_THRESHOLD_NM, DEFAULT_STATIONARY_SPEED_KNOTS, DEFAULT_TRACK_CAPACITY,
    DetectionSettings,
};
use crate::geofence::{GeoRegion, RegionDefinition, default_region_vertices};

/// Upstream vessel data provider settings (the API key comes from the environment)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_country_iso")]
    pub country_iso: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            country_iso: default_country_iso(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.datalastic.com/api/v0".to_string()
}

fn default_country_iso() -> String {
    "US".to_string()
}

/// Top-level monitor configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_watchlist_interval")]
    pub watchlist_interval_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_deviation_threshold")]
    pub deviation_threshold_nm: f64,
    #[serde(default = "default_stationary_speed")]
    pub stationary_speed_knots: f64,
    #[serde(default = "default_track_capacity")]
    pub track_capacity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_retention_hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
    /// Operator HTTP API port; the API is off when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_port: Option<u16>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_region")]
    pub region: RegionDefinition,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_watchlist_interval() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    20
}

fn default_deviation_threshold() -> f64 {
    DEFAULT_DEVIATION_THRESHOLD_NM
}

fn default_stationary_speed() -> f64 {
    DEFAULT_STATIONARY_SPEED_KNOTS
}

fn default_track_capacity() -> usize {
    DEFAULT_TRACK_CAPACITY
}

fn default_region() -> RegionDefinition {
    RegionDefinition {
        vertices: default_region_vertices(),
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            watchlist_interval_secs: default_watchlist_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            deviation_threshold_nm: default_deviation_threshold(),
            stationary_speed_knots: default_stationary_speed(),
            track_capacity: default_track_capacity(),
            track_retention_hours: None,
            metrics_port: None,
            api_port: None,
            recipients: Vec::new(),
            watchlist: Vec::new(),
            provider: ProviderConfig::default(),
            region: default_region(),
        }
    }
}

impl MonitorConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: MonitorConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to a TOML file (atomic: write to .tmp then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than 0");
        }
        if self.watchlist_interval_secs == 0 {
            anyhow::bail!("watchlist_interval_secs must be greater than 0");
        }
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be greater than 0");
        }
        if !(self.deviation_threshold_nm.is_finite() && self.deviation_threshold_nm > 0.0) {
            anyhow::bail!("deviation_threshold_nm must be a positive number");
        }
        if !(self.stationary_speed_knots.is_finite() && self.stationary_speed_knots >= 0.0) {
            anyhow::bail!("stationary_speed_knots must not be negative");
        }
        if self.track_capacity < 2 {
            anyhow::bail!("track_capacity must be at least 2 to form a route");
        }
        self.region().context("region is not a valid polygon")?;
        Ok(())
    }

    pub fn region(&self) -> Result<GeoRegion> {
        Ok(self.region.to_region()?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn watchlist_interval(&self) -> Duration {
        Duration::from_secs(self.watchlist_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn detection_settings(&self) -> DetectionSettings {
        DetectionSettings {
            deviation_threshold_nm: self.deviation_threshold_nm,
            stationary_speed_knots: self.stationary_speed_knots,
            track_capacity: self.track_capacity,
            fetch_timeout: self.fetch_timeout(),
            track_retention: self
                .track_retention_hours
                .map(|hours| chrono::Duration::hours(hours as i64)),
        }
    }
}

/// Resolve the monitor config file path.
///
/// Priority:
/// 1. `SEAWATCH_CONFIG` env var
/// 2. `/etc/seawatch/monitor.toml` (production/staging)
/// 3. `./monitor.toml` (development)
pub fn monitor_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SEAWATCH_CONFIG") {
        return PathBuf::from(path);
    }

    match std::env::var("SEAWATCH_ENV").as_deref() {
        Ok("production") | Ok("staging") => PathBuf::from("/etc/seawatch/monitor.toml"),
        _ => PathBuf::from("./monitor.toml"),
    }
}
