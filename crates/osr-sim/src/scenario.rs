//! Scenario configuration.
//!
//! A scenario pins down everything a reproducible run needs: station
//! placement, the gateway identity, the radio parameters shared by every
//! station, and the impairment knobs. Scenarios are plain JSON; every field
//! has a default so a file only states what it changes.

use crate::topology::PropagationConfig;
use osr_core::types::SimNanos;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// One station and its placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationSpec {
    pub id: u16,
    pub x: f64,
    pub y: f64,
}

/// Full scenario description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// All stations including the gateway.
    pub stations: Vec<StationSpec>,
    pub gateway: u16,
    pub seed: u64,

    pub channel_width_mhz: u16,
    pub max_streams: u8,
    pub short_guard: bool,
    pub target_ber: f64,
    pub noise_figure_db: f64,

    /// Power used by scripted traffic, in dBm.
    pub tx_power_dbm: f64,
    /// Discrete ladder searched by the spatial-reuse evaluator.
    pub power_levels_dbm: Vec<f64>,
    pub obss_pd_level_dbm: Option<f64>,

    pub propagation: PropagationConfig,
    /// Maximum hop distance the static routing accepts, in meters.
    pub max_hop_m: f64,

    pub frame_duration_ns: SimNanos,
    /// Gap between successive scripted transmissions, in nanoseconds.
    pub frame_spacing_ns: SimNanos,

    pub link_break_prob: f64,
    pub mean_recovery_s: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            // Two branches hanging off the gateway, three hops each.
            stations: vec![
                StationSpec { id: 0, x: 0.0, y: 0.0 },
                StationSpec { id: 1, x: 40.0, y: 0.0 },
                StationSpec { id: 2, x: 80.0, y: 0.0 },
                StationSpec { id: 3, x: 120.0, y: 0.0 },
                StationSpec { id: 4, x: 0.0, y: 40.0 },
                StationSpec { id: 5, x: 0.0, y: 80.0 },
                StationSpec { id: 6, x: 0.0, y: 120.0 },
            ],
            gateway: 0,
            seed: 42,
            channel_width_mhz: 20,
            max_streams: 1,
            short_guard: false,
            target_ber: 1e-5,
            noise_figure_db: 7.0,
            tx_power_dbm: 16.0,
            power_levels_dbm: (0..=8).rev().map(|i| f64::from(i) * 2.0).collect(),
            obss_pd_level_dbm: None,
            propagation: PropagationConfig::default(),
            max_hop_m: 60.0,
            frame_duration_ns: 1_000_000,
            frame_spacing_ns: 100_000,
            link_break_prob: 0.0,
            mean_recovery_s: 1.0,
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.stations.is_empty() {
            return Err(ScenarioError::Invalid("no stations defined".into()));
        }
        let mut seen = HashSet::new();
        for spec in &self.stations {
            if !seen.insert(spec.id) {
                return Err(ScenarioError::Invalid(format!(
                    "duplicate station id {}",
                    spec.id
                )));
            }
        }
        if !seen.contains(&self.gateway) {
            return Err(ScenarioError::Invalid(format!(
                "gateway {} is not a station",
                self.gateway
            )));
        }
        if self.power_levels_dbm.is_empty() {
            return Err(ScenarioError::Invalid("empty power ladder".into()));
        }
        Ok(())
    }
}
