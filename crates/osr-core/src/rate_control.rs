//! ARF-family closed-loop rate adaptation.
//!
//! Per-link state machine that raises the working mode after a run of
//! delivery successes and falls back on failures. Two variants share the
//! machine: plain ARF keeps its success/timer thresholds fixed, while AARF
//! grows the success threshold geometrically on each failed probe so that
//! repeated failures make the controller probe upward more conservatively.
//!
//! Recovery mode starts after a rate increase and spans exactly one outcome
//! event: the very next failure falls back immediately instead of following
//! the normal every-second-retry fallback rule.
//!
//! ## Example
//!
//! ```rust
//! use osr_core::modulation::{LinkCapabilities, ModulationTable, TableConfig};
//! use osr_core::rate_control::RateController;
//! use osr_core::types::StationId;
//! use std::sync::Arc;
//!
//! let table = Arc::new(ModulationTable::build(&TableConfig::default()));
//! let mut arf = RateController::arf(table, LinkCapabilities::default());
//! let peer = StationId::new(7);
//!
//! let start = arf.tx_parameters(peer).mode_index;
//! for _ in 0..10 {
//!     arf.on_data_ok(peer);
//! }
//! // Ten successes reach the success threshold: the mode steps up once.
//! assert_eq!(arf.status(peer).unwrap().mode_index, start + 1);
//! assert!(arf.status(peer).unwrap().recovery);
//! ```

use crate::events::{TransmissionOutcome, TxParameters};
use crate::modulation::{LinkCapabilities, ModulationTable};
use crate::types::StationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Selects the ARF or AARF behavior of the shared state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    /// ARF: thresholds stay at their configured values.
    Fixed,
    /// AARF: thresholds grow multiplicatively on a failed probe and reset to
    /// their minima on a normal fallback.
    Adaptive {
        success_growth: f64,
        timer_growth: f64,
    },
}

/// Rate-control attributes. Out-of-range values are clamped at construction,
/// never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateControlConfig {
    /// Successes in a row required to try the next higher mode.
    pub success_threshold: u32,
    /// Outcome events (of either kind) after which a probe is forced.
    pub timer_threshold: u32,
    pub min_success_threshold: u32,
    pub min_timer_threshold: u32,
    pub max_success_threshold: u32,
    pub policy: ThresholdPolicy,
}

impl RateControlConfig {
    pub fn arf() -> Self {
        Self {
            success_threshold: 10,
            timer_threshold: 15,
            min_success_threshold: 10,
            min_timer_threshold: 15,
            max_success_threshold: 60,
            policy: ThresholdPolicy::Fixed,
        }
    }

    pub fn aarf() -> Self {
        Self {
            policy: ThresholdPolicy::Adaptive {
                success_growth: 2.0,
                timer_growth: 2.0,
            },
            ..Self::arf()
        }
    }

    /// Clamp thresholds into their configured bounds.
    fn normalized(mut self) -> Self {
        self.max_success_threshold = self.max_success_threshold.max(self.min_success_threshold);
        self.success_threshold = self
            .success_threshold
            .clamp(self.min_success_threshold, self.max_success_threshold);
        self.timer_threshold = self.timer_threshold.max(self.min_timer_threshold);
        self
    }
}

/// Per-link adaptation state. Created when a link is first used, dropped
/// with [`RateController::forget_link`], and mutated only by outcome events.
#[derive(Debug, Clone)]
struct LinkRateState {
    mode_index: usize,
    success: u32,
    failed: u32,
    retry: u32,
    timer: u32,
    recovery: bool,
    success_threshold: u32,
    timer_threshold: u32,
}

impl LinkRateState {
    fn new(table: &ModulationTable, caps: &LinkCapabilities, config: &RateControlConfig) -> Self {
        let (success_threshold, timer_threshold) = match config.policy {
            ThresholdPolicy::Fixed => (config.success_threshold, config.timer_threshold),
            ThresholdPolicy::Adaptive { .. } => {
                (config.min_success_threshold, config.min_timer_threshold)
            }
        };
        Self {
            mode_index: table.initial_index(caps).unwrap_or(0),
            success: 0,
            failed: 0,
            retry: 0,
            timer: 0,
            recovery: false,
            success_threshold,
            timer_threshold,
        }
    }

    fn on_failed(
        &mut self,
        peer: StationId,
        table: &ModulationTable,
        caps: &LinkCapabilities,
        config: &RateControlConfig,
    ) {
        self.timer += 1;
        self.failed += 1;
        self.retry += 1;
        self.success = 0;

        if self.recovery {
            // Failed probe: the transmission right after a rate increase.
            if self.retry == 1 {
                if let ThresholdPolicy::Adaptive {
                    success_growth,
                    timer_growth,
                } = config.policy
                {
                    self.success_threshold = ((self.success_threshold as f64 * success_growth)
                        as u32)
                        .min(config.max_success_threshold);
                    self.timer_threshold = ((self.timer_threshold as f64 * timer_growth) as u32)
                        .max(config.min_timer_threshold);
                }
                self.fall_back(peer, table, caps);
            }
            self.timer = 0;
            self.recovery = false;
        } else {
            // Normal fallback on every second failed retry.
            if (self.retry - 1) % 2 == 1 {
                if let ThresholdPolicy::Adaptive { .. } = config.policy {
                    self.success_threshold = config.min_success_threshold;
                    self.timer_threshold = config.min_timer_threshold;
                }
                self.fall_back(peer, table, caps);
            }
            if self.retry >= 2 {
                self.timer = 0;
            }
        }
    }

    fn on_ok(
        &mut self,
        peer: StationId,
        table: &ModulationTable,
        caps: &LinkCapabilities,
    ) {
        self.timer += 1;
        self.success += 1;
        self.failed = 0;
        self.retry = 0;
        self.recovery = false;

        if self.success == self.success_threshold || self.timer == self.timer_threshold {
            let next = table.increase_from(self.mode_index, caps);
            if next != self.mode_index {
                debug!(
                    %peer,
                    from = %table.entry(self.mode_index),
                    to = %table.entry(next),
                    "rate increase"
                );
            }
            self.mode_index = next;
            self.timer = 0;
            self.success = 0;
            self.recovery = true;
        }
    }

    fn fall_back(&mut self, peer: StationId, table: &ModulationTable, caps: &LinkCapabilities) {
        let next = table.decrease_from(self.mode_index, caps);
        if next != self.mode_index {
            debug!(
                %peer,
                from = %table.entry(self.mode_index),
                to = %table.entry(next),
                "rate fallback"
            );
        }
        self.mode_index = next;
    }
}

/// Read-only view of one link's adaptation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub mode_index: usize,
    pub success: u32,
    pub failed: u32,
    pub retry: u32,
    pub timer: u32,
    pub recovery: bool,
    pub success_threshold: u32,
    pub timer_threshold: u32,
}

/// ARF-family rate controller. One instance per station; link state is keyed
/// by peer and created lazily on first use.
pub struct RateController {
    table: Arc<ModulationTable>,
    caps: LinkCapabilities,
    config: RateControlConfig,
    links: HashMap<StationId, LinkRateState>,
}

impl RateController {
    pub fn arf(table: Arc<ModulationTable>, caps: LinkCapabilities) -> Self {
        Self::with_config(table, caps, RateControlConfig::arf())
    }

    pub fn aarf(table: Arc<ModulationTable>, caps: LinkCapabilities) -> Self {
        Self::with_config(table, caps, RateControlConfig::aarf())
    }

    pub fn with_config(
        table: Arc<ModulationTable>,
        caps: LinkCapabilities,
        config: RateControlConfig,
    ) -> Self {
        Self {
            table,
            caps,
            config: config.normalized(),
            links: HashMap::new(),
        }
    }

    /// Feed a delivery failure for the link to `peer`.
    pub fn on_data_failed(&mut self, peer: StationId) {
        let Self {
            table,
            caps,
            config,
            links,
        } = self;
        links
            .entry(peer)
            .or_insert_with(|| LinkRateState::new(table, caps, config))
            .on_failed(peer, table, caps, config);
    }

    /// Feed a delivery success for the link to `peer`.
    pub fn on_data_ok(&mut self, peer: StationId) {
        let Self {
            table,
            caps,
            config,
            links,
        } = self;
        links
            .entry(peer)
            .or_insert_with(|| LinkRateState::new(table, caps, config))
            .on_ok(peer, table, caps);
    }

    /// Dispatch a delivery outcome event from the radio layer.
    pub fn on_outcome(&mut self, outcome: TransmissionOutcome) {
        if outcome.ok {
            self.on_data_ok(outcome.peer);
        } else {
            self.on_data_failed(outcome.peer);
        }
    }

    /// Transmit parameters for the next frame to `peer`.
    pub fn tx_parameters(&mut self, peer: StationId) -> TxParameters {
        let Self {
            table,
            caps,
            config,
            links,
        } = self;
        let link = links
            .entry(peer)
            .or_insert_with(|| LinkRateState::new(table, caps, config));
        TxParameters::from_entry(link.mode_index, table.entry(link.mode_index))
    }

    /// Current state of a link, if it exists.
    pub fn status(&self, peer: StationId) -> Option<LinkStatus> {
        self.links.get(&peer).map(|l| LinkStatus {
            mode_index: l.mode_index,
            success: l.success,
            failed: l.failed,
            retry: l.retry,
            timer: l.timer,
            recovery: l.recovery,
            success_threshold: l.success_threshold,
            timer_threshold: l.timer_threshold,
        })
    }

    /// Drop all state for a link.
    pub fn forget_link(&mut self, peer: StationId) {
        self.links.remove(&peer);
    }

    pub fn table(&self) -> &ModulationTable {
        &self.table
    }
}
