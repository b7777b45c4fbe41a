//! # OSR Core - Adaptive Rate Control and OBSS Spatial Reuse
//!
//! Control-plane library for a dense wireless mesh: closed-loop link-rate
//! adaptation driven by delivery feedback, and an interference-aware
//! spatial-reuse decision procedure that lets a station transmit concurrently
//! with an overheard transmission at a reduced power/MCS ceiling whenever it
//! can prove no affected receiver drops below its required SNR.
//!
//! ## Overview
//!
//! - **Modulation table** ([`modulation`]): the static catalogue of
//!   transmission modes across the legacy and high-throughput tiers, with
//!   per-mode SNR thresholds precomputed from a target bit error rate.
//! - **Rate adaptation** ([`rate_control`]): the ARF state machine family;
//!   plain ARF with fixed probe thresholds and AARF with geometrically
//!   growing ones.
//! - **SNR-feedback selection** ([`snr_select`]): RBAR-style selection from
//!   per-peer SNR reports.
//! - **Medium bookkeeping** ([`path_loss`], [`ledger`], [`medium`]): measured
//!   path losses and the rolling ledger of overheard in-flight transmissions
//!   behind one injected shared-state handle.
//! - **Spatial reuse** ([`spatial_reuse`], [`routing`]): the feasibility
//!   search over the transmit power ladder, failing open whenever safety
//!   cannot be proven.
//!
//! ## Event Flow
//!
//! ```text
//! radio/MAC layer ──PreambleObserved──► SpatialReuseEvaluator ──► Verdict
//!        │                                   │    ▲
//!        │                              SharedMedium (losses + ledger)
//!        │
//!        └─TransmissionOutcome──► RateController ──► TxParameters
//! ```
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
//! let mut controller = RateController::aarf(table, LinkCapabilities::default());
//!
//! let peer = StationId::new(2);
//! controller.on_data_ok(peer);
//! let params = controller.tx_parameters(peer);
//! assert!(params.data_rate_bps > 0);
//! ```

pub mod events;
pub mod ledger;
pub mod medium;
pub mod modulation;
pub mod path_loss;
pub mod rate_control;
pub mod routing;
pub mod snr_select;
pub mod spatial_reuse;
pub mod types;
pub mod units;

pub use events::{PreambleObserved, SpatialReuseVerdict, TransmissionOutcome, TxParameters};
pub use ledger::{LedgerEntry, TransmissionLedger};
pub use medium::SharedMedium;
pub use modulation::{LinkCapabilities, ModulationEntry, ModulationTable, ModulationTier, TableConfig};
pub use path_loss::PathLossTracker;
pub use rate_control::{LinkStatus, RateControlConfig, RateController, ThresholdPolicy};
pub use routing::RouteLookup;
pub use snr_select::SnrRateSelector;
pub use spatial_reuse::{SpatialReuseConfig, SpatialReuseEvaluator};
pub use types::{SimNanos, StationId};
