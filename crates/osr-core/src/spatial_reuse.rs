//! OBSS spatial-reuse feasibility search.
//!
//! Runs on every overheard preamble. The evaluator first records the
//! measured path loss and the in-flight transmission, then decides whether
//! its station could transmit concurrently: it searches the discrete power
//! ladder from the top down for a level that leaves every ongoing receiver's
//! SNR at or above the threshold of the mode that receiver is using, and for
//! the winning level picks the highest-rate mode its own next hop could still
//! decode. Any gap in the required knowledge (no route, an unmeasured path
//! loss, no safe power level) clears the restriction: the algorithm fails
//! open and never restricts when it cannot prove safety.

use crate::events::{PreambleObserved, SpatialReuseVerdict};
use crate::ledger::LedgerEntry;
use crate::medium::SharedMedium;
use crate::modulation::{LinkCapabilities, ModulationTable};
use crate::routing::{is_self_traffic, RouteLookup};
use crate::types::{SimNanos, StationId};
use crate::units::{dbm_to_watt, noise_floor_watt, ratio_to_db, snr_ratio};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Spatial-reuse evaluation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReuseConfig {
    pub channel_width_mhz: u16,
    pub noise_figure_db: f64,
    /// Discrete transmit power ladder supplied by the radio layer, in dBm.
    /// Searched from the highest level downward.
    pub power_levels_dbm: Vec<f64>,
    /// Optional static RSSI gate: overheard frames weaker than this never
    /// produce a restriction.
    pub obss_pd_level_dbm: Option<f64>,
    /// Capabilities used when picking the evaluator's own MCS ceiling.
    pub caps: LinkCapabilities,
}

impl Default for SpatialReuseConfig {
    fn default() -> Self {
        Self {
            channel_width_mhz: 20,
            noise_figure_db: 7.0,
            power_levels_dbm: (0..=8).rev().map(|i| f64::from(i) * 2.0).collect(),
            obss_pd_level_dbm: None,
            caps: LinkCapabilities::default(),
        }
    }
}

/// Interference/signal load at one receiver implicated in the ledger.
struct ReceiverLoad {
    receiver: StationId,
    interference_w: f64,
    signal_w: f64,
    mode_index: usize,
}

/// Per-station spatial-reuse evaluator over the shared medium view.
pub struct SpatialReuseEvaluator<R: RouteLookup> {
    own: StationId,
    color: u8,
    table: Arc<ModulationTable>,
    medium: SharedMedium,
    routing: R,
    config: SpatialReuseConfig,
}

impl<R: RouteLookup> SpatialReuseEvaluator<R> {
    pub fn new(
        own: StationId,
        color: u8,
        table: Arc<ModulationTable>,
        medium: SharedMedium,
        routing: R,
        config: SpatialReuseConfig,
    ) -> Self {
        Self {
            own,
            color,
            table,
            medium,
            routing,
            config,
        }
    }

    pub fn station(&self) -> StationId {
        self.own
    }

    /// Evaluate one overheard preamble. The verdict is recomputed from
    /// scratch on every call and never cached.
    pub fn on_preamble(
        &mut self,
        event: &PreambleObserved,
        now_ns: SimNanos,
    ) -> SpatialReuseVerdict {
        if event.color == self.color {
            // Same BSS color: not an overlapping transmission.
            return SpatialReuseVerdict::Unrestricted;
        }
        if let Some(gate) = self.config.obss_pd_level_dbm {
            if event.rssi_dbm < gate {
                debug!(
                    station = %self.own,
                    rssi = event.rssi_dbm,
                    gate,
                    "frame below OBSS-PD level, ignoring"
                );
                return SpatialReuseVerdict::Unrestricted;
            }
        }

        let loss = event.rssi_dbm - event.tx_power_dbm;
        self.medium.record_loss(event.reporter, event.source, loss);

        self.medium.append_transmission(LedgerEntry {
            destination: event.destination,
            source: event.source,
            start_ns: now_ns,
            duration_ns: event.duration_ns,
            tx_power_dbm: event.tx_power_dbm,
            mode_index: event.mode_index,
        });
        self.medium.prune_expired(now_ns);
        let transmissions = self.medium.transmissions();

        let next_hop = match self.routing.next_hop(self.own) {
            Some(hop) => hop,
            None => return self.fail_open("no route to gateway"),
        };
        if transmissions.is_empty() {
            return self.fail_open("ledger empty");
        }
        if transmissions
            .iter()
            .any(|e| is_self_traffic(self.own, next_hop, e))
        {
            return self.fail_open("overheard transmission shares own flow");
        }

        // Aggregate interference at the evaluator's own next hop.
        let mut next_hop_interference_w = 0.0;
        for entry in &transmissions {
            let loss = match self.medium.lookup_loss(next_hop, entry.source) {
                Some(l) => l,
                None => return self.fail_open("path loss to next hop unknown"),
            };
            next_hop_interference_w += dbm_to_watt(entry.tx_power_dbm + loss);
        }

        // Interference and wanted-signal power at every ongoing receiver.
        let mut ongoing = Vec::with_capacity(transmissions.len());
        for entry in &transmissions {
            let mut interference_w = 0.0;
            let mut signal_w = 0.0;
            for other in &transmissions {
                let loss = match self.medium.lookup_loss(entry.destination, other.source) {
                    Some(l) => l,
                    None => return self.fail_open("path loss at ongoing receiver unknown"),
                };
                let power_w = dbm_to_watt(other.tx_power_dbm + loss);
                if other.destination == entry.destination {
                    signal_w = power_w;
                } else {
                    interference_w += power_w;
                }
            }
            ongoing.push(ReceiverLoad {
                receiver: entry.destination,
                interference_w,
                signal_w,
                mode_index: entry.mode_index,
            });
        }

        let noise_w = noise_floor_watt(self.config.channel_width_mhz, self.config.noise_figure_db);
        let mut levels = self.config.power_levels_dbm.clone();
        levels.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let mut selected_level = None;
        'levels: for &level in &levels {
            for load in &ongoing {
                let loss = match self.medium.lookup_loss(load.receiver, self.own) {
                    Some(l) => l,
                    None => return self.fail_open("own path loss to ongoing receiver unknown"),
                };
                let required = match self.table.get(load.mode_index) {
                    Some(entry) => entry.required_snr_db,
                    None => return self.fail_open("ongoing transmission mode unknown"),
                };
                let own_interference_w = dbm_to_watt(level + loss);
                let snr_db = ratio_to_db(snr_ratio(
                    load.signal_w,
                    load.interference_w + own_interference_w,
                    noise_w,
                ));
                if snr_db < required {
                    continue 'levels;
                }
            }
            selected_level = Some(level);
            break;
        }
        let level = match selected_level {
            Some(l) => l,
            None => return self.fail_open("no power level leaves ongoing receivers decodable"),
        };

        // MCS ceiling from the achievable SNR at the own next hop.
        let loss = match self.medium.lookup_loss(next_hop, self.own) {
            Some(l) => l,
            None => return self.fail_open("own path loss to next hop unknown"),
        };
        let own_signal_w = dbm_to_watt(level + loss);
        let own_snr_db = ratio_to_db(snr_ratio(own_signal_w, next_hop_interference_w, noise_w));
        let mcs_limit = match self.table.best_under_snr(own_snr_db, &self.config.caps) {
            Some(index) => index,
            None => return self.fail_open("next hop could not decode any mode"),
        };

        debug!(
            station = %self.own,
            power_dbm = level,
            mcs = %self.table.entry(mcs_limit),
            snr = own_snr_db,
            "concurrent transmission permitted under restriction"
        );
        SpatialReuseVerdict::Restricted {
            power_level_dbm: level,
            mcs_limit,
        }
    }

    fn fail_open(&self, reason: &str) -> SpatialReuseVerdict {
        debug!(station = %self.own, reason, "spatial reuse fails open");
        SpatialReuseVerdict::Unrestricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::{ModulationTier, TableConfig};
    use std::collections::HashMap;

    const A: u16 = 1;
    const B: u16 = 2;
    const C: u16 = 3;
    const D: u16 = 4;
    const E: u16 = 5;
    const R1: u16 = 11;
    const R2: u16 = 12;
    const R3: u16 = 13;

    fn sta(n: u16) -> StationId {
        StationId::new(n)
    }

    fn he_mcs0_index(table: &ModulationTable) -> usize {
        table
            .entries()
            .iter()
            .position(|e| e.tier == ModulationTier::He && e.mcs == 0)
            .unwrap()
    }

    struct Fixture {
        table: Arc<ModulationTable>,
        medium: SharedMedium,
        evaluator: SpatialReuseEvaluator<HashMap<StationId, StationId>>,
        mode_index: usize,
    }

    /// Three overlapping flows A->R1, B->R2, C->R3; the evaluating station D
    /// routes toward E. Near pairs sit at -60 dB, far pairs at -110 dB.
    fn fixture(next_hop: Option<(u16, u16)>) -> Fixture {
        let table = Arc::new(ModulationTable::build(&TableConfig::default()));
        let medium = SharedMedium::new();
        let mut routes = HashMap::new();
        if let Some((from, to)) = next_hop {
            routes.insert(sta(from), sta(to));
        }
        let mode_index = he_mcs0_index(&table);
        let evaluator = SpatialReuseEvaluator::new(
            sta(D),
            D as u8,
            Arc::clone(&table),
            medium.clone(),
            routes,
            SpatialReuseConfig::default(),
        );
        Fixture {
            table,
            medium,
            evaluator,
            mode_index,
        }
    }

    fn seed_losses(medium: &SharedMedium, skip: Option<(u16, u16)>) {
        let sources = [A, B, C];
        let receivers = [R1, R2, R3];
        for (i, &r) in receivers.iter().enumerate() {
            for (j, &s) in sources.iter().enumerate() {
                let loss = if i == j { -60.0 } else { -110.0 };
                record_unless(medium, skip, r, s, loss);
            }
            record_unless(medium, skip, r, D, -110.0);
        }
        for &s in &sources {
            record_unless(medium, skip, E, s, -110.0);
        }
        record_unless(medium, skip, E, D, -60.0);
    }

    fn record_unless(medium: &SharedMedium, skip: Option<(u16, u16)>, a: u16, b: u16, loss: f64) {
        if skip == Some((a, b)) || skip == Some((b, a)) {
            return;
        }
        medium.record_loss(sta(a), sta(b), loss);
    }

    fn preamble(src: u16, dst: u16, mode_index: usize) -> PreambleObserved {
        PreambleObserved {
            reporter: sta(D),
            source: sta(src),
            destination: sta(dst),
            color: src as u8,
            rssi_dbm: -94.0,
            tx_power_dbm: 16.0,
            duration_ns: 1_000_000,
            mode_index,
        }
    }

    fn run_three_flows(fix: &mut Fixture) -> SpatialReuseVerdict {
        let m = fix.mode_index;
        fix.evaluator.on_preamble(&preamble(A, R1, m), 1_000);
        fix.evaluator.on_preamble(&preamble(B, R2, m), 2_000);
        fix.evaluator.on_preamble(&preamble(C, R3, m), 3_000)
    }

    #[test]
    fn test_feasible_reuse_yields_restriction() {
        let mut fix = fixture(Some((D, E)));
        seed_losses(&fix.medium, None);
        let verdict = run_three_flows(&mut fix);
        match verdict {
            SpatialReuseVerdict::Restricted {
                power_level_dbm,
                mcs_limit,
            } => {
                // All receivers tolerate the highest ladder level, and the
                // clean path to E supports the top of the HE ladder.
                assert_eq!(power_level_dbm, 16.0);
                let entry = fix.table.entry(mcs_limit);
                assert_eq!(entry.tier, ModulationTier::He);
                assert!(entry.mcs >= 9, "expected a high ceiling, got {}", entry);
            }
            SpatialReuseVerdict::Unrestricted => panic!("expected a restriction verdict"),
        }
    }

    #[test]
    fn test_missing_path_loss_fails_open() {
        let mut fix = fixture(Some((D, E)));
        seed_losses(&fix.medium, Some((R2, D)));
        assert_eq!(run_three_flows(&mut fix), SpatialReuseVerdict::Unrestricted);
    }

    #[test]
    fn test_missing_receiver_pair_fails_open() {
        let mut fix = fixture(Some((D, E)));
        seed_losses(&fix.medium, Some((R1, B)));
        assert_eq!(run_three_flows(&mut fix), SpatialReuseVerdict::Unrestricted);
    }

    #[test]
    fn test_unresolved_route_fails_open() {
        let mut fix = fixture(None);
        seed_losses(&fix.medium, None);
        assert_eq!(run_three_flows(&mut fix), SpatialReuseVerdict::Unrestricted);
    }

    #[test]
    fn test_next_hop_in_ledger_fails_open() {
        // D routes through R1, which is receiving one of the overheard flows.
        let mut fix = fixture(Some((D, R1)));
        seed_losses(&fix.medium, None);
        fix.medium.record_loss(sta(R1), sta(D), -60.0);
        assert_eq!(run_three_flows(&mut fix), SpatialReuseVerdict::Unrestricted);
    }

    #[test]
    fn test_no_safe_power_level_denies_restriction() {
        let mut fix = fixture(Some((D, E)));
        // D sits right next to every ongoing receiver.
        let sources = [A, B, C];
        let receivers = [R1, R2, R3];
        for (i, &r) in receivers.iter().enumerate() {
            for (j, &s) in sources.iter().enumerate() {
                let loss = if i == j { -60.0 } else { -110.0 };
                fix.medium.record_loss(sta(r), sta(s), loss);
            }
            fix.medium.record_loss(sta(r), sta(D), -30.0);
        }
        for &s in &sources {
            fix.medium.record_loss(sta(E), sta(s), -110.0);
        }
        fix.medium.record_loss(sta(E), sta(D), -60.0);

        assert_eq!(run_three_flows(&mut fix), SpatialReuseVerdict::Unrestricted);
    }

    #[test]
    fn test_same_color_frame_is_not_obss() {
        let mut fix = fixture(Some((D, E)));
        seed_losses(&fix.medium, None);
        let mut event = preamble(A, R1, fix.mode_index);
        event.color = D as u8;
        assert_eq!(
            fix.evaluator.on_preamble(&event, 1_000),
            SpatialReuseVerdict::Unrestricted
        );
        // The gate short-circuits before any bookkeeping.
        assert!(fix.medium.transmissions().is_empty());
    }

    #[test]
    fn test_obss_pd_gate_ignores_weak_frames() {
        let mut fix = fixture(Some((D, E)));
        seed_losses(&fix.medium, None);
        fix.evaluator.config.obss_pd_level_dbm = Some(-82.0);
        let event = preamble(A, R1, fix.mode_index); // rssi -94 dBm
        assert_eq!(
            fix.evaluator.on_preamble(&event, 1_000),
            SpatialReuseVerdict::Unrestricted
        );
        assert!(fix.medium.transmissions().is_empty());
    }

    #[test]
    fn test_expired_entries_are_pruned_before_deciding() {
        let mut fix = fixture(Some((D, E)));
        seed_losses(&fix.medium, None);
        let m = fix.mode_index;
        fix.evaluator.on_preamble(&preamble(A, R1, m), 1_000);
        fix.evaluator.on_preamble(&preamble(B, R2, m), 2_000);
        // Both earlier flows have left the air by now.
        fix.evaluator
            .on_preamble(&preamble(C, R3, m), 10_000_000);
        let remaining = fix.medium.transmissions();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source, sta(C));
    }

    #[test]
    fn test_preamble_records_first_writer_wins_loss() {
        let mut fix = fixture(Some((D, E)));
        let m = fix.mode_index;
        fix.evaluator.on_preamble(&preamble(A, R1, m), 1_000);
        // rssi -94, tx 16 => loss -110 for the (D, A) pair.
        assert_eq!(fix.medium.lookup_loss(sta(D), sta(A)), Some(-110.0));
    }
}
