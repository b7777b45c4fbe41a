//! Modulation-and-coding catalogue with precomputed SNR thresholds.
//!
//! The table holds every transmission mode a station class supports: the
//! legacy OFDM rates plus the tiered high-throughput MCS ladders, one concrete
//! entry per (mode, spatial-stream count, channel width, guard interval).
//! Each entry carries the minimum SNR at which the mode meets the configured
//! target bit error rate; thresholds are computed once at construction by
//! numerically inverting analytic BER curves, so every later feasibility
//! check is a plain comparison.
//!
//! ## Example
//!
//! ```rust
//! use osr_core::modulation::{LinkCapabilities, ModulationTable, ModulationTier, TableConfig};
//!
//! let table = ModulationTable::build(&TableConfig::default());
//! let caps = LinkCapabilities {
//!     tier: ModulationTier::He,
//!     streams: 1,
//!     channel_width_mhz: 20,
//!     short_guard: false,
//! };
//!
//! let start = table.initial_index(&caps).unwrap();
//! let up = table.increase_from(start, &caps);
//! assert!(table.entry(up).data_rate_bps > table.entry(start).data_rate_bps);
//! ```

use crate::units::{db_to_ratio, ratio_to_db};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Modulation class tier, totally ordered from legacy OFDM to the
/// highest-throughput ladder. Entries of different tiers never mix in a
/// single rate-adaptation scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModulationTier {
    /// Legacy OFDM rate set (single stream, fixed guard interval).
    Legacy,
    /// First high-throughput ladder; stream count is encoded in the MCS index.
    Ht,
    /// Very-high-throughput ladder; adds 256-QAM.
    Vht,
    /// High-efficiency ladder; adds 1024-QAM and the long symbol clock.
    He,
}

/// Constellation used by a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModulationScheme {
    Bpsk,
    Qpsk,
    Qam16,
    Qam64,
    Qam256,
    Qam1024,
}

impl ModulationScheme {
    /// Coded bits carried per subcarrier per symbol.
    pub fn bits_per_symbol(&self) -> u32 {
        match self {
            ModulationScheme::Bpsk => 1,
            ModulationScheme::Qpsk => 2,
            ModulationScheme::Qam16 => 4,
            ModulationScheme::Qam64 => 6,
            ModulationScheme::Qam256 => 8,
            ModulationScheme::Qam1024 => 10,
        }
    }
}

/// FEC code rate as a fraction k/n.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRate {
    pub k: u8,
    pub n: u8,
}

impl CodeRate {
    pub fn new(k: u8, n: u8) -> Self {
        Self { k, n }
    }

    pub fn rate(&self) -> f64 {
        self.k as f64 / self.n as f64
    }
}

impl fmt::Display for CodeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.k, self.n)
    }
}

/// One concrete transmission mode. Immutable after table construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulationEntry {
    /// MCS value within the tier (legacy: rate-set index).
    pub mcs: u8,
    pub tier: ModulationTier,
    pub scheme: ModulationScheme,
    pub code_rate: CodeRate,
    /// Spatial streams this entry requires.
    pub streams: u8,
    pub channel_width_mhz: u16,
    pub guard_interval_ns: u16,
    pub data_rate_bps: u64,
    /// Minimum SNR (dB) at which the mode meets the table's target BER.
    pub required_snr_db: f64,
}

impl fmt::Display for ModulationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}-MCS{} {:?} R={} nss{} {}MHz ({:.1} Mb/s, req {:.1} dB)",
            self.tier,
            self.mcs,
            self.scheme,
            self.code_rate,
            self.streams,
            self.channel_width_mhz,
            self.data_rate_bps as f64 / 1e6,
            self.required_snr_db,
        )
    }
}

/// Link capabilities negotiated with a peer, used to decide which table
/// entries a rate search may land on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkCapabilities {
    /// Operating tier for this link.
    pub tier: ModulationTier,
    /// Negotiated spatial stream count.
    pub streams: u8,
    pub channel_width_mhz: u16,
    pub short_guard: bool,
}

impl Default for LinkCapabilities {
    fn default() -> Self {
        Self {
            tier: ModulationTier::He,
            streams: 1,
            channel_width_mhz: 20,
            short_guard: false,
        }
    }
}

/// Table construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub channel_width_mhz: u16,
    /// Highest spatial stream count to generate entries for.
    pub max_streams: u8,
    pub short_guard: bool,
    /// Target bit error rate used to precompute SNR thresholds.
    pub target_ber: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            channel_width_mhz: 20,
            max_streams: 1,
            short_guard: false,
            target_ber: 1e-5,
        }
    }
}

/// The static mode catalogue. Entries are grouped by tier, within a tier by
/// stream count, and within a stream block by ascending data rate.
#[derive(Debug, Clone)]
pub struct ModulationTable {
    entries: Vec<ModulationEntry>,
}

/// (scheme, code rate) ladder shared by the high-throughput tiers; the Vht
/// and He tiers extend it with the denser constellations.
const HT_LADDER: [(ModulationScheme, (u8, u8)); 8] = [
    (ModulationScheme::Bpsk, (1, 2)),
    (ModulationScheme::Qpsk, (1, 2)),
    (ModulationScheme::Qpsk, (3, 4)),
    (ModulationScheme::Qam16, (1, 2)),
    (ModulationScheme::Qam16, (3, 4)),
    (ModulationScheme::Qam64, (2, 3)),
    (ModulationScheme::Qam64, (3, 4)),
    (ModulationScheme::Qam64, (5, 6)),
];

const VHT_EXTRA: [(ModulationScheme, (u8, u8)); 2] = [
    (ModulationScheme::Qam256, (3, 4)),
    (ModulationScheme::Qam256, (5, 6)),
];

const HE_EXTRA: [(ModulationScheme, (u8, u8)); 2] = [
    (ModulationScheme::Qam1024, (3, 4)),
    (ModulationScheme::Qam1024, (5, 6)),
];

const LEGACY_LADDER: [(ModulationScheme, (u8, u8)); 8] = [
    (ModulationScheme::Bpsk, (1, 2)),
    (ModulationScheme::Bpsk, (3, 4)),
    (ModulationScheme::Qpsk, (1, 2)),
    (ModulationScheme::Qpsk, (3, 4)),
    (ModulationScheme::Qam16, (1, 2)),
    (ModulationScheme::Qam16, (3, 4)),
    (ModulationScheme::Qam64, (2, 3)),
    (ModulationScheme::Qam64, (3, 4)),
];

impl ModulationTable {
    /// Build the full catalogue for one station class and precompute the SNR
    /// threshold of every entry at the configured target BER.
    pub fn build(config: &TableConfig) -> Self {
        let mut entries = Vec::new();
        let width = config.channel_width_mhz;

        for (i, &(scheme, (k, n))) in LEGACY_LADDER.iter().enumerate() {
            entries.push(make_entry(
                i as u8,
                ModulationTier::Legacy,
                scheme,
                CodeRate::new(k, n),
                1,
                20,
                800,
                config.target_ber,
            ));
        }

        let ht_gi = if config.short_guard { 400 } else { 800 };
        for nss in 1..=config.max_streams {
            for (i, &(scheme, (k, n))) in HT_LADDER.iter().enumerate() {
                let mcs = (nss - 1) * 8 + i as u8;
                entries.push(make_entry(
                    mcs,
                    ModulationTier::Ht,
                    scheme,
                    CodeRate::new(k, n),
                    nss,
                    width.min(40),
                    ht_gi,
                    config.target_ber,
                ));
            }
        }

        for nss in 1..=config.max_streams {
            for (i, &(scheme, (k, n))) in
                HT_LADDER.iter().chain(VHT_EXTRA.iter()).enumerate()
            {
                let mcs = i as u8;
                if !vht_mcs_allowed(mcs, width, nss) {
                    continue;
                }
                entries.push(make_entry(
                    mcs,
                    ModulationTier::Vht,
                    scheme,
                    CodeRate::new(k, n),
                    nss,
                    width,
                    ht_gi,
                    config.target_ber,
                ));
            }
        }

        let he_gi = if config.short_guard { 800 } else { 3200 };
        for nss in 1..=config.max_streams {
            for (i, &(scheme, (k, n))) in HT_LADDER
                .iter()
                .chain(VHT_EXTRA.iter())
                .chain(HE_EXTRA.iter())
                .enumerate()
            {
                entries.push(make_entry(
                    i as u8,
                    ModulationTier::He,
                    scheme,
                    CodeRate::new(k, n),
                    nss,
                    width,
                    he_gi,
                    config.target_ber,
                ));
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ModulationEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ModulationEntry> {
        self.entries.get(index)
    }

    /// Panicking accessor for indices the table itself produced.
    pub fn entry(&self, index: usize) -> &ModulationEntry {
        &self.entries[index]
    }

    /// Whether a link with the given capabilities can use an entry at all.
    /// Tier confinement is handled by the scan itself, which never crosses a
    /// tier or stream-block boundary.
    pub fn is_feasible(&self, entry: &ModulationEntry, caps: &LinkCapabilities) -> bool {
        entry.channel_width_mhz <= caps.channel_width_mhz && entry.streams <= caps.streams
    }

    /// Starting index for a fresh link: the lowest-rate feasible entry of the
    /// link's tier, preferring the block matching the negotiated stream count.
    pub fn initial_index(&self, caps: &LinkCapabilities) -> Option<usize> {
        let exact = self.entries.iter().position(|e| {
            e.tier == caps.tier && e.streams == caps.streams && self.is_feasible(e, caps)
        });
        exact.or_else(|| {
            self.entries
                .iter()
                .position(|e| e.tier == caps.tier && self.is_feasible(e, caps))
        })
    }

    /// Next feasible higher-rate neighbor, or `index` unchanged if none
    /// exists. The scan stops at a tier boundary and at a stream-block
    /// boundary, and skips entries the link cannot use.
    pub fn increase_from(&self, index: usize, caps: &LinkCapabilities) -> usize {
        let current = match self.entries.get(index) {
            Some(e) => e,
            None => return index,
        };
        for i in index + 1..self.entries.len() {
            let candidate = &self.entries[i];
            if candidate.tier != current.tier || candidate.streams != current.streams {
                break;
            }
            if self.is_feasible(candidate, caps) {
                return i;
            }
        }
        index
    }

    /// Next feasible lower-rate neighbor, or `index` unchanged if none
    /// exists. Saturating; never wraps.
    pub fn decrease_from(&self, index: usize, caps: &LinkCapabilities) -> usize {
        let current = match self.entries.get(index) {
            Some(e) => e,
            None => return index,
        };
        for i in (0..index).rev() {
            let candidate = &self.entries[i];
            if candidate.tier != current.tier || candidate.streams != current.streams {
                break;
            }
            if self.is_feasible(candidate, caps) {
                return i;
            }
        }
        index
    }

    /// Highest-rate feasible entry of the link's tier whose SNR threshold
    /// does not exceed `snr_db`. Equality passes; ties favor the entry found
    /// first (the lower stream count).
    pub fn best_under_snr(&self, snr_db: f64, caps: &LinkCapabilities) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_rate = 0u64;
        for (i, e) in self.entries.iter().enumerate() {
            if e.tier != caps.tier || !self.is_feasible(e, caps) {
                continue;
            }
            if e.required_snr_db <= snr_db && e.data_rate_bps > best_rate {
                best_rate = e.data_rate_bps;
                best = Some(i);
            }
        }
        best
    }
}

/// VHT MCS 9 does not fit the 20 MHz tone plan except at three streams.
fn vht_mcs_allowed(mcs: u8, width_mhz: u16, nss: u8) -> bool {
    !(mcs == 9 && width_mhz == 20 && nss != 3)
}

fn make_entry(
    mcs: u8,
    tier: ModulationTier,
    scheme: ModulationScheme,
    code_rate: CodeRate,
    streams: u8,
    width_mhz: u16,
    guard_interval_ns: u16,
    target_ber: f64,
) -> ModulationEntry {
    let data_rate_bps = data_rate(tier, scheme, code_rate, streams, width_mhz, guard_interval_ns);
    let required_snr_db =
        required_snr_db(scheme, code_rate, data_rate_bps, width_mhz, target_ber);
    ModulationEntry {
        mcs,
        tier,
        scheme,
        code_rate,
        streams,
        channel_width_mhz: width_mhz,
        guard_interval_ns,
        data_rate_bps,
        required_snr_db,
    }
}

/// PHY data rate from the OFDM numerology of each tier.
fn data_rate(
    tier: ModulationTier,
    scheme: ModulationScheme,
    code_rate: CodeRate,
    streams: u8,
    width_mhz: u16,
    guard_interval_ns: u16,
) -> u64 {
    let (data_subcarriers, base_symbol_ns) = match tier {
        ModulationTier::Legacy => (48.0, 3200.0),
        ModulationTier::Ht | ModulationTier::Vht => {
            let sc = match width_mhz {
                20 => 52.0,
                40 => 108.0,
                _ => 234.0,
            };
            (sc, 3200.0)
        }
        ModulationTier::He => {
            let sc = match width_mhz {
                20 => 234.0,
                40 => 468.0,
                _ => 980.0,
            };
            (sc, 12_800.0)
        }
    };
    let symbol_s = (base_symbol_ns + guard_interval_ns as f64) * 1e-9;
    let bits_per_sym =
        data_subcarriers * scheme.bits_per_symbol() as f64 * code_rate.rate() * streams as f64;
    (bits_per_sym / symbol_s).round() as u64
}

/// Minimum SNR meeting `target_ber`, found by bisecting the analytic BER
/// curve for the entry's constellation and code rate.
fn required_snr_db(
    scheme: ModulationScheme,
    code_rate: CodeRate,
    data_rate_bps: u64,
    width_mhz: u16,
    target_ber: f64,
) -> f64 {
    let bandwidth_hz = width_mhz as f64 * 1e6;
    let ber_at = |snr_db: f64| -> f64 {
        // Eb/N0 = SNR * B/Rb, then credit the FEC with its coding gain.
        let ebn0_db = snr_db + ratio_to_db(bandwidth_hz / data_rate_bps as f64)
            + coding_gain_db(code_rate);
        ber_uncoded(scheme, db_to_ratio(ebn0_db))
    };

    let mut lo = -10.0;
    let mut hi = 60.0;
    while hi - lo > 0.01 {
        let mid = 0.5 * (lo + hi);
        if ber_at(mid) > target_ber {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

/// Asymptotic coding gain of the binary convolutional code at each rate.
fn coding_gain_db(code_rate: CodeRate) -> f64 {
    match (code_rate.k, code_rate.n) {
        (1, 2) => 5.0,
        (2, 3) => 4.0,
        (3, 4) => 3.5,
        (5, 6) => 3.0,
        _ => 0.0,
    }
}

/// Uncoded BER over AWGN. BPSK/QPSK use the exact expression; square M-QAM
/// uses the Gray-coded nearest-neighbor approximation.
fn ber_uncoded(scheme: ModulationScheme, ebn0: f64) -> f64 {
    match scheme {
        ModulationScheme::Bpsk | ModulationScheme::Qpsk => 0.5 * erfc(ebn0.sqrt()),
        _ => {
            let k = scheme.bits_per_symbol() as f64;
            let m = 2.0_f64.powf(k);
            (2.0 / k) * (1.0 - 1.0 / m.sqrt())
                * erfc((1.5 * k / (m - 1.0) * ebn0).sqrt())
        }
    }
}

/// Complementary error function, Abramowitz & Stegun 7.1.26.
fn erfc(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.3275911 * x.abs());
    let poly = t * (0.254829592
        + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let result = poly * (-x * x).exp();
    if x >= 0.0 {
        result
    } else {
        2.0 - result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn he_caps() -> LinkCapabilities {
        LinkCapabilities::default()
    }

    #[test]
    fn test_table_layout_single_stream() {
        let table = ModulationTable::build(&TableConfig::default());
        // 8 legacy + 8 HT + 9 VHT (MCS9 invalid at 20 MHz nss1) + 12 HE.
        assert_eq!(table.len(), 8 + 8 + 9 + 12);
        assert_eq!(table.entry(0).tier, ModulationTier::Legacy);
        assert_eq!(table.entries().last().unwrap().tier, ModulationTier::He);
        assert_eq!(table.entries().last().unwrap().mcs, 11);
    }

    #[test]
    fn test_known_data_rates() {
        let table = ModulationTable::build(&TableConfig::default());
        // Legacy 54 Mb/s top rate.
        let legacy_top = table
            .entries()
            .iter()
            .filter(|e| e.tier == ModulationTier::Legacy)
            .last()
            .unwrap();
        assert_eq!(legacy_top.data_rate_bps, 54_000_000);
        // HT MCS7 at 20 MHz long guard is 65 Mb/s.
        let ht7 = table
            .entries()
            .iter()
            .find(|e| e.tier == ModulationTier::Ht && e.mcs == 7)
            .unwrap();
        assert_eq!(ht7.data_rate_bps, 65_000_000);
    }

    #[test]
    fn test_thresholds_grow_with_rate_within_block() {
        let table = ModulationTable::build(&TableConfig::default());
        let he: Vec<_> = table
            .entries()
            .iter()
            .filter(|e| e.tier == ModulationTier::He)
            .collect();
        assert!(he[0].required_snr_db < he[7].required_snr_db);
        assert!(he[7].required_snr_db < he[11].required_snr_db);
        // The densest constellation needs a believable WLAN-grade SNR.
        assert!(he[11].required_snr_db > 25.0 && he[11].required_snr_db < 45.0);
    }

    #[test]
    fn test_increase_decrease_saturate() {
        let table = ModulationTable::build(&TableConfig::default());
        let caps = he_caps();
        let first = table.initial_index(&caps).unwrap();
        assert_eq!(table.entry(first).mcs, 0);
        assert_eq!(table.decrease_from(first, &caps), first);

        let mut idx = first;
        for _ in 0..20 {
            idx = table.increase_from(idx, &caps);
        }
        assert_eq!(table.entry(idx).mcs, 11);
        assert_eq!(table.increase_from(idx, &caps), idx);
    }

    #[test]
    fn test_scan_never_crosses_tier_boundary() {
        let table = ModulationTable::build(&TableConfig::default());
        let caps = LinkCapabilities {
            tier: ModulationTier::Legacy,
            ..he_caps()
        };
        let mut idx = table.initial_index(&caps).unwrap();
        for _ in 0..20 {
            idx = table.increase_from(idx, &caps);
        }
        assert_eq!(table.entry(idx).tier, ModulationTier::Legacy);
        assert_eq!(table.entry(idx).data_rate_bps, 54_000_000);
    }

    #[test]
    fn test_scan_stays_in_stream_block() {
        let config = TableConfig {
            max_streams: 2,
            ..TableConfig::default()
        };
        let table = ModulationTable::build(&config);
        let caps = LinkCapabilities {
            tier: ModulationTier::Ht,
            streams: 2,
            channel_width_mhz: 20,
            short_guard: false,
        };
        let start = table.initial_index(&caps).unwrap();
        assert_eq!(table.entry(start).streams, 2);
        let mut idx = start;
        for _ in 0..20 {
            idx = table.increase_from(idx, &caps);
        }
        // Top of the two-stream HT block, never into VHT.
        assert_eq!(table.entry(idx).tier, ModulationTier::Ht);
        assert_eq!(table.entry(idx).streams, 2);
        assert_eq!(table.entry(idx).mcs, 15);
        // Decreasing from the bottom of the block does not slide into nss1.
        assert_eq!(table.decrease_from(start, &caps), start);
    }

    #[test]
    fn test_best_under_snr_extremes() {
        let table = ModulationTable::build(&TableConfig::default());
        let caps = he_caps();
        // Far below every threshold: no feasible mode.
        assert!(table.best_under_snr(-20.0, &caps).is_none());
        // Generous SNR: the top of the ladder.
        let best = table.best_under_snr(60.0, &caps).unwrap();
        assert_eq!(table.entry(best).mcs, 11);
    }

    #[test]
    fn test_best_under_snr_equality_passes() {
        let table = ModulationTable::build(&TableConfig::default());
        let caps = he_caps();
        let idx = table.best_under_snr(30.0, &caps).unwrap();
        let threshold = table.entry(idx).required_snr_db;
        // Exactly at the winning entry's threshold the same entry still wins.
        assert_eq!(table.best_under_snr(threshold, &caps), Some(idx));
    }
}
