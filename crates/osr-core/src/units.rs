//! dB/linear unit conversions and the thermal noise floor.
//!
//! All interference arithmetic in the spatial-reuse search happens in linear
//! watts; path losses and thresholds are carried in dB. The noise floor
//! follows the usual receiver model: thermal noise kTB at 290 K scaled by the
//! receiver noise figure.

/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.380649e-23;

/// Standard noise reference temperature in Kelvin.
pub const T0_KELVIN: f64 = 290.0;

/// Convert a power in dBm to watts.
pub fn dbm_to_watt(dbm: f64) -> f64 {
    10.0_f64.powf((dbm - 30.0) / 10.0)
}

/// Convert a power in watts to dBm.
pub fn watt_to_dbm(watt: f64) -> f64 {
    10.0 * watt.log10() + 30.0
}

/// Convert a dB value to a linear ratio.
pub fn db_to_ratio(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Convert a linear ratio to dB.
pub fn ratio_to_db(ratio: f64) -> f64 {
    10.0 * ratio.log10()
}

/// Receiver noise floor in watts for the given channel width and noise figure.
///
/// `N = F * k * T0 * B`, with the noise figure applied as a linear factor.
pub fn noise_floor_watt(channel_width_mhz: u16, noise_figure_db: f64) -> f64 {
    let thermal = BOLTZMANN * T0_KELVIN * channel_width_mhz as f64 * 1e6;
    db_to_ratio(noise_figure_db) * thermal
}

/// Linear SNR at a receiver given signal, aggregate interference, and the
/// noise floor, all in watts.
pub fn snr_ratio(signal_watt: f64, interference_watt: f64, noise_floor_watt: f64) -> f64 {
    signal_watt / (noise_floor_watt + interference_watt)
}
