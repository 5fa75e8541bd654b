//! State features for the learned policy.

use smallvec::SmallVec;

use crate::traits::Observation;

/// Feature vector; eight features fit inline.
pub type StateVec = SmallVec<[f64; 8]>;

/// Normalised observation features, padded with zeros or truncated to `size`.
///
/// Order: price, volume, cash, position, tick, trend over the window,
/// mean of the last three returns, dispersion of the last five prices
/// relative to the current price (zero until five prices exist).
pub fn extract(obs: &Observation<'_>, size: usize) -> StateVec {
    let px = obs.price();
    let window = obs.prices;

    let trend = match window.first() {
        Some(&p0) if window.len() >= 2 && p0 != 0.0 => (px - p0) / p0,
        _ => 0.0,
    };
    let recent_returns = quant::returns(quant::trailing(window, 4));
    let momentum = quant::mean(&recent_returns).unwrap_or(0.0);
    let volatility = if window.len() >= 5 {
        quant::std_dev_or_zero(quant::trailing(window, 5)) / (px + 1e-9)
    } else {
        0.0
    };

    let mut state: StateVec = SmallVec::from_buf([
        px / 200.0,
        obs.last_volume.raw() as f64 / 2000.0,
        obs.cash.to_float() / 5000.0,
        obs.position as f64 / 50.0,
        obs.tick as f64 / 1000.0,
        trend,
        momentum,
        volatility,
    ]);
    state.resize(size, 0.0);
    state
}
