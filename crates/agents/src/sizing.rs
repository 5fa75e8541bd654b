//! Shared trader parameters and the signal-to-order rules used by the
//! rule-based strategies.
//!
//! # Decision order
//!
//! 1. Bullish: cover an open short first, otherwise build or extend a long.
//! 2. Bearish: reduce an open long first, otherwise build or extend a short
//!    when shorting is enabled.
//! 3. Inside the hysteresis band: step the position back toward flat.
//!
//! Every branch is capped by cash affordability and the long/short unit caps.

use serde::{Deserialize, Serialize};
use types::{ConfigError, Price};

use crate::traits::{Intent, Observation};

// =============================================================================
// Trader Profile
// =============================================================================

/// Risk and sizing parameters common to every strategy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderProfile {
    /// 0 (aggressive) to 1 (cautious). Shrinks order sizes.
    pub risk_aversion: f64,
    pub shorting_enabled: bool,
    pub max_long_units: u64,
    /// Also the account's short cap at settlement.
    pub max_short_units: u64,
    /// Lot size seed.
    pub base_qty: u64,
    /// Limit price distance from the reference price (buy above, sell below).
    pub limit_offset_pct: f64,
}

impl Default for TraderProfile {
    fn default() -> Self {
        Self {
            risk_aversion: 0.5,
            shorting_enabled: true,
            max_long_units: 50,
            max_short_units: 50,
            base_qty: 2,
            limit_offset_pct: 0.002,
        }
    }
}

impl TraderProfile {
    pub fn with_risk_aversion(mut self, risk_aversion: f64) -> Self {
        self.risk_aversion = risk_aversion;
        self
    }

    pub fn with_shorting(mut self, enabled: bool) -> Self {
        self.shorting_enabled = enabled;
        self
    }

    pub fn with_base_qty(mut self, base_qty: u64) -> Self {
        self.base_qty = base_qty;
        self
    }

    pub fn with_caps(mut self, max_long_units: u64, max_short_units: u64) -> Self {
        self.max_long_units = max_long_units;
        self.max_short_units = max_short_units;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.risk_aversion) {
            return Err(format!("risk_aversion {} outside [0, 1]", self.risk_aversion));
        }
        if self.base_qty == 0 {
            return Err("base_qty must be positive".into());
        }
        if !(0.0..1.0).contains(&self.limit_offset_pct) {
            return Err(format!("limit_offset_pct {} outside [0, 1)", self.limit_offset_pct));
        }
        Ok(())
    }

    /// Lot size for a signal strength in [0, 1]: larger with conviction,
    /// smaller with risk aversion.
    pub fn size_for(&self, strength: f64) -> u64 {
        let base = self.base_qty as f64;
        let boost = (base * strength * (1.0 - 0.6 * self.risk_aversion)).ceil().max(0.0);
        (self.base_qty + boost as u64).max(1)
    }

    pub fn buy_price(&self, px: f64) -> Price {
        Price::from_float_cents(px * (1.0 + self.limit_offset_pct))
    }

    pub fn sell_price(&self, px: f64) -> Price {
        Price::from_float_cents(px * (1.0 - self.limit_offset_pct))
    }

    /// Units the long side can still grow by.
    pub fn long_room(&self, position: i64) -> u64 {
        self.max_long_units.saturating_sub(position.max(0) as u64)
    }

    /// Units the short side can still grow by. Zero when shorting is off.
    pub fn short_room(&self, position: i64) -> u64 {
        if !self.shorting_enabled {
            return 0;
        }
        self.max_short_units.saturating_sub((-position).max(0) as u64)
    }
}

/// Wrap a profile validation failure for one account.
pub(crate) fn profile_error(account: &types::AccountId, message: String) -> ConfigError {
    ConfigError::trader(account, message)
}

// =============================================================================
// Signal Rules
// =============================================================================

/// Thresholded view of a raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalRead {
    pub bullish: bool,
    pub bearish: bool,
    pub flatten_long: bool,
    pub flatten_short: bool,
    /// Conviction in [0, 1].
    pub strength: f64,
}

/// Turn a thresholded signal into an intent for the observing account.
pub fn decide(profile: &TraderProfile, obs: &Observation<'_>, read: SignalRead) -> Intent {
    let px = obs.price();
    let pos = obs.position;
    let size = profile.size_for(read.strength);
    let affordable = obs.cash.units_affordable(obs.reference_price);
    let buy = |qty: u64| Intent::buy(qty, profile.buy_price(px));
    let sell = |qty: u64| Intent::sell(qty, profile.sell_price(px));
    let owed = (-pos).max(0) as u64;
    let held = pos.max(0) as u64;

    if read.bullish {
        let qty = if pos < 0 {
            size.min(affordable).min(owed)
        } else {
            size.min(profile.long_room(pos)).min(affordable)
        };
        return if qty > 0 { buy(qty) } else { Intent::Hold };
    }

    if read.bearish {
        let qty = if pos > 0 {
            size.min(held)
        } else {
            size.min(profile.short_room(pos))
        };
        return if qty > 0 { sell(qty) } else { Intent::Hold };
    }

    if pos > 0 && read.flatten_long {
        return sell(size.min(held));
    }
    if pos < 0 && read.flatten_short {
        let qty = size.min(owed).min(affordable);
        if qty > 0 {
            return buy(qty);
        }
    }
    Intent::Hold
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Cash, Quantity};

    fn obs(cash: f64, position: i64) -> Observation<'static> {
        Observation {
            reference_price: Price::from_float(100.0),
            last_volume: Quantity(0),
            cash: Cash::from_float(cash),
            position,
            tick: 10,
            prices: &[],
        }
    }

    fn bullish(strength: f64) -> SignalRead {
        SignalRead { bullish: true, strength, ..Default::default() }
    }

    fn bearish(strength: f64) -> SignalRead {
        SignalRead { bearish: true, strength, ..Default::default() }
    }

    #[test]
    fn test_size_scales_with_strength_and_risk() {
        let bold = TraderProfile::default().with_risk_aversion(0.0);
        let shy = TraderProfile::default().with_risk_aversion(1.0);
        assert_eq!(bold.size_for(0.0), 2);
        assert_eq!(bold.size_for(1.0), 4);
        assert_eq!(shy.size_for(1.0), 3);
    }

    #[test]
    fn test_limit_prices_straddle_reference() {
        let p = TraderProfile::default();
        assert_eq!(p.buy_price(100.0), Price::from_float(100.2));
        assert_eq!(p.sell_price(100.0), Price::from_float(99.8));
    }

    #[test]
    fn test_bullish_covers_short_first() {
        let p = TraderProfile::default().with_risk_aversion(0.0);
        let intent = decide(&p, &obs(10_000.0, -1), bullish(1.0));
        assert_eq!(intent, Intent::buy(1, Price::from_float(100.2)));
    }

    #[test]
    fn test_bullish_builds_long_within_cash() {
        let p = TraderProfile::default().with_risk_aversion(0.0);
        assert_eq!(decide(&p, &obs(250.0, 0), bullish(1.0)), Intent::buy(2, Price::from_float(100.2)));
        assert_eq!(decide(&p, &obs(50.0, 0), bullish(1.0)), Intent::Hold);
    }

    #[test]
    fn test_bullish_respects_long_cap() {
        let p = TraderProfile::default().with_caps(10, 10);
        assert_eq!(decide(&p, &obs(1e6, 10), bullish(1.0)), Intent::Hold);
    }

    #[test]
    fn test_bearish_reduces_long_then_shorts() {
        let p = TraderProfile::default().with_risk_aversion(0.0);
        assert_eq!(decide(&p, &obs(0.0, 1), bearish(1.0)), Intent::sell(1, Price::from_float(99.8)));
        assert_eq!(decide(&p, &obs(0.0, 0), bearish(1.0)), Intent::sell(4, Price::from_float(99.8)));
    }

    #[test]
    fn test_bearish_without_shorting_holds_when_flat() {
        let p = TraderProfile::default().with_shorting(false);
        assert_eq!(decide(&p, &obs(0.0, 0), bearish(1.0)), Intent::Hold);
    }

    #[test]
    fn test_flatten_both_directions() {
        let p = TraderProfile::default();
        let read = SignalRead { flatten_long: true, flatten_short: true, ..Default::default() };
        assert_eq!(decide(&p, &obs(0.0, 5), read), Intent::sell(2, Price::from_float(99.8)));
        assert_eq!(decide(&p, &obs(1000.0, -5), read), Intent::buy(2, Price::from_float(100.2)));
        // Covering needs cash.
        assert_eq!(decide(&p, &obs(0.0, -5), read), Intent::Hold);
    }

    #[test]
    fn test_profile_validation() {
        assert!(TraderProfile::default().validate().is_ok());
        assert!(TraderProfile::default().with_risk_aversion(1.5).validate().is_err());
        assert!(TraderProfile::default().with_base_qty(0).validate().is_err());
    }
}
