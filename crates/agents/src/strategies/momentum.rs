//! Momentum trader: follows short-horizon acceleration.
//!
//! # Strategy Logic
//! - **Signal**: short-window return minus long-window return
//! - **Long** when the signal clears `+entry_threshold`
//! - **Short** when it falls below `-entry_threshold` (if shorting is enabled)
//! - **Flatten** once momentum fades past the smaller `exit_threshold`
//!
//! The gap between entry and exit thresholds is the hysteresis band that
//! stops the trader flip-flopping on noise.

use serde::{Deserialize, Serialize};

use crate::sizing::{decide, SignalRead, TraderProfile};
use crate::traits::{Intent, Observation, Strategy};

/// Parameters for a [`MomentumTrader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Short lookback in ticks.
    #[serde(alias = "mom_short")]
    pub short_window: usize,
    /// Long lookback in ticks.
    #[serde(alias = "mom_long")]
    pub long_window: usize,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            short_window: 3,
            long_window: 10,
            entry_threshold: 0.003,
            exit_threshold: 0.0005,
        }
    }
}

impl MomentumConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.short_window == 0 {
            return Err("short_window must be positive".into());
        }
        if self.short_window >= self.long_window {
            return Err(format!(
                "short_window {} must be below long_window {}",
                self.short_window, self.long_window
            ));
        }
        if self.exit_threshold < 0.0 || self.exit_threshold >= self.entry_threshold {
            return Err(format!(
                "exit_threshold {} must be in [0, entry_threshold {})",
                self.exit_threshold, self.entry_threshold
            ));
        }
        Ok(())
    }
}

pub struct MomentumTrader {
    config: MomentumConfig,
    profile: TraderProfile,
}

impl MomentumTrader {
    pub fn new(config: MomentumConfig, profile: TraderProfile) -> Self {
        Self { config, profile }
    }

    /// Short-window return minus long-window return. `None` until the
    /// history is longer than both windows.
    pub fn signal(&self, prices: &[f64]) -> Option<f64> {
        let n = prices.len();
        let (short, long) = (self.config.short_window, self.config.long_window);
        if n <= short.max(long) {
            return None;
        }
        let now = prices[n - 1];
        let r_short = quant::pct_change(prices[n - 1 - short], now);
        let r_long = quant::pct_change(prices[n - 1 - long], now);
        Some(r_short - r_long)
    }
}

impl Strategy for MomentumTrader {
    fn act(&mut self, obs: &Observation<'_>) -> Intent {
        let Some(signal) = self.signal(obs.prices) else {
            return Intent::Hold;
        };
        let entry = self.config.entry_threshold;
        let exit = self.config.exit_threshold;
        let read = SignalRead {
            bullish: signal > entry,
            bearish: signal < -entry,
            flatten_long: signal < exit,
            flatten_short: signal > -exit,
            strength: (signal.abs() / entry.max(1e-6)).min(1.0),
        };
        decide(&self.profile, obs, read)
    }

    fn reset(&mut self) {}

    fn lookback(&self) -> usize {
        self.config.long_window.max(self.config.short_window)
    }

    fn name(&self) -> &'static str {
        "momentum"
    }
}
