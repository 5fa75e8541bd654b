//! Mean reversion trader: fades moves away from the trailing average.
//!
//! # Strategy Logic
//! - **Signal**: z-score of the current price over the last `lookback` prices
//! - **Short** when z > `entry_z`, **long** when z < `-entry_z`
//! - **Flatten** when |z| < `exit_z`
//!
//! With fewer than `lookback` prices there is no signal and the trader holds.

use serde::{Deserialize, Serialize};

use crate::sizing::{decide, SignalRead, TraderProfile};
use crate::traits::{Intent, Observation, Strategy};

/// Parameters for a [`MeanReversionTrader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    #[serde(alias = "mr_lookback")]
    pub lookback: usize,
    /// Below this dispersion the z-score is treated as 0.
    #[serde(alias = "mr_min_std")]
    pub min_std: f64,
    #[serde(alias = "mr_entry_z")]
    pub entry_z: f64,
    #[serde(alias = "mr_exit_z")]
    pub exit_z: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            min_std: 1e-3,
            entry_z: 1.0,
            exit_z: 0.25,
        }
    }
}

impl MeanReversionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.lookback < 2 {
            return Err(format!("lookback {} must be at least 2", self.lookback));
        }
        if self.exit_z < 0.0 || self.exit_z >= self.entry_z {
            return Err(format!(
                "exit_z {} must be in [0, entry_z {})",
                self.exit_z, self.entry_z
            ));
        }
        Ok(())
    }
}

pub struct MeanReversionTrader {
    config: MeanReversionConfig,
    profile: TraderProfile,
}

impl MeanReversionTrader {
    pub fn new(config: MeanReversionConfig, profile: TraderProfile) -> Self {
        Self { config, profile }
    }

    /// Z-score of the latest price over the trailing window, `None` while the
    /// window is incomplete.
    pub fn zscore(&self, prices: &[f64]) -> Option<f64> {
        if prices.len() < self.config.lookback {
            return None;
        }
        quant::zscore_last(quant::trailing(prices, self.config.lookback), self.config.min_std)
    }
}

impl Strategy for MeanReversionTrader {
    fn act(&mut self, obs: &Observation<'_>) -> Intent {
        let Some(z) = self.zscore(obs.prices) else {
            return Intent::Hold;
        };
        let inside_band = z.abs() < self.config.exit_z;
        let read = SignalRead {
            bullish: z < -self.config.entry_z,
            bearish: z > self.config.entry_z,
            flatten_long: inside_band,
            flatten_short: inside_band,
            strength: (z.abs() / self.config.entry_z.max(1e-6)).min(1.0),
        };
        decide(&self.profile, obs, read)
    }

    fn reset(&mut self) {}

    fn lookback(&self) -> usize {
        self.config.lookback
    }

    fn name(&self) -> &'static str {
        "mean_reversion"
    }
}
