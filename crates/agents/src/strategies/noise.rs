//! Noise trader: random single-lot orders scattered around the price.
//!
//! Supplies background two-sided flow so the book has something to cross
//! against. Draws from its own seeded RNG, so runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use types::Price;

use crate::sizing::TraderProfile;
use crate::traits::{Intent, Observation, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Probability of trading on a given tick.
    pub activity: f64,
    /// Maximum relative distance of the limit price from the reference.
    pub noise_weight: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            activity: 0.5,
            noise_weight: 0.01,
        }
    }
}

impl NoiseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.activity) {
            return Err(format!("activity {} outside [0, 1]", self.activity));
        }
        if !(0.0..1.0).contains(&self.noise_weight) {
            return Err(format!("noise_weight {} outside [0, 1)", self.noise_weight));
        }
        Ok(())
    }
}

pub struct NoiseTrader {
    config: NoiseConfig,
    profile: TraderProfile,
    seed: u64,
    rng: StdRng,
}

impl NoiseTrader {
    pub fn new(config: NoiseConfig, profile: TraderProfile, seed: u64) -> Self {
        Self {
            config,
            profile,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Strategy for NoiseTrader {
    fn act(&mut self, obs: &Observation<'_>) -> Intent {
        if self.rng.gen::<f64>() >= self.config.activity {
            return Intent::Hold;
        }
        let buying = self.rng.gen_bool(0.5);
        let u: f64 = self.rng.gen_range(-1.0..=1.0);
        let price = Price::from_float_cents(obs.price() * (1.0 + u * self.config.noise_weight));
        let qty = self.profile.base_qty;

        if buying {
            if obs.cash.units_affordable(price) < qty {
                return Intent::Hold;
            }
            Intent::buy(qty, price)
        } else {
            let sellable = obs.position.max(0) as u64 + self.profile.short_room(obs.position);
            if sellable < qty {
                return Intent::Hold;
            }
            Intent::sell(qty, price)
        }
    }

    /// Rewind the RNG so a reset run replays the same draws.
    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn lookback(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "noise"
    }
}
