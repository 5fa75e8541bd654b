//! The strategy capability contract.
//!
//! Every decision model receives the same [`Observation`] each tick and
//! answers with an [`Intent`]. Strategies never see or mutate account state
//! directly; the engine owns accounts and only Settlement changes them.

use types::{Cash, OrderSide, Price, Quantity, Tick};

// =============================================================================
// Intent
// =============================================================================

/// What a strategy wants to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    #[default]
    Hold,
    Buy { quantity: u64, price: Price },
    Sell { quantity: u64, price: Price },
}

impl Intent {
    pub fn buy(quantity: u64, price: Price) -> Self {
        Intent::Buy { quantity, price }
    }

    pub fn sell(quantity: u64, price: Price) -> Self {
        Intent::Sell { quantity, price }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Intent::Hold)
    }

    /// Side, quantity and price of an orderable intent.
    ///
    /// Malformed intents (zero quantity or non-positive price) collapse to
    /// `None`, the same as hold.
    pub fn order_terms(&self) -> Option<(OrderSide, Quantity, Price)> {
        let (side, quantity, price) = match *self {
            Intent::Hold => return None,
            Intent::Buy { quantity, price } => (OrderSide::Buy, quantity, price),
            Intent::Sell { quantity, price } => (OrderSide::Sell, quantity, price),
        };
        (quantity > 0 && price.is_positive()).then_some((side, Quantity(quantity), price))
    }
}

// =============================================================================
// Observation
// =============================================================================

/// Per-account view of the market handed to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub reference_price: Price,
    pub last_volume: Quantity,
    pub cash: Cash,
    pub position: i64,
    pub tick: Tick,
    /// Trailing reference prices, oldest first, ending with the current one.
    pub prices: &'a [f64],
}

impl Observation<'_> {
    pub fn price(&self) -> f64 {
        self.reference_price.to_float()
    }

    /// Mark-to-market value of cash plus position.
    pub fn equity(&self) -> f64 {
        (self.cash + self.reference_price * self.position).to_float()
    }
}

// =============================================================================
// Strategy Trait
// =============================================================================

/// A pluggable decision model.
pub trait Strategy {
    /// Decide this tick's intent.
    fn act(&mut self, obs: &Observation<'_>) -> Intent;

    /// Drop episode-local state.
    fn reset(&mut self);

    /// How many trailing prices the strategy reads.
    fn lookback(&self) -> usize;

    fn name(&self) -> &'static str;

    /// Called once with the final observation when a run ends.
    fn finish(&mut self, _obs: &Observation<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_intents_have_no_order_terms() {
        assert_eq!(Intent::Hold.order_terms(), None);
        assert_eq!(Intent::buy(0, Price::from_float(10.0)).order_terms(), None);
        assert_eq!(Intent::sell(3, Price::ZERO).order_terms(), None);

        let terms = Intent::sell(3, Price::from_float(10.0)).order_terms();
        assert_eq!(terms, Some((OrderSide::Sell, Quantity(3), Price::from_float(10.0))));
    }

    #[test]
    fn test_observation_equity() {
        let prices = [100.0];
        let obs = Observation {
            reference_price: Price::from_float(100.0),
            last_volume: Quantity(0),
            cash: Cash::from_float(500.0),
            position: -2,
            tick: 1,
            prices: &prices,
        };
        assert!((obs.equity() - 300.0).abs() < 1e-9);
    }
}
