//! Matched trades and order book snapshots.

use crate::ids::{AccountId, OrderId, Tick, TradeId};
use crate::money::{Cash, Price, Quantity};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Trade
// =============================================================================

/// A match between one resting bid and one resting ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub buyer_id: AccountId,
    pub seller_id: AccountId,
    pub buyer_order_id: OrderId,
    pub seller_order_id: OrderId,
    /// Midpoint of the two resting prices.
    pub price: Price,
    pub quantity: Quantity,
    /// Later of the two orders' submission ticks.
    pub tick: Tick,
}

impl Trade {
    /// Cash that changes hands, `None` if it overflows.
    pub fn notional(&self) -> Option<Cash> {
        self.price.checked_notional(self.quantity)
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} @ {} (buyer: {}, seller: {})",
            self.id, self.quantity, self.price, self.buyer_id, self.seller_id
        )
    }
}

// =============================================================================
// Book Snapshot
// =============================================================================

/// One row of a book snapshot: a price level, or a single order when the
/// snapshot is not aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: usize,
}

/// Top of the book at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BookSnapshot {
    /// Highest first.
    pub bids: Vec<BookLevel>,
    /// Lowest first.
    pub asks: Vec<BookLevel>,
    pub tick: Tick,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(bid.midpoint(ask)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
