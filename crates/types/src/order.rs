//! Order types.
//!
//! Every order is a limit order. It rests in the book until fully matched,
//! carrying the tick it was submitted at and the arrival sequence the book
//! assigned on admission.

use crate::error::ParseSideError;
use crate::ids::{AccountId, OrderId, Tick};
use crate::money::{Cash, Price, Quantity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Order Side
// =============================================================================

/// Which side of the market the order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            _ => Err(ParseSideError(s.to_string())),
        }
    }
}

// =============================================================================
// Order Struct
// =============================================================================

/// A resting limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Arrival sequence (assigned by the book, use 0 as placeholder).
    pub id: OrderId,
    pub account_id: AccountId,
    pub side: OrderSide,
    /// Limit price.
    pub price: Price,
    /// Remaining quantity.
    pub quantity: Quantity,
    /// Tick the order was submitted at.
    pub tick: Tick,
}

impl Order {
    pub fn new(
        account_id: impl Into<AccountId>,
        side: OrderSide,
        price: Price,
        quantity: Quantity,
        tick: Tick,
    ) -> Self {
        Self {
            id: OrderId(0),
            account_id: account_id.into(),
            side,
            price,
            quantity,
            tick,
        }
    }

    pub fn buy(account_id: impl Into<AccountId>, price: Price, quantity: Quantity, tick: Tick) -> Self {
        Self::new(account_id, OrderSide::Buy, price, quantity, tick)
    }

    pub fn sell(account_id: impl Into<AccountId>, price: Price, quantity: Quantity, tick: Tick) -> Self {
        Self::new(account_id, OrderSide::Sell, price, quantity, tick)
    }

    pub fn is_filled(&self) -> bool {
        self.quantity.is_zero()
    }

    /// `None` when price times quantity does not fit in `Cash`.
    pub fn notional(&self) -> Option<Cash> {
        self.price.checked_notional(self.quantity)
    }
}
