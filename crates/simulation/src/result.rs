//! Per-tick output record.
//!
//! A tree of primitives with stable snake_case names. Fixed-point values are
//! converted to `f64` here and nowhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use types::{BookLevel, BookSnapshot, Tick, Trade};

use crate::accounting::Account;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    pub tick: Tick,
    /// Reference price after this tick.
    pub price: f64,
    pub volume: u64,
    pub volatility: f64,
    /// Settled trades only.
    pub trades: Vec<TradeRecord>,
    /// Matches that settlement refused.
    pub rejected_trades: usize,
    pub order_book: BookRecord,
    pub accounts: BTreeMap<String, AccountStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: u64,
    pub buyer: String,
    pub seller: String,
    pub price: f64,
    pub quantity: u64,
    pub tick: Tick,
}

impl From<&Trade> for TradeRecord {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id.0,
            buyer: trade.buyer_id.to_string(),
            seller: trade.seller_id.to_string(),
            price: trade.price.to_float(),
            quantity: trade.quantity.raw(),
            tick: trade.tick,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BookRecord {
    pub bids: Vec<LevelRecord>,
    pub asks: Vec<LevelRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub price: f64,
    pub quantity: u64,
    pub orders: usize,
}

impl From<&BookLevel> for LevelRecord {
    fn from(level: &BookLevel) -> Self {
        Self {
            price: level.price.to_float(),
            quantity: level.quantity.raw(),
            orders: level.order_count,
        }
    }
}

impl From<&BookSnapshot> for BookRecord {
    fn from(snapshot: &BookSnapshot) -> Self {
        Self {
            bids: snapshot.bids.iter().map(LevelRecord::from).collect(),
            asks: snapshot.asks.iter().map(LevelRecord::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub balance: f64,
    pub assets: i64,
    pub equity: f64,
    pub pnl: f64,
    pub avg_entry_price: Option<f64>,
    pub trades_won: u64,
    pub trades_lost: u64,
    pub win_rate: Option<f64>,
    pub max_drawdown_value: f64,
    pub max_drawdown_pct: f64,
}

impl From<&Account> for AccountStats {
    fn from(account: &Account) -> Self {
        Self {
            balance: account.cash.to_float(),
            assets: account.position,
            equity: account.equity.to_float(),
            pnl: account.pnl.to_float(),
            avg_entry_price: account.avg_entry_price,
            trades_won: account.trades_won,
            trades_lost: account.trades_lost,
            win_rate: account.win_rate(),
            max_drawdown_value: account.max_drawdown_value.to_float(),
            max_drawdown_pct: account.max_drawdown_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{AccountId, Cash, OrderId, Price, Quantity, TradeId};

    #[test]
    fn test_field_names_are_stable() {
        let trade = Trade {
            id: TradeId(4),
            buyer_id: AccountId::from("b"),
            seller_id: AccountId::from("s"),
            buyer_order_id: OrderId(1),
            seller_order_id: OrderId(2),
            price: Price::from_float(100.5),
            quantity: Quantity(3),
            tick: 9,
        };
        let account = Account::new(AccountId::from("b"), Cash::from_float(50.0), 0, 50, Price::from_float(100.0));
        let result = TickResult {
            tick: 9,
            price: 100.5,
            volume: 3,
            volatility: 0.0,
            trades: vec![TradeRecord::from(&trade)],
            rejected_trades: 0,
            order_book: BookRecord::default(),
            accounts: BTreeMap::from([("b".to_string(), AccountStats::from(&account))]),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["trades"][0]["buyer"], "b");
        assert_eq!(json["trades"][0]["price"], 100.5);
        assert_eq!(json["accounts"]["b"]["balance"], 50.0);
        assert!(json["accounts"]["b"]["win_rate"].is_null());
        assert!(json["order_book"]["bids"].as_array().unwrap().is_empty());
    }
}
