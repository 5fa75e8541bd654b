//! Account state and trade settlement.
//!
//! ## Position and cost basis
//!
//! Positions are signed. A fill first closes any opposite-side position,
//! then opens or extends on its own side:
//! - extending: `new_cost = (old_cost * old_qty + price * added) / (old_qty + added)`
//! - opening from flat: `new_cost = price`
//! - back to flat: no cost basis
//!
//! ## Scoring
//!
//! Only the closing part of a fill is scored: a win when the close is better
//! than the cost basis it closes against, a loss when worse.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{AccountId, Cash, ConfigError, OrderSide, Price, Quantity, RiskViolation, Tick, Trade};

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub cash: Cash,
    /// Signed units (positive = long, negative = short).
    pub position: i64,
    /// Weighted average entry price. `None` exactly when flat.
    pub avg_entry_price: Option<f64>,
    /// Largest short magnitude settlement will allow.
    pub short_cap: u64,
    /// Driven by external orders instead of a strategy.
    pub is_user: bool,

    pub starting_equity: Cash,
    pub equity: Cash,
    pub pnl: Cash,
    pub peak_equity: Cash,
    pub max_drawdown_value: Cash,
    pub max_drawdown_pct: f64,
    pub trades_won: u64,
    pub trades_lost: u64,
}

impl Account {
    /// Open an account valued at `price`. An initial position is booked at
    /// that price.
    pub fn new(id: AccountId, cash: Cash, position: i64, short_cap: u64, price: Price) -> Self {
        let equity = cash.saturating_add(price * position);
        Self {
            id,
            cash,
            position,
            avg_entry_price: (position != 0).then(|| price.to_float()),
            short_cap,
            is_user: false,
            starting_equity: equity,
            equity,
            pnl: Cash::ZERO,
            peak_equity: equity,
            max_drawdown_value: Cash::ZERO,
            max_drawdown_pct: 0.0,
            trades_won: 0,
            trades_lost: 0,
        }
    }

    pub fn with_user_control(mut self, is_user: bool) -> Self {
        self.is_user = is_user;
        self
    }

    /// Wins over closed legs, undefined before the first close.
    pub fn win_rate(&self) -> Option<f64> {
        let closed = self.trades_won + self.trades_lost;
        (closed > 0).then(|| self.trades_won as f64 / closed as f64)
    }

    /// Apply one leg of a settled trade: cash, position, cost basis, score.
    fn apply_fill(&mut self, side: OrderSide, price: Price, quantity: Quantity) {
        let notional = price * quantity;
        match side {
            OrderSide::Buy => self.cash -= notional,
            OrderSide::Sell => self.cash += notional,
        }

        let px = price.to_float();
        let sign = side.sign();
        let qty = quantity.signed();

        // Close against an opposite position first.
        let closing = if self.position * sign < 0 {
            qty.min(self.position.abs())
        } else {
            0
        };
        if closing > 0 {
            if let Some(cost) = self.avg_entry_price {
                let edge = (px - cost) * self.position.signum() as f64;
                if edge > 0.0 {
                    self.trades_won += 1;
                } else if edge < 0.0 {
                    self.trades_lost += 1;
                }
            }
            self.position += sign * closing;
            if self.position == 0 {
                self.avg_entry_price = None;
            }
        }

        let opening = qty - closing;
        if opening > 0 {
            let held = self.position.abs() as f64;
            self.avg_entry_price = Some(match self.avg_entry_price {
                Some(cost) if self.position != 0 => (cost * held + px * opening as f64) / (held + opening as f64),
                _ => px,
            });
            self.position += sign * opening;
        }
    }

    /// Revalue at `price` and update PnL and drawdown.
    pub fn mark_to_market(&mut self, price: Price) {
        self.equity = self.cash.saturating_add(price * self.position);
        self.pnl = self.equity.saturating_sub(self.starting_equity);
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }
        let drawdown = self.peak_equity.saturating_sub(self.equity);
        if drawdown > self.max_drawdown_value {
            self.max_drawdown_value = drawdown;
            self.max_drawdown_pct = if self.peak_equity > Cash::ZERO {
                drawdown.to_float() / self.peak_equity.to_float()
            } else {
                0.0
            };
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Audit record for one leg of a settled trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account_id: AccountId,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub price: Price,
    pub tick: Tick,
}

/// A trade settlement refused, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub trade: Trade,
    pub reason: RiskViolation,
}

/// Outcome of settling one batch of trades, in input order.
#[derive(Debug, Clone, Default)]
pub struct SettlementReport {
    pub settled: Vec<Trade>,
    pub rejected: Vec<Rejection>,
}

// =============================================================================
// Accounts
// =============================================================================

/// Every account in the market, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct Accounts {
    accounts: Vec<Account>,
    index: HashMap<AccountId, usize>,
}

impl Accounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: Account) -> Result<(), ConfigError> {
        if self.index.contains_key(&account.id) {
            return Err(ConfigError::DuplicateAccount(account.id));
        }
        self.index.insert(account.id.clone(), self.accounts.len());
        self.accounts.push(account);
        Ok(())
    }

    pub fn get(&self, id: &AccountId) -> Option<&Account> {
        self.index.get(id).map(|&i| &self.accounts[i])
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Settle `trades` in order, appending two ledger entries per accepted trade.
    pub fn settle(&mut self, trades: &[Trade], tick: Tick, ledger: &mut Vec<LedgerEntry>) -> SettlementReport {
        let mut report = SettlementReport::default();
        for trade in trades {
            match self.settle_trade(trade) {
                Ok(()) => {
                    ledger.push(LedgerEntry {
                        account_id: trade.buyer_id.clone(),
                        side: OrderSide::Buy,
                        quantity: trade.quantity,
                        price: trade.price,
                        tick,
                    });
                    ledger.push(LedgerEntry {
                        account_id: trade.seller_id.clone(),
                        side: OrderSide::Sell,
                        quantity: trade.quantity,
                        price: trade.price,
                        tick,
                    });
                    report.settled.push(trade.clone());
                }
                Err(reason) => {
                    debug!(trade = %trade, %reason, "settlement dropped trade");
                    report.rejected.push(Rejection {
                        trade: trade.clone(),
                        reason,
                    });
                }
            }
        }
        report
    }

    fn settle_trade(&mut self, trade: &Trade) -> Result<(), RiskViolation> {
        let buyer = *self
            .index
            .get(&trade.buyer_id)
            .ok_or_else(|| RiskViolation::UnknownAccount(trade.buyer_id.clone()))?;
        let seller = *self
            .index
            .get(&trade.seller_id)
            .ok_or_else(|| RiskViolation::UnknownAccount(trade.seller_id.clone()))?;

        let overflow = |account: &AccountId| RiskViolation::BalanceOverflow {
            account: account.clone(),
            price: trade.price,
            quantity: trade.quantity,
        };

        let notional = trade.notional().ok_or_else(|| overflow(&trade.buyer_id))?;
        let available = self.accounts[buyer].cash;
        if available < notional {
            return Err(RiskViolation::InsufficientFunds {
                account: trade.buyer_id.clone(),
                required: notional,
                available,
            });
        }

        let seller_account = &self.accounts[seller];
        let floor = -i64::try_from(seller_account.short_cap).unwrap_or(i64::MAX);
        let remaining = i64::try_from(trade.quantity.raw())
            .ok()
            .and_then(|qty| seller_account.position.checked_sub(qty));
        if remaining.map_or(true, |position| position < floor) {
            return Err(RiskViolation::ShortCapExceeded {
                account: trade.seller_id.clone(),
                quantity: trade.quantity,
                position: seller_account.position,
                cap: seller_account.short_cap,
            });
        }
        if seller_account.cash.checked_add(notional).is_none() {
            return Err(overflow(&trade.seller_id));
        }
        let bought = i64::try_from(trade.quantity.raw())
            .ok()
            .and_then(|qty| self.accounts[buyer].position.checked_add(qty));
        if bought.is_none() {
            return Err(overflow(&trade.buyer_id));
        }

        self.accounts[buyer].apply_fill(OrderSide::Buy, trade.price, trade.quantity);
        self.accounts[seller].apply_fill(OrderSide::Sell, trade.price, trade.quantity);
        Ok(())
    }

    /// Revalue every account at `price`.
    pub fn mark_to_market(&mut self, price: Price) {
        for account in &mut self.accounts {
            account.mark_to_market(price);
        }
    }
}
