//! The market engine: one `tick()` moves the whole market forward.
//!
//! # Tick phases
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              MarketEngine::tick()            │
//! │                                              │
//! │  1. Observe: each strategy acts on its view  │
//! │  2. Admit intents (+ market maker quotes)    │
//! │  3. Match                                    │
//! │  4. Settle; unwind rejections, re-match      │
//! │  5. Reference price, volume, volatility      │
//! │  6. Mark accounts to market                  │
//! │  7. Emit TickResult                          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Settlement is authoritative. A rejected trade cancels the offending
//! order, gives the counterparty its quantity back at its original priority,
//! and the book is matched again until a pass settles cleanly. The book is
//! never left crossed between ticks.

use std::str::FromStr;

use agents::{build_strategy, BuildContext, Observation, SeedHierarchy, Strategy, StrategyModel};
use quant::{std_dev_or_zero, trailing};
use serde::{Deserialize, Serialize};
use sim_core::{OrderBook, SimCoreError};
use tracing::{debug, info, trace, warn};
use types::{
    AccountId, Cash, Order, OrderId, OrderSide, Price, Quantity, RiskViolation, Tick, Trade,
};

use crate::accounting::{Account, Accounts, LedgerEntry, Rejection};
use crate::config::{MarketConfig, MarketMakerSpec};
use crate::error::Result;
use crate::result::{AccountStats, BookRecord, TickResult, TradeRecord};

/// Trailing prices used for volatility.
const VOLATILITY_WINDOW: usize = 10;

/// Shortest observation window handed to strategies.
const MIN_OBSERVATION_WINDOW: usize = 5;

// =============================================================================
// Market State
// =============================================================================

/// Append-only market histories. Index 0 is the initial state.
#[derive(Debug, Clone, Default)]
pub struct MarketState {
    pub tick: Tick,
    pub price_history: Vec<f64>,
    pub volume_history: Vec<u64>,
    pub volatility_history: Vec<f64>,
}

impl MarketState {
    fn new(initial_price: Price) -> Self {
        Self {
            tick: 0,
            price_history: vec![initial_price.to_float()],
            volume_history: vec![0],
            volatility_history: vec![0.0],
        }
    }

    pub fn last_volume(&self) -> u64 {
        self.volume_history.last().copied().unwrap_or(0)
    }
}

// =============================================================================
// External Orders
// =============================================================================

/// An order injected from outside the strategy population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOrder {
    pub account_id: String,
    /// `"buy"` or `"sell"`, any case.
    pub side: String,
    pub price: f64,
    pub quantity: i64,
}

impl ExternalOrder {
    pub fn new(account_id: impl Into<String>, side: impl Into<String>, price: f64, quantity: i64) -> Self {
        Self {
            account_id: account_id.into(),
            side: side.into(),
            price,
            quantity,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

struct Trader {
    account_id: AccountId,
    model: StrategyModel,
}

pub struct MarketEngine {
    config: MarketConfig,
    book: OrderBook,
    accounts: Accounts,
    traders: Vec<Trader>,
    state: MarketState,
    price: Price,
    /// Trailing prices each observation carries.
    window: usize,
    transactions: Vec<LedgerEntry>,
}

impl MarketEngine {
    /// Validate `config` and build the market.
    pub fn new(config: MarketConfig) -> Result<Self> {
        config.validate()?;

        let price = Price::from_float(config.initial_price);
        let seeds = SeedHierarchy::new(config.seed);
        let mut accounts = Accounts::new();
        let mut traders = Vec::with_capacity(config.traders.len());

        for spec in &config.traders {
            let profile = config.risk.effective_profile(&spec.profile);
            let model = build_strategy(
                &spec.strategy,
                &BuildContext {
                    account_id: &spec.id,
                    profile: &profile,
                    seeds,
                },
            )?;
            let account = Account::new(
                spec.id.clone(),
                Cash::from_float(spec.balance),
                spec.assets,
                config.risk.short_cap(spec.profile.max_short_units),
                price,
            )
            .with_user_control(spec.is_user);
            accounts.insert(account)?;
            traders.push(Trader {
                account_id: spec.id.clone(),
                model,
            });
        }

        if let Some(mm) = &config.market_maker {
            accounts.insert(Account::new(
                mm.id.clone(),
                Cash::from_float(mm.balance),
                mm.assets,
                config.risk.short_cap(mm.max_short_units),
                price,
            ))?;
        }

        let window = traders
            .iter()
            .map(|t| t.model.lookback() + 2)
            .fold(MIN_OBSERVATION_WINDOW, usize::max);

        info!(
            accounts = accounts.len(),
            strategies = traders.len(),
            seed = config.seed,
            window,
            "market initialized"
        );

        Ok(Self {
            state: MarketState::new(price),
            config,
            book: OrderBook::new(),
            accounts,
            traders,
            price,
            window,
            transactions: Vec::new(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Ticks completed so far.
    pub fn current_tick(&self) -> Tick {
        self.state.tick
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Ledger entries from the last tick's settlement.
    pub fn transactions(&self) -> &[LedgerEntry] {
        &self.transactions
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn observation_window(&self) -> usize {
        self.window
    }

    /// The strategy driving `id`, if any.
    pub fn strategy(&self, id: &AccountId) -> Option<&StrategyModel> {
        self.traders.iter().find(|t| &t.account_id == id).map(|t| &t.model)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Queue an external order for the next tick.
    ///
    /// Validated exactly as admission validates; stamped with the tick it
    /// will be matched in.
    pub fn submit_order(&mut self, order: ExternalOrder) -> Result<OrderId> {
        let side = OrderSide::from_str(&order.side).map_err(SimCoreError::from)?;
        if order.quantity <= 0 {
            return Err(SimCoreError::InvalidOrder(format!(
                "quantity must be positive ({} from {})",
                order.quantity, order.account_id
            ))
            .into());
        }
        if !order.price.is_finite() {
            return Err(SimCoreError::InvalidOrder(format!("price {} is not a number", order.price)).into());
        }

        let order = Order::new(
            order.account_id,
            side,
            Price::from_float(order.price),
            Quantity(order.quantity as u64),
            self.state.tick + 1,
        );
        let id = self.book.admit(order)?;
        debug!(%id, "external order admitted");
        Ok(id)
    }

    /// Advance the market one tick.
    pub fn tick(&mut self) -> TickResult {
        self.state.tick += 1;
        let tick = self.state.tick;

        self.collect_orders(tick);
        let (trades, rejected) = self.match_and_settle(tick);

        self.price = Price::mean(trades.iter().map(|t| t.price)).unwrap_or(self.price);
        let volume = trades.iter().fold(0u64, |acc, t| acc.saturating_add(t.quantity.raw()));
        self.state.price_history.push(self.price.to_float());
        self.state.volume_history.push(volume);
        let volatility = std_dev_or_zero(trailing(&self.state.price_history, VOLATILITY_WINDOW));
        self.state.volatility_history.push(volatility);

        self.accounts.mark_to_market(self.price);

        trace!(
            tick,
            price = %self.price,
            volume,
            trades = trades.len(),
            rejected,
            resting = self.book.len(),
            "tick complete"
        );

        let snapshot = self
            .book
            .snapshot(self.config.snapshot_depth, self.config.aggregate_snapshot, tick);
        TickResult {
            tick,
            price: self.price.to_float(),
            volume,
            volatility,
            trades: trades.iter().map(TradeRecord::from).collect(),
            rejected_trades: rejected,
            order_book: BookRecord::from(&snapshot),
            accounts: self
                .accounts
                .iter()
                .map(|a| (a.id.to_string(), AccountStats::from(a)))
                .collect(),
        }
    }

    /// Run `n` ticks.
    pub fn run(&mut self, n: u64) -> Vec<TickResult> {
        info!(ticks = n, from = self.state.tick, "run started");
        let results: Vec<TickResult> = (0..n).map(|_| self.tick()).collect();
        info!(tick = self.state.tick, price = %self.price, "run finished");
        results
    }

    /// Give every strategy its final observation.
    pub fn end_episode(&mut self) {
        let Self {
            traders,
            accounts,
            state,
            price,
            window,
            ..
        } = self;
        for trader in traders.iter_mut() {
            let Some(account) = accounts.get(&trader.account_id) else {
                continue;
            };
            if account.is_user {
                continue;
            }
            trader.model.finish(&observe(state, account, *price, *window));
        }
        info!(tick = state.tick, "episode ended");
    }

    // =========================================================================
    // Tick Phases
    // =========================================================================

    fn collect_orders(&mut self, tick: Tick) {
        let mut orders = Vec::new();
        for trader in &mut self.traders {
            let Some(account) = self.accounts.get(&trader.account_id) else {
                continue;
            };
            if account.is_user {
                continue;
            }
            let obs = observe(&self.state, account, self.price, self.window);
            if let Some((side, quantity, price)) = trader.model.act(&obs).order_terms() {
                orders.push(Order::new(trader.account_id.clone(), side, price, quantity, tick));
            }
        }

        if let Some(mm) = &self.config.market_maker {
            orders.extend(quotes(mm, self.price, tick));
        }

        for order in orders {
            if let Err(err) = self.book.admit(order) {
                debug!(%err, "order rejected at admission");
            }
        }
    }

    /// Match and settle until a pass settles every trade it produced.
    ///
    /// Returns the settled trades and the number of rejections.
    fn match_and_settle(&mut self, tick: Tick) -> (Vec<Trade>, usize) {
        self.transactions.clear();
        let mut settled = Vec::new();
        let mut rejected = 0;

        loop {
            let trades = self.book.match_orders();
            if trades.is_empty() {
                break;
            }
            let report = self.accounts.settle(&trades, tick, &mut self.transactions);
            settled.extend(report.settled);
            if report.rejected.is_empty() {
                break;
            }
            rejected += report.rejected.len();
            for rejection in &report.rejected {
                self.unwind(rejection);
            }
        }

        (settled, rejected)
    }

    /// Cancel the offending order of a rejected trade and give the other side
    /// its quantity back.
    fn unwind(&mut self, rejection: &Rejection) {
        let trade = &rejection.trade;
        let (cancel_buyer, cancel_seller) = match &rejection.reason {
            RiskViolation::InsufficientFunds { .. } => (true, false),
            RiskViolation::ShortCapExceeded { .. } => (false, true),
            RiskViolation::BalanceOverflow { account, .. } => {
                (account == &trade.buyer_id, account == &trade.seller_id)
            }
            RiskViolation::UnknownAccount(_) => (
                !self.accounts.contains(&trade.buyer_id),
                !self.accounts.contains(&trade.seller_id),
            ),
        };

        for (order_id, cancel) in [
            (trade.buyer_order_id, cancel_buyer),
            (trade.seller_order_id, cancel_seller),
        ] {
            let outcome = if cancel {
                self.book.cancel(order_id).map(|_| ())
            } else {
                self.book.restore(order_id, trade.quantity)
            };
            match outcome {
                Ok(()) => {}
                // Already cancelled by an earlier rejection in this batch.
                Err(err) if cancel => debug!(%err, "cancel skipped"),
                Err(err) => warn!(%err, trade = %trade, "restore found no order"),
            }
        }
    }
}

/// Per-account market view for one strategy.
fn observe<'a>(state: &'a MarketState, account: &Account, price: Price, window: usize) -> Observation<'a> {
    Observation {
        reference_price: price,
        last_volume: Quantity(state.last_volume()),
        cash: account.cash,
        position: account.position,
        tick: state.tick,
        prices: trailing(&state.price_history, window),
    }
}

/// Passive buy below and sell above the reference price.
fn quotes(mm: &MarketMakerSpec, price: Price, tick: Tick) -> [Order; 2] {
    let p = price.to_float();
    let quantity = Quantity(mm.quantity);
    [
        Order::buy(
            mm.id.clone(),
            Price::from_float_cents(p * (1.0 - mm.offset_pct)),
            quantity,
            tick,
        ),
        Order::sell(
            mm.id.clone(),
            Price::from_float_cents(p * (1.0 + mm.offset_pct)),
            quantity,
            tick,
        ),
    ]
}
