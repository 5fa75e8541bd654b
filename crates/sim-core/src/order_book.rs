//! Resting-order book with price-time priority.
//!
//! Each side is a `BTreeMap` keyed by a priority key, so the best order is
//! always the first entry:
//! - Bids: price descending, then submission tick, then arrival sequence
//! - Asks: price ascending, then submission tick, then arrival sequence
//!
//! Orders never expire. Liquidity that does not cross stays in the book
//! across ticks until it is matched or cancelled.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};
use types::{
    BookLevel, BookSnapshot, Order, OrderId, OrderSide, Price, Quantity, Tick, Trade, TradeId,
};

use crate::error::{Result, SimCoreError};

/// Sort key for one side of the book. `rank` is the negated price for bids
/// so both sides iterate best-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PriorityKey {
    rank: i64,
    tick: Tick,
    seq: OrderId,
}

impl PriorityKey {
    fn for_order(order: &Order) -> Self {
        let rank = match order.side {
            OrderSide::Buy => -order.price.raw(),
            OrderSide::Sell => order.price.raw(),
        };
        Self {
            rank,
            tick: order.tick,
            seq: order.id,
        }
    }
}

/// Two-sided limit order book.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: BTreeMap<PriorityKey, Order>,
    asks: BTreeMap<PriorityKey, Order>,
    /// Resting order lookup.
    index: HashMap<OrderId, (OrderSide, PriorityKey)>,
    /// Orders fully consumed by the most recent `match_orders` call.
    consumed: HashMap<OrderId, Order>,
    next_order_id: u64,
    next_trade_id: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Insert an order, assigning its arrival sequence.
    ///
    /// Rejects non-positive quantity or price with `InvalidOrder`, as well as
    /// a price above `Price::MAX` or a notional that does not fit in `Cash`.
    pub fn admit(&mut self, mut order: Order) -> Result<OrderId> {
        if order.quantity.is_zero() {
            return Err(SimCoreError::InvalidOrder(format!(
                "quantity must be positive ({} from {})",
                order.quantity, order.account_id
            )));
        }
        if !order.price.is_positive() {
            return Err(SimCoreError::InvalidOrder(format!(
                "price must be positive ({} from {})",
                order.price, order.account_id
            )));
        }
        if order.price > Price::MAX {
            return Err(SimCoreError::InvalidOrder(format!(
                "price {} above limit {} (from {})",
                order.price,
                Price::MAX,
                order.account_id
            )));
        }
        if order.notional().is_none() {
            return Err(SimCoreError::InvalidOrder(format!(
                "{} @ {} overflows cash (from {})",
                order.quantity, order.price, order.account_id
            )));
        }

        self.next_order_id += 1;
        order.id = OrderId(self.next_order_id);
        let id = order.id;
        self.insert(order);
        Ok(id)
    }

    fn insert(&mut self, order: Order) {
        let key = PriorityKey::for_order(&order);
        self.index.insert(order.id, (order.side, key));
        self.side_mut(order.side).insert(key, order);
    }

    fn side_mut(&mut self, side: OrderSide) -> &mut BTreeMap<PriorityKey, Order> {
        match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        }
    }

    fn side(&self, side: OrderSide) -> &BTreeMap<PriorityKey, Order> {
        match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        }
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Match crossing orders until best bid < best ask.
    ///
    /// Each trade executes at the midpoint of the two resting prices for the
    /// smaller of the two remaining quantities. Fully filled orders leave the
    /// book but stay restorable until the next call. When the crossing pair
    /// belongs to one account, the later arrival is cancelled instead.
    pub fn match_orders(&mut self) -> Vec<Trade> {
        self.consumed.clear();
        let mut trades = Vec::new();

        loop {
            let (bid_key, ask_key) = match (self.bids.first_key_value(), self.asks.first_key_value()) {
                (Some((bk, bid)), Some((ak, ask))) if bid.price >= ask.price => (*bk, *ak),
                _ => break,
            };

            // An account never trades with itself: the newer of the two leaves.
            if self.bids[&bid_key].account_id == self.asks[&ask_key].account_id {
                let (side, key) = if bid_key.seq > ask_key.seq {
                    (OrderSide::Buy, bid_key)
                } else {
                    (OrderSide::Sell, ask_key)
                };
                if let Some(order) = self.side_mut(side).remove(&key) {
                    self.index.remove(&order.id);
                    debug!(id = %order.id, account = %order.account_id, "self-trade prevented");
                }
                continue;
            }

            let trade = {
                let bid = &self.bids[&bid_key];
                let ask = &self.asks[&ask_key];
                self.next_trade_id += 1;
                Trade {
                    id: TradeId(self.next_trade_id),
                    buyer_id: bid.account_id.clone(),
                    seller_id: ask.account_id.clone(),
                    buyer_order_id: bid.id,
                    seller_order_id: ask.id,
                    price: bid.price.midpoint(ask.price),
                    quantity: bid.quantity.min(ask.quantity),
                    tick: bid.tick.max(ask.tick),
                }
            };

            self.fill(OrderSide::Buy, bid_key, trade.quantity);
            self.fill(OrderSide::Sell, ask_key, trade.quantity);
            trace!(%trade, "matched");
            trades.push(trade);
        }

        trades
    }

    fn fill(&mut self, side: OrderSide, key: PriorityKey, quantity: Quantity) {
        let book_side = self.side_mut(side);
        let done = match book_side.get_mut(&key) {
            Some(order) => {
                order.quantity = order.quantity.saturating_sub(quantity);
                order.is_filled()
            }
            None => false,
        };
        if done {
            if let Some(order) = book_side.remove(&key) {
                self.index.remove(&order.id);
                self.consumed.insert(order.id, order);
            }
        }
    }

    // =========================================================================
    // Restore / Cancel
    // =========================================================================

    /// Put matched quantity back on an order, keeping its original priority.
    ///
    /// Works for resting orders and for orders the last match call consumed.
    pub fn restore(&mut self, order_id: OrderId, quantity: Quantity) -> Result<()> {
        if let Some((side, key)) = self.index.get(&order_id).copied() {
            if let Some(order) = self.side_mut(side).get_mut(&key) {
                order.quantity += quantity;
                return Ok(());
            }
        }

        let mut order = self
            .consumed
            .remove(&order_id)
            .ok_or(SimCoreError::OrderNotFound(order_id))?;
        order.quantity += quantity;
        if !order.quantity.is_zero() {
            self.insert(order);
        }
        Ok(())
    }

    /// Remove an order from the book. A just-consumed order is forgotten so it
    /// can no longer be restored.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<Order> {
        if let Some((side, key)) = self.index.remove(&order_id) {
            if let Some(order) = self.side_mut(side).remove(&key) {
                return Ok(order);
            }
        }
        self.consumed
            .remove(&order_id)
            .ok_or(SimCoreError::OrderNotFound(order_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first_key_value().map(|(_, o)| o.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first_key_value().map(|(_, o)| o.price)
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        let (side, key) = self.index.get(&order_id)?;
        self.side(*side).get(key)
    }

    /// Resting orders on one side, best first.
    pub fn orders(&self, side: OrderSide) -> impl Iterator<Item = &Order> {
        self.side(side).values()
    }

    pub fn total_quantity(&self, side: OrderSide) -> Quantity {
        self.side(side).values().map(|o| o.quantity).sum()
    }

    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Top `depth` rows per side, summed by price when `aggregate` is set,
    /// otherwise one row per resting order.
    pub fn snapshot(&self, depth: usize, aggregate: bool, tick: Tick) -> BookSnapshot {
        BookSnapshot {
            bids: Self::levels(&self.bids, depth, aggregate),
            asks: Self::levels(&self.asks, depth, aggregate),
            tick,
        }
    }

    fn levels(side: &BTreeMap<PriorityKey, Order>, depth: usize, aggregate: bool) -> Vec<BookLevel> {
        if !aggregate {
            return side
                .values()
                .take(depth)
                .map(|o| BookLevel {
                    price: o.price,
                    quantity: o.quantity,
                    order_count: 1,
                })
                .collect();
        }

        // Equal prices are contiguous in key order.
        let mut levels: Vec<BookLevel> = Vec::with_capacity(depth);
        for order in side.values() {
            match levels.last_mut() {
                Some(level) if level.price == order.price => {
                    level.quantity += order.quantity;
                    level.order_count += 1;
                }
                _ => {
                    if levels.len() == depth {
                        break;
                    }
                    levels.push(BookLevel {
                        price: order.price,
                        quantity: order.quantity,
                        order_count: 1,
                    });
                }
            }
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn order(account: &str, side: OrderSide, price: f64, quantity: u64, tick: Tick) -> Order {
        Order::new(account, side, Price::from_float(price), Quantity(quantity), tick)
    }

    #[test]
    fn test_new_order_book() {
        let book = OrderBook::new();
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_admit_rejects_zero_quantity_and_price() {
        let mut book = OrderBook::new();
        let err = book.admit(order("a", OrderSide::Buy, 100.0, 0, 1)).unwrap_err();
        assert!(matches!(err, SimCoreError::InvalidOrder(_)));
        let err = book.admit(order("a", OrderSide::Sell, 0.0, 5, 1)).unwrap_err();
        assert!(matches!(err, SimCoreError::InvalidOrder(_)));
        assert!(book.is_empty());
    }

    #[test]
    fn test_admit_rejects_out_of_range_orders() {
        let mut book = OrderBook::new();
        let err = book.admit(order("a", OrderSide::Buy, 1e300, 1, 1)).unwrap_err();
        assert!(matches!(err, SimCoreError::InvalidOrder(_)));
        let err = book.admit(order("a", OrderSide::Buy, 1e9, 1_000_000, 1)).unwrap_err();
        assert!(matches!(err, SimCoreError::InvalidOrder(_)));
        let err = book
            .admit(Order::sell("a", Price(1), Quantity(u64::MAX), 1))
            .unwrap_err();
        assert!(matches!(err, SimCoreError::InvalidOrder(_)));
        assert!(book.is_empty());

        // The limits themselves are admissible.
        book.admit(Order::buy("a", Price::MAX, Quantity(10_000), 1)).unwrap();
        book.admit(Order::sell("b", Price(1), Quantity(i64::MAX as u64), 1)).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_bad_side_text_is_invalid_order() {
        let err: SimCoreError = "short".parse::<OrderSide>().unwrap_err().into();
        assert!(matches!(err, SimCoreError::InvalidOrder(_)));
    }

    #[test]
    fn test_arrival_sequence_is_monotonic() {
        let mut book = OrderBook::new();
        let a = book.admit(order("a", OrderSide::Buy, 99.0, 1, 1)).unwrap();
        let b = book.admit(order("b", OrderSide::Sell, 101.0, 1, 1)).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_bid_priority_price_then_tick_then_sequence() {
        let mut book = OrderBook::new();
        let late = book.admit(order("late", OrderSide::Buy, 100.0, 1, 2)).unwrap();
        let second = book.admit(order("second", OrderSide::Buy, 100.0, 1, 1)).unwrap();
        let third = book.admit(order("third", OrderSide::Buy, 100.0, 1, 1)).unwrap();
        let best = book.admit(order("best", OrderSide::Buy, 100.5, 1, 5)).unwrap();

        let ids: Vec<_> = book.orders(OrderSide::Buy).map(|o| o.id).collect();
        assert_eq!(ids, vec![best, second, third, late]);
    }

    #[test]
    fn test_ask_priority_ascending() {
        let mut book = OrderBook::new();
        book.admit(order("a", OrderSide::Sell, 102.0, 1, 1)).unwrap();
        book.admit(order("b", OrderSide::Sell, 101.0, 1, 1)).unwrap();
        assert_eq!(book.best_ask(), Some(Price::from_float(101.0)));
    }

    #[test]
    fn test_cross_at_midpoint_empties_book() {
        let mut book = OrderBook::new();
        book.admit(order("buyer", OrderSide::Buy, 101.0, 10, 1)).unwrap();
        book.admit(order("seller", OrderSide::Sell, 99.0, 10, 1)).unwrap();

        let trades = book.match_orders();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, Price::from_float(100.0));
        assert_eq!(trades[0].quantity, Quantity(10));
        assert_eq!(trades[0].buyer_id.as_str(), "buyer");
        assert!(book.is_empty());
    }

    #[test]
    fn test_self_cross_cancels_newer_order() {
        let mut book = OrderBook::new();
        let old_bid = book.admit(order("a", OrderSide::Buy, 100.0, 4, 1)).unwrap();
        book.admit(order("a", OrderSide::Sell, 99.0, 2, 2)).unwrap();
        book.admit(order("b", OrderSide::Sell, 99.5, 3, 2)).unwrap();

        let trades = book.match_orders();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].seller_id.as_str(), "b");
        assert_eq!(trades[0].buyer_order_id, old_bid);
        assert_eq!(trades[0].quantity, Quantity(3));
        assert_eq!(book.order(old_bid).map(|o| o.quantity), Some(Quantity(1)));
        assert_eq!(book.orders(OrderSide::Sell).count(), 0);
    }

    #[test]
    fn test_partial_fill_keeps_remainder() {
        let mut book = OrderBook::new();
        let buy = book.admit(order("b", OrderSide::Buy, 100.0, 5, 1)).unwrap();
        assert!(book.match_orders().is_empty());

        book.admit(order("s", OrderSide::Sell, 100.0, 3, 2)).unwrap();
        let trades = book.match_orders();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity, Quantity(3));
        assert_eq!(trades[0].tick, 2);
        assert_eq!(book.order(buy).map(|o| o.quantity), Some(Quantity(2)));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_sweep_multiple_levels() {
        let mut book = OrderBook::new();
        book.admit(order("s1", OrderSide::Sell, 100.0, 2, 1)).unwrap();
        book.admit(order("s2", OrderSide::Sell, 101.0, 2, 1)).unwrap();
        book.admit(order("s3", OrderSide::Sell, 105.0, 2, 1)).unwrap();
        book.admit(order("b", OrderSide::Buy, 102.0, 5, 2)).unwrap();

        let trades = book.match_orders();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].price, Price::from_float(101.0));
        assert_eq!(trades[1].price, Price::from_float(101.5));
        assert_eq!(book.best_bid(), Some(Price::from_float(102.0)));
        assert_eq!(book.best_ask(), Some(Price::from_float(105.0)));
    }

    #[test]
    fn test_restore_consumed_order_keeps_priority() {
        let mut book = OrderBook::new();
        let first = book.admit(order("s1", OrderSide::Sell, 60.0, 20, 1)).unwrap();
        book.admit(order("s2", OrderSide::Sell, 60.0, 5, 1)).unwrap();
        let buy = book.admit(order("b", OrderSide::Buy, 60.0, 20, 2)).unwrap();

        let trades = book.match_orders();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].seller_order_id, first);

        book.cancel(buy).unwrap();
        book.restore(first, Quantity(20)).unwrap();

        let front = book.orders(OrderSide::Sell).next().unwrap();
        assert_eq!(front.id, first);
        assert_eq!(front.quantity, Quantity(20));
        assert_eq!(book.total_quantity(OrderSide::Sell), Quantity(25));
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_restore_partially_filled_order() {
        let mut book = OrderBook::new();
        let buy = book.admit(order("b", OrderSide::Buy, 50.0, 10, 1)).unwrap();
        book.admit(order("s", OrderSide::Sell, 50.0, 4, 1)).unwrap();
        book.match_orders();

        book.restore(buy, Quantity(4)).unwrap();
        assert_eq!(book.order(buy).map(|o| o.quantity), Some(Quantity(10)));
    }

    #[test]
    fn test_restore_unknown_order_fails() {
        let mut book = OrderBook::new();
        assert_eq!(
            book.restore(OrderId(42), Quantity(1)),
            Err(SimCoreError::OrderNotFound(OrderId(42)))
        );
    }

    #[test]
    fn test_consumed_orders_forgotten_on_next_match() {
        let mut book = OrderBook::new();
        let sell = book.admit(order("s", OrderSide::Sell, 10.0, 1, 1)).unwrap();
        book.admit(order("b", OrderSide::Buy, 10.0, 1, 1)).unwrap();
        book.match_orders();
        book.match_orders();
        assert!(book.restore(sell, Quantity(1)).is_err());
    }

    #[test]
    fn test_cancel_resting_order() {
        let mut book = OrderBook::new();
        let id = book.admit(order("a", OrderSide::Buy, 99.0, 3, 1)).unwrap();
        let cancelled = book.cancel(id).unwrap();
        assert_eq!(cancelled.quantity, Quantity(3));
        assert!(book.is_empty());
        assert!(book.cancel(id).is_err());
    }

    #[test]
    fn test_snapshot_aggregated_and_per_order() {
        let mut book = OrderBook::new();
        book.admit(order("a", OrderSide::Buy, 99.0, 3, 1)).unwrap();
        book.admit(order("b", OrderSide::Buy, 99.0, 4, 1)).unwrap();
        book.admit(order("c", OrderSide::Buy, 98.0, 1, 1)).unwrap();
        book.admit(order("d", OrderSide::Sell, 101.0, 2, 1)).unwrap();
        book.admit(order("e", OrderSide::Sell, 103.0, 2, 1)).unwrap();

        let agg = book.snapshot(10, true, 1);
        assert_eq!(agg.bids.len(), 2);
        assert_eq!(agg.bids[0].quantity, Quantity(7));
        assert_eq!(agg.bids[0].order_count, 2);
        assert_eq!(agg.asks[0].price, Price::from_float(101.0));

        let raw = book.snapshot(2, false, 1);
        assert_eq!(raw.bids.len(), 2);
        assert_eq!(raw.bids[1].quantity, Quantity(4));
        assert!(raw.bids.iter().all(|l| l.order_count == 1));

        let shallow = book.snapshot(1, true, 1);
        assert_eq!(shallow.bids.len(), 1);
        assert_eq!(shallow.asks.len(), 1);
    }

    fn arb_order() -> impl Strategy<Value = (bool, u32, u64, u64)> {
        (any::<bool>(), 90u32..110, 1u64..20, 0u64..5)
    }

    proptest! {
        #[test]
        fn prop_matching_conserves_and_uncrosses(orders in prop::collection::vec(arb_order(), 1..60)) {
            let mut book = OrderBook::new();
            for (i, (is_buy, px, qty, tick)) in orders.iter().enumerate() {
                let side = if *is_buy { OrderSide::Buy } else { OrderSide::Sell };
                book.admit(order(&format!("acct{i}"), side, *px as f64, *qty, *tick)).unwrap();
            }

            let bids_before = book.total_quantity(OrderSide::Buy);
            let asks_before = book.total_quantity(OrderSide::Sell);
            let trades = book.match_orders();
            let traded: Quantity = trades.iter().map(|t| t.quantity).sum();

            prop_assert_eq!(bids_before - book.total_quantity(OrderSide::Buy), traded);
            prop_assert_eq!(asks_before - book.total_quantity(OrderSide::Sell), traded);

            for trade in &trades {
                prop_assert!(trade.quantity.raw() > 0);
            }
            if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                prop_assert!(bid < ask);
            }
        }

        #[test]
        fn prop_shared_accounts_never_self_trade(orders in prop::collection::vec(arb_order(), 1..60)) {
            let mut book = OrderBook::new();
            for (i, (is_buy, px, qty, tick)) in orders.iter().enumerate() {
                let side = if *is_buy { OrderSide::Buy } else { OrderSide::Sell };
                book.admit(order(&format!("acct{}", i % 3), side, *px as f64, *qty, *tick)).unwrap();
            }

            for trade in book.match_orders() {
                prop_assert_ne!(&trade.buyer_id, &trade.seller_id);
            }
            if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                prop_assert!(bid < ask);
            }
        }
    }
}
