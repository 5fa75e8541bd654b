//! Sim-core: order book mechanics for the tick market.
//!
//! - Resting-order book with price-time priority
//! - Midpoint-price matching until no crossing pair remains
//! - Restore/cancel hooks so settlement can undo rejected matches

mod error;
mod order_book;

pub use error::{Result, SimCoreError};
pub use order_book::OrderBook;
