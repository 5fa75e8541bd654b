//! Core types for the tick market simulation.
//!
//! Fixed-point money, identifiers, orders, trades, book snapshots and the
//! errors shared by every crate in the workspace.

pub mod error;
pub mod ids;
pub mod money;
pub mod order;
pub mod trade;

pub use error::{ConfigError, ParseSideError, RiskViolation};
pub use ids::{AccountId, OrderId, Tick, TradeId, PRICE_SCALE};
pub use money::{Cash, Price, Quantity};
pub use order::{Order, OrderSide};
pub use trade::{BookLevel, BookSnapshot, Trade};
