//! Simulation crate: the tick market engine.
//!
//! This crate ties the order book, the strategy population and account
//! settlement into one turn-based loop:
//! - [`MarketEngine`] owns every piece of mutable state
//! - [`accounting`] settles trades with risk checks and keeps the audit ledger
//! - [`MarketConfig`] describes a market as serde data
//! - [`TickResult`] is the immutable record each tick emits
//!
//! # Example
//!
//! ```ignore
//! use simulation::{MarketConfig, MarketEngine};
//!
//! let mut engine = MarketEngine::new(MarketConfig::demo())?;
//! for result in engine.run(100) {
//!     println!("{}", serde_json::to_string(&result)?);
//! }
//! engine.end_episode();
//! ```

pub mod accounting;
pub mod config;
mod engine;
mod error;
mod result;

pub use accounting::{Account, Accounts, LedgerEntry, Rejection, SettlementReport};
pub use config::{MarketConfig, MarketMakerSpec, RiskConfig, TraderSpec};
pub use engine::{ExternalOrder, MarketEngine, MarketState};
pub use error::{Result, SimulationError};
pub use result::{AccountStats, BookRecord, LevelRecord, TickResult, TradeRecord};
