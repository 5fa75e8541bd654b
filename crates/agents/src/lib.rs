//! Agents crate: decision models for the tick market.
//!
//! This crate provides:
//! - The [`Strategy`] trait every decision model implements
//! - [`Observation`] handed to strategies each tick and the [`Intent`] they return
//! - [`TraderProfile`] sizing and risk parameters shared by all variants
//! - Concrete strategies (`strategies` module) and the [`STRATEGY_REGISTRY`]
//!   that builds them from configuration
//!
//! # Architecture
//! Strategies see a read-only per-account view of the market and answer with
//! at most one limit order. The simulation owns accounts, routes orders to the
//! book and settles fills; strategies never touch balances.
//!
//! # Available Strategies
//! - [`strategies::MomentumTrader`] - short-window minus long-window return
//! - [`strategies::MeanReversionTrader`] - z-score against a rolling window
//! - [`strategies::LearnedPolicy`] - dueling Double-DQN over discrete actions
//! - [`strategies::NoiseTrader`] - random orders around the reference price
//!
//! # Example
//! ```ignore
//! use agents::{build_strategy, BuildContext, SeedHierarchy, StrategySpec, TraderProfile};
//!
//! let spec: StrategySpec = serde_json::from_str(r#"{"type": "momentum"}"#)?;
//! let model = build_strategy(&spec, &BuildContext {
//!     account_id: &"t1".into(),
//!     profile: &TraderProfile::default(),
//!     seeds: SeedHierarchy::new(7),
//! })?;
//! ```

pub mod registry;
pub mod rng;
pub mod sizing;
pub mod strategies;
mod traits;

pub use registry::{
    build_strategy, BuildContext, StrategyFactory, StrategyKind, StrategyModel, StrategySpec,
    STRATEGY_REGISTRY,
};
pub use rng::SeedHierarchy;
pub use sizing::{decide, SignalRead, TraderProfile};
pub use strategies::{
    LearnedPolicy, LearnedPolicyConfig, MeanReversionConfig, MeanReversionTrader, MomentumConfig,
    MomentumTrader, NoiseConfig, NoiseTrader,
};
pub use traits::{Intent, Observation, Strategy};
