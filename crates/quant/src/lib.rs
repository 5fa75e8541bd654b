//! Quantitative helpers for the tick market simulation.

pub mod stats;

pub use stats::{mean, pct_change, returns, std_dev, std_dev_or_zero, trailing, variance, zscore_last};
