//! Errors surfaced by the market engine.

use sim_core::SimCoreError;
use thiserror::Error;
use types::ConfigError;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimulationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// The market could not be built from its configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An externally injected order failed admission.
    #[error(transparent)]
    Order(#[from] SimCoreError),
}
