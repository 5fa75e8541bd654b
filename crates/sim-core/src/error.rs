//! Error types for order book operations.

use thiserror::Error;
use types::{OrderId, ParseSideError};

/// Result type for sim-core operations.
pub type Result<T> = std::result::Result<T, SimCoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimCoreError {
    /// Rejected at admission: non-positive quantity or price, or a bad side.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// No resting or just-consumed order with this id.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),
}

impl From<ParseSideError> for SimCoreError {
    fn from(err: ParseSideError) -> Self {
        SimCoreError::InvalidOrder(err.to_string())
    }
}
