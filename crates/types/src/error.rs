//! Errors shared across the workspace.

use crate::ids::AccountId;
use crate::money::{Cash, Price, Quantity};
use thiserror::Error;

/// Text that is neither "buy" nor "sell".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized order side: {0:?}")]
pub struct ParseSideError(pub String);

/// Why settlement refused a trade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskViolation {
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    #[error("{account} has {available} but needs {required}")]
    InsufficientFunds {
        account: AccountId,
        required: Cash,
        available: Cash,
    },

    #[error("{account} selling {quantity} would exceed short cap of {cap} (position {position})")]
    ShortCapExceeded {
        account: AccountId,
        quantity: Quantity,
        position: i64,
        cap: u64,
    },

    #[error("settling {quantity} @ {price} would overflow {account}'s balance or position")]
    BalanceOverflow {
        account: AccountId,
        price: Price,
        quantity: Quantity,
    },
}

/// Configuration rejected at construction; the simulation cannot start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("account id must not be empty")]
    EmptyAccountId,

    #[error("duplicate account id {0}")]
    DuplicateAccount(AccountId),

    #[error("{account}: {message}")]
    InvalidTrader { account: AccountId, message: String },

    #[error("invalid market setting: {0}")]
    InvalidMarket(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to read config {path}: {message}")]
    Io { path: String, message: String },
}

impl ConfigError {
    pub fn trader(account: &AccountId, message: impl Into<String>) -> Self {
        Self::InvalidTrader {
            account: account.clone(),
            message: message.into(),
        }
    }
}
