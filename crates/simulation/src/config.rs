//! Market configuration.
//!
//! Everything here is plain serde data, consumed once by
//! [`MarketEngine::new`](crate::MarketEngine::new) and never mutated after.

use std::collections::HashSet;
use std::path::Path;

use agents::{
    LearnedPolicyConfig, MeanReversionConfig, MomentumConfig, NoiseConfig, StrategySpec,
    TraderProfile,
};
use serde::{Deserialize, Serialize};
use types::{AccountId, ConfigError};

// =============================================================================
// Trader
// =============================================================================

/// One trading account and the strategy that drives it.
///
/// Profile and strategy fields sit at the top level of the JSON object,
/// next to `id`, `balance` and `assets`; `type` picks the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderSpec {
    pub id: AccountId,
    #[serde(default = "default_balance")]
    pub balance: f64,
    /// Initial signed position.
    #[serde(default)]
    pub assets: i64,
    /// Orders arrive only through `submit_order`; the strategy is never consulted.
    #[serde(default)]
    pub is_user: bool,
    #[serde(flatten)]
    pub profile: TraderProfile,
    #[serde(flatten)]
    pub strategy: StrategySpec,
}

fn default_balance() -> f64 {
    10_000.0
}

impl TraderSpec {
    pub fn new(id: impl Into<AccountId>, strategy: StrategySpec) -> Self {
        Self {
            id: id.into(),
            balance: default_balance(),
            assets: 0,
            is_user: false,
            profile: TraderProfile::default(),
            strategy,
        }
    }

    /// A human-controlled account. The strategy slot is unused.
    pub fn user(id: impl Into<AccountId>, balance: f64, assets: i64) -> Self {
        Self::new(id, StrategySpec::Momentum(MomentumConfig::default()))
            .with_balance(balance)
            .with_assets(assets)
            .as_user()
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_assets(mut self, assets: i64) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_profile(mut self, profile: TraderProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn as_user(mut self) -> Self {
        self.is_user = true;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.as_str().is_empty() {
            return Err(ConfigError::EmptyAccountId);
        }
        if !self.balance.is_finite() || self.balance < 0.0 {
            return Err(ConfigError::trader(
                &self.id,
                format!("balance {} must be a non-negative number", self.balance),
            ));
        }
        self.profile
            .validate()
            .map_err(|m| ConfigError::trader(&self.id, m))?;
        self.strategy
            .validate()
            .map_err(|m| ConfigError::trader(&self.id, m))
    }
}

// =============================================================================
// Market Maker
// =============================================================================

/// Passive two-sided quoter around the previous reference price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerSpec {
    pub id: AccountId,
    pub balance: f64,
    pub assets: i64,
    /// Quote distance from the reference price, as a fraction.
    pub offset_pct: f64,
    pub quantity: u64,
    pub max_short_units: u64,
}

impl Default for MarketMakerSpec {
    fn default() -> Self {
        Self {
            id: AccountId::from("MM"),
            balance: 10_000.0,
            assets: 100,
            offset_pct: 0.01,
            quantity: 3,
            max_short_units: 50,
        }
    }
}

impl MarketMakerSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.as_str().is_empty() {
            return Err(ConfigError::EmptyAccountId);
        }
        if !self.balance.is_finite() || self.balance < 0.0 {
            return Err(ConfigError::trader(&self.id, "balance must be a non-negative number"));
        }
        if !(0.0..1.0).contains(&self.offset_pct) || self.offset_pct == 0.0 {
            return Err(ConfigError::trader(
                &self.id,
                format!("offset_pct {} outside (0, 1)", self.offset_pct),
            ));
        }
        if self.quantity == 0 {
            return Err(ConfigError::trader(&self.id, "quote quantity must be positive"));
        }
        Ok(())
    }
}

// =============================================================================
// Risk
// =============================================================================

/// Market-wide shorting switch, applied on top of each trader's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// When off, every account's short cap is zero and strategies never
    /// open shorts.
    pub allow_short_selling: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            allow_short_selling: true,
        }
    }
}

impl RiskConfig {
    /// The settlement short cap for an account configured with `max_short_units`.
    pub fn short_cap(&self, max_short_units: u64) -> u64 {
        if self.allow_short_selling {
            max_short_units
        } else {
            0
        }
    }

    /// The profile a strategy actually trades with.
    pub fn effective_profile(&self, profile: &TraderProfile) -> TraderProfile {
        let mut profile = profile.clone();
        if !self.allow_short_selling {
            profile.shorting_enabled = false;
        }
        profile
    }
}

// =============================================================================
// Market
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub initial_price: f64,
    /// Root of every derived random stream.
    pub seed: u64,
    /// Rows per side in each tick's book snapshot.
    pub snapshot_depth: usize,
    /// Sum snapshot rows by price instead of listing each order.
    pub aggregate_snapshot: bool,
    pub traders: Vec<TraderSpec>,
    pub risk: RiskConfig,
    #[serde(alias = "market_maker_config")]
    pub market_maker: Option<MarketMakerSpec>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            initial_price: 100.0,
            seed: 123_456_789,
            snapshot_depth: 10,
            aggregate_snapshot: true,
            traders: Vec::new(),
            risk: RiskConfig::default(),
            market_maker: None,
        }
    }
}

impl MarketConfig {
    pub fn with_initial_price(mut self, price: f64) -> Self {
        self.initial_price = price;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_snapshot(mut self, depth: usize, aggregate: bool) -> Self {
        self.snapshot_depth = depth;
        self.aggregate_snapshot = aggregate;
        self
    }

    pub fn with_trader(mut self, trader: TraderSpec) -> Self {
        self.traders.push(trader);
        self
    }

    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_market_maker(mut self, market_maker: MarketMakerSpec) -> Self {
        self.market_maker = Some(market_maker);
        self
    }

    /// One trader of each kind plus a market maker.
    pub fn demo() -> Self {
        Self::default()
            .with_trader(TraderSpec::new(
                "momentum_1",
                StrategySpec::Momentum(MomentumConfig::default()),
            ))
            .with_trader(TraderSpec::new(
                "mean_rev_1",
                StrategySpec::MeanReversion(MeanReversionConfig::default()),
            ))
            .with_trader(TraderSpec::new(
                "rl_1",
                StrategySpec::LearnedPolicy(LearnedPolicyConfig::default()),
            ))
            .with_trader(
                TraderSpec::new("noise_1", StrategySpec::Noise(NoiseConfig::default())).with_assets(20),
            )
            .with_trader(
                TraderSpec::new("noise_2", StrategySpec::Noise(NoiseConfig::default())).with_assets(20),
            )
            .with_market_maker(MarketMakerSpec::default())
    }

    /// Check everything that can be checked without building the market.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_price.is_finite() || self.initial_price <= 0.0 {
            return Err(ConfigError::InvalidMarket(format!(
                "initial_price {} must be positive",
                self.initial_price
            )));
        }
        if self.snapshot_depth == 0 {
            return Err(ConfigError::InvalidMarket("snapshot_depth must be positive".into()));
        }

        let mut seen = HashSet::new();
        for trader in &self.traders {
            trader.validate()?;
            if !seen.insert(&trader.id) {
                return Err(ConfigError::DuplicateAccount(trader.id.clone()));
            }
        }
        if let Some(mm) = &self.market_maker {
            mm.validate()?;
            if seen.contains(&mm.id) {
                return Err(ConfigError::DuplicateAccount(mm.id.clone()));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_is_valid() {
        let config = MarketConfig::demo();
        assert!(config.validate().is_ok());
        assert_eq!(config.traders.len(), 5);
        assert!(config.market_maker.is_some());
    }

    #[test]
    fn test_trader_json_is_flat() {
        let json = r#"{
            "initial_price": 50.0,
            "traders": [
                {"id": "m1", "type": "momentum", "balance": 5000, "assets": 3,
                 "risk_aversion": 0.2, "mom_short": 2, "mom_long": 6},
                {"id": "u1", "type": "rl", "balance": 100, "is_user": true, "hidden_size": 8}
            ],
            "market_maker_config": {"id": "MM"}
        }"#;
        let config = MarketConfig::from_json_str(json).unwrap();
        assert_eq!(config.initial_price, 50.0);

        let m1 = &config.traders[0];
        assert_eq!(m1.assets, 3);
        assert_eq!(m1.profile.risk_aversion, 0.2);
        let StrategySpec::Momentum(momentum) = &m1.strategy else {
            panic!("expected momentum, got {:?}", m1.strategy);
        };
        assert_eq!((momentum.short_window, momentum.long_window), (2, 6));

        let u1 = &config.traders[1];
        assert!(u1.is_user);
        assert!(matches!(&u1.strategy, StrategySpec::LearnedPolicy(c) if c.hidden_size == 8));
        assert_eq!(config.market_maker.as_ref().map(|m| m.quantity), Some(3));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let config = MarketConfig::default()
            .with_trader(TraderSpec::user("a", 100.0, 0))
            .with_trader(TraderSpec::user("a", 100.0, 0));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateAccount(AccountId::from("a")))
        );

        let config = MarketConfig::default()
            .with_trader(TraderSpec::user("MM", 100.0, 0))
            .with_market_maker(MarketMakerSpec::default());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateAccount(_))));
    }

    #[test]
    fn test_bad_market_settings() {
        assert!(MarketConfig::default().with_initial_price(0.0).validate().is_err());
        assert!(MarketConfig::default().with_snapshot(0, true).validate().is_err());
        let config = MarketConfig::default().with_trader(TraderSpec::user("", 1.0, 0));
        assert_eq!(config.validate(), Err(ConfigError::EmptyAccountId));
        let config = MarketConfig::default().with_trader(TraderSpec::user("poor", -1.0, 0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_strategy_params_surface_with_account() {
        let spec = StrategySpec::Momentum(MomentumConfig {
            short_window: 8,
            long_window: 4,
            ..Default::default()
        });
        let config = MarketConfig::default().with_trader(TraderSpec::new("m", spec));
        match config.validate() {
            Err(ConfigError::InvalidTrader { account, .. }) => assert_eq!(account.as_str(), "m"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors_are_config_errors() {
        assert!(matches!(
            MarketConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            MarketConfig::from_path("/nonexistent/market.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_short_selling_switch() {
        let off = RiskConfig { allow_short_selling: false };
        assert_eq!(off.short_cap(50), 0);
        assert!(!off.effective_profile(&TraderProfile::default()).shorting_enabled);
        assert_eq!(RiskConfig::default().short_cap(50), 50);
    }
}
