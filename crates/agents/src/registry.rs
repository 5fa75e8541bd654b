//! Strategy selection.
//!
//! The set of strategies is closed: [`StrategySpec`] is the configuration
//! discriminator (`"type"` in JSON), [`StrategyModel`] is the runtime enum,
//! and [`STRATEGY_REGISTRY`] maps each kind to the function that builds it.

use std::fmt;

use serde::{Deserialize, Serialize};
use types::{AccountId, ConfigError};

use crate::rng::SeedHierarchy;
use crate::sizing::{profile_error, TraderProfile};
use crate::strategies::{
    LearnedPolicy, LearnedPolicyConfig, MeanReversionConfig, MeanReversionTrader, MomentumConfig,
    MomentumTrader, NoiseConfig, NoiseTrader,
};
use crate::traits::{Intent, Observation, Strategy};

// =============================================================================
// Spec / Kind
// =============================================================================

/// Strategy variant and its parameters, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategySpec {
    Momentum(MomentumConfig),
    MeanReversion(MeanReversionConfig),
    #[serde(alias = "rl")]
    LearnedPolicy(LearnedPolicyConfig),
    Noise(NoiseConfig),
}

impl StrategySpec {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategySpec::Momentum(_) => StrategyKind::Momentum,
            StrategySpec::MeanReversion(_) => StrategyKind::MeanReversion,
            StrategySpec::LearnedPolicy(_) => StrategyKind::LearnedPolicy,
            StrategySpec::Noise(_) => StrategyKind::Noise,
        }
    }

    /// Check the variant's own parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StrategySpec::Momentum(c) => c.validate(),
            StrategySpec::MeanReversion(c) => c.validate(),
            StrategySpec::LearnedPolicy(c) => c.validate(),
            StrategySpec::Noise(c) => c.validate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Momentum,
    MeanReversion,
    LearnedPolicy,
    Noise,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Momentum => "momentum",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::LearnedPolicy => "learned_policy",
            StrategyKind::Noise => "noise",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Runtime Model
// =============================================================================

/// A constructed strategy. Dispatch is a plain `match`.
pub enum StrategyModel {
    Momentum(MomentumTrader),
    MeanReversion(MeanReversionTrader),
    LearnedPolicy(Box<LearnedPolicy>),
    Noise(NoiseTrader),
}

impl StrategyModel {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyModel::Momentum(_) => StrategyKind::Momentum,
            StrategyModel::MeanReversion(_) => StrategyKind::MeanReversion,
            StrategyModel::LearnedPolicy(_) => StrategyKind::LearnedPolicy,
            StrategyModel::Noise(_) => StrategyKind::Noise,
        }
    }

    pub fn as_learned_policy(&self) -> Option<&LearnedPolicy> {
        match self {
            StrategyModel::LearnedPolicy(p) => Some(p),
            _ => None,
        }
    }
}

/// Forward a call to whichever variant is inside.
macro_rules! dispatch {
    ($model:expr, $s:ident => $call:expr) => {
        match $model {
            StrategyModel::Momentum($s) => $call,
            StrategyModel::MeanReversion($s) => $call,
            StrategyModel::LearnedPolicy($s) => $call,
            StrategyModel::Noise($s) => $call,
        }
    };
}

impl Strategy for StrategyModel {
    fn act(&mut self, obs: &Observation<'_>) -> Intent {
        dispatch!(self, s => s.act(obs))
    }

    fn reset(&mut self) {
        dispatch!(self, s => s.reset())
    }

    fn lookback(&self) -> usize {
        dispatch!(self, s => s.lookback())
    }

    fn name(&self) -> &'static str {
        dispatch!(self, s => s.name())
    }

    fn finish(&mut self, obs: &Observation<'_>) {
        dispatch!(self, s => s.finish(obs))
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Everything a factory needs besides the spec itself.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub account_id: &'a AccountId,
    pub profile: &'a TraderProfile,
    pub seeds: SeedHierarchy,
}

pub type StrategyFactory = fn(&StrategySpec, &BuildContext<'_>) -> Result<StrategyModel, ConfigError>;

pub const STRATEGY_REGISTRY: &[(StrategyKind, StrategyFactory)] = &[
    (StrategyKind::Momentum, build_momentum as StrategyFactory),
    (StrategyKind::MeanReversion, build_mean_reversion as StrategyFactory),
    (StrategyKind::LearnedPolicy, build_learned_policy as StrategyFactory),
    (StrategyKind::Noise, build_noise as StrategyFactory),
];

/// Validate and construct the strategy described by `spec`.
pub fn build_strategy(spec: &StrategySpec, ctx: &BuildContext<'_>) -> Result<StrategyModel, ConfigError> {
    ctx.profile
        .validate()
        .map_err(|m| profile_error(ctx.account_id, m))?;

    let kind = spec.kind();
    let factory = STRATEGY_REGISTRY
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, f)| *f)
        .ok_or_else(|| ConfigError::trader(ctx.account_id, format!("no factory registered for {kind}")))?;
    factory(spec, ctx)
}

fn mismatch(ctx: &BuildContext<'_>, expected: StrategyKind, spec: &StrategySpec) -> ConfigError {
    ConfigError::trader(
        ctx.account_id,
        format!("{expected} factory given a {} spec", spec.kind()),
    )
}

fn build_momentum(spec: &StrategySpec, ctx: &BuildContext<'_>) -> Result<StrategyModel, ConfigError> {
    let StrategySpec::Momentum(config) = spec else {
        return Err(mismatch(ctx, StrategyKind::Momentum, spec));
    };
    config.validate().map_err(|m| ConfigError::trader(ctx.account_id, m))?;
    Ok(StrategyModel::Momentum(MomentumTrader::new(
        config.clone(),
        ctx.profile.clone(),
    )))
}

fn build_mean_reversion(spec: &StrategySpec, ctx: &BuildContext<'_>) -> Result<StrategyModel, ConfigError> {
    let StrategySpec::MeanReversion(config) = spec else {
        return Err(mismatch(ctx, StrategyKind::MeanReversion, spec));
    };
    config.validate().map_err(|m| ConfigError::trader(ctx.account_id, m))?;
    Ok(StrategyModel::MeanReversion(MeanReversionTrader::new(
        config.clone(),
        ctx.profile.clone(),
    )))
}

fn build_learned_policy(spec: &StrategySpec, ctx: &BuildContext<'_>) -> Result<StrategyModel, ConfigError> {
    let StrategySpec::LearnedPolicy(config) = spec else {
        return Err(mismatch(ctx, StrategyKind::LearnedPolicy, spec));
    };
    config.validate().map_err(|m| ConfigError::trader(ctx.account_id, m))?;
    let seed = config
        .random_state
        .unwrap_or_else(|| ctx.seeds.sub_seed(ctx.account_id, "learned_policy"));
    Ok(StrategyModel::LearnedPolicy(Box::new(LearnedPolicy::new(
        config.clone(),
        ctx.profile.clone(),
        seed,
    ))))
}

fn build_noise(spec: &StrategySpec, ctx: &BuildContext<'_>) -> Result<StrategyModel, ConfigError> {
    let StrategySpec::Noise(config) = spec else {
        return Err(mismatch(ctx, StrategyKind::Noise, spec));
    };
    config.validate().map_err(|m| ConfigError::trader(ctx.account_id, m))?;
    let seed = ctx.seeds.sub_seed(ctx.account_id, "noise");
    Ok(StrategyModel::Noise(NoiseTrader::new(
        config.clone(),
        ctx.profile.clone(),
        seed,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(account: &'a AccountId, profile: &'a TraderProfile) -> BuildContext<'a> {
        BuildContext {
            account_id: account,
            profile,
            seeds: SeedHierarchy::new(123_456_789),
        }
    }

    #[test]
    fn test_registry_covers_every_kind() {
        for kind in [
            StrategyKind::Momentum,
            StrategyKind::MeanReversion,
            StrategyKind::LearnedPolicy,
            StrategyKind::Noise,
        ] {
            assert!(STRATEGY_REGISTRY.iter().any(|(k, _)| *k == kind), "{kind}");
        }
    }

    #[test]
    fn test_spec_parses_type_tag() {
        let spec: StrategySpec =
            serde_json::from_str(r#"{"type": "momentum", "mom_short": 2, "mom_long": 8}"#).unwrap();
        assert_eq!(
            spec,
            StrategySpec::Momentum(MomentumConfig {
                short_window: 2,
                long_window: 8,
                ..Default::default()
            })
        );

        let spec: StrategySpec = serde_json::from_str(r#"{"type": "rl", "hidden": 16}"#).unwrap();
        assert_eq!(spec.kind(), StrategyKind::LearnedPolicy);

        let spec: StrategySpec = serde_json::from_str(r#"{"type": "mean_reversion"}"#).unwrap();
        assert_eq!(spec, StrategySpec::MeanReversion(MeanReversionConfig::default()));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<StrategySpec>(r#"{"type": "martingale"}"#).is_err());
    }

    #[test]
    fn test_build_each_kind() {
        let account = AccountId::from("t1");
        let profile = TraderProfile::default();
        for spec in [
            StrategySpec::Momentum(MomentumConfig::default()),
            StrategySpec::MeanReversion(MeanReversionConfig::default()),
            StrategySpec::LearnedPolicy(LearnedPolicyConfig::default()),
            StrategySpec::Noise(NoiseConfig::default()),
        ] {
            let model = build_strategy(&spec, &ctx(&account, &profile)).unwrap();
            assert_eq!(model.kind(), spec.kind());
            assert_eq!(model.name(), spec.kind().as_str());
        }
    }

    #[test]
    fn test_bad_params_are_config_errors() {
        let account = AccountId::from("bad");
        let profile = TraderProfile::default();
        let spec = StrategySpec::Momentum(MomentumConfig {
            short_window: 10,
            long_window: 5,
            ..Default::default()
        });
        let err = build_strategy(&spec, &ctx(&account, &profile)).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidTrader { .. }));

        let risky = TraderProfile::default().with_risk_aversion(-1.0);
        let spec = StrategySpec::Noise(NoiseConfig::default());
        assert!(build_strategy(&spec, &ctx(&account, &risky)).is_err());
    }

    #[test]
    fn test_factory_rejects_foreign_spec() {
        let account = AccountId::from("x");
        let profile = TraderProfile::default();
        let spec = StrategySpec::Noise(NoiseConfig::default());
        assert!(build_momentum(&spec, &ctx(&account, &profile)).is_err());
    }

    #[test]
    fn test_learned_policy_seed_falls_back_to_market_seed() {
        let account = AccountId::from("rl_1");
        let profile = TraderProfile::default();
        let spec = StrategySpec::LearnedPolicy(LearnedPolicyConfig {
            random_state: None,
            ..Default::default()
        });
        let model = build_strategy(&spec, &ctx(&account, &profile)).unwrap();
        assert!(model.as_learned_policy().is_some());
    }
}
