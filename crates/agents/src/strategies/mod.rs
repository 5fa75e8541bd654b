//! Strategy variants.

pub mod learned_policy;
pub mod mean_reversion;
pub mod momentum;
pub mod noise;

pub use learned_policy::{LearnedPolicy, LearnedPolicyConfig};
pub use mean_reversion::{MeanReversionConfig, MeanReversionTrader};
pub use momentum::{MomentumConfig, MomentumTrader};
pub use noise::{NoiseConfig, NoiseTrader};
