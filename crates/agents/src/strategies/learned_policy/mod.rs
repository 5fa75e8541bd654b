//! Learned policy: an online double-estimator value learner.
//!
//! # Architecture
//!
//! ```text
//! Observation ─► features ─► online DuelingNetwork ─► ε-greedy action ─► Intent
//!                                   ▲                         │
//!                  soft update (τ)  │                         ▼
//!                 target network ◄──┘        replay buffer ◄─ (s, a, r, s', done)
//! ```
//!
//! A transition is recorded when the next observation arrives: the reward is
//! the change in the account's mark-to-market equity since the previous
//! decision. Every recorded transition triggers one learning step once the
//! buffer holds a full batch.
//!
//! Targets pick the next action with the online network and value it with the
//! slow-moving target copy. The per-sample gradient is the TD error clipped
//! to `±huber_delta`.

mod features;
mod network;
mod replay;

pub use features::{extract, StateVec};
pub use network::{Activations, DuelingNetwork};
pub use replay::{ReplayBuffer, Transition};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{OrderSide, Price};

use crate::sizing::TraderProfile;
use crate::traits::{Intent, Observation, Strategy};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnedPolicyConfig {
    #[serde(alias = "lr")]
    pub learning_rate: f64,
    pub gamma: f64,
    /// Initial exploration rate.
    pub epsilon: f64,
    #[serde(alias = "eps_decay")]
    pub epsilon_decay: f64,
    #[serde(alias = "eps_min")]
    pub epsilon_min: f64,
    pub state_size: usize,
    #[serde(alias = "hidden")]
    pub hidden_size: usize,
    pub qty_bins: Vec<u64>,
    pub pct_bins: Vec<f64>,
    pub huber_delta: f64,
    pub batch_size: usize,
    pub tau: f64,
    pub replay_size: usize,
    /// Exploration seed. Derived from the market seed when absent.
    pub random_state: Option<u64>,
    /// Equity change is divided by this to form the reward.
    pub reward_scale: f64,
}

impl Default for LearnedPolicyConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            gamma: 0.99,
            epsilon: 0.1,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            state_size: 8,
            hidden_size: 64,
            qty_bins: vec![1, 2, 5],
            pct_bins: vec![0.002, 0.005, 0.01],
            huber_delta: 1.0,
            batch_size: 64,
            tau: 0.01,
            replay_size: 20_000,
            random_state: Some(17),
            reward_scale: 100.0,
        }
    }
}

impl LearnedPolicyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.state_size == 0 || self.hidden_size == 0 {
            return Err("state_size and hidden_size must be positive".into());
        }
        if self.qty_bins.is_empty() || self.qty_bins.contains(&0) {
            return Err("qty_bins must be non-empty and positive".into());
        }
        if self.pct_bins.is_empty() || self.pct_bins.iter().any(|p| !(0.0..1.0).contains(p)) {
            return Err("pct_bins must be non-empty and within [0, 1)".into());
        }
        if !(0.0..=1.0).contains(&self.epsilon) || !(0.0..=1.0).contains(&self.epsilon_min) {
            return Err("epsilon and epsilon_min must be within [0, 1]".into());
        }
        if !(0.0..=1.0).contains(&self.epsilon_decay) {
            return Err("epsilon_decay must be within [0, 1]".into());
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return Err(format!("tau {} outside (0, 1]", self.tau));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(format!("gamma {} outside [0, 1]", self.gamma));
        }
        if self.batch_size == 0 || self.batch_size > self.replay_size {
            return Err(format!(
                "batch_size {} must be in 1..=replay_size {}",
                self.batch_size, self.replay_size
            ));
        }
        if self.learning_rate <= 0.0 || self.huber_delta <= 0.0 || self.reward_scale <= 0.0 {
            return Err("learning_rate, huber_delta and reward_scale must be positive".into());
        }
        Ok(())
    }
}

// =============================================================================
// Action Space
// =============================================================================

/// One discrete action: hold, or a side with a quantity bin and price offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionTemplate {
    Hold,
    Trade { side: OrderSide, qty: u64, offset_pct: f64 },
}

/// `[hold] + {buy, sell} × qty_bins × pct_bins`, fixed at construction.
#[derive(Debug, Clone)]
pub struct ActionSpace {
    actions: Vec<ActionTemplate>,
}

impl ActionSpace {
    pub fn new(qty_bins: &[u64], pct_bins: &[f64]) -> Self {
        let mut actions = vec![ActionTemplate::Hold];
        for side in [OrderSide::Buy, OrderSide::Sell] {
            for &qty in qty_bins {
                for &offset_pct in pct_bins {
                    actions.push(ActionTemplate::Trade { side, qty, offset_pct });
                }
            }
        }
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ActionTemplate> {
        self.actions.get(index).copied()
    }

    /// Concrete intent for `index` given the account's cash and inventory.
    pub fn intent(&self, index: usize, obs: &Observation<'_>, profile: &TraderProfile) -> Intent {
        let Some(ActionTemplate::Trade { side, qty, offset_pct }) = self.get(index) else {
            return Intent::Hold;
        };
        let px = obs.price();
        let ra = profile.risk_aversion;

        match side {
            OrderSide::Buy => {
                let price = Price::from_float_cents(px * (1.0 + offset_pct));
                let affordable = obs.cash.units_affordable(price);
                if affordable == 0 {
                    return Intent::Hold;
                }
                let size = ((qty.min(affordable) as f64) * (1.0 - 0.7 * ra)).floor() as u64;
                Intent::buy(size.max(1), price)
            }
            OrderSide::Sell => {
                let price = Price::from_float_cents(px * (1.0 - offset_pct));
                let sellable = obs.position.max(0) as u64 + profile.short_room(obs.position);
                if sellable == 0 {
                    return Intent::Hold;
                }
                let size = ((qty.min(sellable) as f64) * (0.3 + 0.7 * ra)).floor() as u64;
                Intent::sell(size.max(1), price)
            }
        }
    }
}

// =============================================================================
// Policy
// =============================================================================

#[derive(Debug, Clone)]
struct PendingDecision {
    state: StateVec,
    action: usize,
    equity: f64,
}

pub struct LearnedPolicy {
    config: LearnedPolicyConfig,
    profile: TraderProfile,
    actions: ActionSpace,
    online: DuelingNetwork,
    target: DuelingNetwork,
    replay: ReplayBuffer,
    rng: StdRng,
    epsilon: f64,
    pending: Option<PendingDecision>,
    learn_steps: u64,
}

impl LearnedPolicy {
    /// Build with weights and exploration drawn from `seed`.
    pub fn new(config: LearnedPolicyConfig, profile: TraderProfile, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let actions = ActionSpace::new(&config.qty_bins, &config.pct_bins);
        let online = DuelingNetwork::new(config.state_size, config.hidden_size, actions.len(), &mut rng);
        let target = online.clone();
        Self {
            epsilon: config.epsilon,
            replay: ReplayBuffer::new(config.replay_size),
            config,
            profile,
            actions,
            online,
            target,
            rng,
            pending: None,
            learn_steps: 0,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    pub fn learn_steps(&self) -> u64 {
        self.learn_steps
    }

    pub fn actions(&self) -> &ActionSpace {
        &self.actions
    }

    /// Online estimates for every action in the current observation.
    pub fn q_values(&self, obs: &Observation<'_>) -> Vec<f64> {
        self.online.q_values(&extract(obs, self.config.state_size))
    }

    /// ε-greedy choice over the online estimates.
    fn select_action(&mut self, state: &[f64]) -> usize {
        if self.rng.gen::<f64>() < self.epsilon {
            return self.rng.gen_range(0..self.actions.len());
        }
        argmax(&self.online.q_values(state))
    }

    /// Store a transition and run one learning step.
    pub fn record(&mut self, transition: Transition) {
        self.replay.push(transition);
        self.learn();
    }

    fn learn(&mut self) {
        if self.replay.len() < self.config.batch_size {
            return;
        }

        let batch = self.replay.sample(&mut self.rng, self.config.batch_size);
        let mut abs_td = 0.0;
        for t in &batch {
            let target = if t.done {
                t.reward
            } else {
                let next_action = argmax(&self.online.q_values(&t.next_state));
                let next_value = self.target.q_values(&t.next_state)[next_action];
                t.reward + self.config.gamma * next_value
            };

            let act = self.online.forward(&t.state);
            let td = act.q[t.action] - target;
            abs_td += td.abs();
            let grad = td.clamp(-self.config.huber_delta, self.config.huber_delta);
            self.online
                .backward(&t.state, &act, t.action, grad, self.config.learning_rate);
        }

        self.target.soft_update_from(&self.online, self.config.tau);
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        self.learn_steps += 1;

        if self.learn_steps % 100 == 0 {
            debug!(
                steps = self.learn_steps,
                epsilon = self.epsilon,
                mean_abs_td = abs_td / batch.len() as f64,
                "learned policy progress"
            );
        }
    }

    /// Close the previous decision with the state that followed it.
    fn settle_pending(&mut self, next_state: &StateVec, equity: f64, done: bool) {
        if let Some(prev) = self.pending.take() {
            let reward = (equity - prev.equity) / self.config.reward_scale;
            self.record(Transition {
                state: prev.state,
                action: prev.action,
                reward,
                next_state: next_state.clone(),
                done,
            });
        }
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

impl Strategy for LearnedPolicy {
    fn act(&mut self, obs: &Observation<'_>) -> Intent {
        let state = extract(obs, self.config.state_size);
        let equity = obs.equity();
        self.settle_pending(&state, equity, false);

        let action = self.select_action(&state);
        self.pending = Some(PendingDecision { state, action, equity });
        self.actions.intent(action, obs, &self.profile)
    }

    fn reset(&mut self) {
        self.pending = None;
    }

    fn lookback(&self) -> usize {
        5
    }

    fn name(&self) -> &'static str {
        "learned_policy"
    }

    fn finish(&mut self, obs: &Observation<'_>) {
        let state = extract(obs, self.config.state_size);
        self.settle_pending(&state, obs.equity(), true);
    }
}
