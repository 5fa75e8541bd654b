//! Bounded experience replay.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::index;

use super::features::StateVec;

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: StateVec,
    pub action: usize,
    pub reward: f64,
    pub next_state: StateVec,
    pub done: bool,
}

/// Ring buffer; the oldest transition is evicted once full.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    capacity: usize,
    items: VecDeque<Transition>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Up to `n` distinct transitions, drawn uniformly without replacement.
    pub fn sample(&self, rng: &mut StdRng, n: usize) -> Vec<Transition> {
        let n = n.min(self.items.len());
        index::sample(rng, self.items.len(), n)
            .into_iter()
            .map(|i| self.items[i].clone())
            .collect()
    }
}
