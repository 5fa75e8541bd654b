//! Dueling value network with one hidden layer.
//!
//! # Forward
//! ```text
//! z1 = s·W1 + b1          h = relu(z1)
//! V  = h·Wv + bv          A = h·Wa + ba
//! Q  = V + (A - mean(A))
//! ```
//!
//! # Backward
//! Only the taken action's Q carries loss. With `g = dL/dQ[a]`:
//! `dV = g` and `dA[j] = g·(δ_aj − 1/n)`, then back through the heads into
//! the hidden layer, masked by `z1 > 0`. Parameters move by plain SGD.

use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Intermediate values from one forward pass, kept for backprop.
#[derive(Debug, Clone)]
pub struct Activations {
    pub z1: Vec<f64>,
    pub hidden: Vec<f64>,
    pub q: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct DuelingNetwork {
    /// [inputs][hidden]
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    /// [hidden]
    wv: Vec<f64>,
    bv: f64,
    /// [hidden][actions]
    wa: Vec<Vec<f64>>,
    ba: Vec<f64>,
}

fn gaussian_matrix(rows: usize, cols: usize, scale: f64, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut matrix = Vec::with_capacity(rows);
    for _ in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for _ in 0..cols {
            let x: f64 = StandardNormal.sample(rng);
            row.push(x * scale);
        }
        matrix.push(row);
    }
    matrix
}

impl DuelingNetwork {
    /// Weights drawn from N(0, 1/fan_in), biases zero.
    pub fn new(n_inputs: usize, n_hidden: usize, n_actions: usize, rng: &mut StdRng) -> Self {
        let in_scale = 1.0 / (n_inputs as f64).sqrt();
        let hid_scale = 1.0 / (n_hidden as f64).sqrt();
        let wv = gaussian_matrix(1, n_hidden, hid_scale, rng).pop().unwrap_or_default();
        Self {
            w1: gaussian_matrix(n_inputs, n_hidden, in_scale, rng),
            b1: vec![0.0; n_hidden],
            wv,
            bv: 0.0,
            wa: gaussian_matrix(n_hidden, n_actions, hid_scale, rng),
            ba: vec![0.0; n_actions],
        }
    }

    pub fn n_actions(&self) -> usize {
        self.ba.len()
    }

    pub fn forward(&self, state: &[f64]) -> Activations {
        let mut z1 = self.b1.clone();
        for (s, row) in state.iter().zip(&self.w1) {
            for (z, w) in z1.iter_mut().zip(row) {
                *z += s * w;
            }
        }
        let hidden: Vec<f64> = z1.iter().map(|z| z.max(0.0)).collect();

        let value = self.bv + hidden.iter().zip(&self.wv).map(|(h, w)| h * w).sum::<f64>();
        let mut advantage = self.ba.clone();
        for (h, row) in hidden.iter().zip(&self.wa) {
            for (a, w) in advantage.iter_mut().zip(row) {
                *a += h * w;
            }
        }
        let mean_adv = advantage.iter().sum::<f64>() / advantage.len().max(1) as f64;
        let q = advantage.iter().map(|a| value + a - mean_adv).collect();

        Activations { z1, hidden, q }
    }

    pub fn q_values(&self, state: &[f64]) -> Vec<f64> {
        self.forward(state).q
    }

    /// One SGD step on `grad = dL/dQ[action]`.
    pub fn backward(&mut self, state: &[f64], act: &Activations, action: usize, grad: f64, lr: f64) {
        let n = self.n_actions() as f64;
        let d_value = grad;
        let d_adv: Vec<f64> = (0..self.ba.len())
            .map(|j| {
                let own = if j == action { 1.0 } else { 0.0 };
                grad * (own - 1.0 / n)
            })
            .collect();

        // Hidden gradient uses the weights before this step.
        let d_z1: Vec<f64> = (0..self.b1.len())
            .map(|h| {
                if act.z1[h] <= 0.0 {
                    return 0.0;
                }
                let through_adv: f64 = self.wa[h].iter().zip(&d_adv).map(|(w, d)| w * d).sum();
                self.wv[h] * d_value + through_adv
            })
            .collect();

        for (h, hv) in act.hidden.iter().enumerate() {
            self.wv[h] -= lr * hv * d_value;
            for (w, d) in self.wa[h].iter_mut().zip(&d_adv) {
                *w -= lr * hv * d;
            }
        }
        self.bv -= lr * d_value;
        for (b, d) in self.ba.iter_mut().zip(&d_adv) {
            *b -= lr * d;
        }

        for (s, row) in state.iter().zip(self.w1.iter_mut()) {
            for (w, d) in row.iter_mut().zip(&d_z1) {
                *w -= lr * s * d;
            }
        }
        for (b, d) in self.b1.iter_mut().zip(&d_z1) {
            *b -= lr * d;
        }
    }

    /// Blend toward `online`: θ ← (1 − τ)·θ + τ·θ_online.
    pub fn soft_update_from(&mut self, online: &DuelingNetwork, tau: f64) {
        let blend = |t: &mut f64, o: f64| *t = (1.0 - tau) * *t + tau * o;

        for (trow, orow) in self.w1.iter_mut().zip(&online.w1) {
            trow.iter_mut().zip(orow).for_each(|(t, o)| blend(t, *o));
        }
        self.b1.iter_mut().zip(&online.b1).for_each(|(t, o)| blend(t, *o));
        self.wv.iter_mut().zip(&online.wv).for_each(|(t, o)| blend(t, *o));
        blend(&mut self.bv, online.bv);
        for (trow, orow) in self.wa.iter_mut().zip(&online.wa) {
            trow.iter_mut().zip(orow).for_each(|(t, o)| blend(t, *o));
        }
        self.ba.iter_mut().zip(&online.ba).for_each(|(t, o)| blend(t, *o));
    }
}
