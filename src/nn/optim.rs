//! First-order optimizers and gradient clipping.

use super::ParamMut;
use crate::error::{ForecastError, Result};
use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

/// Update rule applied to a module's parameters after a backward pass.
pub trait Optimizer {
    /// Apply one update. `params` must come in the same order on every call.
    fn step(&mut self, params: Vec<ParamMut<'_>>);

    fn learning_rate(&self) -> f64;
}

/// Serializable choice of optimizer; the learning rate lives in the trainer
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam { beta1: f64, beta2: f64, epsilon: f64 },
    Sgd { momentum: f64 },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl OptimizerKind {
    pub fn build(&self, learning_rate: f64) -> Result<Box<dyn Optimizer>> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning rate must be positive, got {learning_rate}"
            )));
        }
        match *self {
            OptimizerKind::Adam {
                beta1,
                beta2,
                epsilon,
            } => {
                if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) || epsilon <= 0.0 {
                    return Err(ForecastError::InvalidParameter(
                        "adam betas must lie in [0, 1) and epsilon must be positive".to_string(),
                    ));
                }
                Ok(Box::new(Adam::with_params(learning_rate, beta1, beta2, epsilon)))
            }
            OptimizerKind::Sgd { momentum } => {
                if !(0.0..1.0).contains(&momentum) {
                    return Err(ForecastError::InvalidParameter(format!(
                        "momentum must lie in [0, 1), got {momentum}"
                    )));
                }
                Ok(Box::new(Sgd::new(learning_rate, momentum)))
            }
        }
    }
}

/// Adam optimizer.
///
/// ```text
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// w = w - lr * m_hat / (sqrt(v_hat) + epsilon)
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Vec<ArrayD<f64>>,
    v: Vec<ArrayD<f64>>,
    t: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self::with_params(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_params(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    pub fn timestep(&self) -> i32 {
        self.t
    }

    pub fn reset_state(&mut self) {
        self.m.clear();
        self.v.clear();
        self.t = 0;
    }

    fn ensure_state(&mut self, params: &[ParamMut<'_>]) {
        let matches = self.m.len() == params.len()
            && self
                .m
                .iter()
                .zip(params)
                .all(|(m, p)| m.shape() == p.value.shape());
        if !matches {
            self.m = params.iter().map(|p| ArrayD::zeros(p.value.raw_dim())).collect();
            self.v = self.m.clone();
            self.t = 0;
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, mut params: Vec<ParamMut<'_>>) {
        self.ensure_state(&params);
        self.t += 1;

        let bias_correction1 = 1.0 - self.beta1.powi(self.t);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t);
        let (lr, beta1, beta2, eps) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);

        for ((p, m), v) in params.iter_mut().zip(&mut self.m).zip(&mut self.v) {
            Zip::from(&mut p.value)
                .and(&p.grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias_correction1;
                    let v_hat = *v / bias_correction2;
                    *w -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// Stochastic gradient descent with classical momentum.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f64,
    momentum: f64,
    velocity: Vec<ArrayD<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: Vec::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, mut params: Vec<ParamMut<'_>>) {
        if self.velocity.len() != params.len() {
            self.velocity = params
                .iter()
                .map(|p| ArrayD::zeros(p.value.raw_dim()))
                .collect();
        }
        let (lr, mu) = (self.learning_rate, self.momentum);
        for (p, vel) in params.iter_mut().zip(&mut self.velocity) {
            Zip::from(&mut p.value)
                .and(&p.grad)
                .and(vel)
                .for_each(|w, &g, vel| {
                    *vel = mu * *vel + g;
                    *w -= lr * *vel;
                });
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// Rescale all gradients so their joint L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping. A non-positive `max_norm` disables
/// clipping.
pub fn clip_grad_norm(params: &mut [ParamMut<'_>], max_norm: f64) -> f64 {
    let norm = params
        .iter()
        .map(|p| p.grad.iter().map(|g| g * g).sum::<f64>())
        .sum::<f64>()
        .sqrt();

    if max_norm > 0.0 && norm.is_finite() && norm > max_norm {
        let factor = max_norm / (norm + 1e-12);
        for p in params.iter_mut() {
            p.grad.mapv_inplace(|g| g * factor);
        }
    }
    norm
}
