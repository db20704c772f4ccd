//! Minimal reverse-mode neural network building blocks on `ndarray`.
//!
//! Layers cache what they need during `forward` and accumulate parameter
//! gradients during `backward`; callers are expected to run
//! [`Module::zero_grad`] before every backward pass.
//!
//! Sequences are passed as one `(batch, features)` matrix per time step.

mod activation;
mod dense;
mod gru;
mod lstm;
mod optim;
mod tcn;

pub use activation::{sigmoid, sigmoid_grad_from_output, tanh_grad_from_output};
pub use dense::Dense;
pub use gru::Gru;
pub use lstm::Lstm;
pub use optim::{clip_grad_norm, Adam, Optimizer, OptimizerKind, Sgd};
pub use tcn::TemporalConv;

use crate::error::{ForecastError, Result};
use ndarray::{Array, Array2, ArrayViewMutD, Dimension};
use serde::{Deserialize, Serialize};

/// A trainable tensor and its accumulated gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param<D: Dimension> {
    pub value: Array<f64, D>,
    #[serde(skip)]
    pub grad: Array<f64, D>,
}

impl<D: Dimension> Param<D> {
    pub fn new(value: Array<f64, D>) -> Self {
        let grad = Array::zeros(value.raw_dim());
        Self { value, grad }
    }

    /// Reset the gradient, re-allocating it if the shape is stale (e.g. after
    /// loading from a checkpoint).
    pub fn zero_grad(&mut self) {
        if self.grad.shape() != self.value.shape() {
            self.grad = Array::zeros(self.value.raw_dim());
        } else {
            self.grad.fill(0.0);
        }
    }

    pub fn as_mut(&mut self) -> ParamMut<'_> {
        if self.grad.shape() != self.value.shape() {
            self.grad = Array::zeros(self.value.raw_dim());
        }
        ParamMut {
            value: self.value.view_mut().into_dyn(),
            grad: self.grad.view_mut().into_dyn(),
        }
    }
}

/// Dimension-erased mutable view of a parameter, used by optimizers.
#[derive(Debug)]
pub struct ParamMut<'a> {
    pub value: ArrayViewMutD<'a, f64>,
    pub grad: ArrayViewMutD<'a, f64>,
}

/// Anything that owns trainable parameters.
pub trait Module {
    /// Mutable views of every parameter, in a stable order.
    fn params(&mut self) -> Vec<ParamMut<'_>>;

    fn zero_grad(&mut self) {
        for mut p in self.params() {
            p.grad.fill(0.0);
        }
    }

    fn num_parameters(&mut self) -> usize {
        self.params().iter().map(|p| p.value.len()).sum()
    }
}

/// Layer mapping a sequence to a sequence of the same length.
pub trait SequenceLayer: Module {
    /// Output feature width.
    fn output_size(&self) -> usize;

    /// Run the layer over all time steps, caching activations.
    fn forward(&mut self, inputs: &[Array2<f64>]) -> Result<Vec<Array2<f64>>>;

    /// Back-propagate output gradients (one per step) and return input
    /// gradients. Parameter gradients are accumulated.
    fn backward(&mut self, d_outputs: &[Array2<f64>]) -> Result<Vec<Array2<f64>>>;

    /// Check that the parameter shapes agree with each other, e.g. after
    /// deserialization.
    fn check_shapes(&self) -> Result<()>;
}

/// `Parse` error unless `got == expected`.
pub(crate) fn check_shape(name: &str, got: &[usize], expected: &[usize]) -> Result<()> {
    if got != expected {
        return Err(ForecastError::Parse(format!(
            "{name} has shape {got:?}, expected {expected:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod gradcheck {
    use super::Module;

    fn set_value<M: Module>(module: &mut M, param: usize, index: usize, value: f64) {
        let mut params = module.params();
        if let Some(slot) = params[param].value.iter_mut().nth(index) {
            *slot = value;
        }
    }

    fn get_value<M: Module>(module: &mut M, param: usize, index: usize) -> f64 {
        let params = module.params();
        params[param].value.iter().nth(index).copied().unwrap_or(f64::NAN)
    }

    /// Compare the gradients currently stored in `module` against central
    /// finite differences of `objective`.
    pub fn assert_gradients<M, F>(module: &mut M, mut objective: F)
    where
        M: Module,
        F: FnMut(&mut M) -> f64,
    {
        let eps = 1e-5;
        let analytic: Vec<Vec<f64>> = module
            .params()
            .iter()
            .map(|p| p.grad.iter().copied().collect())
            .collect();

        for (pi, grads) in analytic.iter().enumerate() {
            let stride = (grads.len() / 15).max(1);
            for j in (0..grads.len()).step_by(stride) {
                let original = get_value(module, pi, j);
                set_value(module, pi, j, original + eps);
                let plus = objective(module);
                set_value(module, pi, j, original - eps);
                let minus = objective(module);
                set_value(module, pi, j, original);

                let numeric = (plus - minus) / (2.0 * eps);
                let exact = grads[j];
                let scale = 1.0 + exact.abs().max(numeric.abs());
                assert!(
                    (exact - numeric).abs() <= 1e-4 * scale,
                    "param {pi} entry {j}: analytic {exact} vs numeric {numeric}"
                );
            }
        }
    }
}
