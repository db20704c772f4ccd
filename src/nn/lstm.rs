//! Long Short-Term Memory layer with full back-propagation through time.

use super::activation::{sigmoid, sigmoid_grad_from_output, tanh_grad_from_output};
use super::{check_shape, Module, Param, ParamMut, SequenceLayer};
use crate::error::{ForecastError, Result};
use ndarray::{s, Array1, Array2, Axis, Ix1, Ix2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Activations of one time step, kept for the backward pass.
#[derive(Debug, Clone, PartialEq)]
struct LstmStep {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    tanh_c: Array2<f64>,
}

/// LSTM layer. Gate blocks are packed as `[input, forget, cell, output]`.
///
/// ```text
/// i = σ(x W_i + h U_i + b_i)     f = σ(x W_f + h U_f + b_f)
/// g = tanh(x W_g + h U_g + b_g)  o = σ(x W_o + h U_o + b_o)
/// c' = f ⊙ c + i ⊙ g             h' = o ⊙ tanh(c')
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lstm {
    hidden_size: usize,
    w_x: Param<Ix2>,
    w_h: Param<Ix2>,
    bias: Param<Ix1>,
    #[serde(skip)]
    cache: Vec<LstmStep>,
}

impl Lstm {
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new(-limit, limit);
        let mut bias = Array1::zeros(4 * hidden_size);
        // forget gate starts open
        bias.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);

        Self {
            hidden_size,
            w_x: Param::new(Array2::random_using((input_size, 4 * hidden_size), dist, rng)),
            w_h: Param::new(Array2::random_using((hidden_size, 4 * hidden_size), dist, rng)),
            bias: Param::new(bias),
            cache: Vec::new(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.w_x.value.nrows()
    }
}

impl Module for Lstm {
    fn params(&mut self) -> Vec<ParamMut<'_>> {
        vec![self.w_x.as_mut(), self.w_h.as_mut(), self.bias.as_mut()]
    }
}

impl SequenceLayer for Lstm {
    fn output_size(&self) -> usize {
        self.hidden_size
    }

    fn check_shapes(&self) -> Result<()> {
        let gates = 4 * self.hidden_size;
        check_shape("lstm input weights", self.w_x.value.shape(), &[self.input_size(), gates])?;
        check_shape("lstm recurrent weights", self.w_h.value.shape(), &[self.hidden_size, gates])?;
        check_shape("lstm bias", self.bias.value.shape(), &[gates])
    }

    fn forward(&mut self, inputs: &[Array2<f64>]) -> Result<Vec<Array2<f64>>> {
        self.cache.clear();
        let Some(first) = inputs.first() else {
            return Ok(Vec::new());
        };
        if first.ncols() != self.input_size() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.input_size(),
                got: first.ncols(),
            });
        }

        let hs = self.hidden_size;
        let batch = first.nrows();
        let mut h = Array2::zeros((batch, hs));
        let mut c = Array2::zeros((batch, hs));
        let mut outputs = Vec::with_capacity(inputs.len());

        for x in inputs {
            let z = x.dot(&self.w_x.value) + h.dot(&self.w_h.value) + &self.bias.value;
            let i = z.slice(s![.., 0..hs]).mapv(sigmoid);
            let f = z.slice(s![.., hs..2 * hs]).mapv(sigmoid);
            let g = z.slice(s![.., 2 * hs..3 * hs]).mapv(f64::tanh);
            let o = z.slice(s![.., 3 * hs..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            outputs.push(h_next.clone());
            self.cache.push(LstmStep {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            h = h_next;
            c = c_next;
        }

        Ok(outputs)
    }

    fn backward(&mut self, d_outputs: &[Array2<f64>]) -> Result<Vec<Array2<f64>>> {
        if d_outputs.len() != self.cache.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.cache.len(),
                got: d_outputs.len(),
            });
        }
        let Some(last) = self.cache.last() else {
            return Ok(Vec::new());
        };

        let hs = self.hidden_size;
        let batch = last.x.nrows();
        let mut dh_next = Array2::zeros((batch, hs));
        let mut dc_next = Array2::zeros((batch, hs));
        let mut d_inputs = vec![Array2::zeros((0, 0)); self.cache.len()];

        for t in (0..self.cache.len()).rev() {
            let step = &self.cache[t];
            let dh = &d_outputs[t] + &dh_next;

            let d_o = &dh * &step.tanh_c;
            let dc = &dh * &step.o * &step.tanh_c.mapv(tanh_grad_from_output) + &dc_next;
            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;
            dc_next = &dc * &step.f;

            let mut dz = Array2::zeros((batch, 4 * hs));
            dz.slice_mut(s![.., 0..hs])
                .assign(&(d_i * &step.i.mapv(sigmoid_grad_from_output)));
            dz.slice_mut(s![.., hs..2 * hs])
                .assign(&(d_f * &step.f.mapv(sigmoid_grad_from_output)));
            dz.slice_mut(s![.., 2 * hs..3 * hs])
                .assign(&(d_g * &step.g.mapv(tanh_grad_from_output)));
            dz.slice_mut(s![.., 3 * hs..])
                .assign(&(d_o * &step.o.mapv(sigmoid_grad_from_output)));

            self.w_x.grad += &step.x.t().dot(&dz);
            self.w_h.grad += &step.h_prev.t().dot(&dz);
            self.bias.grad += &dz.sum_axis(Axis(0));

            d_inputs[t] = dz.dot(&self.w_x.value.t());
            dh_next = dz.dot(&self.w_h.value.t());
        }

        Ok(d_inputs)
    }
}
