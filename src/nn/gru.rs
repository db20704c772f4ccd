//! Gated Recurrent Unit layer.

use super::activation::{sigmoid, sigmoid_grad_from_output, tanh_grad_from_output};
use super::{check_shape, Module, Param, ParamMut, SequenceLayer};
use crate::error::{ForecastError, Result};
use ndarray::{s, Array1, Array2, Axis, Ix1, Ix2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
struct GruStep {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    z: Array2<f64>,
    r: Array2<f64>,
    n: Array2<f64>,
    /// Recurrent contribution to the candidate, before the reset gate.
    hn: Array2<f64>,
}

/// GRU layer; gate blocks packed as `[update, reset, candidate]`.
///
/// ```text
/// z = σ(x W_z + b_z + h U_z + c_z)
/// r = σ(x W_r + b_r + h U_r + c_r)
/// n = tanh(x W_n + b_n + r ⊙ (h U_n + c_n))
/// h' = (1 - z) ⊙ n + z ⊙ h
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gru {
    hidden_size: usize,
    w_x: Param<Ix2>,
    w_h: Param<Ix2>,
    b_x: Param<Ix1>,
    b_h: Param<Ix1>,
    #[serde(skip)]
    cache: Vec<GruStep>,
}

impl Gru {
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new(-limit, limit);
        Self {
            hidden_size,
            w_x: Param::new(Array2::random_using((input_size, 3 * hidden_size), dist, rng)),
            w_h: Param::new(Array2::random_using((hidden_size, 3 * hidden_size), dist, rng)),
            b_x: Param::new(Array1::zeros(3 * hidden_size)),
            b_h: Param::new(Array1::zeros(3 * hidden_size)),
            cache: Vec::new(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.w_x.value.nrows()
    }
}

impl Module for Gru {
    fn params(&mut self) -> Vec<ParamMut<'_>> {
        vec![
            self.w_x.as_mut(),
            self.w_h.as_mut(),
            self.b_x.as_mut(),
            self.b_h.as_mut(),
        ]
    }
}

impl SequenceLayer for Gru {
    fn output_size(&self) -> usize {
        self.hidden_size
    }

    fn check_shapes(&self) -> Result<()> {
        let gates = 3 * self.hidden_size;
        check_shape("gru input weights", self.w_x.value.shape(), &[self.input_size(), gates])?;
        check_shape("gru recurrent weights", self.w_h.value.shape(), &[self.hidden_size, gates])?;
        check_shape("gru input bias", self.b_x.value.shape(), &[gates])?;
        check_shape("gru recurrent bias", self.b_h.value.shape(), &[gates])
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
        let mut h = Array2::zeros((first.nrows(), hs));
        let mut outputs = Vec::with_capacity(inputs.len());

        for x in inputs {
            let gx = x.dot(&self.w_x.value) + &self.b_x.value;
            let gh = h.dot(&self.w_h.value) + &self.b_h.value;

            let z = (&gx.slice(s![.., 0..hs]) + &gh.slice(s![.., 0..hs])).mapv(sigmoid);
            let r = (&gx.slice(s![.., hs..2 * hs]) + &gh.slice(s![.., hs..2 * hs])).mapv(sigmoid);
            let hn = gh.slice(s![.., 2 * hs..]).to_owned();
            let n = (&gx.slice(s![.., 2 * hs..]) + &(&r * &hn)).mapv(f64::tanh);

            let h_next = &z.mapv(|v| 1.0 - v) * &n + &z * &h;

            outputs.push(h_next.clone());
            self.cache.push(GruStep {
                x: x.clone(),
                h_prev: h,
                z,
                r,
                n,
                hn,
            });
            h = h_next;
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
        let mut d_inputs = vec![Array2::zeros((0, 0)); self.cache.len()];

        for t in (0..self.cache.len()).rev() {
            let step = &self.cache[t];
            let dh = &d_outputs[t] + &dh_next;

            let dn = &dh * &step.z.mapv(|v| 1.0 - v);
            let dz = &dh * &(&step.h_prev - &step.n);
            let dh_direct = &dh * &step.z;

            let da_n = dn * &step.n.mapv(tanh_grad_from_output);
            let dr = &da_n * &step.hn;
            let da_z = dz * &step.z.mapv(sigmoid_grad_from_output);
            let da_r = dr * &step.r.mapv(sigmoid_grad_from_output);

            let mut dgx = Array2::zeros((batch, 3 * hs));
            dgx.slice_mut(s![.., 0..hs]).assign(&da_z);
            dgx.slice_mut(s![.., hs..2 * hs]).assign(&da_r);
            dgx.slice_mut(s![.., 2 * hs..]).assign(&da_n);

            let mut dgh = dgx.clone();
            dgh.slice_mut(s![.., 2 * hs..]).assign(&(&da_n * &step.r));

            self.w_x.grad += &step.x.t().dot(&dgx);
            self.b_x.grad += &dgx.sum_axis(Axis(0));
            self.w_h.grad += &step.h_prev.t().dot(&dgh);
            self.b_h.grad += &dgh.sum_axis(Axis(0));

            d_inputs[t] = dgx.dot(&self.w_x.value.t());
            dh_next = dh_direct + dgh.dot(&self.w_h.value.t());
        }

        Ok(d_inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::gradcheck::assert_gradients;
    use ndarray_rand::rand_distr::Normal;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random_sequence(rng: &mut StdRng, steps: usize, batch: usize, width: usize) -> Vec<Array2<f64>> {
        let dist = Normal::new(0.0, 1.0).unwrap();
        (0..steps)
            .map(|_| Array2::random_using((batch, width), dist, rng))
            .collect()
    }

    #[test]
    fn forward_shapes_and_bounds() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut gru = Gru::new(1, 4, &mut rng);
        let inputs = random_sequence(&mut rng, 6, 2, 1);
        let outputs = gru.forward(&inputs).unwrap();

        assert_eq!(outputs.len(), 6);
        assert_eq!(outputs[0].shape(), &[2, 4]);
        // convex combination of tanh outputs and a zero initial state
        assert!(outputs.iter().all(|h| h.iter().all(|v| v.abs() < 1.0)));
        assert_eq!(gru.num_parameters(), 12 + 4 * 12 + 12 + 12);
    }

    #[test]
    fn empty_sequence_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut gru = Gru::new(1, 4, &mut rng);
        assert!(gru.forward(&[]).unwrap().is_empty());
        assert!(gru.backward(&[]).unwrap().is_empty());
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut gru = Gru::new(2, 3, &mut rng);
        let inputs = random_sequence(&mut rng, 4, 2, 2);
        let weights = random_sequence(&mut rng, 4, 2, 3);

        gru.zero_grad();
        gru.forward(&inputs).unwrap();
        gru.backward(&weights).unwrap();

        assert_gradients(&mut gru, |layer| {
            let outputs = layer.forward(&inputs).unwrap();
            outputs
                .iter()
                .zip(&weights)
                .map(|(o, w)| (o * w).sum())
                .sum()
        });
    }
}
