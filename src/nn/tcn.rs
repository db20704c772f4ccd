//! Temporal convolution block: causal dilated convolution, ReLU and a residual
//! connection.
//!
//! For kernel size `K` and dilation `d` the block computes
//!
//! ```text
//! a_t = b + Σ_k x_{t - k·d} W_k        (terms with t - k·d < 0 are zero)
//! y_t = relu(a_t) + skip(x_t)
//! ```
//!
//! where `skip` is the identity when input and output widths agree and a
//! learned 1×1 projection otherwise.

use super::{check_shape, Module, Param, ParamMut, SequenceLayer};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, Array3, Axis, Ix1, Ix2, Ix3};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq)]
struct TcnCache {
    inputs: Vec<Array2<f64>>,
    pre: Vec<Array2<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalConv {
    dilation: usize,
    /// Shape `(kernel, in, out)`.
    weight: Param<Ix3>,
    bias: Param<Ix1>,
    projection: Option<Param<Ix2>>,
    #[serde(skip)]
    cache: TcnCache,
}

impl TemporalConv {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        kernel_size: usize,
        dilation: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if kernel_size == 0 || dilation == 0 {
            return Err(ForecastError::InvalidParameter(
                "kernel size and dilation must be positive".to_string(),
            ));
        }
        // He-uniform for the ReLU branch
        let fan_in = (kernel_size * input_size) as f64;
        let limit = (6.0 / fan_in).sqrt();
        let weight = Array3::random_using(
            (kernel_size, input_size, output_size),
            Uniform::new(-limit, limit),
            rng,
        );
        let projection = (input_size != output_size).then(|| {
            let limit = (6.0 / (input_size + output_size) as f64).sqrt();
            Param::new(Array2::random_using(
                (input_size, output_size),
                Uniform::new(-limit, limit),
                rng,
            ))
        });

        Ok(Self {
            dilation,
            weight: Param::new(weight),
            bias: Param::new(Array1::zeros(output_size)),
            projection,
            cache: TcnCache::default(),
        })
    }

    pub fn kernel_size(&self) -> usize {
        self.weight.value.shape()[0]
    }

    pub fn input_size(&self) -> usize {
        self.weight.value.shape()[1]
    }

    pub fn dilation(&self) -> usize {
        self.dilation
    }

    /// Number of past steps (including the current one) that influence an
    /// output.
    pub fn receptive_field(&self) -> usize {
        (self.kernel_size() - 1) * self.dilation + 1
    }

    fn source(&self, t: usize, k: usize) -> Option<usize> {
        t.checked_sub(k * self.dilation)
    }
}

impl Module for TemporalConv {
    fn params(&mut self) -> Vec<ParamMut<'_>> {
        let mut params = vec![self.weight.as_mut(), self.bias.as_mut()];
        if let Some(projection) = self.projection.as_mut() {
            params.push(projection.as_mut());
        }
        params
    }
}

impl SequenceLayer for TemporalConv {
    fn output_size(&self) -> usize {
        self.weight.value.shape()[2]
    }

    fn check_shapes(&self) -> Result<()> {
        if self.kernel_size() == 0 || self.dilation == 0 {
            return Err(ForecastError::Parse(
                "temporal convolution needs a positive kernel size and dilation".to_string(),
            ));
        }
        let (input, output) = (self.input_size(), self.output_size());
        check_shape("tcn bias", self.bias.value.shape(), &[output])?;
        match &self.projection {
            Some(p) => check_shape("tcn projection", p.value.shape(), &[input, output]),
            // identity skip connection
            None => check_shape("tcn skip connection", &[input], &[output]),
        }
    }

    fn forward(&mut self, inputs: &[Array2<f64>]) -> Result<Vec<Array2<f64>>> {
        self.cache = TcnCache::default();
        if let Some(first) = inputs.first() {
            if first.ncols() != self.input_size() {
                return Err(ForecastError::DimensionMismatch {
                    expected: self.input_size(),
                    got: first.ncols(),
                });
            }
        }

        let mut outputs = Vec::with_capacity(inputs.len());
        let mut pre = Vec::with_capacity(inputs.len());
        for (t, x) in inputs.iter().enumerate() {
            let mut acc = Array2::<f64>::zeros((x.nrows(), self.output_size())) + &self.bias.value;
            for k in 0..self.kernel_size() {
                if let Some(src) = self.source(t, k) {
                    acc += &inputs[src].dot(&self.weight.value.index_axis(Axis(0), k));
                }
            }
            let skip = match &self.projection {
                Some(p) => x.dot(&p.value),
                None => x.clone(),
            };
            outputs.push(acc.mapv(|v| v.max(0.0)) + skip);
            pre.push(acc);
        }

        self.cache = TcnCache {
            inputs: inputs.to_vec(),
            pre,
        };
        Ok(outputs)
    }

    fn backward(&mut self, d_outputs: &[Array2<f64>]) -> Result<Vec<Array2<f64>>> {
        let steps = self.cache.inputs.len();
        if d_outputs.len() != steps {
            return Err(ForecastError::DimensionMismatch {
                expected: steps,
                got: d_outputs.len(),
            });
        }

        let mut d_inputs: Vec<Array2<f64>> = self
            .cache
            .inputs
            .iter()
            .map(|x| Array2::zeros(x.raw_dim()))
            .collect();

        for t in 0..steps {
            let dy = &d_outputs[t];
            let x = &self.cache.inputs[t];

            let mut d_act = dy.clone();
            d_act.zip_mut_with(&self.cache.pre[t], |g, &a| {
                if a <= 0.0 {
                    *g = 0.0;
                }
            });

            self.bias.grad += &d_act.sum_axis(Axis(0));
            for k in 0..self.kernel_size() {
                let Some(src) = self.source(t, k) else {
                    continue;
                };
                let x_src = &self.cache.inputs[src];
                let mut gk = self.weight.grad.index_axis_mut(Axis(0), k);
                gk += &x_src.t().dot(&d_act);
                d_inputs[src] += &d_act.dot(&self.weight.value.index_axis(Axis(0), k).t());
            }

            match self.projection.as_mut() {
                Some(p) => {
                    p.grad += &x.t().dot(dy);
                    d_inputs[t] += &dy.dot(&p.value.t());
                }
                None => d_inputs[t] += dy,
            }
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
    fn rejects_zero_kernel_or_dilation() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(TemporalConv::new(1, 2, 0, 1, &mut rng).is_err());
        assert!(TemporalConv::new(1, 2, 2, 0, &mut rng).is_err());
    }

    #[test]
    fn receptive_field_grows_with_dilation() {
        let mut rng = StdRng::seed_from_u64(0);
        let conv = TemporalConv::new(1, 2, 3, 4, &mut rng).unwrap();
        assert_eq!(conv.receptive_field(), 9);
        assert_eq!(conv.dilation(), 4);
    }

    #[test]
    fn convolution_is_causal() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut conv = TemporalConv::new(1, 3, 2, 1, &mut rng).unwrap();
        let mut inputs = random_sequence(&mut rng, 5, 1, 1);
        let before = conv.forward(&inputs).unwrap();

        // perturbing the last step must not change earlier outputs
        inputs[4][[0, 0]] += 10.0;
        let after = conv.forward(&inputs).unwrap();
        for t in 0..4 {
            assert_eq!(before[t], after[t]);
        }
    }

    #[test]
    fn projection_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut conv = TemporalConv::new(2, 3, 3, 2, &mut rng).unwrap();
        let inputs = random_sequence(&mut rng, 6, 2, 2);
        let weights = random_sequence(&mut rng, 6, 2, 3);

        conv.zero_grad();
        conv.forward(&inputs).unwrap();
        conv.backward(&weights).unwrap();

        assert_gradients(&mut conv, |layer| {
            let outputs = layer.forward(&inputs).unwrap();
            outputs
                .iter()
                .zip(&weights)
                .map(|(o, w)| (o * w).sum())
                .sum()
        });
    }

    #[test]
    fn identity_skip_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(22);
        let mut conv = TemporalConv::new(3, 3, 2, 1, &mut rng).unwrap();
        let inputs = random_sequence(&mut rng, 5, 2, 3);
        let weights = random_sequence(&mut rng, 5, 2, 3);

        conv.zero_grad();
        conv.forward(&inputs).unwrap();
        let d_inputs = conv.backward(&weights).unwrap();
        assert_eq!(d_inputs.len(), 5);

        assert_gradients(&mut conv, |layer| {
            let outputs = layer.forward(&inputs).unwrap();
            outputs
                .iter()
                .zip(&weights)
                .map(|(o, w)| (o * w).sum())
                .sum()
        });
    }
}
