//! Fully connected layer.

use super::{check_shape, Module, Param, ParamMut};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, Axis, Ix1, Ix2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// `y = x W + b` with Glorot-uniform initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    weight: Param<Ix2>,
    bias: Param<Ix1>,
    #[serde(skip)]
    input: Option<Array2<f64>>,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        Self {
            weight: Param::new(Array2::random_using(
                (input_size, output_size),
                Uniform::new(-limit, limit),
                rng,
            )),
            bias: Param::new(Array1::zeros(output_size)),
            input: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn check_shapes(&self) -> Result<()> {
        check_shape("dense bias", self.bias.value.shape(), &[self.output_size()])
    }

    pub fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        self.input = Some(x.clone());
        x.dot(&self.weight.value) + &self.bias.value
    }

    pub fn backward(&mut self, d_out: &Array2<f64>) -> Result<Array2<f64>> {
        let x = self.input.as_ref().ok_or_else(|| {
            ForecastError::ComputationError("dense backward called before forward".to_string())
        })?;
        self.weight.grad += &x.t().dot(d_out);
        self.bias.grad += &d_out.sum_axis(Axis(0));
        Ok(d_out.dot(&self.weight.value.t()))
    }
}

impl Module for Dense {
    fn params(&mut self) -> Vec<ParamMut<'_>> {
        vec![self.weight.as_mut(), self.bias.as_mut()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::gradcheck::assert_gradients;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn forward_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut dense = Dense::new(3, 2, &mut rng);
        let y = dense.forward(&Array2::ones((4, 3)));
        assert_eq!(y.shape(), &[4, 2]);
        assert_eq!(dense.input_size(), 3);
        assert_eq!(dense.output_size(), 2);
        assert_eq!(dense.num_parameters(), 3 * 2 + 2);
    }

    #[test]
    fn backward_before_forward_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut dense = Dense::new(3, 2, &mut rng);
        assert!(dense.backward(&Array2::ones((1, 2))).is_err());
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut dense = Dense::new(3, 2, &mut rng);
        let x = array![[0.5, -1.0, 2.0], [1.5, 0.3, -0.7]];
        let weights = array![[1.0, -2.0], [0.5, 3.0]];

        dense.zero_grad();
        dense.forward(&x);
        dense.backward(&weights).unwrap();

        assert_gradients(&mut dense, |d| (d.forward(&x) * &weights).sum());
    }
}
