//! Scalar activations and their derivatives expressed through the output.

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `d sigmoid / dx` given `s = sigmoid(x)`.
#[inline]
pub fn sigmoid_grad_from_output(s: f64) -> f64 {
    s * (1.0 - s)
}

/// `d tanh / dx` given `t = tanh(x)`.
#[inline]
pub fn tanh_grad_from_output(t: f64) -> f64 {
    1.0 - t * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert_relative_eq!(sigmoid(1000.0), 1.0);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let eps = 1e-6;
        for &x in &[-2.0, -0.3, 0.0, 0.7, 3.0] {
            let fd = (sigmoid(x + eps) - sigmoid(x - eps)) / (2.0 * eps);
            assert_relative_eq!(sigmoid_grad_from_output(sigmoid(x)), fd, epsilon = 1e-8);

            let fd = ((x + eps).tanh() - (x - eps).tanh()) / (2.0 * eps);
            assert_relative_eq!(tanh_grad_from_output(x.tanh()), fd, epsilon = 1e-8);
        }
    }
}
