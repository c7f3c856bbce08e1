//! Squashing functions used by LSTM nodes and output terminals.
//!
//! Every gate in an [`LstmNode`](crate::LstmNode) is a logistic sigmoid of its
//! weighted input sum; the cell input is the same curve stretched onto `(-2, 2)`.
//! Both propagate NaN and map the infinities onto their asymptotes so a runaway
//! weight vector degrades into saturated gates instead of poisoning the CEC.

/// Logistic sigmoid: `f(x) = 1 / (1 + e^(-x))`.
#[inline]
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return 1.0;
    }
    if x == f64::NEG_INFINITY {
        return 0.0;
    }
    // exp(710) overflows f64; the result is already 0/1 to machine precision long before.
    let clamped = x.clamp(-709.0, 709.0);
    1.0 / (1.0 + (-clamped).exp())
}

/// Cell input squash: `g(x) = 4·sigmoid(x) − 2`, onto the open range `(-2, 2)`.
#[inline]
#[must_use]
pub fn squash_input(x: f64) -> f64 {
    4.0f64.mul_add(sigmoid(x), -2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(10.0) > 0.9999);
        assert!(sigmoid(-10.0) < 0.0001);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_extremes() {
        assert_eq!(sigmoid(f64::INFINITY), 1.0);
        assert_eq!(sigmoid(f64::NEG_INFINITY), 0.0);
        assert!(sigmoid(f64::NAN).is_nan());
        assert!(sigmoid(1e6).is_finite());
        assert!(sigmoid(-1e6).is_finite());
    }

    #[test]
    fn test_squash_input_range() {
        assert!(squash_input(0.0).abs() < 1e-12);
        assert!(squash_input(50.0) <= 2.0);
        assert!(squash_input(-50.0) >= -2.0);
        assert!((squash_input(5.0) - (4.0 / (1.0 + (-5.0f64).exp()) - 2.0)).abs() < 1e-12);
    }
}
