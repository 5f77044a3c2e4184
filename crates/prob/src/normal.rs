//! Univariate Gaussian (Normal) distribution.
//!
//! `Normal` takes `[mean, std_dev]` and produces a real.
//!
//! # Example
//!
//! ```rust
//! use genfn_core::{Key, Value};
//! use genfn_prob::{Distribution, Normal};
//!
//! let args = [Value::Real(0.0), Value::Real(1.0)];
//! let x = Normal.sample(Key::new(0), &args).unwrap();
//! assert!(Normal.logpdf(&x, &args).unwrap().is_finite());
//! ```

use std::f64::consts::PI;

use genfn_core::{Key, Value};
use rand_distr::Distribution as _;

use crate::distribution::{expect_arity, Distribution};
use crate::error::ProbError;

/// N(μ, σ²) with parameters supplied per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normal;

/// Log probability density of N(mean, std_dev²) at x.
///
/// log pdf(x) = -0.5 * log(2πσ²) - (x-μ)²/(2σ²)
pub fn normal_logpdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    let z = (x - mean) / std_dev;
    -0.5 * (2.0 * PI).ln() - std_dev.ln() - 0.5 * z * z
}

fn params(args: &[Value]) -> Result<(f64, f64), ProbError> {
    let args = expect_arity("normal", args, 2)?;
    let mean = args[0].as_real()?;
    let std_dev = args[1].as_real()?;
    if !(std_dev > 0.0 && std_dev.is_finite()) {
        return Err(ProbError::invalid(
            "std_dev",
            format!("standard deviation must be positive and finite, got {std_dev}"),
        ));
    }
    Ok((mean, std_dev))
}

impl Distribution for Normal {
    fn name(&self) -> &'static str {
        "normal"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let (mean, std_dev) = params(args)?;
        let normal = rand_distr::Normal::new(mean, std_dev)
            .map_err(|e| ProbError::invalid("std_dev", e.to_string()))?;
        Ok(Value::Real(normal.sample(&mut key.rng())))
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let (mean, std_dev) = params(args)?;
        Ok(normal_logpdf(value.as_real()?, mean, std_dev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn args(mean: f64, std_dev: f64) -> [Value; 2] {
        [Value::Real(mean), Value::Real(std_dev)]
    }

    #[test]
    fn test_standard_normal_density() {
        let lp = Normal.logpdf(&Value::Real(0.0), &args(0.0, 1.0)).unwrap();
        assert_abs_diff_eq!(lp, -0.5 * (2.0 * PI).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_shifted_density() {
        // N(4; 1, 1): z = 3
        let lp = Normal.logpdf(&Value::Real(4.0), &args(1.0, 1.0)).unwrap();
        assert_abs_diff_eq!(lp, -0.5 * (2.0 * PI).ln() - 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_integer_value_widened() {
        let a = Normal.logpdf(&Value::Int(2), &args(0.0, 2.0)).unwrap();
        let b = Normal.logpdf(&Value::Real(2.0), &args(0.0, 2.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_std_dev() {
        let err = Normal.logpdf(&Value::Real(0.0), &args(0.0, -1.0)).unwrap_err();
        assert!(matches!(err, ProbError::InvalidParameter { .. }));
        assert!(Normal.sample(Key::new(0), &args(0.0, 0.0)).is_err());
    }

    #[test]
    fn test_arity() {
        let err = Normal.sample(Key::new(0), &[Value::Real(0.0)]).unwrap_err();
        assert_eq!(
            err,
            ProbError::ArityMismatch {
                distribution: "normal",
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_sample_moments() {
        let n = 20_000;
        let xs: Vec<f64> = Key::new(1)
            .split(n)
            .into_iter()
            .map(|k| Normal.sample(k, &args(3.0, 2.0)).unwrap().as_real().unwrap())
            .collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert_abs_diff_eq!(mean, 3.0, epsilon = 0.1);
        assert_abs_diff_eq!(var, 4.0, epsilon = 0.3);
    }
}
