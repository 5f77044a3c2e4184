//! Continuous distributions on bounded or half-bounded supports.

use genfn_core::{Key, Value};
use rand_distr::Distribution as _;

use crate::distribution::{expect_arity, Distribution};
use crate::error::ProbError;
use crate::math::ln_beta;

/// Uniform on `[low, high]`, parameters `[low, high]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

fn bounds(args: &[Value]) -> Result<(f64, f64), ProbError> {
    let args = expect_arity("uniform", args, 2)?;
    let (low, high) = (args[0].as_real()?, args[1].as_real()?);
    if !(low < high && (high - low).is_finite()) {
        return Err(ProbError::invalid(
            "bounds",
            format!("need finite low < high, got [{low}, {high}]"),
        ));
    }
    Ok((low, high))
}

impl Distribution for Uniform {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let (low, high) = bounds(args)?;
        let uniform = rand::distributions::Uniform::new(low, high);
        Ok(Value::Real(uniform.sample(&mut key.rng())))
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let (low, high) = bounds(args)?;
        let x = value.as_real()?;
        Ok(if (low..=high).contains(&x) {
            -(high - low).ln()
        } else {
            f64::NEG_INFINITY
        })
    }
}

/// Beta on `(0, 1)`, parameters `[alpha, beta]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Beta;

fn shape_params(args: &[Value]) -> Result<(f64, f64), ProbError> {
    let args = expect_arity("beta", args, 2)?;
    let (a, b) = (args[0].as_real()?, args[1].as_real()?);
    for (name, v) in [("alpha", a), ("beta", b)] {
        if !(v > 0.0 && v.is_finite()) {
            return Err(ProbError::invalid(name, format!("must be positive, got {v}")));
        }
    }
    Ok((a, b))
}

impl Distribution for Beta {
    fn name(&self) -> &'static str {
        "beta"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let (a, b) = shape_params(args)?;
        let beta = rand_distr::Beta::new(a, b).map_err(|e| ProbError::invalid("beta", e.to_string()))?;
        Ok(Value::Real(beta.sample(&mut key.rng())))
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let (a, b) = shape_params(args)?;
        let x = value.as_real()?;
        if !(x > 0.0 && x < 1.0) {
            return Ok(f64::NEG_INFINITY);
        }
        Ok((a - 1.0) * x.ln() + (b - 1.0) * (-x).ln_1p() - ln_beta(a, b))
    }
}

/// Exponential on `[0, inf)`, parameter `[rate]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exponential;

fn rate(args: &[Value]) -> Result<f64, ProbError> {
    let args = expect_arity("exponential", args, 1)?;
    let rate = args[0].as_real()?;
    if !(rate > 0.0 && rate.is_finite()) {
        return Err(ProbError::invalid("rate", format!("must be positive, got {rate}")));
    }
    Ok(rate)
}

impl Distribution for Exponential {
    fn name(&self) -> &'static str {
        "exponential"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let rate = rate(args)?;
        let exp = rand_distr::Exp::new(rate).map_err(|e| ProbError::invalid("rate", e.to_string()))?;
        Ok(Value::Real(exp.sample(&mut key.rng())))
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let rate = rate(args)?;
        let x = value.as_real()?;
        Ok(if x < 0.0 {
            f64::NEG_INFINITY
        } else {
            rate.ln() - rate * x
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_uniform_density() {
        let args = [Value::Real(-1.0), Value::Real(3.0)];
        assert_abs_diff_eq!(Uniform.logpdf(&Value::Real(0.0), &args).unwrap(), -(4f64.ln()));
        assert_eq!(
            Uniform.logpdf(&Value::Real(3.5), &args).unwrap(),
            f64::NEG_INFINITY
        );
        let x = Uniform.sample(Key::new(2), &args).unwrap().as_real().unwrap();
        assert!((-1.0..3.0).contains(&x));
    }

    #[test]
    fn test_uniform_rejects_empty_interval() {
        let args = [Value::Real(1.0), Value::Real(1.0)];
        assert!(Uniform.sample(Key::new(0), &args).is_err());
    }

    #[test]
    fn test_beta_density() {
        // Beta(2, 2) has density 6x(1-x)
        let args = [Value::Real(2.0), Value::Real(2.0)];
        let lp = Beta.logpdf(&Value::Real(0.25), &args).unwrap();
        assert_abs_diff_eq!(lp, (6.0f64 * 0.25 * 0.75).ln(), epsilon = 1e-9);
        assert_eq!(Beta.logpdf(&Value::Real(1.2), &args).unwrap(), f64::NEG_INFINITY);
        let x = Beta.sample(Key::new(4), &args).unwrap().as_real().unwrap();
        assert!(x > 0.0 && x < 1.0);
    }

    #[test]
    fn test_exponential_density() {
        let args = [Value::Real(2.0)];
        assert_abs_diff_eq!(
            Exponential.logpdf(&Value::Real(0.5), &args).unwrap(),
            2f64.ln() - 1.0,
            epsilon = 1e-12
        );
        assert_eq!(
            Exponential.logpdf(&Value::Real(-0.1), &args).unwrap(),
            f64::NEG_INFINITY
        );
        assert!(Exponential.sample(Key::new(0), &[Value::Real(0.0)]).is_err());
    }
}
