//! Distributions over finite sets.
//!
//! - [`Categorical`]: `[logits]` over `{0, 1, ..., n-1}`, an `Int`
//! - [`Flip`]: `[p]`, a `Bool` that is `true` with probability `p`
//! - [`Bernoulli`]: `[logit]`, a `Bool` parameterized in log-odds
//!
//! Logits need not be normalized.

use genfn_core::{Key, Value};
use rand::Rng;

use crate::distribution::{expect_arity, Distribution};
use crate::error::ProbError;
use crate::math::{inverse_transform, log_softmax, softmax, softplus};

/// Categorical distribution over indices, parameterized by logits.
///
/// # Example
///
/// ```rust
/// use genfn_core::{Key, Value};
/// use genfn_prob::{Categorical, Distribution};
///
/// let logits = [Value::reals([0.0, 0.0, 0.0, 0.0])];
/// let lp = Categorical.logpdf(&Value::Int(2), &logits).unwrap();
/// assert!((lp - 0.25f64.ln()).abs() < 1e-12);
///
/// // Outside the support
/// let lp = Categorical.logpdf(&Value::Int(4), &logits).unwrap();
/// assert_eq!(lp, f64::NEG_INFINITY);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Categorical;

fn logits(args: &[Value]) -> Result<Vec<f64>, ProbError> {
    let args = expect_arity("categorical", args, 1)?;
    let logits = args[0].as_reals()?;
    if logits.is_empty() {
        return Err(ProbError::invalid("logits", "distribution cannot be empty"));
    }
    if logits.iter().any(|l| l.is_nan() || *l == f64::INFINITY) {
        return Err(ProbError::invalid("logits", "logits must be finite or -inf"));
    }
    Ok(logits)
}

impl Distribution for Categorical {
    fn name(&self) -> &'static str {
        "categorical"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let probs = softmax(&logits(args)?);
        let u: f64 = key.rng().gen();
        Ok(Value::from(inverse_transform(&probs, u)))
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let log_probs = log_softmax(&logits(args)?);
        let i = value.as_int()?;
        Ok(usize::try_from(i)
            .ok()
            .and_then(|i| log_probs.get(i).copied())
            .unwrap_or(f64::NEG_INFINITY))
    }
}

/// Coin flip with success probability `p`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flip;

fn probability(args: &[Value]) -> Result<f64, ProbError> {
    let args = expect_arity("flip", args, 1)?;
    let p = args[0].as_real()?;
    if !(0.0..=1.0).contains(&p) {
        return Err(ProbError::invalid(
            "p",
            format!("probability must lie in [0, 1], got {p}"),
        ));
    }
    Ok(p)
}

impl Distribution for Flip {
    fn name(&self) -> &'static str {
        "flip"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let p = probability(args)?;
        Ok(Value::Bool(key.rng().gen_bool(p)))
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let p = probability(args)?;
        Ok(if value.as_bool()? { p.ln() } else { (1.0 - p).ln() })
    }
}

/// Coin flip parameterized by the log-odds of `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bernoulli;

fn logit(args: &[Value]) -> Result<f64, ProbError> {
    let args = expect_arity("bernoulli", args, 1)?;
    let l = args[0].as_real()?;
    if l.is_nan() {
        return Err(ProbError::invalid("logit", "logit is NaN"));
    }
    Ok(l)
}

impl Distribution for Bernoulli {
    fn name(&self) -> &'static str {
        "bernoulli"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let log_p = -softplus(-logit(args)?);
        let u: f64 = key.rng().gen();
        Ok(Value::Bool(u.ln() < log_p))
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let l = logit(args)?;
        Ok(if value.as_bool()? { -softplus(-l) } else { -softplus(l) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_categorical_normalizes_logits() {
        let args = [Value::reals([1f64.ln(), 2f64.ln(), 3f64.ln()])];
        let lp = Categorical.logpdf(&Value::Int(1), &args).unwrap();
        assert_abs_diff_eq!(lp, (2.0f64 / 6.0).ln(), epsilon = 1e-12);
        assert_eq!(
            Categorical.logpdf(&Value::Int(-1), &args).unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_categorical_masked_logit_never_sampled() {
        let args = [Value::reals([0.0, f64::NEG_INFINITY])];
        for k in Key::new(5).split(200) {
            assert_eq!(Categorical.sample(k, &args).unwrap(), Value::Int(0));
        }
    }

    #[test]
    fn test_categorical_rejects_empty() {
        let err = Categorical.sample(Key::new(0), &[Value::array([])]).unwrap_err();
        assert!(matches!(err, ProbError::InvalidParameter { .. }));
    }

    #[test]
    fn test_flip() {
        let args = [Value::Real(0.25)];
        assert_abs_diff_eq!(
            Flip.logpdf(&Value::Bool(true), &args).unwrap(),
            0.25f64.ln()
        );
        assert_abs_diff_eq!(
            Flip.logpdf(&Value::Bool(false), &args).unwrap(),
            0.75f64.ln()
        );
        assert!(Flip.logpdf(&Value::Bool(true), &[Value::Real(1.5)]).is_err());
        assert!(Flip.logpdf(&Value::Int(1), &args).is_err());
    }

    #[test]
    fn test_flip_certain() {
        let args = [Value::Real(1.0)];
        assert_eq!(Flip.sample(Key::new(3), &args).unwrap(), Value::Bool(true));
        assert_eq!(
            Flip.logpdf(&Value::Bool(false), &args).unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_bernoulli_matches_flip() {
        let p: f64 = 0.3;
        let l = (p / (1.0 - p)).ln();
        for v in [true, false] {
            let a = Bernoulli.logpdf(&Value::Bool(v), &[Value::Real(l)]).unwrap();
            let b = Flip.logpdf(&Value::Bool(v), &[Value::Real(p)]).unwrap();
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bernoulli_frequency() {
        let args = [Value::Real(0.0)];
        let n = 10_000;
        let hits = Key::new(9)
            .split(n)
            .into_iter()
            .filter(|k| Bernoulli.sample(*k, &args).unwrap() == Value::Bool(true))
            .count();
        assert_abs_diff_eq!(hits as f64 / n as f64, 0.5, epsilon = 0.03);
    }
}
