//! # Distribution Capabilities
//!
//! Generative functions consume distributions through one of two
//! capabilities:
//!
//! - [`Distribution`]: exact. Draws a value and evaluates its log density.
//! - [`EstimatorDistribution`]: estimator-based. Draws a value together with
//!   an unbiased estimate of the reciprocal density, and estimates the log
//!   density of a given value.
//!
//! Both take their parameters as positional [`Value`] arguments, so one
//! stateless distribution object serves every call site.

use std::fmt::Debug;

use genfn_core::{Key, Value};

use crate::error::ProbError;

/// Exact sampler and density.
pub trait Distribution: Send + Sync + Debug {
    /// Short name, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Draw a value.
    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError>;

    /// Log density of `value`. Values outside the support give `-inf`.
    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError>;
}

/// Estimated sampler and density.
///
/// `random_weighted` returns `(w, v)` where `exp(w)` is an unbiased estimate
/// of `1 / p(v)`. `estimate_logpdf` returns `w` where `exp(w)` is an
/// unbiased estimate of `p(v)`.
pub trait EstimatorDistribution: Send + Sync + Debug {
    /// Short name, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Draw a value with a log reciprocal density estimate.
    fn random_weighted(&self, key: Key, args: &[Value]) -> Result<(f64, Value), ProbError>;

    /// Estimate the log density of `value`.
    fn estimate_logpdf(&self, key: Key, value: &Value, args: &[Value]) -> Result<f64, ProbError>;
}

/// Check the argument count of a distribution call.
pub fn expect_arity<'a>(
    distribution: &'static str,
    args: &'a [Value],
    expected: usize,
) -> Result<&'a [Value], ProbError> {
    if args.len() == expected {
        Ok(args)
    } else {
        Err(ProbError::ArityMismatch {
            distribution,
            expected,
            got: args.len(),
        })
    }
}
