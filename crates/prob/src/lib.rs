//! # Prob - Distributions as Capabilities
//!
//! Generative functions never sample from an ambient generator. They call a
//! distribution through one of two capabilities, passing an explicit
//! [`genfn_core::Key`]:
//!
//! - **Exact** ([`Distribution`]): `sample` and `logpdf`
//! - **Estimator** ([`EstimatorDistribution`]): `random_weighted` and
//!   `estimate_logpdf`, for densities that are only available through
//!   unbiased estimates
//!
//! ## Core Concepts
//!
//! - **Support violations are scores, not errors**: a value outside the
//!   support has log density `-inf`
//! - **Parameters are arguments**: distributions are stateless and take their
//!   parameters as positional values, so one object serves every call site
//! - **Mixtures marginalize**: [`MixtureDistribution`] scores with a
//!   log-sum-exp over components
//!
//! ## Example
//!
//! ```rust
//! use genfn_core::{Key, Value};
//! use genfn_prob::{Distribution, Flip};
//!
//! let coin = [Value::Real(0.5)];
//! let heads = Flip.sample(Key::new(0), &coin).unwrap();
//! let lp = Flip.logpdf(&heads, &coin).unwrap();
//! assert!((lp - 0.5f64.ln()).abs() < 1e-12);
//! ```

mod continuous;
mod discrete;
mod distribution;
mod error;
pub mod math;
mod mixture;
mod normal;

pub use continuous::{Beta, Exponential, Uniform};
pub use discrete::{Bernoulli, Categorical, Flip};
pub use distribution::{expect_arity, Distribution, EstimatorDistribution};
pub use error::ProbError;
pub use math::{log_softmax, logsumexp};
pub use mixture::MixtureDistribution;
pub use normal::{normal_logpdf, Normal};

/// Tolerance for comparing log probabilities.
pub const LOG_PROB_TOLERANCE: f64 = 1e-9;
