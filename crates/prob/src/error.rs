//! Error types for distribution operations.
//!
//! A value outside a distribution's support is not an error: its log density
//! is `f64::NEG_INFINITY`. Errors are reserved for calls that cannot be
//! evaluated at all.

use genfn_core::CoreError;
use thiserror::Error;

/// Errors that can occur when sampling or scoring a distribution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbError {
    /// A parameter is outside its valid range.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Wrong number of arguments.
    #[error("{distribution} expects {expected} arguments, got {got}")]
    ArityMismatch {
        distribution: &'static str,
        expected: usize,
        got: usize,
    },

    /// An argument or value has the wrong kind.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An estimator could not produce an estimate.
    #[error("Estimator {distribution} failed: {reason}")]
    EstimatorFailed {
        distribution: &'static str,
        reason: String,
    },
}

impl ProbError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ProbError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
