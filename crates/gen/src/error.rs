//! Error types for generative function operations.
//!
//! Structural errors are fatal at the detecting call. Zero-probability
//! outcomes are not errors: they show up as `f64::NEG_INFINITY` scores and
//! weights.

use genfn_core::{Address, CoreError, Segment};
use genfn_prob::ProbError;
use thiserror::Error;

/// Errors raised by the generative function interface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenError {
    /// Choice-map or value error (missing or conflicting address, wrong kind).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Distribution error (bad parameters, arity).
    #[error(transparent)]
    Prob(#[from] ProbError),

    /// The pieces of a composition do not fit together.
    #[error("Structural mismatch: {reason}")]
    StructuralMismatch { reason: String },

    /// A generative function was called with the wrong number of arguments.
    #[error("{gen_fn} expects {expected} arguments, got {got}")]
    ArityMismatch {
        gen_fn: String,
        expected: usize,
        got: usize,
    },

    /// A trace was updated without a recorded generative function.
    #[error("Trace has no generative function to dispatch to")]
    MissingTrace,
}

impl GenError {
    /// A structural mismatch with the given reason.
    pub fn structural(reason: impl Into<String>) -> Self {
        GenError::StructuralMismatch {
            reason: reason.into(),
        }
    }

    /// A missing-address error at `address`.
    pub fn missing(address: Address) -> Self {
        GenError::Core(CoreError::MissingAddress { address })
    }

    /// Check the argument count of a call.
    pub fn check_arity(gen_fn: &str, got: usize, expected: usize) -> Result<(), GenError> {
        if got == expected {
            Ok(())
        } else {
            Err(GenError::ArityMismatch {
                gen_fn: gen_fn.to_string(),
                expected,
                got,
            })
        }
    }

    /// Prefix any address carried by this error with `seg`.
    pub fn within(self, seg: impl Into<Segment>) -> Self {
        match self {
            GenError::Core(e) => GenError::Core(e.within(seg)),
            GenError::Prob(ProbError::Core(e)) => GenError::Prob(ProbError::Core(e.within(seg))),
            other => other,
        }
    }

    /// Prefix any address carried by this error with every segment of
    /// `addr`.
    pub fn within_address(self, addr: &Address) -> Self {
        addr.segments()
            .iter()
            .rev()
            .fold(self, |e, seg| e.within(seg))
    }

    /// The address named by a missing-address error.
    pub fn missing_address(&self) -> Option<&Address> {
        match self {
            GenError::Core(CoreError::MissingAddress { address }) => Some(address),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfn_core::addr;

    #[test]
    fn test_within_address_builds_full_path() {
        let err = GenError::missing(addr!["x"]).within_address(&addr!["steps", 7]);
        assert_eq!(err.missing_address(), Some(&addr!["steps", 7, "x"]));
    }

    #[test]
    fn test_check_arity() {
        assert!(GenError::check_arity("switch", 3, 3).is_ok());
        let err = GenError::check_arity("switch", 2, 3).unwrap_err();
        assert_eq!(err.to_string(), "switch expects 3 arguments, got 2");
    }

    #[test]
    fn test_prob_errors_convert() {
        let err: GenError = ProbError::InvalidParameter {
            name: "p".into(),
            reason: "out of range".into(),
        }
        .into();
        assert!(matches!(err, GenError::Prob(_)));
        assert_eq!(err.clone().within("x"), err);
    }
}
