//! # Error Types
//!
//! Structural errors in the choice-map layer are first-class: they mean two
//! pieces of data cannot be combined, not that a computation produced an
//! unlikely result. Zero-probability outcomes are never errors; they flow
//! through score arithmetic as `f64::NEG_INFINITY`.

use thiserror::Error;

use crate::address::Address;

/// Core errors for addresses, values and choice maps.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A required address has no valid leaf.
    #[error("Missing address: {address}")]
    MissingAddress { address: Address },

    /// The same leaf address appears in both operands of a disjoint union.
    #[error("Conflicting address: {address}")]
    ConflictingAddress { address: Address },

    /// A value does not have the kind an operation expects.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: String },

    /// An indexed access fell outside an array or tuple.
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl CoreError {
    /// Prefix the address carried by this error with `seg`.
    ///
    /// Used when an error crosses a namespace boundary so that the reported
    /// address is the full path from the outermost caller.
    pub fn within(self, seg: impl Into<crate::address::Segment>) -> Self {
        match self {
            CoreError::MissingAddress { address } => CoreError::MissingAddress {
                address: address.prepend(seg.into()),
            },
            CoreError::ConflictingAddress { address } => CoreError::ConflictingAddress {
                address: address.prepend(seg.into()),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr;

    #[test]
    fn test_within_prefixes_address() {
        let err = CoreError::MissingAddress { address: addr!["x"] }.within(3usize);
        assert_eq!(
            err,
            CoreError::MissingAddress {
                address: addr![3usize, "x"]
            }
        );
        assert_eq!(err.to_string(), "Missing address: (3, \"x\")");
    }

    #[test]
    fn test_within_leaves_other_errors() {
        let err = CoreError::IndexOutOfBounds { index: 4, len: 2 }.within("x");
        assert!(matches!(err, CoreError::IndexOutOfBounds { index: 4, len: 2 }));
    }
}
