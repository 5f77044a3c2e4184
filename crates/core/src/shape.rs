//! # Shapes - The Structure of Values
//!
//! Combinators that pick between alternatives (Switch, Mixture) or replicate
//! across a leading dimension (Batch, Scan) only compose when the pieces
//! agree structurally. A [`Shape`] is that structure: the composition is
//! only defined when shapes match, so a mismatch is reported as an error
//! rather than silently truncated.
//!
//! ## Design Choices
//!
//! Shapes are checked at runtime from the values that actually flow, which
//! keeps dynamic models (closures over [`crate::Value`]) expressible.

use std::fmt;

/// A type identifier for scalar leaves.
///
/// Examples: "real", "int", "bool"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub &'static str);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The structure of a [`crate::Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// The unit value.
    Unit,
    /// A scalar of the given type.
    Scalar(TypeId),
    /// A heterogeneous product.
    Tuple(Vec<Shape>),
    /// An array with a leading extent and an element shape.
    Array(usize, Box<Shape>),
}

impl Shape {
    /// Convenience: real scalar.
    pub fn real() -> Self {
        Shape::Scalar(TypeId("real"))
    }

    /// Convenience: array of reals.
    pub fn real_vector(len: usize) -> Self {
        Shape::Array(len, Box::new(Shape::real()))
    }

    /// Number of array dimensions along the leading-array spine.
    pub fn rank(&self) -> usize {
        match self {
            Shape::Array(_, elem) => 1 + elem.rank(),
            _ => 0,
        }
    }

    /// Leading extent, if this is an array shape.
    pub fn leading_extent(&self) -> Option<usize> {
        match self {
            Shape::Array(n, _) => Some(*n),
            _ => None,
        }
    }

    /// Check if two values of these shapes can stand in for each other.
    pub fn is_compatible(&self, other: &Shape) -> bool {
        self == other
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Unit => write!(f, "()"),
            Shape::Scalar(ty) => write!(f, "{ty}[]"),
            Shape::Tuple(items) => write!(
                f,
                "({})",
                items
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Shape::Array(..) => {
                let mut dims = Vec::new();
                let mut cur = self;
                while let Shape::Array(n, elem) = cur {
                    dims.push(n.to_string());
                    cur = elem;
                }
                match cur {
                    Shape::Scalar(ty) => write!(f, "{}[{}]", ty, dims.join(", ")),
                    other => write!(f, "{}[{}]", other, dims.join(", ")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::real();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.to_string(), "real[]");
    }

    #[test]
    fn test_vector_shape() {
        let v = Shape::real_vector(10);
        assert_eq!(v.rank(), 1);
        assert_eq!(v.leading_extent(), Some(10));
        assert_eq!(v.to_string(), "real[10]");
    }

    #[test]
    fn test_matrix_shape() {
        let m = Shape::Array(3, Box::new(Shape::real_vector(4)));
        assert_eq!(m.rank(), 2);
        assert_eq!(m.to_string(), "real[3, 4]");
    }

    #[test]
    fn test_shape_compatibility() {
        let a = Shape::real_vector(10);
        let b = Shape::real_vector(10);
        let c = Shape::real_vector(20);

        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&c));
    }
}
