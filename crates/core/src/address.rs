//! # Addresses - Naming Random Choices
//!
//! Every random choice made by a generative function lives at an
//! [`Address`]: a path of [`Segment`]s, each either a symbolic key (`"x"`)
//! or an integer index (`3`). The path `("xs", 3, "x")` names the `x`
//! choice of the fourth replicate of the `xs` sub-computation.
//!
//! Addresses are totally ordered, segment by segment, so iteration over
//! choice maps is deterministic.
//!
//! ```rust
//! use genfn_core::{addr, Address, Segment};
//!
//! let a = addr!["xs", 3, "x"];
//! assert_eq!(a.len(), 3);
//! assert_eq!(a.first(), Some(&Segment::from("xs")));
//! assert!(addr!["xs", 2] < addr!["xs", 3]);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of an address path.
///
/// Keys order before indices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// A static, symbolic key.
    Key(String),
    /// A non-negative integer index.
    Index(usize),
}

impl Segment {
    /// The key name, if this is a key segment.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(k) => Some(k),
            Segment::Index(_) => None,
        }
    }

    /// The index, if this is an index segment.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{k:?}"),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(k: &str) -> Self {
        Segment::Key(k.to_string())
    }
}

impl From<String> for Segment {
    fn from(k: String) -> Self {
        Segment::Key(k)
    }
}

impl From<&String> for Segment {
    fn from(k: &String) -> Self {
        Segment::Key(k.clone())
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Index(i)
    }
}

impl From<&Segment> for Segment {
    fn from(seg: &Segment) -> Self {
        seg.clone()
    }
}

/// Integer literals default to `i32`; this lets `addr!["xs", 3]` work.
///
/// # Panics
///
/// Panics on a negative index, like slice indexing does.
impl From<i32> for Segment {
    fn from(i: i32) -> Self {
        assert!(i >= 0, "address index must be non-negative, got {i}");
        Segment::Index(i as usize)
    }
}

/// A path of segments identifying a random choice.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(Vec<Segment>);

impl Address {
    /// The empty (root) address.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build an address from segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// The segments of this address.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if this is the root address.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment.
    pub fn first(&self) -> Option<&Segment> {
        self.0.first()
    }

    /// Split into the first segment and the remaining path.
    pub fn split_first(&self) -> Option<(&Segment, &[Segment])> {
        self.0.split_first()
    }

    /// Append a segment, returning the extended address.
    pub fn push(mut self, seg: impl Into<Segment>) -> Self {
        self.0.push(seg.into());
        self
    }

    /// Prepend a segment, returning the extended address.
    pub fn prepend(mut self, seg: impl Into<Segment>) -> Self {
        self.0.insert(0, seg.into());
        self
    }

    /// Concatenate two addresses.
    pub fn join(mut self, other: &Address) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    /// Check if `prefix` is a prefix of this address.
    pub fn starts_with(&self, prefix: &Address) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{seg}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<Segment>> for Address {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl From<&[Segment]> for Address {
    fn from(segments: &[Segment]) -> Self {
        Self(segments.to_vec())
    }
}

impl From<Segment> for Address {
    fn from(seg: Segment) -> Self {
        Self(vec![seg])
    }
}

impl From<&str> for Address {
    fn from(k: &str) -> Self {
        Self(vec![Segment::from(k)])
    }
}

impl From<usize> for Address {
    fn from(i: usize) -> Self {
        Self(vec![Segment::Index(i)])
    }
}

impl<'a> IntoIterator for &'a Address {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build an [`Address`] from segments.
///
/// ```rust
/// use genfn_core::{addr, Segment};
///
/// let a = addr!["steps", 7, "z"];
/// assert_eq!(a.segments()[1], Segment::Index(7));
/// assert!(addr![].is_empty());
/// ```
#[macro_export]
macro_rules! addr {
    () => {
        $crate::Address::root()
    };
    ($($seg:expr),+ $(,)?) => {
        $crate::Address::new(vec![$($crate::Segment::from($seg)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_order() {
        assert!(Segment::from("z") < Segment::from(0usize));
        assert!(Segment::from(2usize) < Segment::from(10usize));
        assert!(Segment::from("a") < Segment::from("b"));
    }

    #[test]
    fn test_address_lexicographic_order() {
        let mut addrs = vec![addr!["x", 1], addr!["x"], addr!["a", 5], addr!["x", 0]];
        addrs.sort();
        assert_eq!(
            addrs,
            vec![addr!["a", 5], addr!["x"], addr!["x", 0], addr!["x", 1]]
        );
    }

    #[test]
    fn test_address_building() {
        let a = Address::root().push("xs").push(3usize).push("x");
        assert_eq!(a, addr!["xs", 3, "x"]);
        assert_eq!(a.clone().prepend("outer").len(), 4);
        assert!(a.starts_with(&addr!["xs"]));
        assert_eq!(addr!["a"].join(&addr!["b", 1]), addr!["a", "b", 1]);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(addr!["xs", 3, "x"].to_string(), "(\"xs\", 3, \"x\")");
        assert_eq!(Address::root().to_string(), "()");
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_negative_index_panics() {
        let _ = Segment::from(-1);
    }
}
