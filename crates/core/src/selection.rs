//! # Selections - Predicates over Addresses
//!
//! A [`Selection`] answers "is this address selected?". Selections are
//! closed under conjunction (`&`), disjunction (`|`) and complement (`!`),
//! and are consumed by [`crate::ChoiceMap::filter`] and
//! [`crate::ChoiceMap::restrict`].
//!
//! Matching works one segment at a time: [`Selection::step`] returns the
//! residual selection that applies below a segment, and
//! [`Selection::selects_here`] says whether the current location itself is
//! selected. A path selection `at(("x",))` selects `x` and everything under
//! it.
//!
//! ```rust
//! use genfn_core::{addr, Selection};
//!
//! let s = Selection::at(addr!["x"]) | Selection::at(addr!["ys", 2]);
//! assert!(s.contains(&addr!["x"]));
//! assert!(s.contains(&addr!["ys", 2, "z"]));
//! assert!(!s.contains(&addr!["ys", 1]));
//! assert!((!s).contains(&addr!["ys", 1]));
//! ```

use std::ops::{BitAnd, BitOr, Not};

use crate::address::{Address, Segment};

/// A boolean predicate over addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Selects every address.
    All,
    /// Selects no address.
    None,
    /// Selects addresses whose first segment equals the key, with the
    /// residual selection applied below it.
    Path(Segment, Box<Selection>),
    /// Selects addresses whose first segment is any integer index.
    AnyIndex(Box<Selection>),
    /// Both selections.
    And(Box<Selection>, Box<Selection>),
    /// Either selection.
    Or(Box<Selection>, Box<Selection>),
    /// The complement.
    Complement(Box<Selection>),
}

impl Selection {
    /// Select everything.
    pub fn all() -> Self {
        Selection::All
    }

    /// Select nothing.
    pub fn none() -> Self {
        Selection::None
    }

    /// Select an address and everything below it.
    pub fn at(addr: impl Into<Address>) -> Self {
        let addr = addr.into();
        addr.segments()
            .iter()
            .rev()
            .fold(Selection::All, |inner, seg| {
                Selection::Path(seg.clone(), Box::new(inner))
            })
    }

    /// Select every integer index at the current level, with `inner` below.
    pub fn any_index(inner: Selection) -> Self {
        Selection::AnyIndex(Box::new(inner))
    }

    /// Select any of the given addresses.
    pub fn any_of<I, A>(addrs: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Address>,
    {
        addrs
            .into_iter()
            .fold(Selection::None, |acc, a| acc | Selection::at(a))
    }

    /// Conjunction.
    pub fn and(self, other: Selection) -> Self {
        match (self, other) {
            (Selection::None, _) | (_, Selection::None) => Selection::None,
            (Selection::All, s) | (s, Selection::All) => s,
            (a, b) => Selection::And(Box::new(a), Box::new(b)),
        }
    }

    /// Disjunction.
    pub fn or(self, other: Selection) -> Self {
        match (self, other) {
            (Selection::All, _) | (_, Selection::All) => Selection::All,
            (Selection::None, s) | (s, Selection::None) => s,
            (a, b) => Selection::Or(Box::new(a), Box::new(b)),
        }
    }

    /// Complement.
    pub fn complement(self) -> Self {
        match self {
            Selection::All => Selection::None,
            Selection::None => Selection::All,
            Selection::Complement(inner) => *inner,
            s => Selection::Complement(Box::new(s)),
        }
    }

    /// The residual selection below `seg`.
    pub fn step(&self, seg: &Segment) -> Selection {
        match self {
            Selection::All => Selection::All,
            Selection::None => Selection::None,
            Selection::Path(head, rest) => {
                if head == seg {
                    (**rest).clone()
                } else {
                    Selection::None
                }
            }
            Selection::AnyIndex(rest) => match seg {
                Segment::Index(_) => (**rest).clone(),
                Segment::Key(_) => Selection::None,
            },
            Selection::And(a, b) => a.step(seg).and(b.step(seg)),
            Selection::Or(a, b) => a.step(seg).or(b.step(seg)),
            Selection::Complement(inner) => inner.step(seg).complement(),
        }
    }

    /// Whether the current location (the empty remaining path) is selected.
    pub fn selects_here(&self) -> bool {
        match self {
            Selection::All => true,
            Selection::None | Selection::Path(..) | Selection::AnyIndex(_) => false,
            Selection::And(a, b) => a.selects_here() && b.selects_here(),
            Selection::Or(a, b) => a.selects_here() || b.selects_here(),
            Selection::Complement(inner) => !inner.selects_here(),
        }
    }

    /// Check if an address is selected.
    pub fn contains(&self, addr: &Address) -> bool {
        let mut sel = self.clone();
        for seg in addr {
            sel = sel.step(seg);
            match sel {
                Selection::All => return true,
                Selection::None => return false,
                _ => {}
            }
        }
        sel.selects_here()
    }
}

impl BitAnd for Selection {
    type Output = Selection;

    fn bitand(self, rhs: Selection) -> Selection {
        self.and(rhs)
    }
}

impl BitOr for Selection {
    type Output = Selection;

    fn bitor(self, rhs: Selection) -> Selection {
        self.or(rhs)
    }
}

impl Not for Selection {
    type Output = Selection;

    fn not(self) -> Selection {
        self.complement()
    }
}

impl From<Address> for Selection {
    fn from(addr: Address) -> Self {
        Selection::at(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr;

    #[test]
    fn test_all_none() {
        assert!(Selection::all().contains(&addr!["anything", 3]));
        assert!(!Selection::none().contains(&addr!["anything"]));
        assert!(Selection::all().contains(&Address::root()));
    }

    #[test]
    fn test_path_selects_subtree() {
        let s = Selection::at(addr!["x", "y"]);
        assert!(s.contains(&addr!["x", "y"]));
        assert!(s.contains(&addr!["x", "y", 0]));
        assert!(!s.contains(&addr!["x"]));
        assert!(!s.contains(&addr!["x", "z"]));
    }

    #[test]
    fn test_boolean_algebra() {
        let x = Selection::at(addr!["x"]);
        let y = Selection::at(addr!["y"]);
        let both = x.clone() & y.clone();
        let either = x.clone() | y.clone();

        assert!(!both.contains(&addr!["x"]));
        assert!(either.contains(&addr!["x"]));
        assert!(either.contains(&addr!["y"]));
        assert!(!either.contains(&addr!["z"]));
        assert!((!x.clone()).contains(&addr!["z"]));
        assert!(!(!x.clone()).contains(&addr!["x", 1]));
        assert_eq!(!!x.clone(), x);
    }

    #[test]
    fn test_any_index() {
        let s = Selection::at(addr!["steps"]).and(Selection::all());
        assert!(s.contains(&addr!["steps", 4]));

        let every_z = Selection::any_index(Selection::at(addr!["z"]));
        assert!(every_z.contains(&addr![0, "z"]));
        assert!(every_z.contains(&addr![9, "z"]));
        assert!(!every_z.contains(&addr![9, "w"]));
        assert!(!every_z.contains(&addr!["k", "z"]));
    }

    #[test]
    fn test_any_of() {
        let s = Selection::any_of([addr!["a"], addr!["b", 1]]);
        assert!(s.contains(&addr!["a"]));
        assert!(s.contains(&addr!["b", 1]));
        assert!(!s.contains(&addr!["b", 0]));
    }
}
