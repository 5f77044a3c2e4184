//! # Choice Maps - Random Choices by Address
//!
//! A [`ChoiceMap`] is a strictly-owned tree recording the values of random
//! choices. It is the currency of the generative function interface:
//! traces expose their choices as a choice map, constraints are choice
//! maps, and `update` returns the discarded old values as one.
//!
//! ## Node Kinds
//!
//! - `Empty`: no choices
//! - `Leaf(v)`: one sampled value at the current address
//! - `Branch`: children keyed by static string segments
//! - `Indexed`: children keyed by integer, a sparse array produced by
//!   `Scan` and `Batch`
//! - `Masked`: structurally present but gated by a flag. An invalid
//!   (`flag == false`) subtree never contributes score and reads as absent
//!   under strict lookup ([`ChoiceMap::get`]).
//!
//! ## Combining
//!
//! Two combination operators with distinct, documented semantics:
//!
//! | operator | overlap on a leaf |
//! |---|---|
//! | [`ChoiceMap::merge`] | right operand wins |
//! | [`ChoiceMap::disjoint_union`] | `ConflictingAddress` error |
//!
//! Invalid masked entries never override valid ones and never collide.
//!
//! ## Example
//!
//! ```rust
//! use genfn_core::{addr, ChoiceMap, Value};
//!
//! let mut chm = ChoiceMap::new();
//! chm.insert(&addr!["xs", 3, "x"], 1.5);
//! chm.insert(&addr!["y"], true);
//!
//! assert_eq!(chm.get(&addr!["xs", 3, "x"]), Some(&Value::Real(1.5)));
//! assert_eq!(chm.num_choices(), 2);
//!
//! // Nested: Branch -> Indexed -> Branch -> Leaf
//! assert!(matches!(chm.submap(&"xs".into()), ChoiceMap::Indexed(_)));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{Address, Segment};
use crate::error::CoreError;
use crate::selection::Selection;
use crate::value::Value;

/// A hierarchical map from addresses to recorded values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ChoiceMap {
    /// No choices.
    #[default]
    Empty,
    /// A single value at the current address.
    Leaf(Value),
    /// Children keyed by static segment.
    Branch(BTreeMap<String, ChoiceMap>),
    /// Children keyed by integer index.
    Indexed(BTreeMap<usize, ChoiceMap>),
    /// Choices gated by a validity flag.
    Masked { flag: bool, inner: Box<ChoiceMap> },
}

impl ChoiceMap {
    /// An empty choice map.
    pub fn new() -> Self {
        ChoiceMap::Empty
    }

    /// A single leaf.
    pub fn leaf(v: impl Into<Value>) -> Self {
        ChoiceMap::Leaf(v.into())
    }

    /// Gate `inner` by `flag`. Masking an empty map is still empty.
    pub fn masked(flag: bool, inner: ChoiceMap) -> Self {
        match inner {
            ChoiceMap::Empty => ChoiceMap::Empty,
            inner => ChoiceMap::Masked {
                flag,
                inner: Box::new(inner),
            },
        }
    }

    /// Gate this map by `flag`.
    pub fn mask(self, flag: bool) -> Self {
        ChoiceMap::masked(flag, self)
    }

    /// A branch node, collapsing to `Empty` when there are no children.
    pub fn branch(children: BTreeMap<String, ChoiceMap>) -> Self {
        if children.is_empty() {
            ChoiceMap::Empty
        } else {
            ChoiceMap::Branch(children)
        }
    }

    /// An indexed node, collapsing to `Empty` when there are no entries.
    pub fn indexed(entries: BTreeMap<usize, ChoiceMap>) -> Self {
        if entries.is_empty() {
            ChoiceMap::Empty
        } else {
            ChoiceMap::Indexed(entries)
        }
    }

    /// An indexed node over a dense sequence of submaps; empty ones are
    /// dropped.
    pub fn from_sequence(items: impl IntoIterator<Item = ChoiceMap>) -> Self {
        ChoiceMap::indexed(
            items
                .into_iter()
                .enumerate()
                .filter(|(_, c)| !c.is_empty())
                .collect(),
        )
    }

    /// An indexed node of leaves, one per value.
    pub fn from_slice(values: impl IntoIterator<Item = Value>) -> Self {
        ChoiceMap::from_sequence(values.into_iter().map(ChoiceMap::Leaf))
    }

    /// Build a map from `(address, value)` pairs; later pairs override.
    pub fn from_leaves<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Address, V)>,
        V: Into<Value>,
    {
        let mut chm = ChoiceMap::new();
        for (addr, v) in pairs {
            chm.insert(&addr, v);
        }
        chm
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Set the value at `addr`, replacing whatever was there.
    pub fn insert(&mut self, addr: &Address, v: impl Into<Value>) {
        self.insert_submap(addr, ChoiceMap::Leaf(v.into()));
    }

    /// Set the subtree at `addr`.
    pub fn insert_submap(&mut self, addr: &Address, sub: ChoiceMap) {
        let this = std::mem::take(self);
        *self = this.inserted(addr.segments(), sub);
    }

    /// Builder form of [`ChoiceMap::insert`].
    pub fn with(mut self, addr: impl Into<Address>, v: impl Into<Value>) -> Self {
        self.insert(&addr.into(), v);
        self
    }

    /// Builder form of [`ChoiceMap::insert_submap`].
    pub fn with_submap(mut self, addr: impl Into<Address>, sub: ChoiceMap) -> Self {
        self.insert_submap(&addr.into(), sub);
        self
    }

    /// Set `prefix / i / suffix` to `values[i]` for every `i`.
    ///
    /// This is the slice form of address construction: it expands to an
    /// `Indexed` node at `prefix` over a statically sized array of values.
    pub fn insert_slice(
        &mut self,
        prefix: &Address,
        suffix: &Address,
        values: impl IntoIterator<Item = Value>,
    ) {
        for (i, v) in values.into_iter().enumerate() {
            let addr = prefix.clone().push(i).join(suffix);
            self.insert(&addr, v);
        }
    }

    fn inserted(self, path: &[Segment], sub: ChoiceMap) -> ChoiceMap {
        let Some((seg, rest)) = path.split_first() else {
            return sub;
        };
        match (self, seg) {
            (ChoiceMap::Masked { flag, inner }, _) => ChoiceMap::Masked {
                flag,
                inner: Box::new(inner.inserted(path, sub)),
            },
            (this, Segment::Key(k)) => {
                let mut children = match this {
                    ChoiceMap::Branch(children) => children,
                    _ => BTreeMap::new(),
                };
                let child = children.remove(k).unwrap_or_default();
                children.insert(k.clone(), child.inserted(rest, sub));
                ChoiceMap::Branch(children)
            }
            (this, Segment::Index(i)) => {
                let mut entries = match this {
                    ChoiceMap::Indexed(entries) => entries,
                    _ => BTreeMap::new(),
                };
                let child = entries.remove(i).unwrap_or_default();
                entries.insert(*i, child.inserted(rest, sub));
                ChoiceMap::Indexed(entries)
            }
        }
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Check if the map holds no leaves at all (valid or not).
    pub fn is_empty(&self) -> bool {
        match self {
            ChoiceMap::Empty => true,
            ChoiceMap::Leaf(_) => false,
            ChoiceMap::Branch(children) => children.values().all(ChoiceMap::is_empty),
            ChoiceMap::Indexed(entries) => entries.values().all(ChoiceMap::is_empty),
            ChoiceMap::Masked { inner, .. } => inner.is_empty(),
        }
    }

    /// The valid leaf value at the root, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ChoiceMap::Leaf(v) => Some(v),
            ChoiceMap::Masked { flag: true, inner } => inner.value(),
            _ => None,
        }
    }

    /// Strict lookup: the value at `addr`, or `None` if absent or masked
    /// invalid anywhere along the path.
    pub fn get(&self, addr: &Address) -> Option<&Value> {
        let mut node = self;
        for seg in addr {
            node = node.child(seg)?;
        }
        node.value()
    }

    /// Check if `addr` holds a valid leaf.
    pub fn contains(&self, addr: &Address) -> bool {
        self.get(addr).is_some()
    }

    fn child(&self, seg: &Segment) -> Option<&ChoiceMap> {
        match (self, seg) {
            (ChoiceMap::Branch(children), Segment::Key(k)) => children.get(k),
            (ChoiceMap::Indexed(entries), Segment::Index(i)) => entries.get(i),
            (ChoiceMap::Masked { flag: true, inner }, _) => inner.child(seg),
            _ => None,
        }
    }

    /// The subtree under `seg`, keeping any mask that gates it.
    pub fn submap(&self, seg: &Segment) -> ChoiceMap {
        match (self, seg) {
            (ChoiceMap::Branch(children), Segment::Key(k)) => {
                children.get(k).cloned().unwrap_or_default()
            }
            (ChoiceMap::Indexed(entries), Segment::Index(i)) => {
                entries.get(i).cloned().unwrap_or_default()
            }
            (ChoiceMap::Masked { flag: true, inner }, _) => inner.submap(seg),
            (ChoiceMap::Masked { flag: false, inner }, _) => {
                ChoiceMap::masked(false, inner.submap(seg))
            }
            _ => ChoiceMap::Empty,
        }
    }

    /// The subtree at `addr`, keeping any mask that gates it.
    pub fn get_submap(&self, addr: &Address) -> ChoiceMap {
        match addr.split_first() {
            None => self.clone(),
            Some((seg, rest)) => self.submap(seg).get_submap(&Address::from(rest)),
        }
    }

    /// Strip top-level masks, exposing the structurally present choices
    /// regardless of validity.
    pub fn unmask(&self) -> &ChoiceMap {
        match self {
            ChoiceMap::Masked { inner, .. } => inner.unmask(),
            other => other,
        }
    }

    /// Every valid leaf with its address, in address order.
    pub fn leaves(&self) -> Vec<(Address, &Value)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, path: &mut Vec<Segment>, out: &mut Vec<(Address, &'a Value)>) {
        match self {
            ChoiceMap::Empty | ChoiceMap::Masked { flag: false, .. } => {}
            ChoiceMap::Leaf(v) => out.push((Address::new(path.clone()), v)),
            ChoiceMap::Branch(children) => {
                for (k, child) in children {
                    path.push(Segment::Key(k.clone()));
                    child.collect_leaves(path, out);
                    path.pop();
                }
            }
            ChoiceMap::Indexed(entries) => {
                for (i, child) in entries {
                    path.push(Segment::Index(*i));
                    child.collect_leaves(path, out);
                    path.pop();
                }
            }
            ChoiceMap::Masked { flag: true, inner } => inner.collect_leaves(path, out),
        }
    }

    /// Addresses of every valid leaf, in order.
    pub fn addresses(&self) -> Vec<Address> {
        self.leaves().into_iter().map(|(a, _)| a).collect()
    }

    /// Number of valid leaves.
    pub fn num_choices(&self) -> usize {
        self.leaves().len()
    }

    /// Integer keys of an `Indexed` root, in order.
    pub fn indices(&self) -> Vec<usize> {
        match self.unmask() {
            ChoiceMap::Indexed(entries) => entries.keys().copied().collect(),
            _ => Vec::new(),
        }
    }

    // ========================================================================
    // Combining
    // ========================================================================

    /// Right-biased merge: where both maps hold a leaf, `other` wins;
    /// overlapping branches are merged recursively.
    pub fn merge(self, other: ChoiceMap) -> ChoiceMap {
        match (self, other) {
            (a, b) if b.is_empty() => a,
            (a, b) if a.is_empty() => b,
            (a, ChoiceMap::Masked { flag: true, inner }) => a.merge(*inner),
            (a, ChoiceMap::Masked { flag: false, .. }) => a,
            (ChoiceMap::Masked { flag: true, inner }, b) => inner.merge(b),
            (ChoiceMap::Masked { flag: false, .. }, b) => b,
            (ChoiceMap::Branch(mut a), ChoiceMap::Branch(b)) => {
                for (k, v) in b {
                    let merged = match a.remove(&k) {
                        Some(existing) => existing.merge(v),
                        None => v,
                    };
                    a.insert(k, merged);
                }
                ChoiceMap::Branch(a)
            }
            (ChoiceMap::Indexed(mut a), ChoiceMap::Indexed(b)) => {
                for (i, v) in b {
                    let merged = match a.remove(&i) {
                        Some(existing) => existing.merge(v),
                        None => v,
                    };
                    a.insert(i, merged);
                }
                ChoiceMap::Indexed(a)
            }
            (_, b) => b,
        }
    }

    /// Union of two maps expected to be choice-disjoint.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConflictingAddress`] naming the first address
    /// at which both maps hold valid choices.
    pub fn disjoint_union(self, other: ChoiceMap) -> Result<ChoiceMap, CoreError> {
        self.union_at(other, &mut Vec::new())
    }

    fn union_at(self, other: ChoiceMap, path: &mut Vec<Segment>) -> Result<ChoiceMap, CoreError> {
        match (self, other) {
            (a, b) if b.is_empty() => Ok(a),
            (a, b) if a.is_empty() => Ok(b),
            (a, ChoiceMap::Masked { flag: true, inner }) => a.union_at(*inner, path),
            (a, ChoiceMap::Masked { flag: false, .. }) => Ok(a),
            (ChoiceMap::Masked { flag: true, inner }, b) => inner.union_at(b, path),
            (ChoiceMap::Masked { flag: false, .. }, b) => Ok(b),
            (ChoiceMap::Branch(mut a), ChoiceMap::Branch(b)) => {
                for (k, v) in b {
                    let merged = match a.remove(&k) {
                        Some(existing) => {
                            path.push(Segment::Key(k.clone()));
                            let merged = existing.union_at(v, path);
                            path.pop();
                            merged?
                        }
                        None => v,
                    };
                    a.insert(k, merged);
                }
                Ok(ChoiceMap::Branch(a))
            }
            (ChoiceMap::Indexed(mut a), ChoiceMap::Indexed(b)) => {
                for (i, v) in b {
                    let merged = match a.remove(&i) {
                        Some(existing) => {
                            path.push(Segment::Index(i));
                            let merged = existing.union_at(v, path);
                            path.pop();
                            merged?
                        }
                        None => v,
                    };
                    a.insert(i, merged);
                }
                Ok(ChoiceMap::Indexed(a))
            }
            _ => Err(CoreError::ConflictingAddress {
                address: Address::new(path.clone()),
            }),
        }
    }

    // ========================================================================
    // Selecting
    // ========================================================================

    /// Keep only the addresses accepted by `sel`.
    pub fn filter(&self, sel: &Selection) -> ChoiceMap {
        match sel {
            Selection::All => return self.clone(),
            Selection::None => return ChoiceMap::Empty,
            _ => {}
        }
        match self {
            ChoiceMap::Empty => ChoiceMap::Empty,
            ChoiceMap::Leaf(_) => {
                if sel.selects_here() {
                    self.clone()
                } else {
                    ChoiceMap::Empty
                }
            }
            ChoiceMap::Branch(children) => ChoiceMap::branch(
                children
                    .iter()
                    .filter_map(|(k, child)| {
                        let sub = child.filter(&sel.step(&Segment::Key(k.clone())));
                        (!sub.is_empty()).then(|| (k.clone(), sub))
                    })
                    .collect(),
            ),
            ChoiceMap::Indexed(entries) => ChoiceMap::indexed(
                entries
                    .iter()
                    .filter_map(|(i, child)| {
                        let sub = child.filter(&sel.step(&Segment::Index(*i)));
                        (!sub.is_empty()).then_some((*i, sub))
                    })
                    .collect(),
            ),
            ChoiceMap::Masked { flag, inner } => ChoiceMap::masked(*flag, inner.filter(sel)),
        }
    }

    /// Keep only the addresses rejected by `sel`.
    pub fn restrict(&self, sel: &Selection) -> ChoiceMap {
        self.filter(&sel.clone().complement())
    }
}

impl From<Value> for ChoiceMap {
    fn from(v: Value) -> Self {
        ChoiceMap::Leaf(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr;

    fn xy() -> ChoiceMap {
        ChoiceMap::new().with(addr!["x"], 1.0).with(addr!["y"], 2.0)
    }

    #[test]
    fn test_insert_builds_nested_nodes() {
        let chm = ChoiceMap::new().with(addr!["xs", 3, "x"], 1.0);
        let ChoiceMap::Branch(top) = &chm else {
            panic!("expected branch, got {chm:?}");
        };
        let ChoiceMap::Indexed(xs) = &top["xs"] else {
            panic!("expected indexed");
        };
        assert!(matches!(&xs[&3], ChoiceMap::Branch(inner) if inner.contains_key("x")));
    }

    #[test]
    fn test_insert_overrides() {
        let mut chm = xy();
        chm.insert(&addr!["x"], 5.0);
        assert_eq!(chm.get(&addr!["x"]), Some(&Value::Real(5.0)));
        assert_eq!(chm.num_choices(), 2);
    }

    #[test]
    fn test_insert_slice() {
        let mut chm = ChoiceMap::new();
        chm.insert_slice(&addr!["obs"], &addr!["y"], Value::reals([0.5, 1.5, 2.5]).as_array().unwrap().to_vec());
        assert_eq!(chm.get(&addr!["obs", 2, "y"]), Some(&Value::Real(2.5)));
        assert_eq!(chm.submap(&"obs".into()).indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_masked_reads_as_absent() {
        let chm = ChoiceMap::new().with_submap(addr!["m"], xy().mask(false));
        assert!(!chm.contains(&addr!["m", "x"]));
        assert_eq!(chm.num_choices(), 0);
        assert!(!chm.is_empty());

        let valid = ChoiceMap::new().with_submap(addr!["m"], xy().mask(true));
        assert_eq!(valid.get(&addr!["m", "y"]), Some(&Value::Real(2.0)));
    }

    #[test]
    fn test_submap_keeps_mask() {
        let chm = xy().mask(false);
        let sub = chm.submap(&"x".into());
        assert!(matches!(sub, ChoiceMap::Masked { flag: false, .. }));
        assert_eq!(sub.value(), None);
        assert_eq!(sub.unmask().value(), Some(&Value::Real(1.0)));
    }

    #[test]
    fn test_merge_right_biased() {
        let a = xy();
        let b = ChoiceMap::new().with(addr!["y"], 9.0).with(addr!["z"], 3.0);
        let m = a.merge(b);
        assert_eq!(m.get(&addr!["x"]), Some(&Value::Real(1.0)));
        assert_eq!(m.get(&addr!["y"]), Some(&Value::Real(9.0)));
        assert_eq!(m.get(&addr!["z"]), Some(&Value::Real(3.0)));
    }

    #[test]
    fn test_merge_invalid_does_not_override() {
        let a = xy();
        let b = ChoiceMap::new().with(addr!["x"], 7.0).mask(false);
        assert_eq!(a.clone().merge(b), a);
    }

    #[test]
    fn test_disjoint_union() {
        let a = ChoiceMap::new().with(addr!["s", 0, "x"], 1.0);
        let b = ChoiceMap::new().with(addr!["s", 1, "x"], 2.0);
        let u = a.clone().disjoint_union(b).unwrap();
        assert_eq!(u.num_choices(), 2);

        let clash = ChoiceMap::new().with(addr!["s", 0, "x"], 5.0);
        let err = a.disjoint_union(clash).unwrap_err();
        assert_eq!(
            err,
            CoreError::ConflictingAddress {
                address: addr!["s", 0, "x"]
            }
        );
    }

    #[test]
    fn test_disjoint_union_ignores_invalid() {
        let a = xy();
        let b = xy().mask(false);
        assert_eq!(a.clone().disjoint_union(b).unwrap(), a);
    }

    #[test]
    fn test_filter_and_restrict() {
        let chm = xy().with(addr!["zs", 0], 1.0).with(addr!["zs", 1], 2.0);
        let sel = Selection::at(addr!["x"]) | Selection::at(addr!["zs", 1]);

        let kept = chm.filter(&sel);
        assert_eq!(kept.addresses(), vec![addr!["x"], addr!["zs", 1]]);

        let rest = chm.restrict(&sel);
        assert_eq!(rest.addresses(), vec![addr!["y"], addr!["zs", 0]]);

        let union = kept.disjoint_union(rest).unwrap();
        assert_eq!(union, chm);
    }

    #[test]
    fn test_leaves_in_address_order() {
        let chm = ChoiceMap::new()
            .with(addr!["b"], 1)
            .with(addr!["a", 2], 2)
            .with(addr!["a", 0], 3);
        assert_eq!(chm.addresses(), vec![addr!["a", 0], addr!["a", 2], addr!["b"]]);
    }

    #[test]
    fn test_from_slice_skips_nothing() {
        let chm = ChoiceMap::from_slice(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(chm.indices(), vec![0, 1]);
        assert_eq!(chm.get(&addr![1]), Some(&Value::Int(2)));
    }

    #[test]
    fn test_json_shape() {
        let chm = ChoiceMap::new().with(addr!["x"], 1.0);
        let json = serde_json::to_value(&chm).unwrap();
        assert_eq!(json["Branch"]["x"]["Leaf"]["Real"], serde_json::json!(1.0));
    }
}
