//! # Diffs - Change Annotations for Incremental Update
//!
//! `update` is told which arguments changed since the trace was produced.
//! Each argument travels as a [`Diff`]: the new value plus a [`Change`]
//! tag. `NoChange` is a promise that the value is identical to the one the
//! old trace saw, which lets combinators skip recomputation.
//!
//! `UnknownChange` is always a sound answer. Callers that cannot tell use
//! it; callees may [`Diff::refine`] it against the old value.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Whether a value differs from its previous version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Change {
    /// The value is bitwise identical to the previous one.
    NoChange,
    /// The value may have changed.
    UnknownChange,
}

/// A value paired with its change tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub value: Value,
    pub change: Change,
}

impl Diff {
    /// A value known to be unchanged.
    pub fn no_change(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            change: Change::NoChange,
        }
    }

    /// A value that may have changed.
    pub fn unknown_change(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            change: Change::UnknownChange,
        }
    }

    /// Tag `new` by comparing it bitwise with `old`.
    pub fn between(old: &Value, new: Value) -> Self {
        if old.bitwise_eq(&new) {
            Diff::no_change(new)
        } else {
            Diff::unknown_change(new)
        }
    }

    /// Sharpen an `UnknownChange` to `NoChange` when the value turns out to
    /// equal `old`.
    pub fn refine(self, old: &Value) -> Self {
        match self.change {
            Change::NoChange => self,
            Change::UnknownChange => Diff::between(old, self.value),
        }
    }

    /// Check if this diff promises no change.
    pub fn is_unchanged(&self) -> bool {
        self.change == Change::NoChange
    }

    /// Split a tuple-valued diff into per-element diffs.
    ///
    /// A `NoChange` tuple has unchanged elements; an `UnknownChange` tuple
    /// tags each element `UnknownChange`.
    pub fn components(&self) -> Option<Vec<Diff>> {
        let items = match &self.value {
            Value::Tuple(items) => items,
            Value::Unit => return Some(Vec::new()),
            _ => return None,
        };
        Some(
            items
                .iter()
                .map(|v| Diff {
                    value: v.clone(),
                    change: self.change,
                })
                .collect(),
        )
    }
}

/// Tag every argument `NoChange`.
pub fn no_change_all(args: &[Value]) -> Vec<Diff> {
    args.iter().cloned().map(Diff::no_change).collect()
}

/// Tag every argument `UnknownChange`.
pub fn unknown_change_all(args: &[Value]) -> Vec<Diff> {
    args.iter().cloned().map(Diff::unknown_change).collect()
}

/// Tag each argument by comparing it with the corresponding old argument.
/// Extra new arguments are `UnknownChange`.
pub fn diff_args(old: &[Value], new: &[Value]) -> Vec<Diff> {
    new.iter()
        .enumerate()
        .map(|(i, v)| match old.get(i) {
            Some(o) => Diff::between(o, v.clone()),
            None => Diff::unknown_change(v.clone()),
        })
        .collect()
}

/// The new argument values carried by a slice of diffs.
pub fn values(diffs: &[Diff]) -> Vec<Value> {
    diffs.iter().map(|d| d.value.clone()).collect()
}

/// Check if every diff promises no change.
pub fn all_unchanged(diffs: &[Diff]) -> bool {
    diffs.iter().all(Diff::is_unchanged)
}
