//! Branch selection.
//!
//! [`Switch`] holds a closed list of branches fixed at construction. Its
//! arguments are `[index, args_0, ..., args_{K-1}]`, each `args_k` a
//! `Tuple`. Only the selected branch runs, and its choices sit directly at
//! the switch's address: every branch shares one namespace. Branches not
//! taken contribute no choices and no score.
//!
//! With [`Switch::with_placeholders`] the branches not taken are also
//! simulated and recorded as `Masked(false, ..)` entries, at the top-level
//! addresses the taken branch leaves free. A placeholder that would land on
//! an address the taken branch uses is dropped, since both share one
//! namespace. Placeholders are hidden from strict reads and never scored.
//!
//! Branches must agree on return structure. A declared shape
//! ([`Switch::with_return_shape`]) is checked on every call; otherwise the
//! check happens when two branch results meet, which is in `update` when
//! the index moves.
//!
//! [`or_else`] is the two-way form driven by a boolean.

use std::collections::BTreeMap;

use genfn_core::diff::values;
use genfn_core::{ChoiceMap, Diff, Key, Shape, Value};
use tracing::{debug, trace};

use crate::error::GenError;
use crate::gfi::{weight_delta, GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

/// Run one of several branches, chosen by a leading index argument.
#[derive(Debug, Clone)]
pub struct Switch {
    branches: Vec<GenFn>,
    return_shape: Option<Shape>,
    placeholders: bool,
}

impl Switch {
    /// Create a switch over `branches`.
    ///
    /// # Errors
    ///
    /// Returns a structural error if `branches` is empty.
    pub fn new(branches: Vec<GenFn>) -> Result<Self, GenError> {
        if branches.is_empty() {
            return Err(GenError::structural("switch needs at least one branch"));
        }
        Ok(Self {
            branches,
            return_shape: None,
            placeholders: false,
        })
    }

    /// Declare the return shape every branch must produce.
    pub fn with_return_shape(mut self, shape: Shape) -> Self {
        self.return_shape = Some(shape);
        self
    }

    /// Record the branches not taken as masked-out placeholders. Every call
    /// then simulates them too; their draws are never scored.
    pub fn with_placeholders(mut self) -> Self {
        self.placeholders = true;
        self
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Always false; a switch has at least one branch.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    fn select<'a>(&self, args: &'a [Value]) -> Result<(usize, &'a [Value]), GenError> {
        GenError::check_arity("switch", args.len(), self.branches.len() + 1)?;
        let idx = args[0].as_index()?;
        if idx >= self.branches.len() {
            return Err(GenError::structural(format!(
                "branch index {idx} outside 0..{}",
                self.branches.len()
            )));
        }
        Ok((idx, args[1 + idx].as_tuple()?))
    }

    fn check_shape(&self, idx: usize, retval: &Value, against: Option<&Shape>) -> Result<(), GenError> {
        let expected = self.return_shape.as_ref().or(against);
        match expected {
            Some(shape) if !retval.shape().is_compatible(shape) => {
                Err(GenError::structural(format!(
                    "branch {idx} returned {}, expected {shape}",
                    retval.shape()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Switch {
    /// Wrap the taken branch's trace, adding placeholders if enabled.
    fn finish(&self, key: Key, idx: usize, args: &[Value], inner: Trace) -> Trace {
        let retval = inner.retval.clone();
        let mut trace = Trace::wrap(inner, args.to_vec(), retval);
        if self.placeholders {
            trace.choices = self.fill_untaken(key, idx, args, trace.choices);
        }
        trace
    }

    fn fill_untaken(&self, key: Key, idx: usize, args: &[Value], taken: ChoiceMap) -> ChoiceMap {
        let mut children = match taken {
            ChoiceMap::Empty => BTreeMap::new(),
            ChoiceMap::Branch(children) => children,
            other => return other,
        };
        for (j, branch) in self.branches.iter().enumerate().filter(|&(j, _)| j != idx) {
            let untaken = args[1 + j]
                .as_tuple()
                .map_err(GenError::from)
                .and_then(|a| branch.simulate(key.fold_in(j as u64 + 1), a));
            match untaken.map(|t| t.choices) {
                Ok(ChoiceMap::Branch(theirs)) => {
                    for (k, sub) in theirs.into_iter().filter(|(_, sub)| !sub.is_empty()) {
                        children
                            .entry(k)
                            .or_insert_with(|| ChoiceMap::masked(false, sub));
                    }
                }
                Ok(_) => {}
                Err(e) => trace!(branch = j, error = %e, "no placeholder for untaken branch"),
            }
        }
        ChoiceMap::branch(children)
    }
}

impl GenerativeFunction for Switch {
    fn name(&self) -> &str {
        "switch"
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let (idx, branch_args) = self.select(args)?;
        let inner = self.branches[idx].simulate(key, branch_args)?;
        self.check_shape(idx, &inner.retval, None)?;
        Ok(self.finish(key, idx, args, inner))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let (idx, branch_args) = self.select(args)?;
        let (inner, w) = self.branches[idx].importance(key, constraint, branch_args)?;
        self.check_shape(idx, &inner.retval, None)?;
        Ok((self.finish(key, idx, args, inner), w))
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let args = values(argdiffs);
        let (idx, branch_args) = self.select(&args)?;
        let (old_idx, _) = self.select(&trace.args)?;
        let old_inner = trace.inner()?;
        let old_shape = trace.retval.shape();

        if idx == old_idx {
            let branch_diffs = argdiffs[1 + idx].components().ok_or_else(|| {
                GenError::structural(format!("branch {idx} arguments must be a tuple"))
            })?;
            let branch_diffs: Vec<Diff> = branch_diffs
                .into_iter()
                .zip(&old_inner.args)
                .map(|(d, old)| d.refine(old))
                .collect();
            let r = self.branches[idx].update(key, old_inner, constraint, &branch_diffs)?;
            self.check_shape(idx, &r.trace.retval, Some(&old_shape))?;
            return Ok(UpdateResult {
                trace: self.finish(key, idx, &args, r.trace),
                weight: r.weight,
                retdiff: r.retdiff,
                discard: r.discard,
            });
        }

        debug!(from = old_idx, to = idx, "switch branch changed");
        let (inner, w) = self.branches[idx].importance(key, constraint, branch_args)?;
        self.check_shape(idx, &inner.retval, Some(&old_shape))?;
        let weight = weight_delta(w, trace.score);
        let new_trace = self.finish(key, idx, &args, inner);
        Ok(UpdateResult {
            retdiff: Diff::between(&trace.retval, new_trace.retval.clone()),
            trace: new_trace,
            weight,
            discard: old_inner.choices.clone(),
        })
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        let (idx, branch_args) = self.select(args)?;
        let (score, retval) = self.branches[idx].assess(key, choices, branch_args)?;
        self.check_shape(idx, &retval, None)?;
        Ok((score, retval))
    }
}

/// Run `if_branch` when the leading boolean is true, else `else_branch`.
///
/// Arguments are `[flag, if_args, else_args]`, each args a `Tuple`.
pub fn or_else(if_branch: GenFn, else_branch: GenFn) -> GenFn {
    // false selects branch 0
    let switch = GenFn::new(Switch {
        branches: vec![else_branch, if_branch],
        return_shape: None,
        placeholders: false,
    });
    switch.contramap(|args| {
        GenError::check_arity("or_else", args.len(), 3)?;
        let flag = args[0].as_bool()?;
        Ok(vec![Value::Bool(flag), args[2].clone(), args[1].clone()])
    })
}
