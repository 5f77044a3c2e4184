//! # Traces - Recorded Executions
//!
//! A [`Trace`] is the immutable record of one call: which generative
//! function ran, on what arguments, which random choices it made, what it
//! returned, and the score `log p(choices; args)`.
//!
//! Composite generative functions keep the traces of their sub-calls in
//! `subtraces`, keyed by the address the sub-call was made at. `update`
//! reads these back to decide what can be reused. Sub-traces are shared
//! behind `Arc`, so a reused sub-call is not copied into the new trace.
//! Wrappers that add no addresses of their own (Map, Switch, Mask) keep
//! their single sub-trace at the root address.

use std::collections::BTreeMap;
use std::sync::Arc;

use genfn_core::{Address, ChoiceMap, Diff, Key, Selection, Value};

use crate::error::GenError;
use crate::gfi::{GenFn, UpdateResult};

/// The record of one execution of a generative function.
#[derive(Debug, Clone)]
pub struct Trace {
    /// The generative function that produced this trace.
    pub gen_fn: Option<GenFn>,
    /// Arguments of the call.
    pub args: Vec<Value>,
    /// Every random choice made, by address.
    pub choices: ChoiceMap,
    /// The return value.
    pub retval: Value,
    /// Sum of the log densities of every active choice.
    pub score: f64,
    /// Traces of sub-calls, by the address they were made at.
    pub subtraces: BTreeMap<Address, Arc<Trace>>,
}

impl Trace {
    /// A trace with no sub-calls.
    pub fn leaf(args: Vec<Value>, choices: ChoiceMap, retval: Value, score: f64) -> Self {
        Self {
            gen_fn: None,
            args,
            choices,
            retval,
            score,
            subtraces: BTreeMap::new(),
        }
    }

    /// A trace that wraps a single sub-trace at the root address, sharing
    /// its choices and score.
    pub fn wrap(inner: Trace, args: Vec<Value>, retval: Value) -> Self {
        let mut subtraces = BTreeMap::new();
        let choices = inner.choices.clone();
        let score = inner.score;
        subtraces.insert(Address::root(), Arc::new(inner));
        Self {
            gen_fn: None,
            args,
            choices,
            retval,
            score,
            subtraces,
        }
    }

    /// The value of the choice at `addr`.
    pub fn get(&self, addr: &Address) -> Option<&Value> {
        self.choices.get(addr)
    }

    /// The choice at `addr`, or a `MissingAddress` error.
    pub fn require(&self, addr: &Address) -> Result<&Value, GenError> {
        self.get(addr).ok_or_else(|| GenError::missing(addr.clone()))
    }

    /// The choices accepted by `sel`.
    pub fn filter(&self, sel: &Selection) -> ChoiceMap {
        self.choices.filter(sel)
    }

    /// The sub-trace recorded at `addr`.
    pub fn subtrace(&self, addr: &Address) -> Option<&Trace> {
        self.subtraces.get(addr).map(Arc::as_ref)
    }

    /// The shared handle of the sub-trace recorded at `addr`.
    pub fn shared_subtrace(&self, addr: &Address) -> Option<&Arc<Trace>> {
        self.subtraces.get(addr)
    }

    /// The sub-trace of the call made at `addr`, searching through nested
    /// calls and wrappers.
    pub fn find_subtrace(&self, addr: &Address) -> Option<&Trace> {
        if let Some(t) = self.subtrace(addr) {
            return Some(t);
        }
        self.subtraces.iter().find_map(|(prefix, sub)| {
            if !addr.starts_with(prefix) {
                return None;
            }
            let rest = Address::from(&addr.segments()[prefix.len()..]);
            sub.find_subtrace(&rest)
        })
    }

    /// The sub-trace kept by a wrapper at the root address.
    pub fn inner(&self) -> Result<&Trace, GenError> {
        self.subtrace(&Address::root())
            .ok_or_else(|| GenError::structural("wrapper trace has no inner trace"))
    }

    /// Update this trace through the generative function that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::MissingTrace`] if the trace was built by hand and
    /// records no generative function.
    pub fn update(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let gen_fn = self.gen_fn.as_ref().ok_or(GenError::MissingTrace)?;
        gen_fn.update(key, self, constraint, argdiffs)
    }

    /// Bitwise comparison of the recorded data (the generative function
    /// handle is ignored).
    pub fn same_record(&self, other: &Trace) -> bool {
        self.score.to_bits() == other.score.to_bits()
            && self.retval.bitwise_eq(&other.retval)
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.bitwise_eq(b))
            && self.choices == other.choices
    }
}
