//! # The Generative Function Interface
//!
//! Every model and every combinator implements [`GenerativeFunction`]: five
//! operations with exact weight semantics.
//!
//! | operation | returns | weight |
//! |---|---|---|
//! | `simulate` | trace | (score is `log p`) |
//! | `importance` | trace, weight | `log p(all) - log q(sampled)` |
//! | `update` | trace, weight, retdiff, discard | `log p(new) - log p(old) - log q(sampled)` |
//! | `assess` | score, retval | `log p(choices)` |
//! | `propose` | choices, score, retval | (score is `log p`) |
//!
//! Composites implement each operation by calling the same operation on
//! their parts and adding the results. Calls always go through a [`GenFn`]
//! handle, which stamps itself into the traces it returns so that
//! [`Trace::update`] can dispatch back.

use std::fmt;
use std::sync::Arc;

use genfn_core::diff::all_unchanged;
use genfn_core::{ChoiceMap, Diff, Key, Value};

use crate::combinators::{Contramap, Map, Mask};
use crate::error::GenError;
use crate::trace::Trace;

/// Result of [`GenerativeFunction::update`].
#[derive(Debug, Clone)]
pub struct UpdateResult {
    /// The updated trace.
    pub trace: Trace,
    /// `log p(new) - log p(old)`, less the proposal density of anything
    /// newly sampled.
    pub weight: f64,
    /// Change of the return value.
    pub retdiff: Diff,
    /// Old values that were overwritten or invalidated.
    pub discard: ChoiceMap,
}

/// The interface every model and combinator implements.
pub trait GenerativeFunction: Send + Sync + fmt::Debug {
    /// Short name, used in errors and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Sample every choice from the prior.
    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError>;

    /// Agree with `constraint` and sample the rest from the internal
    /// proposal. With a complete constraint nothing is sampled and the
    /// weight equals the `assess` score.
    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError>;

    /// Move `trace` to new arguments and constrained values, reusing
    /// everything else.
    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError>;

    /// Score a complete set of choices.
    ///
    /// # Errors
    ///
    /// Returns `MissingAddress` naming the first address the call samples
    /// that `choices` does not provide.
    fn assess(&self, key: Key, choices: &ChoiceMap, args: &[Value])
        -> Result<(f64, Value), GenError>;

    /// Sample choices and report their score.
    fn propose(&self, key: Key, args: &[Value]) -> Result<(ChoiceMap, f64, Value), GenError> {
        let trace = self.simulate(key, args)?;
        Ok((trace.choices, trace.score, trace.retval))
    }
}

/// `new - old` for scores, pinned to `-inf` when the new score is `-inf`.
pub fn weight_delta(new: f64, old: f64) -> f64 {
    if new == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        new - old
    }
}

/// A shared handle to a generative function.
#[derive(Clone)]
pub struct GenFn(Arc<dyn GenerativeFunction>);

impl fmt::Debug for GenFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GenFn").field(&self.0.name()).finish()
    }
}

impl GenFn {
    /// Wrap a generative function in a handle.
    pub fn new(gen_fn: impl GenerativeFunction + 'static) -> Self {
        Self(Arc::new(gen_fn))
    }

    /// Wrap an already shared generative function.
    pub fn from_arc(gen_fn: Arc<dyn GenerativeFunction>) -> Self {
        Self(gen_fn)
    }

    /// The wrapped generative function's name.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Check if two handles point at the same generative function.
    pub fn ptr_eq(&self, other: &GenFn) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn stamp(&self, mut trace: Trace) -> Trace {
        trace.gen_fn = Some(self.clone());
        trace
    }

    /// See [`GenerativeFunction::simulate`].
    pub fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        self.0.simulate(key, args).map(|t| self.stamp(t))
    }

    /// See [`GenerativeFunction::importance`].
    pub fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let (trace, weight) = self.0.importance(key, constraint, args)?;
        Ok((self.stamp(trace), weight))
    }

    /// See [`GenerativeFunction::update`].
    ///
    /// An update with no constrained choices and every argument unchanged
    /// returns the old trace as is, with zero weight.
    pub fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        if argdiffs.len() == trace.args.len()
            && all_unchanged(argdiffs)
            && constraint.num_choices() == 0
        {
            return Ok(UpdateResult {
                trace: self.stamp(trace.clone()),
                weight: 0.0,
                retdiff: Diff::no_change(trace.retval.clone()),
                discard: ChoiceMap::Empty,
            });
        }
        let mut result = self.0.update(key, trace, constraint, argdiffs)?;
        result.trace = self.stamp(result.trace);
        Ok(result)
    }

    /// See [`GenerativeFunction::assess`].
    pub fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        self.0.assess(key, choices, args)
    }

    /// See [`GenerativeFunction::propose`].
    pub fn propose(
        &self,
        key: Key,
        args: &[Value],
    ) -> Result<(ChoiceMap, f64, Value), GenError> {
        self.0.propose(key, args)
    }

    // ========================================================================
    // Combinator shorthands
    // ========================================================================

    /// Transform the return value.
    pub fn map<F>(&self, f: F) -> GenFn
    where
        F: Fn(&Value) -> Result<Value, GenError> + Send + Sync + 'static,
    {
        GenFn::new(Map::new(self.clone(), f))
    }

    /// Transform the arguments before the call.
    pub fn contramap<F>(&self, f: F) -> GenFn
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, GenError> + Send + Sync + 'static,
    {
        GenFn::new(Contramap::new(self.clone(), f))
    }

    /// Gate by a leading boolean argument.
    pub fn mask(&self) -> GenFn {
        GenFn::new(Mask::new(self.clone()))
    }

    /// Run `n` independent copies on the same arguments, in sequence.
    pub fn repeat(&self, n: usize) -> GenFn {
        crate::combinators::repeat(self.clone(), n)
    }

    /// Choose between `self` and `other` by a leading boolean argument.
    pub fn or_else(&self, other: &GenFn) -> GenFn {
        crate::combinators::or_else(self.clone(), other.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_delta() {
        assert_eq!(weight_delta(-1.0, -3.0), 2.0);
        assert_eq!(weight_delta(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
        assert_eq!(weight_delta(-1.0, f64::NEG_INFINITY), f64::INFINITY);
    }
}
