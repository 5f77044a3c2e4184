//! Validity gating.
//!
//! [`Mask`] takes `[flag, inner args...]`. The inner call always runs; its
//! choices are recorded as `Masked(flag, ...)` and its score only counts
//! when `flag` is true. The return value is the inner return value.

use genfn_core::diff::values;
use genfn_core::{ChoiceMap, Diff, Key, Value};

use crate::error::GenError;
use crate::gfi::{GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

static EMPTY: ChoiceMap = ChoiceMap::Empty;

/// The valid part of a constraint: an invalid masked constraint constrains
/// nothing.
fn valid(constraint: &ChoiceMap) -> &ChoiceMap {
    match constraint {
        ChoiceMap::Masked { flag: true, inner } => valid(inner),
        ChoiceMap::Masked { flag: false, .. } => &EMPTY,
        other => other,
    }
}

/// Gate `inner` by a leading boolean argument.
#[derive(Debug, Clone)]
pub struct Mask {
    inner: GenFn,
}

impl Mask {
    pub fn new(inner: GenFn) -> Self {
        Self { inner }
    }
}

fn split_flag(args: &[Value]) -> Result<(bool, &[Value]), GenError> {
    let (flag, rest) = args
        .split_first()
        .ok_or_else(|| GenError::structural("mask needs a leading flag argument"))?;
    Ok((flag.as_bool()?, rest))
}

fn gated(flag: bool, score: f64) -> f64 {
    if flag {
        score
    } else {
        0.0
    }
}

fn masked_trace(flag: bool, inner: Trace, args: Vec<Value>) -> Trace {
    let retval = inner.retval.clone();
    let score = gated(flag, inner.score);
    let mut trace = Trace::wrap(inner, args, retval);
    trace.choices = std::mem::take(&mut trace.choices).mask(flag);
    trace.score = score;
    trace
}

impl GenerativeFunction for Mask {
    fn name(&self) -> &str {
        "mask"
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let (flag, rest) = split_flag(args)?;
        let inner = self.inner.simulate(key, rest)?;
        Ok(masked_trace(flag, inner, args.to_vec()))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let (flag, rest) = split_flag(args)?;
        let (inner, w) = self.inner.importance(key, valid(constraint), rest)?;
        Ok((masked_trace(flag, inner, args.to_vec()), gated(flag, w)))
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let args = values(argdiffs);
        let (flag, _) = split_flag(&args)?;
        let (old_flag, _) = split_flag(&trace.args)?;
        let old_inner = trace.inner()?;

        let r = self
            .inner
            .update(key, old_inner, valid(constraint), &argdiffs[1..])?;

        let weight = match (old_flag, flag) {
            (true, true) => r.weight,
            (false, true) => r.weight + old_inner.score,
            (true, false) => -old_inner.score,
            (false, false) => 0.0,
        };
        // Invalid old values were never choices; valid ones that become
        // invalid are discarded.
        let discard = match (old_flag, flag) {
            (true, true) => r.discard,
            (true, false) => old_inner.choices.clone(),
            (false, _) => ChoiceMap::Empty,
        };
        Ok(UpdateResult {
            trace: masked_trace(flag, r.trace, args),
            weight,
            retdiff: r.retdiff,
            discard,
        })
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        let (flag, rest) = split_flag(args)?;
        let (score, retval) = self.inner.assess(key, choices.unmask(), rest)?;
        Ok((gated(flag, score), retval))
    }
}
