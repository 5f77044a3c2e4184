//! Independent replication over a leading dimension.
//!
//! [`Batch`] runs its inner generative function once per lane. Each
//! argument is either batched (`Some(0)`: an `Array` whose item `i` goes to
//! lane `i`) or broadcast (`None`: every lane sees the whole value). Lane
//! `i` lives under index `i`; the score is the sum over lanes and the
//! return value is the `Array` of lane return values.
//!
//! Lanes share nothing but their inputs, so with the `parallel` feature
//! they run on the rayon pool. Every lane draws from its own split key,
//! which keeps results identical with and without the feature.

use std::collections::BTreeMap;
use std::sync::Arc;

use genfn_core::diff::values;
use genfn_core::{Address, ChoiceMap, Diff, Key, Segment, Value};
use tracing::debug;

use crate::error::GenError;
use crate::gfi::{GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Run `f` for every lane and collect the results in lane order.
fn run_lanes<T, F>(n: usize, f: F) -> Result<Vec<T>, GenError>
where
    T: Send,
    F: Fn(usize) -> Result<T, GenError> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        (0..n).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..n).map(f).collect()
    }
}

/// Vectorise a generative function over per-argument axes.
#[derive(Debug, Clone)]
pub struct Batch {
    inner: GenFn,
    in_axes: Vec<Option<usize>>,
    axis_size: Option<usize>,
}

impl Batch {
    /// Batch `inner` with one axis entry per argument; missing trailing
    /// entries are broadcast.
    ///
    /// # Errors
    ///
    /// Only the leading axis can be batched; any other axis is a structural
    /// error.
    pub fn new(inner: GenFn, in_axes: Vec<Option<usize>>) -> Result<Self, GenError> {
        if let Some(axis) = in_axes.iter().flatten().find(|&&a| a != 0) {
            return Err(GenError::structural(format!(
                "batch supports the leading axis only, got axis {axis}"
            )));
        }
        Ok(Self {
            inner,
            in_axes,
            axis_size: None,
        })
    }

    /// `n` independent calls on the same (broadcast) arguments.
    pub fn repeat(inner: GenFn, n: usize) -> Self {
        Self {
            inner,
            in_axes: Vec::new(),
            axis_size: Some(n),
        }
    }

    /// Fix the number of lanes. Required when no argument is batched.
    pub fn with_axis_size(mut self, n: usize) -> Self {
        self.axis_size = Some(n);
        self
    }

    fn batched(&self, j: usize) -> bool {
        matches!(self.in_axes.get(j), Some(Some(_)))
    }

    /// The common lane count of the batched arguments.
    fn lanes(&self, args: &[Value]) -> Result<usize, GenError> {
        let mut n = self.axis_size;
        for (j, arg) in args.iter().enumerate().filter(|(j, _)| self.batched(*j)) {
            let extent = arg.as_array()?.len();
            match n {
                Some(m) if m != extent => {
                    return Err(GenError::structural(format!(
                        "batched argument {j} has extent {extent}, expected {m}"
                    )))
                }
                _ => n = Some(extent),
            }
        }
        n.ok_or_else(|| GenError::structural("batch has no batched argument and no axis size"))
    }

    fn lane_args(&self, args: &[Value], i: usize) -> Result<Vec<Value>, GenError> {
        args.iter()
            .enumerate()
            .map(|(j, arg)| {
                if self.batched(j) {
                    Ok(arg.at(i)?.clone())
                } else {
                    Ok(arg.clone())
                }
            })
            .collect()
    }

    fn lane_diffs(&self, argdiffs: &[Diff], old_args: &[Value], i: usize) -> Result<Vec<Diff>, GenError> {
        argdiffs
            .iter()
            .zip(old_args)
            .enumerate()
            .map(|(j, (d, old))| {
                if !self.batched(j) {
                    return Ok(d.clone().refine(old));
                }
                let new = d.value.at(i)?.clone();
                if d.is_unchanged() {
                    Ok(Diff::no_change(new))
                } else {
                    Ok(Diff::between(old.at(i)?, new))
                }
            })
            .collect()
    }
}

fn assemble(args: Vec<Value>, lanes: Vec<Trace>) -> Trace {
    let mut choices = BTreeMap::new();
    let mut subtraces = BTreeMap::new();
    let mut retvals = Vec::with_capacity(lanes.len());
    let mut score = 0.0;
    for (i, t) in lanes.into_iter().enumerate() {
        score += t.score;
        retvals.push(t.retval.clone());
        if !t.choices.is_empty() {
            choices.insert(i, t.choices.clone());
        }
        subtraces.insert(Address::from(i), Arc::new(t));
    }
    Trace {
        gen_fn: None,
        args,
        choices: ChoiceMap::indexed(choices),
        retval: Value::Array(retvals),
        score,
        subtraces,
    }
}

impl GenerativeFunction for Batch {
    fn name(&self) -> &str {
        "batch"
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let n = self.lanes(args)?;
        debug!(lanes = n, "batch simulate");
        let keys = key.split(n);
        let lanes = run_lanes(n, |i| {
            self.inner
                .simulate(keys[i], &self.lane_args(args, i)?)
                .map_err(|e| e.within(i))
        })?;
        Ok(assemble(args.to_vec(), lanes))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let n = self.lanes(args)?;
        debug!(lanes = n, "batch importance");
        let keys = key.split(n);
        let lanes = run_lanes(n, |i| {
            self.inner
                .importance(keys[i], &constraint.submap(&Segment::Index(i)), &self.lane_args(args, i)?)
                .map_err(|e| e.within(i))
        })?;
        let weight = lanes.iter().map(|(_, w)| w).sum();
        let traces = lanes.into_iter().map(|(t, _)| t).collect();
        Ok((assemble(args.to_vec(), traces), weight))
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let args = values(argdiffs);
        GenError::check_arity("batch", args.len(), trace.args.len())?;
        let n = self.lanes(&args)?;
        let old_n = trace.retval.extent()?;
        if n != old_n {
            return Err(GenError::structural(format!(
                "batch update changes the lane count from {old_n} to {n}"
            )));
        }
        debug!(lanes = n, "batch update");
        let keys = key.split(n);
        let results = run_lanes(n, |i| {
            let old = trace
                .subtrace(&Address::from(i))
                .ok_or_else(|| GenError::structural(format!("batch trace has no lane {i}")))?;
            let diffs = self.lane_diffs(argdiffs, &trace.args, i)?;
            self.inner
                .update(keys[i], old, &constraint.submap(&Segment::Index(i)), &diffs)
                .map_err(|e| e.within(i))
        })?;

        let mut weight = 0.0;
        let mut discard = BTreeMap::new();
        let mut lanes = Vec::with_capacity(n);
        for (i, r) in results.into_iter().enumerate() {
            weight += r.weight;
            if !r.discard.is_empty() {
                discard.insert(i, r.discard);
            }
            lanes.push(r.trace);
        }
        let new_trace = assemble(args, lanes);
        Ok(UpdateResult {
            retdiff: Diff::between(&trace.retval, new_trace.retval.clone()),
            trace: new_trace,
            weight,
            discard: ChoiceMap::indexed(discard),
        })
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        let n = self.lanes(args)?;
        let keys = key.split(n);
        let lanes = run_lanes(n, |i| {
            self.inner
                .assess(keys[i], &choices.submap(&Segment::Index(i)), &self.lane_args(args, i)?)
                .map_err(|e| e.within(i))
        })?;
        let score = lanes.iter().map(|(s, _)| s).sum();
        Ok((score, Value::Array(lanes.into_iter().map(|(_, r)| r).collect())))
    }
}

/// Independent full traces of one generative function, one per key.
///
/// Unlike [`Batch`], the lanes are not combined into a single trace; only
/// the per-lane scores are summarised.
#[derive(Debug, Clone)]
pub struct TraceBatch {
    traces: Vec<Trace>,
}

impl TraceBatch {
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Score of every lane.
    pub fn scores(&self) -> Vec<f64> {
        self.traces.iter().map(|t| t.score).collect()
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn into_traces(self) -> Vec<Trace> {
        self.traces
    }
}

/// Simulate `gen_fn` on `args` once per split of `key`.
pub fn simulate_lanes(gen_fn: &GenFn, key: Key, n: usize, args: &[Value]) -> Result<TraceBatch, GenError> {
    let keys = key.split(n);
    let traces = run_lanes(n, |i| gen_fn.simulate(keys[i], args).map_err(|e| e.within(i)))?;
    Ok(TraceBatch { traces })
}
