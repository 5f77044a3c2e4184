//! Sequential iteration.
//!
//! [`Scan`] runs a step generative function `n` times, threading a carry.
//! Step `i` lives under the integer address `i`, so the choices form an
//! `Indexed` node with keys exactly `0..n`.
//!
//! - arguments: `[init, xs]`, `xs` an `Array` of length `n` (or `Unit` when
//!   the step ignores its input)
//! - step: `[carry, x] -> Tuple([carry', y])`, `carry'` with the shape of
//!   `carry`
//! - return: `Tuple([final carry, Array(ys)])`
//!
//! `update` is incremental. A step whose carry and input are unchanged and
//! which has no constraint is reused as is: no recomputation, zero weight.
//! So updating only step 7 of 10 leaves steps 0..6 bit-identical.
//!
//! The rest of the family is built on Scan:
//!
//! - [`repeat`]: `n` independent calls on the same arguments
//! - [`iterate_final`]: `carry -> carry`, returns the last carry
//! - [`masked_iterate_final`]: like `iterate_final`, but steps at or after
//!   a dynamic stop index are masked out and pass the carry through

use std::collections::BTreeMap;
use std::sync::Arc;

use genfn_core::diff::values;
use genfn_core::{Address, ChoiceMap, Diff, Key, Segment, Value};
use tracing::debug;

use crate::combinators::mask::Mask;
use crate::dynamic::Gen;
use crate::error::GenError;
use crate::gfi::{GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

/// Apply a step generative function `length` times.
#[derive(Debug, Clone)]
pub struct Scan {
    step: GenFn,
    length: usize,
}

/// The accumulated result of running the steps.
struct Steps {
    carry: Value,
    ys: Vec<Value>,
    choices: BTreeMap<usize, ChoiceMap>,
    subtraces: BTreeMap<Address, Arc<Trace>>,
    score: f64,
}

impl Steps {
    fn new(init: Value, length: usize) -> Self {
        Self {
            carry: init,
            ys: Vec::with_capacity(length),
            choices: BTreeMap::new(),
            subtraces: BTreeMap::new(),
            score: 0.0,
        }
    }

    /// Record step `i` and advance the carry.
    fn push(&mut self, i: usize, t: Arc<Trace>) -> Result<(), GenError> {
        let (carry, y) = split_step_retval(i, &self.carry, &t.retval)?;
        self.carry = carry;
        self.ys.push(y);
        self.score += t.score;
        if !t.choices.is_empty() {
            self.choices.insert(i, t.choices.clone());
        }
        self.subtraces.insert(Address::from(i), t);
        Ok(())
    }

    fn into_trace(self, args: Vec<Value>) -> Trace {
        Trace {
            gen_fn: None,
            args,
            choices: ChoiceMap::indexed(self.choices),
            retval: Value::tuple([self.carry, Value::Array(self.ys)]),
            score: self.score,
            subtraces: self.subtraces,
        }
    }
}

fn split_step_retval(i: usize, carry: &Value, retval: &Value) -> Result<(Value, Value), GenError> {
    let pair = match retval {
        Value::Tuple(items) if items.len() == 2 => items,
        other => {
            return Err(GenError::structural(format!(
                "scan step {i} must return (carry, y), got {}",
                other.shape()
            )))
        }
    };
    if !pair[0].shape().is_compatible(&carry.shape()) {
        return Err(GenError::structural(format!(
            "scan step {i} changed the carry from {} to {}",
            carry.shape(),
            pair[0].shape()
        )));
    }
    Ok((pair[0].clone(), pair[1].clone()))
}

impl Scan {
    pub fn new(step: GenFn, length: usize) -> Self {
        Self { step, length }
    }

    /// Number of steps.
    pub fn length(&self) -> usize {
        self.length
    }

    fn unpack<'a>(&self, args: &'a [Value]) -> Result<(&'a Value, Vec<Value>), GenError> {
        GenError::check_arity("scan", args.len(), 2)?;
        let xs = match &args[1] {
            Value::Unit => vec![Value::Unit; self.length],
            Value::Array(items) if items.len() == self.length => items.clone(),
            Value::Array(items) => {
                return Err(GenError::structural(format!(
                    "scan of length {} given {} inputs",
                    self.length,
                    items.len()
                )))
            }
            other => return Err(GenError::structural(format!("scan inputs must be an array, got {}", other.kind()))),
        };
        Ok((&args[0], xs))
    }

    fn step_args(carry: &Value, x: &Value) -> [Value; 2] {
        [carry.clone(), x.clone()]
    }
}

impl GenerativeFunction for Scan {
    fn name(&self) -> &str {
        "scan"
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let (init, xs) = self.unpack(args)?;
        let mut steps = Steps::new(init.clone(), self.length);
        for (i, (k, x)) in key.split(self.length).into_iter().zip(&xs).enumerate() {
            let t = self
                .step
                .simulate(k, &Self::step_args(&steps.carry, x))
                .map_err(|e| e.within(i))?;
            steps.push(i, Arc::new(t))?;
        }
        Ok(steps.into_trace(args.to_vec()))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let (init, xs) = self.unpack(args)?;
        let mut steps = Steps::new(init.clone(), self.length);
        let mut weight = 0.0;
        for (i, (k, x)) in key.split(self.length).into_iter().zip(&xs).enumerate() {
            let (t, w) = self
                .step
                .importance(k, &constraint.submap(&Segment::Index(i)), &Self::step_args(&steps.carry, x))
                .map_err(|e| e.within(i))?;
            weight += w;
            steps.push(i, Arc::new(t))?;
        }
        Ok((steps.into_trace(args.to_vec()), weight))
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let args = values(argdiffs);
        let (init, xs) = self.unpack(&args)?;
        let (_, old_xs) = self.unpack(&trace.args)?;
        let xs_unchanged = argdiffs[1].is_unchanged();

        let mut carry_diff = argdiffs[0].clone().refine(&trace.args[0]);
        let mut steps = Steps::new(init.clone(), self.length);
        let mut weight = 0.0;
        let mut discard = BTreeMap::new();
        let mut first_changed = None;

        for (i, k) in key.split(self.length).into_iter().enumerate() {
            let old = trace
                .shared_subtrace(&Address::from(i))
                .ok_or_else(|| GenError::structural(format!("scan trace has no step {i}")))?;
            let step_constraint = constraint.submap(&Segment::Index(i));
            let x_diff = if xs_unchanged {
                Diff::no_change(xs[i].clone())
            } else {
                Diff::between(&old_xs[i], xs[i].clone())
            };

            if carry_diff.is_unchanged() && x_diff.is_unchanged() && step_constraint.num_choices() == 0 {
                steps.push(i, Arc::clone(old))?;
                continue;
            }
            first_changed.get_or_insert(i);

            let r = self
                .step
                .update(k, old, &step_constraint, &[carry_diff.clone(), x_diff])
                .map_err(|e| e.within(i))?;
            weight += r.weight;
            if !r.discard.is_empty() {
                discard.insert(i, r.discard);
            }
            steps.push(i, Arc::new(r.trace))?;
            carry_diff = if r.retdiff.is_unchanged() {
                Diff::no_change(steps.carry.clone())
            } else {
                Diff::between(old.retval.at(0)?, steps.carry.clone())
            };
        }

        if let Some(i) = first_changed {
            debug!(first_changed = i, length = self.length, "scan update");
        }
        let new_trace = steps.into_trace(args);
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
        let (init, xs) = self.unpack(args)?;
        let mut carry = init.clone();
        let mut ys = Vec::with_capacity(self.length);
        let mut score = 0.0;
        for (i, (k, x)) in key.split(self.length).into_iter().zip(&xs).enumerate() {
            let (s, retval) = self
                .step
                .assess(k, &choices.submap(&Segment::Index(i)), &Self::step_args(&carry, x))
                .map_err(|e| e.within(i))?;
            let (next, y) = split_step_retval(i, &carry, &retval)?;
            carry = next;
            ys.push(y);
            score += s;
        }
        Ok((score, Value::tuple([carry, Value::Array(ys)])))
    }
}

/// `n` independent calls of `inner` on the same arguments.
///
/// Returns an `Array` of the `n` return values; call `i`'s choices live
/// under index `i`.
pub fn repeat(inner: GenFn, n: usize) -> GenFn {
    let step = GenFn::new(Gen::new("repeat_step", move |ctx, args| {
        let y = ctx.trace(Address::root(), &inner, args[0].as_tuple()?)?;
        Ok(Value::tuple([args[0].clone(), y]))
    }));
    GenFn::new(Scan::new(step, n))
        .contramap(|args| Ok(vec![Value::Tuple(args.to_vec()), Value::Unit]))
        .map(|r| Ok(r.at(1)?.clone()))
}

/// Apply `inner` (carry -> carry) `n` times to `[init]` and return the
/// final carry.
pub fn iterate_final(inner: GenFn, n: usize) -> GenFn {
    let step = GenFn::new(Gen::new("iterate_step", move |ctx, args| {
        let next = ctx.trace(Address::root(), &inner, &args[..1])?;
        Ok(Value::tuple([next, Value::Unit]))
    }));
    GenFn::new(Scan::new(step, n))
        .contramap(|args| {
            GenError::check_arity("iterate_final", args.len(), 1)?;
            Ok(vec![args[0].clone(), Value::Unit])
        })
        .map(|r| Ok(r.at(0)?.clone()))
}

/// Like [`iterate_final`] with arguments `[init, stop]`: step `i` is masked
/// out when `i >= stop`, contributes no score, and passes the carry through.
/// The step count stays `n`.
pub fn masked_iterate_final(inner: GenFn, n: usize) -> GenFn {
    let masked = GenFn::new(Mask::new(inner));
    let step = GenFn::new(Gen::new("masked_iterate_step", move |ctx, args| {
        let carry = args[0].at(0)?.clone();
        let stop = args[0].at(1)?.clone();
        let active = args[1].as_int()? < stop.as_int()?;
        let next = ctx.trace(Address::root(), &masked, &[Value::Bool(active), carry.clone()])?;
        let carry = if active { next } else { carry };
        Ok(Value::tuple([Value::tuple([carry, stop]), Value::Unit]))
    }));
    let steps: Vec<Value> = (0..n).map(Value::from).collect();
    GenFn::new(Scan::new(step, n))
        .contramap(move |args| {
            GenError::check_arity("masked_iterate_final", args.len(), 2)?;
            Ok(vec![
                Value::tuple([args[0].clone(), Value::Int(args[1].as_int()?)]),
                Value::Array(steps.clone()),
            ])
        })
        .map(|r| Ok(r.at(0)?.at(0)?.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::normal;
    use approx::assert_abs_diff_eq;
    use genfn_core::addr;

    /// Gaussian random walk: carry' ~ N(carry, 1), y = carry'.
    fn walk_step() -> GenFn {
        let n = normal();
        GenFn::new(Gen::new("walk", move |ctx, args| {
            let next = ctx.trace("z", &n, &[args[0].clone(), Value::Real(1.0)])?;
            Ok(Value::tuple([next.clone(), next]))
        }))
    }

    #[test]
    fn test_scan_indexed_choices() {
        let scan = GenFn::new(Scan::new(walk_step(), 5));
        let t = scan.simulate(Key::new(0), &[Value::Real(0.0), Value::Unit]).unwrap();
        assert_eq!(t.choices.indices(), vec![0, 1, 2, 3, 4]);
        let ys = t.retval.at(1).unwrap().as_reals().unwrap();
        let last = t.get(&addr![4, "z"]).unwrap().as_real().unwrap();
        assert_eq!(ys[4], last);
        assert_eq!(t.retval.at(0).unwrap().as_real().unwrap(), last);
    }

    #[test]
    fn test_scan_input_length_mismatch() {
        let scan = GenFn::new(Scan::new(walk_step(), 3));
        let err = scan
            .simulate(Key::new(0), &[Value::Real(0.0), Value::reals([1.0, 2.0])])
            .unwrap_err();
        assert!(matches!(err, GenError::StructuralMismatch { .. }));
    }

    #[test]
    fn test_scan_assess_matches_simulate() {
        let scan = GenFn::new(Scan::new(walk_step(), 4));
        let args = [Value::Real(1.0), Value::Unit];
        let t = scan.simulate(Key::new(2), &args).unwrap();
        let (s, r) = scan.assess(Key::new(9), &t.choices, &args).unwrap();
        assert_abs_diff_eq!(s, t.score, epsilon = 1e-12);
        assert!(r.bitwise_eq(&t.retval));
    }

    #[test]
    fn test_scan_assess_missing_step() {
        let scan = GenFn::new(Scan::new(walk_step(), 4));
        let args = [Value::Real(1.0), Value::Unit];
        let t = scan.simulate(Key::new(2), &args).unwrap();
        let partial = t.choices.restrict(&genfn_core::Selection::at(addr![2]));
        let err = scan.assess(Key::new(0), &partial, &args).unwrap_err();
        assert_eq!(err.missing_address(), Some(&addr![2, "z"]));
    }

    #[test]
    fn test_scan_update_shares_reused_steps() {
        let scan = GenFn::new(Scan::new(walk_step(), 6));
        let args = [Value::Real(0.0), Value::Unit];
        let t = scan.simulate(Key::new(5), &args).unwrap();
        let constraint = ChoiceMap::new().with(addr![4, "z"], 0.25);
        let r = scan
            .update(Key::new(6), &t, &constraint, &genfn_core::diff::no_change_all(&args))
            .unwrap();

        let step = |trace: &Trace, i: usize| Arc::clone(trace.shared_subtrace(&Address::from(i)).unwrap());
        for i in 0..4 {
            assert!(Arc::ptr_eq(&step(&t, i), &step(&r.trace, i)));
        }
        assert!(!Arc::ptr_eq(&step(&t, 4), &step(&r.trace, 4)));
        assert!(!Arc::ptr_eq(&step(&t, 5), &step(&r.trace, 5)));
    }

    #[test]
    fn test_repeat() {
        let r = normal().repeat(3);
        let t = r.simulate(Key::new(0), &[Value::Real(0.0), Value::Real(1.0)]).unwrap();
        assert_eq!(t.retval.extent().unwrap(), 3);
        assert_eq!(t.choices.indices(), vec![0, 1, 2]);
        let xs = t.retval.as_reals().unwrap();
        assert_eq!(t.get(&addr![1]), Some(&Value::Real(xs[1])));
    }

    #[test]
    fn test_iterate_final() {
        let step = normal().contramap(|args| Ok(vec![args[0].clone(), Value::Real(1.0)]));
        let it = iterate_final(step, 4);
        let t = it.simulate(Key::new(0), &[Value::Real(0.0)]).unwrap();
        assert_eq!(t.retval, *t.get(&addr![3]).unwrap());
    }

    #[test]
    fn test_masked_iterate_final_gates_late_steps() {
        let step = normal().contramap(|args| Ok(vec![args[0].clone(), Value::Real(1.0)]));
        let it = masked_iterate_final(step, 5);
        let t = it.simulate(Key::new(0), &[Value::Real(0.0), Value::Int(2)]).unwrap();

        // Five steps exist, two are valid.
        assert_eq!(t.choices.indices(), vec![0, 1, 2, 3, 4]);
        assert_eq!(t.choices.num_choices(), 2);
        assert_eq!(t.retval, *t.get(&addr![1]).unwrap());

        let valid: f64 = (0..2)
            .map(|i| {
                let sub = t.inner().unwrap().inner().unwrap();
                sub.subtrace(&Address::from(i)).unwrap().score
            })
            .sum();
        assert_abs_diff_eq!(t.score, valid, epsilon = 1e-12);
    }
}
