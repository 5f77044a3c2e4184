//! # Dynamic Generative Functions
//!
//! [`Gen`] turns ordinary Rust code into a generative function. The body
//! is a closure that receives a [`Context`] and makes every random choice
//! through [`Context::trace`]:
//!
//! ```rust
//! use genfn::{normal, Gen, GenFn};
//! use genfn_core::{Key, Value};
//!
//! let model = GenFn::new(Gen::new("two_gaussians", |ctx, _args| {
//!     let x = ctx.trace("x", &normal(), &[Value::Real(0.0), Value::Real(1.0)])?;
//!     ctx.trace("y", &normal(), &[x, Value::Real(1.0)])
//! }));
//!
//! let trace = model.simulate(Key::new(0), &[]).unwrap();
//! assert_eq!(trace.choices.num_choices(), 2);
//! ```
//!
//! The context is the handler: the same body runs under simulate,
//! importance, assess and update, and the context decides what `trace`
//! means in each mode. Nothing is global.
//!
//! ## Update
//!
//! In update mode, each sub-call at an address the old trace also visited
//! with the same generative function is updated in place: argument diffs
//! are derived by comparing the new arguments with the recorded ones, so
//! untouched sub-calls cost nothing. Addresses visited for the first time
//! are generated by importance. Addresses the old trace visited but the new
//! run does not are discarded and their score leaves the weight. A sub-call
//! that reaches an old address through a different generative function
//! counts as both: the old choices are discarded and the new call is
//! generated from scratch.
//!
//! Sub-calls are matched by handle, so keep one [`GenFn`] per sub-model
//! (the distribution constructors such as [`normal`](crate::normal)
//! already return a shared handle).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use genfn_core::diff::{all_unchanged, diff_args};
use genfn_core::{Address, ChoiceMap, CoreError, Diff, Key, Value};

use crate::error::GenError;
use crate::gfi::{GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

type Body = dyn Fn(&mut Context<'_>, &[Value]) -> Result<Value, GenError> + Send + Sync;

/// A generative function defined by a closure.
#[derive(Clone)]
pub struct Gen {
    name: String,
    body: Arc<Body>,
}

impl fmt::Debug for Gen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gen").field("name", &self.name).finish()
    }
}

impl Gen {
    /// Create a generative function from a body.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Context<'_>, &[Value]) -> Result<Value, GenError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    fn run<'a>(&self, mut ctx: Context<'a>, args: &[Value]) -> Result<(Context<'a>, Value), GenError> {
        let retval = (self.body)(&mut ctx, args)?;
        Ok((ctx, retval))
    }
}

enum Mode<'a> {
    Simulate,
    Importance { constraint: &'a ChoiceMap },
    Assess { choices: &'a ChoiceMap },
    Update {
        old: &'a Trace,
        constraint: &'a ChoiceMap,
    },
}

/// The handler a [`Gen`] body makes its random choices through.
pub struct Context<'a> {
    mode: Mode<'a>,
    key: Key,
    calls: u64,
    visited: BTreeSet<Address>,
    choices: ChoiceMap,
    subtraces: BTreeMap<Address, Arc<Trace>>,
    score: f64,
    weight: f64,
    discard: ChoiceMap,
}

impl<'a> Context<'a> {
    fn new(mode: Mode<'a>, key: Key) -> Self {
        Self {
            mode,
            key,
            calls: 0,
            visited: BTreeSet::new(),
            choices: ChoiceMap::Empty,
            subtraces: BTreeMap::new(),
            score: 0.0,
            weight: 0.0,
            discard: ChoiceMap::Empty,
        }
    }

    /// Call `gen_fn` on `args` at `addr` and return its value.
    ///
    /// # Errors
    ///
    /// - `ConflictingAddress` if `addr` (or a prefix or extension of it) was
    ///   already visited in this run
    /// - any error of the sub-call, with its addresses prefixed by `addr`
    pub fn trace(
        &mut self,
        addr: impl Into<Address>,
        gen_fn: &GenFn,
        args: &[Value],
    ) -> Result<Value, GenError> {
        let addr = addr.into();
        self.visit(&addr)?;
        let key = self.key.fold_in(self.calls);
        self.calls += 1;
        self.dispatch(key, &addr, gen_fn, args)
            .map_err(|e| e.within_address(&addr))
    }

    fn visit(&mut self, addr: &Address) -> Result<(), GenError> {
        let clash = self
            .visited
            .iter()
            .any(|seen| seen.starts_with(addr) || addr.starts_with(seen));
        if clash {
            return Err(CoreError::ConflictingAddress {
                address: addr.clone(),
            }
            .into());
        }
        self.visited.insert(addr.clone());
        Ok(())
    }

    fn dispatch(
        &mut self,
        key: Key,
        addr: &Address,
        gen_fn: &GenFn,
        args: &[Value],
    ) -> Result<Value, GenError> {
        match self.mode {
            Mode::Simulate => {
                let t = gen_fn.simulate(key, args)?;
                Ok(self.record(addr, t))
            }
            Mode::Importance { constraint } => {
                let (t, w) = gen_fn.importance(key, &constraint.get_submap(addr), args)?;
                self.weight += w;
                Ok(self.record(addr, t))
            }
            Mode::Assess { choices } => {
                let (s, retval) = gen_fn.assess(key, &choices.get_submap(addr), args)?;
                self.score += s;
                Ok(retval)
            }
            Mode::Update { old, constraint } => {
                let sub_constraint = constraint.get_submap(addr);
                match old.shared_subtrace(addr) {
                    Some(prev) if same_gen_fn(prev, gen_fn) => {
                        let argdiffs = diff_args(&prev.args, args);
                        if prev.args.len() == args.len()
                            && all_unchanged(&argdiffs)
                            && sub_constraint.num_choices() == 0
                        {
                            return Ok(self.record_shared(addr, Arc::clone(prev)));
                        }
                        let UpdateResult {
                            trace,
                            weight,
                            discard,
                            ..
                        } = gen_fn.update(key, prev, &sub_constraint, &argdiffs)?;
                        self.weight += weight;
                        if !discard.is_empty() {
                            self.discard.insert_submap(addr, discard);
                        }
                        Ok(self.record(addr, trace))
                    }
                    Some(prev) => {
                        tracing::trace!(
                            address = %addr,
                            gen_fn = gen_fn.name(),
                            "generative function changed in update"
                        );
                        self.weight -= prev.score;
                        if !prev.choices.is_empty() {
                            self.discard.insert_submap(addr, prev.choices.clone());
                        }
                        let (t, w) = gen_fn.importance(key, &sub_constraint, args)?;
                        self.weight += w;
                        Ok(self.record(addr, t))
                    }
                    None => {
                        tracing::trace!(address = %addr, "new address in update");
                        let (t, w) = gen_fn.importance(key, &sub_constraint, args)?;
                        self.weight += w;
                        Ok(self.record(addr, t))
                    }
                }
            }
        }
    }

    fn record(&mut self, addr: &Address, t: Trace) -> Value {
        self.record_shared(addr, Arc::new(t))
    }

    fn record_shared(&mut self, addr: &Address, t: Arc<Trace>) -> Value {
        let retval = t.retval.clone();
        self.score += t.score;
        self.choices.insert_submap(addr, t.choices.clone());
        self.subtraces.insert(addr.clone(), t);
        retval
    }

    fn into_trace(self, args: &[Value], retval: Value) -> Trace {
        Trace {
            gen_fn: None,
            args: args.to_vec(),
            choices: self.choices,
            retval,
            score: self.score,
            subtraces: self.subtraces,
        }
    }
}

/// Whether `prev` was produced by `gen_fn`.
fn same_gen_fn(prev: &Trace, gen_fn: &GenFn) -> bool {
    prev.gen_fn.as_ref().is_some_and(|g| g.ptr_eq(gen_fn))
}

impl GenerativeFunction for Gen {
    fn name(&self) -> &str {
        &self.name
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let (ctx, retval) = self.run(Context::new(Mode::Simulate, key), args)?;
        Ok(ctx.into_trace(args, retval))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let (ctx, retval) = self.run(Context::new(Mode::Importance { constraint }, key), args)?;
        let weight = ctx.weight;
        Ok((ctx.into_trace(args, retval), weight))
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let args = genfn_core::diff::values(argdiffs);
        let mode = Mode::Update {
            old: trace,
            constraint,
        };
        let (mut ctx, retval) = self.run(Context::new(mode, key), &args)?;

        for (addr, old_sub) in &trace.subtraces {
            if !ctx.visited.contains(addr) {
                tracing::trace!(address = %addr, "address dropped in update");
                ctx.weight -= old_sub.score;
                ctx.discard.insert_submap(addr, old_sub.choices.clone());
            }
        }

        let weight = ctx.weight;
        let discard = std::mem::take(&mut ctx.discard);
        let retdiff = Diff::between(&trace.retval, retval.clone());
        Ok(UpdateResult {
            trace: ctx.into_trace(&args, retval),
            weight,
            retdiff,
            discard,
        })
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        let (ctx, retval) = self.run(Context::new(Mode::Assess { choices }, key), args)?;
        Ok((ctx.score, retval))
    }
}
