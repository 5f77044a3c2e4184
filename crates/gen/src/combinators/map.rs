//! Pure transforms around a generative function.
//!
//! - [`Map`] post-processes the return value
//! - [`Contramap`] pre-processes the arguments
//!
//! Neither adds addresses: the choices and score are the inner call's.

use std::fmt;
use std::sync::Arc;

use genfn_core::diff::{diff_args, values};
use genfn_core::{ChoiceMap, Diff, Key, Value};

use crate::error::GenError;
use crate::gfi::{GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

type RetFn = dyn Fn(&Value) -> Result<Value, GenError> + Send + Sync;
type ArgFn = dyn Fn(&[Value]) -> Result<Vec<Value>, GenError> + Send + Sync;

/// Apply a function to the return value of `inner`.
#[derive(Clone)]
pub struct Map {
    inner: GenFn,
    f: Arc<RetFn>,
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map").field("inner", &self.inner).finish()
    }
}

impl Map {
    pub fn new<F>(inner: GenFn, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, GenError> + Send + Sync + 'static,
    {
        Self {
            inner,
            f: Arc::new(f),
        }
    }
}

impl GenerativeFunction for Map {
    fn name(&self) -> &str {
        "map"
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let inner = self.inner.simulate(key, args)?;
        let retval = (self.f)(&inner.retval)?;
        Ok(Trace::wrap(inner, args.to_vec(), retval))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let (inner, w) = self.inner.importance(key, constraint, args)?;
        let retval = (self.f)(&inner.retval)?;
        Ok((Trace::wrap(inner, args.to_vec(), retval), w))
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let r = self.inner.update(key, trace.inner()?, constraint, argdiffs)?;
        let (retval, retdiff) = if r.retdiff.is_unchanged() {
            (trace.retval.clone(), Diff::no_change(trace.retval.clone()))
        } else {
            let retval = (self.f)(&r.trace.retval)?;
            (retval.clone(), Diff::between(&trace.retval, retval))
        };
        Ok(UpdateResult {
            trace: Trace::wrap(r.trace, values(argdiffs), retval),
            weight: r.weight,
            retdiff,
            discard: r.discard,
        })
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        let (score, retval) = self.inner.assess(key, choices, args)?;
        Ok((score, (self.f)(&retval)?))
    }
}

/// Apply a function to the arguments before calling `inner`.
#[derive(Clone)]
pub struct Contramap {
    inner: GenFn,
    f: Arc<ArgFn>,
}

impl fmt::Debug for Contramap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contramap").field("inner", &self.inner).finish()
    }
}

impl Contramap {
    pub fn new<F>(inner: GenFn, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, GenError> + Send + Sync + 'static,
    {
        Self {
            inner,
            f: Arc::new(f),
        }
    }
}

impl GenerativeFunction for Contramap {
    fn name(&self) -> &str {
        "contramap"
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let inner = self.inner.simulate(key, &(self.f)(args)?)?;
        let retval = inner.retval.clone();
        Ok(Trace::wrap(inner, args.to_vec(), retval))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        let (inner, w) = self.inner.importance(key, constraint, &(self.f)(args)?)?;
        let retval = inner.retval.clone();
        Ok((Trace::wrap(inner, args.to_vec(), retval), w))
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let old_inner = trace.inner()?;
        let args = values(argdiffs);
        let inner_diffs = diff_args(&old_inner.args, &(self.f)(&args)?);
        let r = self.inner.update(key, old_inner, constraint, &inner_diffs)?;
        let retval = r.trace.retval.clone();
        Ok(UpdateResult {
            trace: Trace::wrap(r.trace, args, retval),
            weight: r.weight,
            retdiff: r.retdiff,
            discard: r.discard,
        })
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        self.inner.assess(key, choices, &(self.f)(args)?)
    }
}
