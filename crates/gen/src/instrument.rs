//! # Compile-Time Instrumentation
//!
//! [`Instrumented`] wraps a generative function and reports every
//! interface call. Whether it does anything is decided at compile time by a
//! const generic:
//!
//! - `Instrumented<false>`: every operation forwards to the inner function.
//!   Nothing is timed and nothing is recorded.
//! - `Instrumented<true>`: every operation runs inside a `tracing` span,
//!   is timed, and is appended to an in-memory log of [`OpRecord`]s.
//!
//! [`AutoInstrumented`] picks `true` in debug builds and `false` in release
//! builds.
//!
//! ```rust
//! use genfn::{normal, GenFn, Instrumented};
//! use genfn_core::{Key, Value};
//!
//! let watched = Instrumented::<true>::new(normal());
//! let handle = GenFn::new(watched.clone());
//! handle.simulate(Key::new(0), &[Value::Real(0.0), Value::Real(1.0)]).unwrap();
//! assert_eq!(watched.records()[0].op, "simulate");
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use genfn_core::{ChoiceMap, Diff, Key, Value};
use tracing::{debug, debug_span};

use crate::error::GenError;
use crate::gfi::{GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

/// One recorded interface call.
#[derive(Debug, Clone, PartialEq)]
pub struct OpRecord {
    /// Which operation ran.
    pub op: &'static str,
    /// Name of the instrumented generative function.
    pub gen_fn: String,
    /// Wall-clock time of the call.
    pub duration: Duration,
    /// The weight or score the call produced, if it succeeded.
    pub weight: Option<f64>,
}

impl fmt::Display for OpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}.{}", self.duration, self.gen_fn, self.op)?;
        if let Some(w) = self.weight {
            write!(f, " weight={w:.4}")?;
        }
        Ok(())
    }
}

/// A generative function whose calls are (or are not) instrumented.
#[derive(Debug, Clone)]
pub struct Instrumented<const ENABLED: bool> {
    inner: GenFn,
    log: Arc<Mutex<Vec<OpRecord>>>,
}

impl<const ENABLED: bool> Instrumented<ENABLED> {
    pub fn new(inner: GenFn) -> Self {
        Self {
            inner,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn inner(&self) -> &GenFn {
        &self.inner
    }

    pub fn into_inner(self) -> GenFn {
        self.inner
    }
}

impl Instrumented<true> {
    /// Every call recorded so far, oldest first. Clones share the log.
    pub fn records(&self) -> Vec<OpRecord> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    fn observe<T>(
        &self,
        op: &'static str,
        weight: impl Fn(&T) -> f64,
        call: impl FnOnce() -> Result<T, GenError>,
    ) -> Result<T, GenError> {
        let name = self.inner.name().to_string();
        let span = debug_span!("gfi", op, gen_fn = %name);
        let _enter = span.enter();

        let start = Instant::now();
        let result = call();
        let duration = start.elapsed();
        let w = result.as_ref().ok().map(&weight);
        match &result {
            Ok(_) => debug!(elapsed_us = duration.as_micros() as u64, weight = w, "done"),
            Err(e) => debug!(elapsed_us = duration.as_micros() as u64, error = %e, "failed"),
        }

        if let Ok(mut log) = self.log.lock() {
            log.push(OpRecord {
                op,
                gen_fn: name,
                duration,
                weight: w,
            });
        }
        result
    }
}

/// Instrumentation on in debug builds.
#[cfg(debug_assertions)]
pub type AutoInstrumented = Instrumented<true>;

/// Instrumentation off in release builds.
#[cfg(not(debug_assertions))]
pub type AutoInstrumented = Instrumented<false>;

// ============================================================================
// Disabled: forward
// ============================================================================

impl GenerativeFunction for Instrumented<false> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        self.inner.simulate(key, args)
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        self.inner.importance(key, constraint, args)
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        self.inner.update(key, trace, constraint, argdiffs)
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        self.inner.assess(key, choices, args)
    }
}

// ============================================================================
// Enabled: span, time, record
// ============================================================================

impl GenerativeFunction for Instrumented<true> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        self.observe("simulate", |t: &Trace| t.score, || self.inner.simulate(key, args))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        self.observe(
            "importance",
            |(_, w): &(Trace, f64)| *w,
            || self.inner.importance(key, constraint, args),
        )
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        self.observe(
            "update",
            |r: &UpdateResult| r.weight,
            || self.inner.update(key, trace, constraint, argdiffs),
        )
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        self.observe(
            "assess",
            |(s, _): &(f64, Value)| *s,
            || self.inner.assess(key, choices, args),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::normal;
    use genfn_core::diff::no_change_all;

    fn args() -> [Value; 2] {
        [Value::Real(0.0), Value::Real(1.0)]
    }

    #[test]
    fn test_disabled_is_transparent() {
        let plain = normal().simulate(Key::new(4), &args()).unwrap();
        let wrapped = GenFn::new(Instrumented::<false>::new(normal()));
        let t = wrapped.simulate(Key::new(4), &args()).unwrap();
        assert_eq!(t.score, plain.score);
        assert_eq!(t.choices, plain.choices);
    }

    #[test]
    fn test_enabled_records_every_call() {
        let watched = Instrumented::<true>::new(normal());
        let g = GenFn::new(watched.clone());
        let (t, w) = g.importance(Key::new(0), &ChoiceMap::leaf(0.3), &args()).unwrap();
        g.update(Key::new(1), &t, &ChoiceMap::leaf(0.1), &no_change_all(&args()))
            .unwrap();
        assert!(g.simulate(Key::new(0), &[]).is_err());

        let records = watched.records();
        let ops: Vec<_> = records.iter().map(|r| r.op).collect();
        assert_eq!(ops, vec!["importance", "update", "simulate"]);
        assert_eq!(records[0].weight, Some(w));
        assert_eq!(records[2].weight, None);
        assert!(records[0].to_string().contains("importance"));

        watched.clear();
        assert!(watched.records().is_empty());
    }
}
