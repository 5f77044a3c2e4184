//! # Primitives - Distributions as Generative Functions
//!
//! A [`Primitive`] makes one random choice at the root address. It adapts
//! either distribution capability:
//!
//! - exact (`sample`, `logpdf`): scores are exact log densities
//! - estimator (`random_weighted`, `estimate_logpdf`): scores are unbiased
//!   log-space estimates
//!
//! `update` follows the three per-choice rules:
//!
//! 1. constrained: take the new value, weight `logpdf(new; θ') - logpdf(old; θ)`,
//!    discard the old value
//! 2. unconstrained, parameters unchanged: keep the value, weight 0
//! 3. unconstrained, parameters changed: keep the value, weight
//!    `logpdf(old; θ') - logpdf(old; θ)`

use std::sync::{Arc, OnceLock};

use genfn_core::diff::{all_unchanged, values};
use genfn_core::{Address, ChoiceMap, Diff, Key, Value};
use genfn_prob::{
    Bernoulli, Beta, Categorical, Distribution, EstimatorDistribution, Exponential, Flip, Normal,
    Uniform,
};

use crate::error::GenError;
use crate::gfi::{weight_delta, GenFn, GenerativeFunction, UpdateResult};
use crate::trace::Trace;

/// The capability a primitive samples and scores through.
#[derive(Debug, Clone)]
pub enum Sampler {
    Exact(Arc<dyn Distribution>),
    Estimator(Arc<dyn EstimatorDistribution>),
}

/// A single random choice.
#[derive(Debug, Clone)]
pub struct Primitive {
    sampler: Sampler,
}

impl Primitive {
    /// A primitive over an exact distribution.
    pub fn exact(dist: impl Distribution + 'static) -> Self {
        Self {
            sampler: Sampler::Exact(Arc::new(dist)),
        }
    }

    /// A primitive over an estimator-based distribution.
    pub fn estimator(dist: impl EstimatorDistribution + 'static) -> Self {
        Self {
            sampler: Sampler::Estimator(Arc::new(dist)),
        }
    }

    fn draw(&self, key: Key, args: &[Value]) -> Result<(Value, f64), GenError> {
        match &self.sampler {
            Sampler::Exact(d) => {
                let v = d.sample(key, args)?;
                let score = d.logpdf(&v, args)?;
                Ok((v, score))
            }
            Sampler::Estimator(d) => {
                let (w, v) = d.random_weighted(key, args)?;
                Ok((v, -w))
            }
        }
    }

    fn score(&self, key: Key, v: &Value, args: &[Value]) -> Result<f64, GenError> {
        Ok(match &self.sampler {
            Sampler::Exact(d) => d.logpdf(v, args)?,
            Sampler::Estimator(d) => d.estimate_logpdf(key, v, args)?,
        })
    }

    /// The constrained value, if any. A constraint below the root address
    /// cannot apply to a single choice.
    fn constrained<'c>(&self, constraint: &'c ChoiceMap) -> Result<Option<&'c Value>, GenError> {
        match constraint.unmask() {
            ChoiceMap::Branch(_) | ChoiceMap::Indexed(_) if constraint.num_choices() > 0 => {
                Err(GenError::structural(format!(
                    "{} is a single choice but was constrained below its address",
                    self.name()
                )))
            }
            _ => Ok(constraint.value()),
        }
    }
}

impl GenerativeFunction for Primitive {
    fn name(&self) -> &str {
        match &self.sampler {
            Sampler::Exact(d) => d.name(),
            Sampler::Estimator(d) => d.name(),
        }
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        let (v, score) = self.draw(key, args)?;
        Ok(Trace::leaf(args.to_vec(), ChoiceMap::Leaf(v.clone()), v, score))
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        match self.constrained(constraint)? {
            Some(v) => {
                let score = self.score(key, v, args)?;
                let trace = Trace::leaf(args.to_vec(), ChoiceMap::Leaf(v.clone()), v.clone(), score);
                Ok((trace, score))
            }
            None => Ok((self.simulate(key, args)?, 0.0)),
        }
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        let args = values(argdiffs);
        let old = &trace.retval;
        match self.constrained(constraint)? {
            Some(v) => {
                let score = self.score(key, v, &args)?;
                Ok(UpdateResult {
                    trace: Trace::leaf(args, ChoiceMap::Leaf(v.clone()), v.clone(), score),
                    weight: weight_delta(score, trace.score),
                    retdiff: Diff::between(old, v.clone()),
                    discard: ChoiceMap::Leaf(old.clone()),
                })
            }
            None if all_unchanged(argdiffs) => Ok(UpdateResult {
                trace: trace.clone(),
                weight: 0.0,
                retdiff: Diff::no_change(old.clone()),
                discard: ChoiceMap::Empty,
            }),
            None => {
                let score = self.score(key, old, &args)?;
                Ok(UpdateResult {
                    trace: Trace::leaf(args, ChoiceMap::Leaf(old.clone()), old.clone(), score),
                    weight: weight_delta(score, trace.score),
                    retdiff: Diff::no_change(old.clone()),
                    discard: ChoiceMap::Empty,
                })
            }
        }
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        let v = self
            .constrained(choices)?
            .ok_or_else(|| GenError::missing(Address::root()))?;
        Ok((self.score(key, v, args)?, v.clone()))
    }
}

// Each constructor hands out one shared handle, so that a model body
// calling `normal()` inline still updates its sub-trace in place.
macro_rules! shared_primitive {
    ($(#[$doc:meta])* $name:ident => $dist:expr) => {
        $(#[$doc])*
        pub fn $name() -> GenFn {
            static HANDLE: OnceLock<GenFn> = OnceLock::new();
            HANDLE
                .get_or_init(|| GenFn::new(Primitive::exact($dist)))
                .clone()
        }
    };
}

shared_primitive!(
    /// `normal(mean, std_dev)`
    normal => Normal
);
shared_primitive!(
    /// `uniform(low, high)`
    uniform => Uniform
);
shared_primitive!(
    /// `flip(p)`
    flip => Flip
);
shared_primitive!(
    /// `bernoulli(logit)`
    bernoulli => Bernoulli
);
shared_primitive!(
    /// `categorical(logits)`
    categorical => Categorical
);
shared_primitive!(
    /// `beta(alpha, beta)`
    beta => Beta
);
shared_primitive!(
    /// `exponential(rate)`
    exponential => Exponential
);
