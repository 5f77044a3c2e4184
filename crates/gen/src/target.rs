//! Posterior targets.
//!
//! A [`Target`] names an unnormalised posterior: a generative function, its
//! arguments, and the observations it is conditioned on. Inference
//! algorithms live elsewhere; this is the record they consume.

use genfn_core::{ChoiceMap, Key, Value};

use crate::error::GenError;
use crate::gfi::GenFn;
use crate::trace::Trace;

/// `p(latents | observations)` for one model call.
#[derive(Debug, Clone)]
pub struct Target {
    pub gen_fn: GenFn,
    pub args: Vec<Value>,
    pub constraint: ChoiceMap,
}

impl Target {
    pub fn new(gen_fn: GenFn, args: Vec<Value>, constraint: ChoiceMap) -> Self {
        Self {
            gen_fn,
            args,
            constraint,
        }
    }

    /// A trace agreeing with the observations, latents from the internal
    /// proposal.
    pub fn importance(&self, key: Key) -> Result<(Trace, f64), GenError> {
        self.gen_fn.importance(key, &self.constraint, &self.args)
    }

    /// Unnormalised log posterior density of `latents`.
    pub fn log_density(&self, key: Key, latents: &ChoiceMap) -> Result<f64, GenError> {
        let choices = latents.clone().merge(self.constraint.clone());
        let (score, _) = self.gen_fn.assess(key, &choices, &self.args)?;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::Gen;
    use crate::primitive::normal;
    use approx::assert_abs_diff_eq;
    use genfn_core::Address;

    #[test]
    fn test_target_weight_matches_density() {
        let n = normal();
        let model = GenFn::new(Gen::new("obs", move |ctx, _| {
            let x = ctx.trace("x", &n, &[Value::Real(0.0), Value::Real(1.0)])?;
            ctx.trace("y", &n, &[x, Value::Real(1.0)])
        }));
        let target = Target::new(model, vec![], ChoiceMap::new().with("y", 1.5));
        let (t, _) = target.importance(Key::new(0)).unwrap();
        assert_eq!(t.get(&Address::from("y")), Some(&Value::Real(1.5)));

        let latents = t.choices.restrict(&genfn_core::Selection::at("y"));
        let d = target.log_density(Key::new(0), &latents).unwrap();
        assert_abs_diff_eq!(d, t.score, epsilon = 1e-12);
    }
}
