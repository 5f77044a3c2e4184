//! Finite mixtures.
//!
//! A [`Mixture`] first draws a component index from a categorical over the
//! given logits, then runs that component through a [`Switch`]. Both
//! choices are ordinary addresses:
//!
//! - [`MIXTURE_COMPONENT_ADDR`]: the component index (`Int`)
//! - [`MIXTURE_SAMPLE_ADDR`]: the choices of the selected component
//!
//! Arguments are `[logits, args_0, ..., args_{K-1}]`, each `args_k` a
//! `Tuple`. The score is the joint `log p(k) + log p(x | k)`.

use genfn_core::{ChoiceMap, Diff, Key, Value};

use crate::combinators::switch::Switch;
use crate::dynamic::Gen;
use crate::error::GenError;
use crate::gfi::{GenFn, GenerativeFunction, UpdateResult};
use crate::primitive::categorical;
use crate::trace::Trace;

/// Address of the component index.
pub const MIXTURE_COMPONENT_ADDR: &str = "mixture_component";

/// Address of the selected component's choices.
pub const MIXTURE_SAMPLE_ADDR: &str = "component_sample";

/// Choose a component by logits, then sample from it.
#[derive(Debug, Clone)]
pub struct Mixture {
    components: usize,
    model: GenFn,
}

impl Mixture {
    /// # Errors
    ///
    /// Returns a structural error if `components` is empty.
    pub fn new(components: Vec<GenFn>) -> Result<Self, GenError> {
        let k = components.len();
        let switch = GenFn::new(Switch::new(components)?);
        let pick = categorical();
        let model = GenFn::new(Gen::new("mixture", move |ctx, args| {
            let idx = ctx.trace(MIXTURE_COMPONENT_ADDR, &pick, &args[..1])?;
            let mut branch_args = Vec::with_capacity(args.len());
            branch_args.push(idx);
            branch_args.extend_from_slice(&args[1..]);
            ctx.trace(MIXTURE_SAMPLE_ADDR, &switch, &branch_args)
        }));
        Ok(Self {
            components: k,
            model,
        })
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components == 0
    }

    fn check(&self, args: &[Value]) -> Result<(), GenError> {
        GenError::check_arity("mixture", args.len(), self.components + 1)?;
        let logits = args[0].as_array()?.len();
        if logits != self.components {
            return Err(GenError::structural(format!(
                "mixture of {} components given {logits} logits",
                self.components
            )));
        }
        Ok(())
    }
}

impl GenerativeFunction for Mixture {
    fn name(&self) -> &str {
        "mixture"
    }

    fn simulate(&self, key: Key, args: &[Value]) -> Result<Trace, GenError> {
        self.check(args)?;
        self.model.simulate(key, args)
    }

    fn importance(
        &self,
        key: Key,
        constraint: &ChoiceMap,
        args: &[Value],
    ) -> Result<(Trace, f64), GenError> {
        self.check(args)?;
        self.model.importance(key, constraint, args)
    }

    fn update(
        &self,
        key: Key,
        trace: &Trace,
        constraint: &ChoiceMap,
        argdiffs: &[Diff],
    ) -> Result<UpdateResult, GenError> {
        self.check(&genfn_core::diff::values(argdiffs))?;
        self.model.update(key, trace, constraint, argdiffs)
    }

    fn assess(
        &self,
        key: Key,
        choices: &ChoiceMap,
        args: &[Value],
    ) -> Result<(f64, Value), GenError> {
        self.check(args)?;
        self.model.assess(key, choices, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::normal;
    use approx::assert_abs_diff_eq;
    use genfn_core::Address;
    use genfn_prob::math::log_softmax;
    use genfn_prob::normal_logpdf;

    fn two_normals() -> GenFn {
        GenFn::new(Mixture::new(vec![normal(), normal()]).unwrap())
    }

    fn args() -> Vec<Value> {
        vec![
            Value::reals([0.0, 1.0]),
            Value::tuple([Value::Real(-5.0), Value::Real(1.0)]),
            Value::tuple([Value::Real(5.0), Value::Real(1.0)]),
        ]
    }

    #[test]
    fn test_mixture_addresses() {
        let t = two_normals().simulate(Key::new(0), &args()).unwrap();
        let k = t.get(&Address::from(MIXTURE_COMPONENT_ADDR)).unwrap().as_index().unwrap();
        let x = t.get(&Address::from(MIXTURE_SAMPLE_ADDR)).unwrap().as_real().unwrap();
        assert_eq!(t.retval, Value::Real(x));
        assert!(k < 2);
    }

    #[test]
    fn test_mixture_joint_score() {
        let m = two_normals();
        let choices = ChoiceMap::new()
            .with(MIXTURE_COMPONENT_ADDR, 1)
            .with(MIXTURE_SAMPLE_ADDR, 4.0);
        let (s, x) = m.assess(Key::new(0), &choices, &args()).unwrap();
        let lp = log_softmax(&[0.0, 1.0]);
        assert_abs_diff_eq!(s, lp[1] + normal_logpdf(4.0, 5.0, 1.0), epsilon = 1e-12);
        assert_eq!(x, Value::Real(4.0));
    }

    #[test]
    fn test_mixture_logit_count() {
        let m = two_normals();
        let mut a = args();
        a[0] = Value::reals([0.0, 1.0, 2.0]);
        let err = m.simulate(Key::new(0), &a).unwrap_err();
        assert!(matches!(err, GenError::StructuralMismatch { .. }));
    }
}
