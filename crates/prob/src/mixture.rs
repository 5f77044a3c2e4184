//! Finite mixtures with the component index marginalized out.
//!
//! Arguments are `[logits, args_0, ..., args_{K-1}]`, each `args_k` a
//! `Tuple` of the k-th component's arguments. The density is
//!
//! ```text
//! log p(v) = logsumexp_k( log_softmax(logits)_k + log p_k(v; args_k) )
//! ```

use std::sync::Arc;

use genfn_core::{Key, Value};
use rand::Rng;

use crate::distribution::{expect_arity, Distribution};
use crate::error::ProbError;
use crate::math::{inverse_transform, log_softmax, logsumexp, softmax};

/// A mixture of exact distributions.
#[derive(Debug, Clone)]
pub struct MixtureDistribution {
    components: Vec<Arc<dyn Distribution>>,
}

impl MixtureDistribution {
    /// Create a mixture over a fixed list of components.
    ///
    /// # Errors
    ///
    /// Returns an error if `components` is empty.
    pub fn new(components: Vec<Arc<dyn Distribution>>) -> Result<Self, ProbError> {
        if components.is_empty() {
            return Err(ProbError::invalid("components", "mixture cannot be empty"));
        }
        Ok(Self { components })
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false; a mixture has at least one component.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn split_args<'a>(&self, args: &'a [Value]) -> Result<(Vec<f64>, Vec<&'a [Value]>), ProbError> {
        let k = self.components.len();
        let args = expect_arity("mixture", args, k + 1)?;
        let logits = args[0].as_reals()?;
        if logits.len() != k {
            return Err(ProbError::invalid(
                "logits",
                format!("expected {k} logits, got {}", logits.len()),
            ));
        }
        let component_args = args[1..]
            .iter()
            .map(Value::as_tuple)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((logits, component_args))
    }
}

impl Distribution for MixtureDistribution {
    fn name(&self) -> &'static str {
        "mixture"
    }

    fn sample(&self, key: Key, args: &[Value]) -> Result<Value, ProbError> {
        let (logits, component_args) = self.split_args(args)?;
        let [pick, draw] = key.split2();
        let u: f64 = pick.rng().gen();
        let idx = inverse_transform(&softmax(&logits), u);
        self.components[idx].sample(draw, component_args[idx])
    }

    fn logpdf(&self, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let (logits, component_args) = self.split_args(args)?;
        let terms = log_softmax(&logits)
            .into_iter()
            .zip(&self.components)
            .zip(component_args)
            .map(|((lw, dist), a)| Ok(lw + dist.logpdf(value, a)?))
            .collect::<Result<Vec<f64>, ProbError>>()?;
        Ok(logsumexp(&terms))
    }
}
