//! Marginal distributions of generative functions.
//!
//! [`Marginal`] turns the value at one address of a model into an
//! estimator-based distribution: the other choices are summed out by
//! sampling rather than exactly. Wrapped in [`Primitive::estimator`], it
//! can be traced like any other distribution.
//!
//! Density estimates are importance sampling over the other choices. By
//! default the model's own prior is the proposal; [`Marginal::with_proposal`]
//! installs a separate generative function, run on the same arguments,
//! whose choices fill in everything but the marginal address:
//!
//! `w_k = log p(rest_k, addr = v) - log q(rest_k)`, `rest_k ~ q`
//!
//! [`Primitive::estimator`]: crate::primitive::Primitive::estimator

use genfn_core::{Address, ChoiceMap, Key, Selection, Value};
use genfn_prob::math::log_mean_exp;
use genfn_prob::{EstimatorDistribution, ProbError};
use tracing::trace;

use crate::error::GenError;
use crate::gfi::GenFn;

/// Importance samples used by [`Marginal::estimate_logpdf`] unless set
/// with [`Marginal::with_particles`].
pub const DEFAULT_MARGINAL_PARTICLES: usize = 100;

/// The distribution of the value at `addr` when `gen_fn` runs on the
/// distribution's arguments.
#[derive(Debug, Clone)]
pub struct Marginal {
    gen_fn: GenFn,
    addr: Address,
    particles: usize,
    proposal: Option<GenFn>,
}

fn failed(e: GenError) -> ProbError {
    ProbError::EstimatorFailed {
        distribution: "marginal",
        reason: e.to_string(),
    }
}

impl Marginal {
    pub fn new(gen_fn: GenFn, addr: impl Into<Address>) -> Self {
        Self {
            gen_fn,
            addr: addr.into(),
            particles: DEFAULT_MARGINAL_PARTICLES,
            proposal: None,
        }
    }

    /// Number of importance samples per density estimate (at least one).
    pub fn with_particles(mut self, k: usize) -> Self {
        self.particles = k.max(1);
        self
    }

    /// Propose the other choices from `proposal` instead of the prior.
    pub fn with_proposal(mut self, proposal: GenFn) -> Self {
        self.proposal = Some(proposal);
        self
    }

    pub fn address(&self) -> &Address {
        &self.addr
    }

    /// One importance weight for `value`, with the rest drawn by `proposal`.
    fn proposal_weight(
        &self,
        proposal: &GenFn,
        key: Key,
        value: &Value,
        args: &[Value],
    ) -> Result<f64, GenError> {
        let [propose_key, assess_key] = key.split2();
        let (rest, q, _) = proposal.propose(propose_key, args)?;
        let choices = rest.merge(ChoiceMap::new().with(self.addr.clone(), value.clone()));
        let (p, _) = self.gen_fn.assess(assess_key, &choices, args)?;
        Ok(p - q)
    }
}

impl EstimatorDistribution for Marginal {
    fn name(&self) -> &'static str {
        "marginal"
    }

    /// Simulate the model and report the value at the address, weighted by
    /// the negated log density of that choice given the rest. With a
    /// proposal the weight is `log q(rest) - log p(rest, value)`.
    fn random_weighted(&self, key: Key, args: &[Value]) -> Result<(f64, Value), ProbError> {
        let t = self.gen_fn.simulate(key, args).map_err(failed)?;
        let value = t.require(&self.addr).map_err(failed)?.clone();
        if let Some(proposal) = &self.proposal {
            let rest = t.choices.restrict(&Selection::at(self.addr.clone()));
            let (q, _) = proposal
                .assess(key.fold_in(1), &rest, args)
                .map_err(failed)?;
            return Ok((q - t.score, value));
        }
        let local = t
            .find_subtrace(&self.addr)
            .map(|sub| sub.score)
            .ok_or_else(|| failed(GenError::missing(self.addr.clone())))?;
        Ok((-local, value))
    }

    /// Average the importance weights of `particles` runs constrained to
    /// `value` at the address.
    fn estimate_logpdf(&self, key: Key, value: &Value, args: &[Value]) -> Result<f64, ProbError> {
        let constraint = ChoiceMap::new().with(self.addr.clone(), value.clone());
        let weights = key
            .split(self.particles)
            .into_iter()
            .map(|k| {
                let w = match &self.proposal {
                    Some(proposal) => self.proposal_weight(proposal, k, value, args),
                    None => self.gen_fn.importance(k, &constraint, args).map(|(_, w)| w),
                };
                w.map_err(failed)
            })
            .collect::<Result<Vec<f64>, ProbError>>()?;
        let estimate = log_mean_exp(&weights);
        trace!(address = %self.addr, particles = self.particles, estimate, "marginal density");
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::Gen;
    use crate::primitive::{normal, Primitive};
    use approx::assert_abs_diff_eq;
    use genfn_prob::normal_logpdf;

    /// x ~ N(0, 1); y ~ N(x, 1). Marginally y ~ N(0, sqrt 2).
    fn chain() -> GenFn {
        let n = normal();
        GenFn::new(Gen::new("chain", move |ctx, _| {
            let x = ctx.trace("x", &n, &[Value::Real(0.0), Value::Real(1.0)])?;
            ctx.trace("y", &n, &[x, Value::Real(1.0)])
        }))
    }

    #[test]
    fn test_random_weighted_reports_local_score() {
        let m = Marginal::new(chain(), "y");
        let (w, v) = m.random_weighted(Key::new(0), &[]).unwrap();
        let t = chain().simulate(Key::new(0), &[]).unwrap();
        assert_eq!(v, *t.get(&Address::from("y")).unwrap());
        let x = t.get(&Address::from("x")).unwrap().as_real().unwrap();
        assert_abs_diff_eq!(w, -normal_logpdf(v.as_real().unwrap(), x, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_estimate_logpdf_close_to_exact() {
        let m = Marginal::new(chain(), "y").with_particles(4000);
        let est = m.estimate_logpdf(Key::new(1), &Value::Real(0.5), &[]).unwrap();
        assert!((est - normal_logpdf(0.5, 0.0, 2f64.sqrt())).abs() < 0.05);
    }

    #[test]
    fn test_missing_address_fails() {
        let m = Marginal::new(chain(), "z");
        let err = m.random_weighted(Key::new(0), &[]).unwrap_err();
        assert!(matches!(err, ProbError::EstimatorFailed { .. }));
    }

    #[test]
    fn test_marginal_as_primitive() {
        let p = GenFn::new(Primitive::estimator(Marginal::new(chain(), "y").with_particles(10)));
        let t = p.simulate(Key::new(2), &[]).unwrap();
        assert!(t.score.is_finite());
        assert!(matches!(t.choices, ChoiceMap::Leaf(Value::Real(_))));
    }

    /// Proposal for the chain's latent: `x ~ N(mean, 1)`.
    fn latent_proposal(mean: f64) -> GenFn {
        let n = normal();
        GenFn::new(Gen::new("latent_proposal", move |ctx, _| {
            ctx.trace("x", &n, &[Value::Real(mean), Value::Real(1.0)])
        }))
    }

    #[test]
    fn test_proposal_weight_single_particle() {
        let q = latent_proposal(0.25);
        let m = Marginal::new(chain(), "y")
            .with_proposal(q.clone())
            .with_particles(1);
        let key = Key::new(3);
        let est = m.estimate_logpdf(key, &Value::Real(0.5), &[]).unwrap();

        let [propose_key, _] = key.split(1)[0].split2();
        let (rest, _, _) = q.propose(propose_key, &[]).unwrap();
        let x = rest.get(&Address::from("x")).unwrap().as_real().unwrap();
        let expected =
            normal_logpdf(x, 0.0, 1.0) + normal_logpdf(0.5, x, 1.0) - normal_logpdf(x, 0.25, 1.0);
        assert_abs_diff_eq!(est, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_proposal_estimate_agrees_with_prior() {
        let v = Value::Real(0.5);
        let exact = normal_logpdf(0.5, 0.0, 2f64.sqrt());
        let prior = Marginal::new(chain(), "y")
            .with_particles(4000)
            .estimate_logpdf(Key::new(1), &v, &[])
            .unwrap();
        let guided = Marginal::new(chain(), "y")
            .with_proposal(latent_proposal(0.25))
            .with_particles(4000)
            .estimate_logpdf(Key::new(1), &v, &[])
            .unwrap();
        assert!((prior - exact).abs() < 0.05);
        assert!((guided - exact).abs() < 0.05);
    }

    #[test]
    fn test_random_weighted_with_prior_as_proposal() {
        let m = Marginal::new(chain(), "y").with_proposal(latent_proposal(0.0));
        let (w, v) = m.random_weighted(Key::new(0), &[]).unwrap();
        let t = chain().simulate(Key::new(0), &[]).unwrap();
        let x = t.get(&Address::from("x")).unwrap().as_real().unwrap();
        assert_abs_diff_eq!(w, -normal_logpdf(v.as_real().unwrap(), x, 1.0), epsilon = 1e-9);
    }
}
