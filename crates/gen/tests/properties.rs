//! Interface identities that every generative function must satisfy,
//! checked over a zoo of primitives, dynamic models and combinators.

use approx::assert_abs_diff_eq;
use genfn::{
    iterate_final, masked_iterate_final, normal, Batch, Gen, GenFn, Marginal, Mixture, Primitive,
    Scan, Switch, MIXTURE_COMPONENT_ADDR,
};
use genfn_core::diff::no_change_all;
use genfn_core::{addr, Address, ChoiceMap, Key, Value};
use genfn_prob::math::softmax;
use genfn_prob::{normal_logpdf, LOG_PROB_TOLERANCE};

const TOL: f64 = LOG_PROB_TOLERANCE;

fn std_args(mean: f64) -> Value {
    Value::tuple([Value::Real(mean), Value::Real(1.0)])
}

/// x ~ N(0, 1); y ~ N(x, 1)
fn two_gaussians() -> GenFn {
    let n = normal();
    GenFn::new(Gen::new("two_gaussians", move |ctx, _| {
        let x = ctx.trace("x", &n, &[Value::Real(0.0), Value::Real(1.0)])?;
        ctx.trace("y", &n, &[x, Value::Real(1.0)])
    }))
}

/// carry' ~ N(carry, 1); emits carry'
fn walk_step() -> GenFn {
    let n = normal();
    GenFn::new(Gen::new("walk_step", move |ctx, args| {
        let next = ctx.trace("z", &n, &[args[0].clone(), Value::Real(1.0)])?;
        Ok(Value::tuple([next.clone(), next]))
    }))
}

/// u ~ N(0, 1)
fn single_at_u() -> GenFn {
    let n = normal();
    GenFn::new(Gen::new("single_at_u", move |ctx, _| {
        ctx.trace("u", &n, &[Value::Real(0.0), Value::Real(1.0)])
    }))
}

fn unit_step() -> GenFn {
    normal().contramap(|args| Ok(vec![args[0].clone(), Value::Real(1.0)]))
}

fn zoo() -> Vec<(&'static str, GenFn, Vec<Value>)> {
    let switch = GenFn::new(Switch::new(vec![normal(), two_gaussians()]).unwrap());
    let mixture = GenFn::new(Mixture::new(vec![normal(), normal(), normal()]).unwrap());
    let with_placeholders = GenFn::new(
        Switch::new(vec![two_gaussians(), single_at_u()])
            .unwrap()
            .with_placeholders(),
    );
    vec![
        ("normal", normal(), vec![Value::Real(1.0), Value::Real(2.0)]),
        ("two_gaussians", two_gaussians(), vec![]),
        (
            "switch",
            switch,
            vec![Value::Int(1), std_args(0.0), Value::Tuple(vec![])],
        ),
        (
            "switch_with_placeholders",
            with_placeholders,
            vec![Value::Int(0), Value::Tuple(vec![]), Value::Tuple(vec![])],
        ),
        ("mask_on", two_gaussians().mask(), vec![Value::Bool(true)]),
        ("mask_off", two_gaussians().mask(), vec![Value::Bool(false)]),
        (
            "scan",
            GenFn::new(Scan::new(walk_step(), 6)),
            vec![Value::Real(0.0), Value::Unit],
        ),
        (
            "batch",
            GenFn::new(Batch::new(normal(), vec![Some(0), None]).unwrap()),
            vec![Value::reals([-1.0, 0.0, 1.0]), Value::Real(0.5)],
        ),
        (
            "mixture",
            mixture,
            vec![Value::reals([0.3, 0.5, 0.2]), std_args(-3.0), std_args(0.0), std_args(3.0)],
        ),
        ("repeat", normal().repeat(4), vec![Value::Real(0.0), Value::Real(1.0)]),
        ("iterate_final", iterate_final(unit_step(), 5), vec![Value::Real(0.0)]),
        (
            "masked_iterate_final",
            masked_iterate_final(unit_step(), 5),
            vec![Value::Real(0.0), Value::Int(3)],
        ),
        (
            "or_else",
            normal().or_else(&two_gaussians()),
            vec![Value::Bool(false), std_args(0.0), Value::Tuple(vec![])],
        ),
    ]
}

#[test]
fn test_assess_reproduces_simulated_score() {
    for (name, g, args) in zoo() {
        for seed in 0..5 {
            let t = g.simulate(Key::new(seed), &args).unwrap();
            let (score, retval) = g.assess(Key::new(seed + 100), &t.choices, &args).unwrap();
            assert!((score - t.score).abs() < TOL, "{name}: {score} vs {}", t.score);
            assert!(retval.bitwise_eq(&t.retval), "{name}: retval differs");
        }
    }
}

#[test]
fn test_complete_constraint_weight_is_assess_score() {
    for (name, g, args) in zoo() {
        let t = g.simulate(Key::new(7), &args).unwrap();
        let (_, w) = g.importance(Key::new(8), &t.choices, &args).unwrap();
        let (score, _) = g.assess(Key::new(9), &t.choices, &args).unwrap();
        assert!((w - score).abs() < TOL, "{name}: {w} vs {score}");
    }
}

#[test]
fn test_empty_update_is_identity() {
    for (name, g, args) in zoo() {
        let t = g.simulate(Key::new(11), &args).unwrap();
        let r = g
            .update(Key::new(12), &t, &ChoiceMap::Empty, &no_change_all(&t.args))
            .unwrap();
        assert!(r.trace.same_record(&t), "{name}: trace changed");
        assert_eq!(r.weight, 0.0, "{name}");
        assert!(r.retdiff.is_unchanged(), "{name}");
        assert!(r.retdiff.value.bitwise_eq(&t.retval), "{name}");
        assert!(r.discard.is_empty(), "{name}");
    }
}

#[test]
fn test_propose_matches_simulate() {
    for (name, g, args) in zoo() {
        let (choices, score, retval) = g.propose(Key::new(21), &args).unwrap();
        let t = g.simulate(Key::new(21), &args).unwrap();
        assert_eq!(choices, t.choices, "{name}");
        assert_eq!(score.to_bits(), t.score.to_bits(), "{name}");
        assert!(retval.bitwise_eq(&t.retval), "{name}");

        let (assessed, _) = g.assess(Key::new(22), &choices, &args).unwrap();
        assert!((assessed - score).abs() < TOL, "{name}: {assessed} vs {score}");
    }
}

#[test]
fn test_propose_estimator_primitive() {
    let marginal = Marginal::new(two_gaussians(), "y").with_particles(50);
    let g = GenFn::new(Primitive::estimator(marginal));
    let (choices, score, retval) = g.propose(Key::new(5), &[]).unwrap();
    let t = g.simulate(Key::new(5), &[]).unwrap();
    assert_eq!(choices, t.choices);
    assert_eq!(score.to_bits(), t.score.to_bits());
    assert!(retval.bitwise_eq(&t.retval));
    assert_eq!(choices.value(), Some(&retval));

    // The score is an estimate; the density estimate of the same value is
    // a different, but finite, one.
    let (assessed, _) = g.assess(Key::new(6), &choices, &[]).unwrap();
    assert!(score.is_finite() && assessed.is_finite());
}

#[test]
fn test_simulate_is_deterministic_in_the_key() {
    for (name, g, args) in zoo() {
        let a = g.simulate(Key::new(3), &args).unwrap();
        let b = g.simulate(Key::new(3), &args).unwrap();
        assert!(a.same_record(&b), "{name}");
    }
}

#[test]
fn test_weight_is_conditional_density_of_observation() {
    let g = two_gaussians();
    let obs = ChoiceMap::new().with("y", 4.0);
    for seed in 0..10 {
        let (t, w) = g.importance(Key::new(seed), &obs, &[]).unwrap();
        let x = t.get(&Address::from("x")).unwrap().as_real().unwrap();
        assert_abs_diff_eq!(w, normal_logpdf(4.0, x, 1.0), epsilon = TOL);
        assert_abs_diff_eq!(
            t.score,
            normal_logpdf(x, 0.0, 1.0) + normal_logpdf(4.0, x, 1.0),
            epsilon = TOL
        );
    }
}

#[test]
fn test_mask_off_contributes_zero() {
    let inners = [
        normal().contramap(|_| Ok(vec![Value::Real(0.0), Value::Real(1.0)])),
        two_gaussians(),
        GenFn::new(Scan::new(walk_step(), 3)).contramap(|_| Ok(vec![Value::Real(0.0), Value::Unit])),
    ];
    for inner in inners {
        let m = inner.mask();
        for seed in 0..5 {
            let t = m.simulate(Key::new(seed), &[Value::Bool(false)]).unwrap();
            assert_eq!(t.score, 0.0);
            assert_eq!(t.choices.num_choices(), 0);
            assert!(t.inner().unwrap().score.is_finite());

            // Any values at all score zero under an invalid mask.
            let (s, _) = m.assess(Key::new(0), &t.choices, &[Value::Bool(false)]).unwrap();
            assert_eq!(s, 0.0);
        }
    }
}

#[test]
fn test_scan_update_reuses_earlier_steps() {
    let scan = GenFn::new(Scan::new(walk_step(), 10));
    let args = [Value::Real(0.0), Value::Unit];
    let t = scan.simulate(Key::new(21), &args).unwrap();
    assert_eq!(t.choices.indices(), (0..10).collect::<Vec<_>>());

    let constraint = ChoiceMap::new().with(addr![7, "z"], 0.25);
    let r = scan
        .update(Key::new(22), &t, &constraint, &no_change_all(&args))
        .unwrap();

    for i in 0..7usize {
        let old = t.subtrace(&Address::from(i)).unwrap();
        let new = r.trace.subtrace(&Address::from(i)).unwrap();
        assert!(new.same_record(old), "step {i} was recomputed");
        assert_eq!(
            new.get(&addr!["z"]).unwrap().as_real().unwrap().to_bits(),
            old.get(&addr!["z"]).unwrap().as_real().unwrap().to_bits()
        );
    }
    assert_eq!(r.trace.get(&addr![7, "z"]), Some(&Value::Real(0.25)));
    assert_eq!(r.discard, ChoiceMap::new().with(addr![7, "z"], t.get(&addr![7, "z"]).unwrap().clone()));

    // Later steps keep their values and are rescored.
    for i in 8..10usize {
        assert!(r.trace.get(&addr![i, "z"]).unwrap().bitwise_eq(t.get(&addr![i, "z"]).unwrap()));
    }
    assert_abs_diff_eq!(r.weight, r.trace.score - t.score, epsilon = TOL);
}

#[test]
fn test_mixture_component_frequencies() {
    let logits = [0.3, 0.5, 0.2];
    let mixture = GenFn::new(Mixture::new(vec![normal(), normal(), normal()]).unwrap());
    let args = [Value::reals(logits), std_args(-3.0), std_args(0.0), std_args(3.0)];

    let n = 100_000;
    let mut counts = [0usize; 3];
    for key in Key::new(2024).split(n) {
        let t = mixture.simulate(key, &args).unwrap();
        let k = t
            .get(&Address::from(MIXTURE_COMPONENT_ADDR))
            .unwrap()
            .as_index()
            .unwrap();
        counts[k] += 1;
    }

    let expected = softmax(&logits);
    let chi2: f64 = counts
        .iter()
        .zip(&expected)
        .map(|(&c, &p)| {
            let e = p * n as f64;
            (c as f64 - e).powi(2) / e
        })
        .sum();
    // chi-squared, 2 degrees of freedom, p = 1e-4
    assert!(chi2 < 18.42, "chi2 = {chi2}, counts = {counts:?}");
}
