//! Two Gaussians: the five interface operations on one small model
//!
//! Run with: cargo run -p genfn --example two_gaussians
//! Set RUST_LOG=genfn=debug to see the instrumentation spans.
//!
//! The model is x ~ N(0, 1), y ~ N(x, 1). Observing y = 4 and drawing x
//! from the prior gives importance weights equal to log N(4; x, 1).

use genfn::{normal, Gen, GenError, GenFn, Instrumented};
use genfn_core::diff::no_change_all;
use genfn_core::{addr, ChoiceMap, Key, Selection, Value};
use genfn_prob::math::log_mean_exp;
use genfn_prob::normal_logpdf;
use tracing_subscriber::EnvFilter;

fn model() -> GenFn {
    let n = normal();
    GenFn::new(Gen::new("two_gaussians", move |ctx, _| {
        let x = ctx.trace("x", &n, &[Value::Real(0.0), Value::Real(1.0)])?;
        ctx.trace("y", &n, &[x, Value::Real(1.0)])
    }))
}

fn main() -> Result<(), GenError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Two Gaussians ===\n");

    // -------------------------------------------------------------------------
    // 1. Simulate and assess
    // -------------------------------------------------------------------------
    println!("1. Simulate and assess");
    println!("----------------------");

    let watched = Instrumented::<true>::new(model());
    let g = GenFn::new(watched.clone());
    let t = g.simulate(Key::new(0), &[])?;
    for (addr, v) in t.choices.leaves() {
        println!("  {addr} = {v}");
    }
    let (score, _) = g.assess(Key::new(1), &t.choices, &[])?;
    println!("  score {:.4}, assess {:.4}\n", t.score, score);

    // -------------------------------------------------------------------------
    // 2. Importance sampling against y = 4
    // -------------------------------------------------------------------------
    println!("2. Importance sampling against y = 4");
    println!("------------------------------------");

    let obs = ChoiceMap::new().with("y", 4.0);
    let mut weights = Vec::new();
    for key in Key::new(2).split(1000) {
        let (t, w) = g.importance(key, &obs, &[])?;
        let x = t.require(&addr!["x"])?.as_real()?;
        debug_assert!((w - normal_logpdf(4.0, x, 1.0)).abs() < 1e-9);
        weights.push(w);
    }
    println!(
        "  log p(y = 4) estimate {:.4}, exact {:.4}\n",
        log_mean_exp(&weights),
        normal_logpdf(4.0, 0.0, 2f64.sqrt())
    );

    // -------------------------------------------------------------------------
    // 3. Update: move x, keep y
    // -------------------------------------------------------------------------
    println!("3. Update: move x, keep y");
    println!("-------------------------");

    let (t, _) = g.importance(Key::new(3), &obs, &[])?;
    let r = g.update(
        Key::new(4),
        &t,
        &ChoiceMap::new().with("x", 3.0),
        &no_change_all(&t.args),
    )?;
    println!("  weight {:.4}", r.weight);
    println!("  discard {:?}", r.discard.leaves());
    println!(
        "  latents now {:?}\n",
        r.trace.filter(&Selection::at("x")).leaves()
    );

    // -------------------------------------------------------------------------
    // 4. What the instrumentation saw
    // -------------------------------------------------------------------------
    println!("4. Recorded calls (last five)");
    println!("-----------------------------");
    let records = watched.records();
    for record in records.iter().rev().take(5) {
        println!("  {record}");
    }
    println!("  ... {} calls in total", records.len());

    Ok(())
}
