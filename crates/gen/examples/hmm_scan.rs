//! Hidden Markov model as a Scan
//!
//! Run with: cargo run -p genfn --example hmm_scan
//! Set RUST_LOG=genfn=debug to watch Scan report the first recomputed step.
//!
//! A two-state chain observed through Gaussian noise. Each step lives at
//! its own integer address; updating one late step leaves every earlier
//! step untouched.

use genfn::{flip, normal, Batch, Gen, GenError, GenFn, Scan};
use genfn_core::diff::no_change_all;
use genfn_core::{addr, Address, ChoiceMap, Key, Value};
use tracing_subscriber::EnvFilter;

const STEPS: usize = 12;

fn hmm_step() -> GenFn {
    let stay = flip();
    let high = normal().contramap(|_| Ok(vec![Value::Real(1.0), Value::Real(0.5)]));
    let low = normal().contramap(|_| Ok(vec![Value::Real(-1.0), Value::Real(0.5)]));
    let observe = high.or_else(&low);
    GenFn::new(Gen::new("hmm_step", move |ctx, args| {
        let prev = args[0].as_bool()?;
        let stays = ctx.trace("stay", &stay, &[Value::Real(0.9)])?.as_bool()?;
        let state = if stays { prev } else { !prev };
        let y = ctx.trace(
            "y",
            &observe,
            &[Value::Bool(state), Value::Tuple(vec![]), Value::Tuple(vec![])],
        )?;
        Ok(Value::tuple([Value::Bool(state), y]))
    }))
}

fn main() -> Result<(), GenError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== HMM as a Scan ===\n");

    let hmm = GenFn::new(Scan::new(hmm_step(), STEPS));
    let args = [Value::Bool(true), Value::Unit];

    // -------------------------------------------------------------------------
    // 1. Simulate
    // -------------------------------------------------------------------------
    println!("1. Simulate {STEPS} steps");
    println!("--------------------");

    let t = hmm.simulate(Key::new(42), &args)?;
    for i in 0..STEPS {
        let stay = t.require(&addr![i, "stay"])?;
        let y = t.require(&addr![i, "y"])?.as_real()?;
        println!("  step {i:2}: stay={stay:<5} y={y:+.3}");
    }
    println!("  score {:.4}\n", t.score);

    // -------------------------------------------------------------------------
    // 2. Incremental update of one late step
    // -------------------------------------------------------------------------
    println!("2. Constrain step 9's observation");
    println!("---------------------------------");

    let constraint = ChoiceMap::new().with(addr![9, "y"], 2.5);
    let r = t.update(Key::new(43), &constraint, &no_change_all(&args))?;
    let reused = (0..STEPS)
        .filter(|&i| {
            let a = Address::from(i);
            match (t.subtrace(&a), r.trace.subtrace(&a)) {
                (Some(old), Some(new)) => old.same_record(new),
                _ => false,
            }
        })
        .count();
    println!("  weight {:.4}", r.weight);
    println!("  {reused} of {STEPS} steps reused unchanged\n");

    // -------------------------------------------------------------------------
    // 3. Independent chains with Batch
    // -------------------------------------------------------------------------
    println!("3. Eight independent chains");
    println!("---------------------------");

    let chains = GenFn::new(Batch::repeat(hmm, 8));
    let batch = chains.simulate(Key::new(7), &args)?;
    for i in 0..8usize {
        let lane = batch
            .subtrace(&Address::from(i))
            .ok_or_else(|| GenError::missing(addr![i]))?;
        println!("  chain {i}: score {:.4}", lane.score);
    }
    println!("  total score {:.4}", batch.score);

    Ok(())
}
