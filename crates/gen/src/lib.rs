//! # Generative Functions
//!
//! Probabilistic programs as values with one shared interface.
//!
//! A generative function is a stochastic computation whose random choices
//! are named by addresses. Every one of them, primitive or composite,
//! answers the same five questions:
//!
//! - **simulate**: run forward and record a [`Trace`]
//! - **importance**: run with some choices fixed and report a weight
//! - **update**: move an existing trace to new arguments or values
//! - **assess**: score a complete set of choices
//! - **propose**: sample choices and their score
//!
//! ## Quick Start
//!
//! ```rust
//! use genfn::{normal, Gen, GenFn};
//! use genfn_core::{ChoiceMap, Key, Value};
//!
//! let model = GenFn::new(Gen::new("model", |ctx, _| {
//!     let x = ctx.trace("x", &normal(), &[Value::Real(0.0), Value::Real(1.0)])?;
//!     ctx.trace("y", &normal(), &[x, Value::Real(1.0)])
//! }));
//!
//! let obs = ChoiceMap::new().with("y", 4.0);
//! let (trace, weight) = model.importance(Key::new(0), &obs, &[]).unwrap();
//! assert_eq!(trace.choices.num_choices(), 2);
//! assert!(weight.is_finite());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                             genfn                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  gfi.rs          GenerativeFunction, GenFn, UpdateResult        │
//! │  trace.rs        Trace                                          │
//! │  primitive.rs    Primitive (distribution at the root address)   │
//! │  dynamic.rs      Gen, Context (closures as models)              │
//! │  combinators/    Map, Contramap, Switch, Mask, Scan, Batch,     │
//! │                  Mixture, repeat, iterate_final, or_else        │
//! │  marginal.rs     Marginal (estimator-based distribution)        │
//! │  target.rs       Target (model, args, observations)             │
//! │  instrument.rs   Instrumented<ENABLED>                          │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │ uses
//!                             ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │          genfn-core          │   │          genfn-prob          │
//! │ Value, Address, ChoiceMap,   │   │ Distribution,                │
//! │ Selection, Diff, Key         │   │ EstimatorDistribution        │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): run [`Batch`] lanes on the rayon thread pool.

pub mod combinators;
mod dynamic;
mod error;
mod gfi;
mod instrument;
mod marginal;
mod primitive;
mod target;
mod trace;

pub use combinators::{
    iterate_final, masked_iterate_final, or_else, repeat, simulate_lanes, Batch, Contramap, Map,
    Mask, Mixture, Scan, Switch, TraceBatch, MIXTURE_COMPONENT_ADDR, MIXTURE_SAMPLE_ADDR,
};
pub use dynamic::{Context, Gen};
pub use error::GenError;
pub use gfi::{weight_delta, GenFn, GenerativeFunction, UpdateResult};
pub use instrument::{AutoInstrumented, Instrumented, OpRecord};
pub use marginal::{Marginal, DEFAULT_MARGINAL_PARTICLES};
pub use primitive::{
    bernoulli, beta, categorical, exponential, flip, normal, uniform, Primitive, Sampler,
};
pub use target::Target;
pub use trace::Trace;
