//! # Combinators
//!
//! Generative functions built from other generative functions. Each one
//! implements the full interface by delegating to its parts, and each one
//! places its parts' choices at well-defined addresses:
//!
//! | combinator | children live at |
//! |---|---|
//! | [`Map`], [`Contramap`], [`Mask`], [`Switch`] | the combinator's own address |
//! | [`Scan`], [`Batch`] | integer indices `0..n` |
//! | [`Mixture`] | [`MIXTURE_COMPONENT_ADDR`] and [`MIXTURE_SAMPLE_ADDR`] |

mod batch;
mod map;
mod mask;
mod mixture;
mod scan;
mod switch;

pub use batch::{simulate_lanes, Batch, TraceBatch};
pub use map::{Contramap, Map};
pub use mask::Mask;
pub use mixture::{Mixture, MIXTURE_COMPONENT_ADDR, MIXTURE_SAMPLE_ADDR};
pub use scan::{iterate_final, masked_iterate_final, repeat, Scan};
pub use switch::{or_else, Switch};
