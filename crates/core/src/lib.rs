//! # Core - Data for Generative Functions
//!
//! This crate provides the data layer shared by every generative function:
//!
//! - **Values**: Dynamically-typed arguments, returns and choices
//! - **Shapes**: Structural descriptions used to check combinator branches
//! - **Addresses**: Hierarchical names for random choices
//! - **Selections**: Boolean predicates over addresses
//! - **Choice maps**: Address-indexed trees of recorded values, with masks
//! - **Diffs**: Change tags that drive incremental update
//! - **Keys**: Splittable, reproducible randomness
//! - **Errors**: Structural failures as first-class values
//!
//! ## Design Philosophy
//!
//! Everything here is plain owned data. A choice map is a value, not a view
//! into a trace, so combinators can build, slice and merge them freely
//! without shared mutable state.

pub mod address;
pub mod choice_map;
pub mod diff;
pub mod error;
pub mod key;
pub mod selection;
pub mod shape;
pub mod value;

// Re-export key types at crate root for convenience
pub use address::{Address, Segment};
pub use choice_map::ChoiceMap;
pub use diff::{Change, Diff};
pub use error::CoreError;
pub use key::Key;
pub use selection::Selection;
pub use shape::{Shape, TypeId};
pub use value::Value;
