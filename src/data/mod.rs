// src/data/mod.rs

//! Typed, named value exchange between vertices of one execution.

pub mod context;
pub mod key;

pub use context::{DataContext, DataValue};
pub use key::{DataKey, TypeTag};
