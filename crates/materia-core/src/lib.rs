#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures for Materia.
//!
//! - [`Ty`]: logical types of plan nodes and runtime values
//! - [`Value`]: materialized runtime values, including shared object handles
//! - [`Sequence`], [`EntitySet`], [`LazyRef`]: lazily loaded collections and references
//! - [`coerce`]: the ordered coercion rule table

pub mod coerce;
mod error;
mod sequence;
mod ty;
mod value;

#[cfg(test)]
mod ty_tests;

pub use coerce::{Coercion, CoercionOptions, SingletonPolicy, coerce};
pub use error::{CoerceError, SequenceCount};
pub use sequence::{EntitySet, Group, LazyRef, SeqIter, Sequence};
pub use ty::{ClassType, Ty};
pub use value::{Instance, KeyPart, ObjectRef, Value};
