//! Plan-to-closure compilation.
//!
//! Every plan node becomes a closure at compile time; the routine is the
//! root closure plus the slots it reserved. Coercions between a node's type
//! and the type its parent expects are selected here, once, and only
//! applied per row.
//!
//! # Module Organization
//!
//! - `compiler`: options, entry points and per-node dispatch
//! - `columns`: positional and named column reads
//! - `construct`: two-phase object construction
//! - `links`: association links and deferred sources
//! - `collections`: joined collections, groupings, arrays, sub-queries
//! - `cases`: case and discriminator nodes
//! - `values`: literals, parameters, member reads and method calls

mod cases;
mod collections;
mod columns;
mod compiler;
mod construct;
mod error;
mod links;
mod values;

#[cfg(test)]
mod cases_tests;
#[cfg(test)]
mod compile_tests;

pub use compiler::{CompileLimits, CompileOptions, MaterializerCompiler};
pub use error::CompileError;
