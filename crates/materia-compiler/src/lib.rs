#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Materializer compiler for Materia.
//!
//! Turns a projection plan into a [`CompiledRoutine`](materia_plan::CompiledRoutine)
//! and keeps recently compiled routines in a [`RoutineCache`] keyed by
//! structural plan equality.

pub mod cache;
pub mod compile;

#[cfg(test)]
pub mod test_utils;

pub use cache::{CacheKey, DEFAULT_CAPACITY, RoutineCache, RoutineStore, SharedRoutineCache};
pub use compile::{CompileError, CompileLimits, CompileOptions, MaterializerCompiler};
