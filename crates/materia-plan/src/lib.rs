#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Projection plans and compiled routines for Materia.
//!
//! - [`PlanNode`]: the projection plan tree
//! - [`MetaType`], [`MetaMember`], [`Method`]: mapping metadata the plan refers to
//! - [`compare`]: cacheability and structural equality
//! - [`CompiledRoutine`], [`RowContext`]: the executable form and its runtime contract

pub mod compare;
mod dump;
mod error;
mod meta;
mod plan;
mod routine;

#[cfg(test)]
mod compare_tests;
#[cfg(test)]
mod plan_tests;
#[cfg(test)]
pub mod test_utils;

pub use compare::{has_side_effect, is_cacheable, structurally_equal};
pub use dump::dump;
pub use error::RuntimeError;
pub use meta::{
    Association, InheritanceCase, LoadOptions, MappingIdentity, MemberAccess, MemberId, MetaMember,
    MetaMemberRef, MetaType, MetaTypeBuilder, MetaTypeRef, Method, MethodBody, MethodRef, SourceShape,
};
pub use plan::{
    ArrayOrigin, ClientWhen, Link, Literal, MemberAssign, NewObject, PlanKind, PlanNode, SearchedWhen,
    SourceHandle, TypeWhen,
};
pub use routine::{CompiledRoutine, Global, MaterializeFn, NamedColumn, RoutineBuilder, RowContext};
