//! Materia: compiles ORM projection plans into routines that read typed
//! object graphs from row cursors.
//!
//! # Example
//!
//! ```
//! use materia_lib::{Engine, MemoryCursor, PlanNode, Ty, Value};
//!
//! let engine = Engine::default();
//! let cursor = MemoryCursor::new(&["Id"], vec![vec![Value::I32(1)], vec![Value::I32(2)]]);
//! let reader = engine
//!     .execute(&PlanNode::column(0, Ty::I32), &Ty::I32, engine.session(Box::new(cursor)))
//!     .expect("plan compiles");
//!
//! let ids: Vec<Value> = reader.collect::<Result<_, _>>().expect("rows materialize");
//! assert_eq!(ids, vec![Value::I32(1), Value::I32(2)]);
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod engine;

#[cfg(test)]
pub mod test_utils;

pub use config::{ConfigError, MaterializerConfig};
pub use engine::Engine;

pub use materia_compiler::{
    CacheKey, CompileError, CompileLimits, CompileOptions, MaterializerCompiler, RoutineCache, SharedRoutineCache,
};
pub use materia_core::{
    ClassType, CoerceError, CoercionOptions, EntitySet, Instance, KeyPart, LazyRef, ObjectRef, Sequence,
    SingletonPolicy, Ty, Value,
};
pub use materia_plan::{
    Association, ClientWhen, CompiledRoutine, Link, Literal, LoadOptions, MappingIdentity, MetaMember, MetaMemberRef,
    MetaType, MetaTypeRef, Method, MethodRef, PlanKind, PlanNode, RowContext, RuntimeError, SearchedWhen, SourceShape,
    TypeWhen,
};
pub use materia_reader::{
    CursorError, DataServices, DeferredSourceFactory, IdentityServices, MemoryCursor, NoopTracer, ObjectReader, PrintTracer,
    ReaderState, RowCursor, Session, SessionBuilder, SessionStatus, SubQueryExecutor, Tracer, Verbosity,
};

/// Errors raised while compiling plans or reading objects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
