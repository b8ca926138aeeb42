//! Compiled routine format and the row context it runs against.
//!
//! A routine is an immutable closure tree built once per plan shape. It
//! never touches the cursor directly: every read, identity-map call and
//! deferred source goes through [`RowContext`], which the reader
//! implements per session.

use std::fmt;
use std::sync::Arc;

use materia_core::{ObjectRef, Sequence, Ty, Value};

use crate::error::RuntimeError;
use crate::meta::{MetaMemberRef, MetaTypeRef, MethodRef};
use crate::plan::Literal;

/// Per-row services a routine needs from its reader.
pub trait RowContext {
    /// Whether the column at `ordinal` is null in the current row.
    fn is_null(&mut self, ordinal: usize) -> Result<bool, RuntimeError>;

    /// Reads a column with the getter matching `wire`.
    fn column(&mut self, ordinal: usize, wire: &Ty) -> Result<Value, RuntimeError>;

    /// Ordinal bound to named-column slot `slot`, or `None` when the
    /// column is absent from the result set.
    fn named_ordinal(&self, slot: usize) -> Option<usize>;

    /// Caller-supplied argument.
    fn argument(&self, index: usize) -> Result<Value, RuntimeError>;

    /// Advances to the next row; `false` once rows run out.
    fn read(&mut self) -> Result<bool, RuntimeError>;

    /// Registers `instance` in the identity map and returns the canonical one.
    fn insert_lookup(&mut self, meta: &MetaTypeRef, instance: ObjectRef) -> Result<ObjectRef, RuntimeError>;

    /// Called once a newly constructed entity is fully assigned.
    fn entity_materialized(&mut self, meta: &MetaTypeRef, instance: &ObjectRef) -> Result<(), RuntimeError>;

    /// Whether deferred loading is enabled right now.
    fn can_defer_load(&self) -> bool;

    /// Deferred source for `member` keyed by `keys`. `slot` is a local
    /// slot reserved for caching the member's source factory.
    fn link_source(&mut self, slot: usize, member: &MetaMemberRef, keys: Vec<Value>)
    -> Result<Sequence, RuntimeError>;

    /// Deferred source for `member` bound to its owning instance.
    fn nested_link_source(
        &mut self,
        slot: usize,
        member: &MetaMemberRef,
        owner: &Value,
    ) -> Result<Sequence, RuntimeError>;

    /// Runs sub-query `index`; `args` follow the session's parent arguments.
    fn execute_subquery(&mut self, index: usize, args: Vec<Value>) -> Result<Sequence, RuntimeError>;
}

pub type MaterializeFn = dyn Fn(&mut dyn RowContext) -> Result<Value, RuntimeError> + Send + Sync;

/// A column bound by name when a reader opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedColumn {
    pub name: Arc<str>,
    pub required: bool,
}

/// Constant data captured by a routine.
#[derive(Clone, Debug)]
pub enum Global {
    Literal(Literal),
    Type(MetaTypeRef),
    Member(MetaMemberRef),
    Method(MethodRef),
}

struct RoutineInner {
    element: Ty,
    materialize: Box<MaterializeFn>,
    named_columns: Vec<NamedColumn>,
    globals: Vec<Global>,
    locals: usize,
}

/// Executable form of a plan, shared by `Arc`.
#[derive(Clone)]
pub struct CompiledRoutine(Arc<RoutineInner>);

impl CompiledRoutine {
    pub fn builder(element: Ty) -> RoutineBuilder {
        RoutineBuilder::new(element)
    }

    /// Materializes one value from the current row.
    pub fn materialize(&self, ctx: &mut dyn RowContext) -> Result<Value, RuntimeError> {
        (self.0.materialize)(ctx)
    }

    pub fn element_type(&self) -> &Ty {
        &self.0.element
    }

    pub fn named_columns(&self) -> &[NamedColumn] {
        &self.0.named_columns
    }

    pub fn globals(&self) -> &[Global] {
        &self.0.globals
    }

    /// Number of per-reader scratch slots.
    pub fn locals(&self) -> usize {
        self.0.locals
    }

    pub fn ptr_eq(&self, other: &CompiledRoutine) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CompiledRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoutine")
            .field("element", &self.0.element.to_string())
            .field("named_columns", &self.0.named_columns)
            .field("globals", &self.0.globals.len())
            .field("locals", &self.0.locals)
            .finish()
    }
}

/// Collects slots and globals while a routine is being compiled.
pub struct RoutineBuilder {
    element: Ty,
    named_columns: Vec<NamedColumn>,
    globals: Vec<Global>,
    locals: usize,
}

impl RoutineBuilder {
    pub fn new(element: Ty) -> Self {
        Self {
            element,
            named_columns: Vec::new(),
            globals: Vec::new(),
            locals: 0,
        }
    }

    /// Registers a named column and returns its slot.
    pub fn named_column(&mut self, name: Arc<str>, required: bool) -> usize {
        self.named_columns.push(NamedColumn { name, required });
        self.named_columns.len() - 1
    }

    pub fn global(&mut self, global: Global) -> usize {
        self.globals.push(global);
        self.globals.len() - 1
    }

    /// Reserves a local scratch slot.
    pub fn local(&mut self) -> usize {
        self.locals += 1;
        self.locals - 1
    }

    pub fn build<F>(self, materialize: F) -> CompiledRoutine
    where
        F: Fn(&mut dyn RowContext) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        CompiledRoutine(Arc::new(RoutineInner {
            element: self.element,
            materialize: Box::new(materialize),
            named_columns: self.named_columns,
            globals: self.globals,
            locals: self.locals,
        }))
    }
}
