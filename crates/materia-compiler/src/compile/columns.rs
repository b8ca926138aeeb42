//! Column reads: positional, named and unnamed.

use std::sync::Arc;

use materia_core::{CoerceError, Coercion, Ty, Value};
use materia_plan::{PlanNode, RowContext, RuntimeError};

use super::compiler::{CompileCtx, Eval, eval_fn};
use super::error::CompileError;

/// Null check, typed read and coercion for one column.
pub(super) struct ColumnReader {
    wire: Ty,
    declared: Ty,
    coercion: Coercion,
    substitute_null: bool,
}

impl ColumnReader {
    pub(super) fn read(&self, ctx: &mut dyn RowContext, ordinal: usize) -> Result<Value, RuntimeError> {
        if ctx.is_null(ordinal)? {
            return self.null(ordinal);
        }
        let raw = ctx.column(ordinal, &self.wire)?;
        self.coercion
            .apply(raw)
            .map_err(|error| RuntimeError::Column { ordinal, error })
    }

    fn null(&self, ordinal: usize) -> Result<Value, RuntimeError> {
        if self.declared.accepts_null() || self.substitute_null {
            return Ok(self.declared.default_value());
        }
        Err(RuntimeError::Column {
            ordinal,
            error: CoerceError::NullAssignment {
                ty: self.declared.clone(),
            },
        })
    }

    /// Value of a named column missing from the result set.
    pub(super) fn absent(&self) -> Value {
        self.declared.default_value()
    }
}

impl CompileCtx<'_> {
    pub(super) fn column_reader(
        &self,
        node: &PlanNode,
        wire: &Ty,
        declared: &Ty,
    ) -> Result<ColumnReader, CompileError> {
        Ok(ColumnReader {
            wire: wire.clone(),
            declared: declared.clone(),
            coercion: self.coercion(node, wire, declared)?,
            substitute_null: self.options.null_substitution,
        })
    }

    pub(super) fn column_ref(
        &mut self,
        node: &PlanNode,
        ordinal: usize,
        wire: &Ty,
        declared: &Ty,
    ) -> Result<Eval, CompileError> {
        let reader = self.column_reader(node, wire, declared)?;
        Ok(eval_fn(move |ctx, _| reader.read(ctx, ordinal)))
    }

    pub(super) fn user_column(
        &mut self,
        node: &PlanNode,
        name: Option<&Arc<str>>,
        required: bool,
    ) -> Result<Eval, CompileError> {
        let declared = node.ty();
        let reader = self.column_reader(node, declared.non_nullable(), declared)?;
        let Some(name) = name else {
            return Ok(eval_fn(move |ctx, _| reader.read(ctx, 0)));
        };

        let slot = self.routine.named_column(name.clone(), required);
        Ok(eval_fn(move |ctx, _| match ctx.named_ordinal(slot) {
            Some(ordinal) => reader.read(ctx, ordinal),
            None => Ok(reader.absent()),
        }))
    }
}
