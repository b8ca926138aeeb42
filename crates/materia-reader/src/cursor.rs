//! Row cursor abstraction over a provider's result stream.
//!
//! A cursor yields one or more result sets, each a forward-only sequence of
//! rows. Getters read from the current row only.

use materia_core::{Ty, Value};
use materia_plan::RuntimeError;

/// Errors reported by a cursor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CursorError {
    #[error("no current row")]
    NoRow,

    #[error("ordinal {ordinal} is out of range ({count} columns)")]
    OrdinalOutOfRange { ordinal: usize, count: usize },

    #[error("column {ordinal} holds {found}, not {expected}")]
    TypeMismatch { ordinal: usize, expected: Ty, found: Ty },

    #[error("cursor is closed")]
    Closed,

    #[error("{0}")]
    Provider(String),
}

impl From<CursorError> for RuntimeError {
    fn from(err: CursorError) -> Self {
        RuntimeError::Cursor {
            message: err.to_string(),
        }
    }
}

/// Forward-only, multi-result row source.
///
/// Only `read`, `field_count`, `name`, `value`, `next_result`, `is_closed`
/// and `close` are required. Typed getters default to `value` plus a type
/// check; providers with native typed reads should override them.
pub trait RowCursor {
    /// Advances to the next row of the current result set.
    fn read(&mut self) -> Result<bool, CursorError>;

    fn field_count(&self) -> usize;

    /// Column name as reported by the provider.
    fn name(&self, ordinal: usize) -> Result<&str, CursorError>;

    /// Raw value of a column in the current row. Null is `Value::Null`.
    fn value(&self, ordinal: usize) -> Result<Value, CursorError>;

    /// Moves to the next result set. Returns false when none remain.
    fn next_result(&mut self) -> Result<bool, CursorError>;

    fn is_closed(&self) -> bool;

    fn close(&mut self);

    fn is_null(&self, ordinal: usize) -> Result<bool, CursorError> {
        Ok(self.value(ordinal)?.is_null())
    }

    fn get_bool(&self, ordinal: usize) -> Result<bool, CursorError> {
        match self.value(ordinal)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(ordinal, Ty::Bool, &other)),
        }
    }

    fn get_i16(&self, ordinal: usize) -> Result<i16, CursorError> {
        match self.value(ordinal)? {
            Value::I16(v) => Ok(v),
            other => Err(mismatch(ordinal, Ty::I16, &other)),
        }
    }

    fn get_i32(&self, ordinal: usize) -> Result<i32, CursorError> {
        match self.value(ordinal)? {
            Value::I32(v) => Ok(v),
            other => Err(mismatch(ordinal, Ty::I32, &other)),
        }
    }

    fn get_i64(&self, ordinal: usize) -> Result<i64, CursorError> {
        match self.value(ordinal)? {
            Value::I64(v) => Ok(v),
            other => Err(mismatch(ordinal, Ty::I64, &other)),
        }
    }

    fn get_f64(&self, ordinal: usize) -> Result<f64, CursorError> {
        match self.value(ordinal)? {
            Value::F64(v) => Ok(v),
            other => Err(mismatch(ordinal, Ty::F64, &other)),
        }
    }

    fn get_string(&self, ordinal: usize) -> Result<String, CursorError> {
        match self.value(ordinal)? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(ordinal, Ty::String, &other)),
        }
    }

    fn get_bytes(&self, ordinal: usize) -> Result<Vec<u8>, CursorError> {
        match self.value(ordinal)? {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch(ordinal, Ty::Bytes, &other)),
        }
    }

    /// Reads a column with the getter matching `wire`.
    ///
    /// Nullable wire types use the getter of their underlying type; types
    /// without a dedicated getter fall back to `value`.
    fn get_typed(&self, ordinal: usize, wire: &Ty) -> Result<Value, CursorError> {
        match wire.non_nullable() {
            Ty::Bool => self.get_bool(ordinal).map(Value::Bool),
            Ty::I16 => self.get_i16(ordinal).map(Value::I16),
            Ty::I32 => self.get_i32(ordinal).map(Value::I32),
            Ty::I64 => self.get_i64(ordinal).map(Value::I64),
            Ty::F64 => self.get_f64(ordinal).map(Value::F64),
            Ty::String => self.get_string(ordinal).map(Value::String),
            Ty::Bytes => self.get_bytes(ordinal).map(Value::Bytes),
            _ => self.value(ordinal),
        }
    }
}

fn mismatch(ordinal: usize, expected: Ty, found: &Value) -> CursorError {
    CursorError::TypeMismatch {
        ordinal,
        expected,
        found: found.runtime_ty(),
    }
}
