use materia_core::CoerceError;

/// Errors raised while a compiled routine materializes a row.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Coercion(#[from] CoerceError),

    #[error("column {ordinal}: {error}")]
    Column { ordinal: usize, error: CoerceError },

    #[error("required column '{name}' is not present in the result")]
    RequiredColumnMissing { name: String },

    #[error("cannot use {what} after it has been disposed")]
    DisposedUse { what: &'static str },

    #[error("cursor error: {message}")]
    Cursor { message: String },

    #[error("cannot read member '{member}' of a null value")]
    NullDereference { member: String },

    #[error("method {method} failed: {message}")]
    Method { method: String, message: String },

    #[error("no sub-query registered at index {index}")]
    SubQueryNotFound { index: usize },

    #[error("sub-query {index} failed: {message}")]
    SubQuery { index: usize, message: String },

    #[error("argument {index} is out of range ({count} supplied)")]
    ArgumentOutOfRange { index: usize, count: usize },

    #[error("cannot load '{member}': {message}")]
    DeferredSource { member: String, message: String },
}
