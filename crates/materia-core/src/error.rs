//! Errors raised while coercing values.

use std::fmt;

use crate::ty::Ty;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoerceError {
    /// No rule applies, or the dynamic conversion failed.
    #[error("cannot convert {actual} to {expected}: {reason}")]
    Conversion {
        actual: Ty,
        expected: Ty,
        reason: String,
    },

    /// Null flowing into a non-nullable value type.
    #[error("cannot assign null to non-nullable {ty}")]
    NullAssignment { ty: Ty },

    /// Sequence-to-singleton reduction saw the wrong number of elements.
    #[error("expected a single {element}, but the sequence {found}")]
    Cardinality { element: Ty, found: SequenceCount },
}

impl CoerceError {
    pub(crate) fn conversion(actual: &Ty, expected: &Ty, reason: impl Into<String>) -> Self {
        CoerceError::Conversion {
            actual: actual.clone(),
            expected: expected.clone(),
            reason: reason.into(),
        }
    }
}

/// Offending element count for `CoerceError::Cardinality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCount {
    Empty,
    Many,
}

impl fmt::Display for SequenceCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceCount::Empty => f.write_str("is empty"),
            SequenceCount::Many => f.write_str("contains more than one element"),
        }
    }
}
