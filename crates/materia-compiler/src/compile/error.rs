use materia_core::CoerceError;
use materia_plan::{PlanNode, SourceHandle};

/// Errors raised while compiling a plan.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("cannot translate {node} at {at}: {reason}")]
    PlanTranslation {
        node: &'static str,
        at: SourceHandle,
        reason: String,
    },

    #[error("{node} at {at}: {error}")]
    Coercion {
        node: &'static str,
        at: SourceHandle,
        error: CoerceError,
    },

    #[error("plan is nested deeper than {limit} levels")]
    DepthLimitExceeded { limit: usize },
}

impl CompileError {
    pub(crate) fn translation(node: &PlanNode, reason: impl Into<String>) -> Self {
        CompileError::PlanTranslation {
            node: node.kind().name(),
            at: node.source().clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn coercion(node: &PlanNode, error: CoerceError) -> Self {
        CompileError::Coercion {
            node: node.kind().name(),
            at: node.source().clone(),
            error,
        }
    }
}
