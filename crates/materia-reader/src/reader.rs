//! Forward-only object reader.

use std::fmt;
use std::rc::Rc;

use materia_core::Value;
use materia_plan::{CompiledRoutine, RuntimeError};

use crate::context::ReaderContext;
use crate::services::DeferredSourceFactory;
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    NotStarted,
    HasCurrent,
    Finished,
    Disposed,
}

/// Materializes one value per row of a result set.
///
/// Named columns are bound when the reader opens, so a missing required
/// column fails before any row is read.
pub struct ObjectReader {
    session: Session,
    routine: CompiledRoutine,
    /// `None` when the session had no result set left to hand out.
    result: Option<usize>,
    ordinals: Vec<Option<usize>>,
    locals: Vec<Option<Rc<dyn DeferredSourceFactory>>>,
    current: Option<Value>,
    state: ReaderState,
    owns_session: bool,
}

impl ObjectReader {
    /// Opens a reader over the session's next result set.
    ///
    /// With `owns_session`, exhausting or disposing the reader disposes the
    /// session too.
    pub fn open(session: &Session, routine: CompiledRoutine, owns_session: bool) -> Result<Self, RuntimeError> {
        let result = session.next_result_set()?;
        let ordinals = match result {
            Some(result) => session.resolve_named_columns(result, routine.named_columns())?,
            None => Vec::new(),
        };
        let state = if result.is_some() {
            ReaderState::NotStarted
        } else {
            ReaderState::Finished
        };
        Ok(Self {
            session: session.clone(),
            locals: vec![None; routine.locals()],
            routine,
            result,
            ordinals,
            current: None,
            state,
            owns_session,
        })
    }

    /// Advances to the next row and materializes it.
    pub fn move_next(&mut self) -> Result<bool, RuntimeError> {
        let result = match (self.state, self.result) {
            (ReaderState::Disposed, _) => return Err(RuntimeError::DisposedUse { what: "object reader" }),
            (ReaderState::Finished, _) | (_, None) => return Ok(false),
            (_, Some(result)) => result,
        };

        if !self.session.read(result)? {
            tracing::trace!(result, "reader exhausted");
            self.current = None;
            self.state = ReaderState::Finished;
            if self.owns_session {
                self.session.dispose();
            }
            return Ok(false);
        }

        let mut ctx = ReaderContext {
            session: &self.session,
            result,
            ordinals: &self.ordinals,
            locals: &mut self.locals,
        };
        let value = self.routine.materialize(&mut ctx)?;
        self.session.trace(|t| t.trace_materialized(result, &value));
        self.current = Some(value);
        self.state = ReaderState::HasCurrent;
        Ok(true)
    }

    /// Value materialized by the last successful `move_next`.
    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn routine(&self) -> &CompiledRoutine {
        &self.routine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Reads the rest of this reader's result set into memory, keeping the
    /// current row, so the session's cursor can move on.
    pub fn buffer(&self) -> Result<(), RuntimeError> {
        if self.state == ReaderState::Disposed {
            return Err(RuntimeError::DisposedUse { what: "object reader" });
        }
        match self.result {
            Some(result) => self.session.buffer_result(result),
            None => Ok(()),
        }
    }

    /// Opens a reader over the session's next result set, buffering this
    /// one first if the cursor still feeds it.
    pub fn get_next_result(
        &self,
        routine: CompiledRoutine,
        owns_session: bool,
    ) -> Result<Option<ObjectReader>, RuntimeError> {
        if self.state == ReaderState::Disposed {
            return Err(RuntimeError::DisposedUse { what: "object reader" });
        }
        let next = Self::open(&self.session, routine, owns_session)?;
        Ok(next.result.is_some().then_some(next))
    }

    /// Idempotent. Disposes the session when this reader owns it.
    pub fn dispose(&mut self) {
        if self.state == ReaderState::Disposed {
            return;
        }
        self.state = ReaderState::Disposed;
        self.current = None;
        if self.owns_session {
            self.session.dispose();
        }
    }
}

impl Drop for ObjectReader {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Iterator for ObjectReader {
    type Item = Result<Value, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.move_next() {
            Ok(true) => self.current.clone().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("result", &self.result)
            .field("state", &self.state)
            .field("routine", &self.routine)
            .finish()
    }
}
