//! Reader session: one live cursor shared by the readers of its result sets.
//!
//! The session hands result sets to readers in order. Only one result set
//! is fed by the live cursor at a time; moving on to the next result set
//! first drains the current one into memory, so a reader that is no longer
//! current keeps working from its buffer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use materia_core::Value;
use materia_plan::{NamedColumn, RuntimeError};

use crate::buffer::BufferedResult;
use crate::cursor::{CursorError, RowCursor};
use crate::services::{DataServices, IdentityServices, SubQueryExecutor};
use crate::trace::{NoopTracer, Tracer};

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Rows come from the live cursor.
    Streaming,
    /// Every result set has been read into memory.
    Buffered,
    /// Disposed by the caller, or the streaming cursor ran out of result
    /// sets and was released. Result sets already read into memory stay
    /// readable in the latter case.
    Disposed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    NotStarted,
    HasRow,
    Finished,
}

struct ResultSet {
    /// `None` while the live cursor feeds this result set.
    rows: Option<BufferedResult>,
    position: Position,
}

struct SessionState {
    cursor: Option<Box<dyn RowCursor>>,
    /// One entry per result set handed out or buffered, in cursor order.
    results: Vec<ResultSet>,
    /// Result set the live cursor is reading.
    live: Option<usize>,
    /// The live cursor sits on a result set no reader has claimed yet.
    has_results: bool,
    claimed: usize,
    buffered: bool,
    disposed: bool,
}

struct SessionInner {
    state: RefCell<SessionState>,
    parent_args: Vec<Value>,
    user_args: Vec<Value>,
    subqueries: Vec<Rc<dyn SubQueryExecutor>>,
    services: Rc<dyn DataServices>,
    retain_cursor: bool,
    tracer: RefCell<Box<dyn Tracer>>,
}

/// Shared handle to a reader session.
#[derive(Clone)]
pub struct Session(Rc<SessionInner>);

impl Session {
    pub fn builder(cursor: Box<dyn RowCursor>) -> SessionBuilder {
        SessionBuilder::new(cursor)
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.0.state.borrow();
        if state.disposed || (state.cursor.is_none() && !state.buffered) {
            SessionStatus::Disposed
        } else if state.buffered {
            SessionStatus::Buffered
        } else {
            SessionStatus::Streaming
        }
    }

    pub fn is_buffered(&self) -> bool {
        self.0.state.borrow().buffered
    }

    pub fn is_disposed(&self) -> bool {
        self.status() == SessionStatus::Disposed
    }

    pub fn parent_args(&self) -> &[Value] {
        &self.0.parent_args
    }

    pub fn user_args(&self) -> &[Value] {
        &self.0.user_args
    }

    pub fn services(&self) -> Rc<dyn DataServices> {
        self.0.services.clone()
    }

    pub fn ptr_eq(&self, other: &Session) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Reads every remaining result set into memory and releases the cursor.
    ///
    /// A result set that is partially read keeps its current row. Calling
    /// this again is a no-op.
    pub fn buffer(&self) -> Result<(), RuntimeError> {
        let mut state = self.state_mut()?;
        if state.buffered {
            return Ok(());
        }
        self.drain_live(&mut state)?;
        while state.has_results {
            let Some(cursor) = state.cursor.as_mut() else {
                break;
            };
            let rows = BufferedResult::snapshot(&mut **cursor, false)?;
            let result = state.results.len();
            self.trace_buffered(result, rows.len());
            state.results.push(ResultSet {
                rows: Some(rows),
                position: Position::NotStarted,
            });
            self.advance(&mut state)?;
        }
        state.buffered = true;
        Ok(())
    }

    /// Releases the cursor and drops buffered rows. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.0.state.borrow_mut();
        if state.disposed {
            return;
        }
        state.disposed = true;
        self.release(&mut state);
        state.results.clear();
        state.live = None;
        state.has_results = false;
        tracing::trace!("session disposed");
        self.0.tracer.borrow_mut().trace_dispose();
    }

    /// Claims the next result set for a new reader.
    ///
    /// A result set still fed by the live cursor is buffered first so that
    /// its reader can go on after the cursor moves. Returns `None` when no
    /// result sets remain.
    pub(crate) fn next_result_set(&self) -> Result<Option<usize>, RuntimeError> {
        let mut state = self.state_mut()?;
        self.drain_live(&mut state)?;

        if state.claimed < state.results.len() {
            let result = state.claimed;
            state.claimed += 1;
            return Ok(Some(result));
        }
        if state.has_results && state.cursor.is_some() {
            let result = state.results.len();
            state.results.push(ResultSet {
                rows: None,
                position: Position::NotStarted,
            });
            state.live = Some(result);
            state.has_results = false;
            state.claimed = result + 1;
            return Ok(Some(result));
        }
        Ok(None)
    }

    /// Advances result set `result` by one row.
    ///
    /// Once a result set is exhausted it stays exhausted. Exhausting the
    /// live result set moves the cursor to the next one, releasing it when
    /// none remain.
    pub(crate) fn read(&self, result: usize) -> Result<bool, RuntimeError> {
        let mut guard = self.state_mut()?;
        let state = &mut *guard;
        let is_live = state.live == Some(result);
        let Some(set) = state.results.get_mut(result) else {
            return Ok(false);
        };
        if set.position == Position::Finished {
            return Ok(false);
        }

        let has_row = match (&mut set.rows, state.cursor.as_mut()) {
            (Some(rows), _) => rows.read()?,
            (None, Some(cursor)) if is_live && !cursor.is_closed() => cursor.read()?,
            _ => false,
        };
        set.position = if has_row { Position::HasRow } else { Position::Finished };
        self.0.tracer.borrow_mut().trace_row(result, has_row);

        if !has_row && is_live {
            self.advance(state)?;
        }
        Ok(has_row)
    }

    /// Drains the rest of result set `result` into memory if the live
    /// cursor still feeds it, then moves the cursor on.
    pub(crate) fn buffer_result(&self, result: usize) -> Result<(), RuntimeError> {
        let mut state = self.state_mut()?;
        if state.live != Some(result) {
            return Ok(());
        }
        self.drain_live(&mut state)
    }

    /// Runs `f` against the current row of result set `result`.
    pub(crate) fn with_row<R>(
        &self,
        result: usize,
        f: impl FnOnce(&dyn RowCursor) -> Result<R, CursorError>,
    ) -> Result<R, RuntimeError> {
        let state = self.state()?;
        let set = state
            .results
            .get(result)
            .filter(|set| set.position == Position::HasRow)
            .ok_or(CursorError::NoRow)?;
        let cursor: &dyn RowCursor = match (&set.rows, &state.cursor) {
            (Some(rows), _) => rows,
            (None, Some(cursor)) if state.live == Some(result) => &**cursor,
            _ => return Err(CursorError::NoRow.into()),
        };
        Ok(f(cursor)?)
    }

    /// Binds named columns to ordinals of result set `result`.
    ///
    /// Matching ignores case and identifier delimiters. A missing required
    /// column is an error; a missing optional one binds to `None`.
    pub(crate) fn resolve_named_columns(
        &self,
        result: usize,
        columns: &[NamedColumn],
    ) -> Result<Vec<Option<usize>>, RuntimeError> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state()?;
        let names: &dyn RowCursor = match state.results.get(result) {
            Some(ResultSet { rows: Some(rows), .. }) => rows,
            _ => match &state.cursor {
                Some(cursor) if state.live == Some(result) => &**cursor,
                _ => return Err(CursorError::NoRow.into()),
            },
        };
        let mut lookup = HashMap::new();
        for ordinal in 0..names.field_count() {
            lookup.insert(normalize_column_name(names.name(ordinal)?), ordinal);
        }

        columns
            .iter()
            .map(|column| match lookup.get(&normalize_column_name(&column.name)) {
                Some(&ordinal) => Ok(Some(ordinal)),
                None if column.required => Err(RuntimeError::RequiredColumnMissing {
                    name: column.name.to_string(),
                }),
                None => Ok(None),
            })
            .collect()
    }

    pub(crate) fn subquery(&self, index: usize) -> Option<Rc<dyn SubQueryExecutor>> {
        self.0.subqueries.get(index).cloned()
    }

    pub(crate) fn trace(&self, f: impl FnOnce(&mut dyn Tracer)) {
        f(&mut **self.0.tracer.borrow_mut());
    }

    fn state(&self) -> Result<std::cell::Ref<'_, SessionState>, RuntimeError> {
        let state = self.0.state.borrow();
        if state.disposed {
            return Err(RuntimeError::DisposedUse { what: "session" });
        }
        Ok(state)
    }

    fn state_mut(&self) -> Result<std::cell::RefMut<'_, SessionState>, RuntimeError> {
        let state = self.0.state.borrow_mut();
        if state.disposed {
            return Err(RuntimeError::DisposedUse { what: "session" });
        }
        Ok(state)
    }

    /// Snapshots the live result set, keeping its current row, and moves
    /// the cursor to the next result set.
    fn drain_live(&self, state: &mut SessionState) -> Result<(), RuntimeError> {
        let Some(result) = state.live else {
            return Ok(());
        };
        let position = state.results[result].position;
        if position != Position::Finished
            && let Some(cursor) = state.cursor.as_mut()
        {
            let rows = BufferedResult::snapshot(&mut **cursor, position == Position::HasRow)?;
            self.trace_buffered(result, rows.len());
            state.results[result].rows = Some(rows);
        }
        self.advance(state)
    }

    fn advance(&self, state: &mut SessionState) -> Result<(), RuntimeError> {
        state.live = None;
        let has_results = match state.cursor.as_mut() {
            Some(cursor) if !cursor.is_closed() => cursor.next_result()?,
            _ => false,
        };
        state.has_results = has_results;
        tracing::debug!(has_results, "advanced to next result set");
        self.0.tracer.borrow_mut().trace_next_result(has_results);

        if !has_results {
            self.release(state);
        }
        Ok(())
    }

    fn release(&self, state: &mut SessionState) {
        let Some(mut cursor) = state.cursor.take() else {
            return;
        };
        let close = !self.0.retain_cursor;
        if close {
            cursor.close();
        }
        tracing::trace!(closed = close, "cursor released");
        self.0.tracer.borrow_mut().trace_release(close);
    }

    fn trace_buffered(&self, result: usize, rows: usize) {
        tracing::debug!(result, rows, "buffered result set");
        self.0.tracer.borrow_mut().trace_buffered(result, rows);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("Session")
            .field("results", &state.results.len())
            .field("live", &state.live)
            .field("buffered", &state.buffered)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// Lowercases a column name and strips `[..]`, `".."` and `` `..` ``
/// delimiters from each dotted part.
pub fn normalize_column_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.trim().chars().peekable();
    while let Some(c) = chars.next() {
        let close = match c {
            '[' => ']',
            '"' => '"',
            '`' => '`',
            _ => {
                out.extend(c.to_lowercase());
                continue;
            }
        };
        while let Some(c) = chars.next() {
            if c != close {
                out.extend(c.to_lowercase());
            } else if chars.peek() == Some(&close) {
                // Doubled delimiter escapes itself.
                chars.next();
                out.push(close);
            } else {
                break;
            }
        }
    }
    out
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    cursor: Box<dyn RowCursor>,
    parent_args: Vec<Value>,
    user_args: Vec<Value>,
    subqueries: Vec<Rc<dyn SubQueryExecutor>>,
    services: Option<Rc<dyn DataServices>>,
    retain_cursor: bool,
    tracer: Box<dyn Tracer>,
}

impl SessionBuilder {
    pub fn new(cursor: Box<dyn RowCursor>) -> Self {
        Self {
            cursor,
            parent_args: Vec::new(),
            user_args: Vec::new(),
            subqueries: Vec::new(),
            services: None,
            retain_cursor: false,
            tracer: Box::new(NoopTracer),
        }
    }

    /// Arguments prepended to every sub-query call.
    pub fn parent_args(mut self, args: Vec<Value>) -> Self {
        self.parent_args = args;
        self
    }

    /// Caller arguments, readable by plans and passed to sub-queries.
    pub fn user_args(mut self, args: Vec<Value>) -> Self {
        self.user_args = args;
        self
    }

    /// Registers the next sub-query executor; indexes follow call order.
    pub fn subquery(mut self, executor: Rc<dyn SubQueryExecutor>) -> Self {
        self.subqueries.push(executor);
        self
    }

    /// Defaults to a fresh [`IdentityServices`] with deferred loading off.
    pub fn services(mut self, services: Rc<dyn DataServices>) -> Self {
        self.services = Some(services);
        self
    }

    /// Leave the cursor open when the session lets go of it.
    pub fn retain_cursor(mut self, retain: bool) -> Self {
        self.retain_cursor = retain;
        self
    }

    pub fn tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    pub fn build(self) -> Session {
        let has_results = !self.cursor.is_closed();
        let services = self
            .services
            .unwrap_or_else(|| Rc::new(IdentityServices::new()));
        Session(Rc::new(SessionInner {
            state: RefCell::new(SessionState {
                cursor: Some(self.cursor),
                results: Vec::new(),
                live: None,
                has_results,
                claimed: 0,
                buffered: false,
                disposed: false,
            }),
            parent_args: self.parent_args,
            user_args: self.user_args,
            subqueries: self.subqueries,
            services,
            retain_cursor: self.retain_cursor,
            tracer: RefCell::new(self.tracer),
        }))
    }
}
