//! In-memory result sets.
//!
//! [`BufferedResult`] is what a session keeps after draining a result set
//! from the live cursor. [`MemoryCursor`] chains several of them into a
//! multi-result cursor.

use std::collections::VecDeque;

use materia_core::Value;

use crate::cursor::{CursorError, RowCursor};

/// A fully read result set with its own row position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferedResult {
    names: Vec<String>,
    rows: Vec<Vec<Value>>,
    /// `None` before the first read, `rows.len()` once exhausted.
    position: Option<usize>,
}

impl BufferedResult {
    pub fn new(names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            names,
            rows,
            position: None,
        }
    }

    /// Drains the rest of the cursor's current result set.
    ///
    /// With `include_current`, the row the cursor is positioned on is kept
    /// as the first row and the snapshot is left positioned on it, so the
    /// caller sees the same current row afterwards.
    pub fn snapshot(cursor: &mut dyn RowCursor, include_current: bool) -> Result<Self, CursorError> {
        let names = (0..cursor.field_count())
            .map(|ordinal| cursor.name(ordinal).map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        if include_current {
            rows.push(capture_row(cursor)?);
        }
        while cursor.read()? {
            rows.push(capture_row(cursor)?);
        }

        Ok(Self {
            names,
            rows,
            position: include_current.then_some(0),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn current(&self) -> Result<&[Value], CursorError> {
        self.position
            .and_then(|p| self.rows.get(p))
            .map(Vec::as_slice)
            .ok_or(CursorError::NoRow)
    }
}

fn capture_row(cursor: &dyn RowCursor) -> Result<Vec<Value>, CursorError> {
    (0..cursor.field_count())
        .map(|ordinal| cursor.value(ordinal))
        .collect()
}

impl RowCursor for BufferedResult {
    fn read(&mut self) -> Result<bool, CursorError> {
        let next = self.position.map_or(0, |p| (p + 1).min(self.rows.len()));
        self.position = Some(next);
        Ok(next < self.rows.len())
    }

    fn field_count(&self) -> usize {
        self.names.len()
    }

    fn name(&self, ordinal: usize) -> Result<&str, CursorError> {
        self.names
            .get(ordinal)
            .map(String::as_str)
            .ok_or(CursorError::OrdinalOutOfRange {
                ordinal,
                count: self.names.len(),
            })
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        let row = self.current()?;
        row.get(ordinal).cloned().ok_or(CursorError::OrdinalOutOfRange {
            ordinal,
            count: row.len(),
        })
    }

    fn next_result(&mut self) -> Result<bool, CursorError> {
        Ok(false)
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}

/// Multi-result cursor over in-memory rows.
#[derive(Clone, Debug, Default)]
pub struct MemoryCursor {
    current: Option<BufferedResult>,
    pending: VecDeque<BufferedResult>,
    closed: bool,
}

impl MemoryCursor {
    /// Single result set with the given column names.
    pub fn new(names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self::default().with_result(names, rows)
    }

    /// Appends another result set.
    pub fn with_result(mut self, names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let result = BufferedResult::new(names.iter().map(|n| (*n).to_owned()).collect(), rows);
        if self.current.is_none() && self.pending.is_empty() {
            self.current = Some(result);
        } else {
            self.pending.push_back(result);
        }
        self
    }

    fn result(&self) -> Result<&BufferedResult, CursorError> {
        if self.closed {
            return Err(CursorError::Closed);
        }
        self.current.as_ref().ok_or(CursorError::NoRow)
    }
}

impl RowCursor for MemoryCursor {
    fn read(&mut self) -> Result<bool, CursorError> {
        if self.closed {
            return Err(CursorError::Closed);
        }
        match &mut self.current {
            Some(result) => result.read(),
            None => Ok(false),
        }
    }

    fn field_count(&self) -> usize {
        self.current.as_ref().map_or(0, BufferedResult::field_count)
    }

    fn name(&self, ordinal: usize) -> Result<&str, CursorError> {
        self.result()?.name(ordinal)
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        self.result()?.value(ordinal)
    }

    fn next_result(&mut self) -> Result<bool, CursorError> {
        if self.closed {
            return Err(CursorError::Closed);
        }
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        self.closed = true;
        self.current = None;
        self.pending.clear();
    }
}
