//! Programmatic instrumentation of sessions and readers.
//!
//! `NoopTracer` is the default and compiles down to nothing. `PrintTracer`
//! collects one formatted line per event for debugging and snapshot tests.
//! Structured `tracing` events are emitted independently of the tracer.

use std::cell::RefCell;
use std::rc::Rc;

use materia_core::Value;

/// Verbosity level for trace output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Default: buffering, result-set advance, cursor release, dispose.
    #[default]
    Default,
    /// Verbose: also every materialized value.
    Verbose,
    /// Very verbose: also every row read.
    VeryVerbose,
}

/// Tracer trait for session and reader instrumentation.
///
/// Each method is called at a specific point:
/// - `trace_row` - after a row read, with whether a row was produced
/// - `trace_buffered` - after a result set is drained into memory
/// - `trace_next_result` - after the live cursor moves to another result set
/// - `trace_materialized` - after a reader materializes its current value
/// - `trace_release` - when the session lets go of its cursor
/// - `trace_dispose` - when the session is disposed
pub trait Tracer {
    fn trace_row(&mut self, result: usize, has_row: bool);

    fn trace_buffered(&mut self, result: usize, rows: usize);

    fn trace_next_result(&mut self, has_results: bool);

    fn trace_materialized(&mut self, result: usize, value: &Value);

    /// `closed` is false when the cursor is retained by its owner.
    fn trace_release(&mut self, closed: bool);

    fn trace_dispose(&mut self);
}

/// No-op tracer that gets optimized away completely.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_row(&mut self, _result: usize, _has_row: bool) {}

    #[inline(always)]
    fn trace_buffered(&mut self, _result: usize, _rows: usize) {}

    #[inline(always)]
    fn trace_next_result(&mut self, _has_results: bool) {}

    #[inline(always)]
    fn trace_materialized(&mut self, _result: usize, _value: &Value) {}

    #[inline(always)]
    fn trace_release(&mut self, _closed: bool) {}

    #[inline(always)]
    fn trace_dispose(&mut self) {}
}

/// Tracer that collects formatted lines.
///
/// Clones share the same line buffer, so a test can keep one handle and
/// hand the other to a session.
#[derive(Clone, Default)]
pub struct PrintTracer {
    verbosity: Verbosity,
    lines: Rc<RefCell<Vec<String>>>,
}

impl PrintTracer {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            lines: Rc::default(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// Collected lines joined by newlines.
    pub fn dump(&self) -> String {
        self.lines.borrow().join("\n")
    }

    /// Prints collected lines to stdout.
    pub fn print(&self) {
        for line in self.lines.borrow().iter() {
            println!("{line}");
        }
    }

    fn push(&self, line: String) {
        self.lines.borrow_mut().push(line);
    }
}

impl Tracer for PrintTracer {
    fn trace_row(&mut self, result: usize, has_row: bool) {
        if self.verbosity != Verbosity::VeryVerbose {
            return;
        }
        let what = if has_row { "read" } else { "end" };
        self.push(format!("{what} #{result}"));
    }

    fn trace_buffered(&mut self, result: usize, rows: usize) {
        self.push(format!("buffer #{result} ({rows} rows)"));
    }

    fn trace_next_result(&mut self, has_results: bool) {
        let what = if has_results { "next result" } else { "no more results" };
        self.push(what.to_owned());
    }

    fn trace_materialized(&mut self, result: usize, value: &Value) {
        if self.verbosity == Verbosity::Default {
            return;
        }
        self.push(format!("value #{result}: {value:?}"));
    }

    fn trace_release(&mut self, closed: bool) {
        let what = if closed { "close cursor" } else { "release cursor" };
        self.push(what.to_owned());
    }

    fn trace_dispose(&mut self) {
        self.push("dispose".to_owned());
    }
}
