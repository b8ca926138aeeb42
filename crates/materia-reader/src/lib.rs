#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Reading materialized objects from a row cursor.
//!
//! - [`RowCursor`]: the provider's multi-result row stream
//! - [`Session`]: cursor ownership, result-set sequencing and buffering
//! - [`ObjectReader`]: runs a compiled routine once per row
//! - [`DataServices`], [`SubQueryExecutor`]: collaborators called while materializing
//! - [`Tracer`]: programmatic instrumentation

mod buffer;
mod context;
mod cursor;
mod reader;
mod services;
mod session;
mod trace;

#[cfg(test)]
mod buffer_tests;
#[cfg(test)]
mod services_tests;
#[cfg(test)]
pub mod test_utils;

pub use buffer::{BufferedResult, MemoryCursor};
pub use cursor::{CursorError, RowCursor};
pub use reader::{ObjectReader, ReaderState};
pub use services::{
    DataServices, DeferredSourceFactory, IdentityKey, IdentityMap, IdentityServices, SubQueryExecutor,
};
pub use session::{Session, SessionBuilder, SessionStatus, normalize_column_name};
pub use trace::{NoopTracer, PrintTracer, Tracer, Verbosity};
