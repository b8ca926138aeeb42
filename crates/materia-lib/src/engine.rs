//! Compile-and-read entry point.

use materia_compiler::{CompileOptions, MaterializerCompiler, RoutineCache, SharedRoutineCache};
use materia_core::Ty;
use materia_plan::{CompiledRoutine, PlanNode};
use materia_reader::{ObjectReader, RowCursor, Session, SessionBuilder};

use crate::Result;
use crate::config::MaterializerConfig;

/// Compiles plans through a shared routine cache and opens readers over
/// row cursors.
///
/// One engine is meant to outlive many queries. Compiled routines are
/// `Send + Sync`; sessions and readers stay on the thread that opened them.
#[derive(Debug)]
pub struct Engine {
    config: MaterializerConfig,
    compiler: MaterializerCompiler,
    cache: SharedRoutineCache,
}

impl Engine {
    pub fn new(config: MaterializerConfig) -> Self {
        let options = config.compile_options();
        Self::with_options(config, options)
    }

    /// Uses `options` for compilation instead of deriving them from `config`.
    ///
    /// Shape, mapping and load options are only reachable this way.
    pub fn with_options(config: MaterializerConfig, options: CompileOptions) -> Self {
        let cache = SharedRoutineCache::new(RoutineCache::with_capacity(config.cache_capacity));
        Self {
            config,
            compiler: MaterializerCompiler::new(options),
            cache,
        }
    }

    pub fn config(&self) -> &MaterializerConfig {
        &self.config
    }

    pub fn options(&self) -> &CompileOptions {
        self.compiler.options()
    }

    pub fn cache(&self) -> &SharedRoutineCache {
        &self.cache
    }

    /// Compiles `plan` for elements of type `element`, reusing a cached
    /// routine when a structurally equal plan was compiled before.
    pub fn compile(&self, plan: &PlanNode, element: &Ty) -> Result<CompiledRoutine> {
        Ok(self.compiler.compile(plan, element, &self.cache)?)
    }

    /// Starts a session over `cursor` with the engine's cursor policy.
    pub fn session(&self, cursor: Box<dyn RowCursor>) -> SessionBuilder {
        Session::builder(cursor).retain_cursor(self.config.retain_cursor)
    }

    /// Opens a reader over the session's next result set. The session
    /// stays with the caller.
    pub fn open(&self, session: &Session, plan: &PlanNode, element: &Ty) -> Result<ObjectReader> {
        let routine = self.compile(plan, element)?;
        Ok(ObjectReader::open(session, routine, false)?)
    }

    /// Compiles `plan`, builds the session and opens a reader that owns it.
    ///
    /// The session is disposed when the reader is exhausted or dropped, or
    /// right away if opening fails.
    pub fn execute(&self, plan: &PlanNode, element: &Ty, session: SessionBuilder) -> Result<ObjectReader> {
        let routine = self.compile(plan, element)?;
        let session = session.build();
        match ObjectReader::open(&session, routine, true) {
            Ok(reader) => Ok(reader),
            Err(err) => {
                tracing::debug!(error = %err, "failed to open reader");
                session.dispose();
                Err(err.into())
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(MaterializerConfig::default())
    }
}
