//! Bounded recency cache of compiled routines.
//!
//! Keys compare plans structurally, so lookup is a linear scan. Capacity is
//! small (10 by default), which keeps that cheap. A hit moves the entry to
//! the front; inserting into a full cache evicts the back.

use std::collections::VecDeque;
use std::sync::Mutex;

use materia_core::{CoercionOptions, Ty};
use materia_plan::{CompiledRoutine, LoadOptions, MappingIdentity, PlanNode, SourceShape, structurally_equal};

use crate::compile::CompileOptions;

pub const DEFAULT_CAPACITY: usize = 10;

/// Everything that determines a compiled routine.
#[derive(Clone, Debug)]
pub struct CacheKey {
    element: Ty,
    shape: SourceShape,
    mapping: MappingIdentity,
    load_options: LoadOptions,
    coercion: CoercionOptions,
    null_substitution: bool,
    plan: PlanNode,
}

impl CacheKey {
    /// Builds a key; the stored plan has its source handles stripped.
    pub fn new(element: &Ty, options: &CompileOptions, plan: &PlanNode) -> Self {
        Self {
            element: element.clone(),
            shape: options.get_shape().clone(),
            mapping: options.get_mapping().clone(),
            load_options: options.get_load_options().clone(),
            coercion: *options.get_coercion(),
            null_substitution: options.get_null_substitution(),
            plan: plan.without_sources(),
        }
    }

    pub fn element(&self) -> &Ty {
        &self.element
    }

    pub fn plan(&self) -> &PlanNode {
        &self.plan
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element
            && self.shape == other.shape
            && self.mapping == other.mapping
            && self.load_options == other.load_options
            && self.coercion == other.coercion
            && self.null_substitution == other.null_substitution
            && structurally_equal(&self.plan, &other.plan)
    }
}

/// Where `MaterializerCompiler::compile` looks up and stores routines.
pub trait RoutineStore {
    fn lookup(&mut self, key: &CacheKey) -> Option<CompiledRoutine>;
    fn store(&mut self, key: CacheKey, routine: CompiledRoutine);
}

impl<S: RoutineStore + ?Sized> RoutineStore for &mut S {
    fn lookup(&mut self, key: &CacheKey) -> Option<CompiledRoutine> {
        (**self).lookup(key)
    }

    fn store(&mut self, key: CacheKey, routine: CompiledRoutine) {
        (**self).store(key, routine)
    }
}

/// Single-owner routine cache.
#[derive(Debug)]
pub struct RoutineCache {
    entries: VecDeque<(CacheKey, CompiledRoutine)>,
    capacity: usize,
}

impl Default for RoutineCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl RoutineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` routines (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<CompiledRoutine> {
        let Some(pos) = self.entries.iter().position(|(k, _)| k == key) else {
            tracing::debug!(element = %key.element, "routine cache miss");
            return None;
        };
        tracing::debug!(element = %key.element, position = pos, "routine cache hit");
        let entry = self.entries.remove(pos)?;
        let routine = entry.1.clone();
        self.entries.push_front(entry);
        Some(routine)
    }

    pub fn put(&mut self, key: CacheKey, routine: CompiledRoutine) {
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            self.entries.remove(pos);
        } else if self.entries.len() >= self.capacity
            && let Some((evicted, _)) = self.entries.pop_back()
        {
            tracing::debug!(element = %evicted.element, "routine cache eviction");
        }
        self.entries.push_front((key, routine));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl RoutineStore for RoutineCache {
    fn lookup(&mut self, key: &CacheKey) -> Option<CompiledRoutine> {
        self.get(key)
    }

    fn store(&mut self, key: CacheKey, routine: CompiledRoutine) {
        self.put(key, routine)
    }
}

/// Routine cache shared between threads; every access takes the lock.
#[derive(Debug, Default)]
pub struct SharedRoutineCache {
    inner: Mutex<RoutineCache>,
}

impl SharedRoutineCache {
    pub fn new(cache: RoutineCache) -> Self {
        Self {
            inner: Mutex::new(cache),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CompiledRoutine> {
        self.with(|cache| cache.get(key))
    }

    pub fn put(&self, key: CacheKey, routine: CompiledRoutine) {
        self.with(|cache| cache.put(key, routine))
    }

    pub fn len(&self) -> usize {
        self.with(|cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with<R>(&self, f: impl FnOnce(&mut RoutineCache) -> R) -> R {
        // A panic while holding the lock leaves the list consistent.
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl RoutineStore for &SharedRoutineCache {
    fn lookup(&mut self, key: &CacheKey) -> Option<CompiledRoutine> {
        self.get(key)
    }

    fn store(&mut self, key: CacheKey, routine: CompiledRoutine) {
        self.put(key, routine)
    }
}
