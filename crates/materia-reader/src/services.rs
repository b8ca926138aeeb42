//! Collaborators a session calls out to: identity tracking, deferred
//! loading and sub-query execution.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use materia_core::{KeyPart, ObjectRef, Sequence, Value};
use materia_plan::{MemberId, MetaMember, MetaMemberRef, MetaTypeRef, RuntimeError};

/// Identity, tracking and deferred-loading services of a data context.
pub trait DataServices {
    /// Registers `instance` and returns the canonical instance for its
    /// identity. Returning a different instance switches the routine into
    /// cached mode for the rest of that object.
    fn insert_lookup(&self, meta: &MetaTypeRef, instance: ObjectRef) -> Result<ObjectRef, RuntimeError>;

    /// Called once per newly materialized entity, after every member is set.
    fn on_entity_materialized(&self, _meta: &MetaTypeRef, _instance: &ObjectRef) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn can_defer_load(&self) -> bool;

    fn deferred_source_factory(&self, member: &MetaMemberRef) -> Result<Rc<dyn DeferredSourceFactory>, RuntimeError>;
}

/// Produces lazy sources for one association member.
pub trait DeferredSourceFactory {
    /// Source of related rows selected by key values.
    fn create_deferred_source(&self, keys: Vec<Value>) -> Sequence;

    /// Source of related rows bound to the owning instance.
    fn create_nested_source(&self, owner: Value) -> Sequence;
}

/// Runs a client-side sub-query.
pub trait SubQueryExecutor {
    /// `parent_args` already end with the row's own arguments.
    fn execute(&self, parent_args: &[Value], user_args: &[Value]) -> Result<Sequence, RuntimeError>;
}

impl<F> SubQueryExecutor for F
where
    F: Fn(&[Value], &[Value]) -> Result<Sequence, RuntimeError>,
{
    fn execute(&self, parent_args: &[Value], user_args: &[Value]) -> Result<Sequence, RuntimeError> {
        self(parent_args, user_args)
    }
}

/// Identity of an entity: root class of its hierarchy plus key values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub root: String,
    pub parts: Vec<KeyPart>,
}

impl IdentityKey {
    /// Key of `instance` under `meta`, or `None` when the type has no
    /// primary key or a key value is not a scalar.
    pub fn of(meta: &MetaTypeRef, instance: &ObjectRef) -> Option<Self> {
        let parts = meta
            .primary_keys()
            .map(|member| instance.get(member.name()).and_then(|v| v.key_part()))
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }

        let mut root = meta.class().clone();
        while let Some(base) = root.base() {
            root = base.clone();
        }
        Some(Self {
            root: root.name().to_owned(),
            parts,
        })
    }
}

/// In-memory identity map, in first-seen order.
#[derive(Default)]
pub struct IdentityMap {
    entries: RefCell<IndexMap<IdentityKey, ObjectRef>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the instance already registered under the same identity, or
    /// registers `instance`. Instances without an identity pass through.
    pub fn insert_lookup(&self, meta: &MetaTypeRef, instance: ObjectRef) -> ObjectRef {
        let Some(key) = IdentityKey::of(meta, &instance) else {
            return instance;
        };
        self.entries.borrow_mut().entry(key).or_insert(instance).clone()
    }

    pub fn get(&self, key: &IdentityKey) -> Option<ObjectRef> {
        self.entries.borrow().get(key).cloned()
    }

    /// Registered instances in first-seen order.
    pub fn instances(&self) -> Vec<ObjectRef> {
        self.entries.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Ready-made [`DataServices`] over an [`IdentityMap`].
///
/// Deferred loading is off until enabled. Factories are registered per
/// association member.
#[derive(Default)]
pub struct IdentityServices {
    identities: IdentityMap,
    deferred_loading: bool,
    factories: IndexMap<MemberId, Rc<dyn DeferredSourceFactory>>,
    materialized: Cell<usize>,
}

impl IdentityServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deferred_loading(mut self, enabled: bool) -> Self {
        self.deferred_loading = enabled;
        self
    }

    pub fn factory(mut self, member: &MetaMember, factory: Rc<dyn DeferredSourceFactory>) -> Self {
        self.factories.insert(member.id().clone(), factory);
        self
    }

    pub fn identities(&self) -> &IdentityMap {
        &self.identities
    }

    /// Number of entities materialized for the first time.
    pub fn materialized_count(&self) -> usize {
        self.materialized.get()
    }
}

impl DataServices for IdentityServices {
    fn insert_lookup(&self, meta: &MetaTypeRef, instance: ObjectRef) -> Result<ObjectRef, RuntimeError> {
        Ok(self.identities.insert_lookup(meta, instance))
    }

    fn on_entity_materialized(&self, meta: &MetaTypeRef, _instance: &ObjectRef) -> Result<(), RuntimeError> {
        self.materialized.set(self.materialized.get() + 1);
        tracing::trace!(entity = meta.name(), "entity materialized");
        Ok(())
    }

    fn can_defer_load(&self) -> bool {
        self.deferred_loading
    }

    fn deferred_source_factory(&self, member: &MetaMemberRef) -> Result<Rc<dyn DeferredSourceFactory>, RuntimeError> {
        self.factories
            .get(member.id())
            .cloned()
            .ok_or_else(|| RuntimeError::DeferredSource {
                member: member.id().to_string(),
                message: "no deferred source factory is registered".to_owned(),
            })
    }
}
