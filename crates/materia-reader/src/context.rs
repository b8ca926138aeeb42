//! `RowContext` implementation backing a reader's routine.

use std::rc::Rc;

use materia_core::{ObjectRef, Sequence, Ty, Value};
use materia_plan::{MetaMemberRef, MetaTypeRef, RowContext, RuntimeError};

use crate::services::DeferredSourceFactory;
use crate::session::Session;

/// Row services for one reader over one result set.
///
/// Holds no session borrow between calls, so collaborators may re-enter
/// the session.
pub(crate) struct ReaderContext<'a> {
    pub(crate) session: &'a Session,
    pub(crate) result: usize,
    pub(crate) ordinals: &'a [Option<usize>],
    /// Deferred-source factories, cached per local slot.
    pub(crate) locals: &'a mut [Option<Rc<dyn DeferredSourceFactory>>],
}

impl ReaderContext<'_> {
    fn factory(
        &mut self,
        slot: usize,
        member: &MetaMemberRef,
    ) -> Result<Rc<dyn DeferredSourceFactory>, RuntimeError> {
        if let Some(Some(factory)) = self.locals.get(slot) {
            return Ok(factory.clone());
        }
        let factory = self.session.services().deferred_source_factory(member)?;
        if let Some(local) = self.locals.get_mut(slot) {
            *local = Some(factory.clone());
        }
        Ok(factory)
    }
}

impl RowContext for ReaderContext<'_> {
    fn is_null(&mut self, ordinal: usize) -> Result<bool, RuntimeError> {
        self.session.with_row(self.result, |row| row.is_null(ordinal))
    }

    fn column(&mut self, ordinal: usize, wire: &Ty) -> Result<Value, RuntimeError> {
        self.session.with_row(self.result, |row| row.get_typed(ordinal, wire))
    }

    fn named_ordinal(&self, slot: usize) -> Option<usize> {
        self.ordinals.get(slot).copied().flatten()
    }

    fn argument(&self, index: usize) -> Result<Value, RuntimeError> {
        let args = self.session.user_args();
        args.get(index).cloned().ok_or(RuntimeError::ArgumentOutOfRange {
            index,
            count: args.len(),
        })
    }

    fn read(&mut self) -> Result<bool, RuntimeError> {
        self.session.read(self.result)
    }

    fn insert_lookup(&mut self, meta: &MetaTypeRef, instance: ObjectRef) -> Result<ObjectRef, RuntimeError> {
        self.session.services().insert_lookup(meta, instance)
    }

    fn entity_materialized(&mut self, meta: &MetaTypeRef, instance: &ObjectRef) -> Result<(), RuntimeError> {
        self.session.services().on_entity_materialized(meta, instance)
    }

    fn can_defer_load(&self) -> bool {
        self.session.services().can_defer_load()
    }

    fn link_source(
        &mut self,
        slot: usize,
        member: &MetaMemberRef,
        keys: Vec<Value>,
    ) -> Result<Sequence, RuntimeError> {
        let factory = self.factory(slot, member)?;
        Ok(Sequence::deferred(move || factory.create_deferred_source(keys)))
    }

    fn nested_link_source(
        &mut self,
        slot: usize,
        member: &MetaMemberRef,
        owner: &Value,
    ) -> Result<Sequence, RuntimeError> {
        let factory = self.factory(slot, member)?;
        let owner = owner.clone();
        Ok(Sequence::deferred(move || factory.create_nested_source(owner)))
    }

    fn execute_subquery(&mut self, index: usize, args: Vec<Value>) -> Result<Sequence, RuntimeError> {
        let executor = self
            .session
            .subquery(index)
            .ok_or(RuntimeError::SubQueryNotFound { index })?;
        let mut parent_args = self.session.parent_args().to_vec();
        parent_args.extend(args);
        executor
            .execute(&parent_args, self.session.user_args())
            .map_err(|err| RuntimeError::SubQuery {
                index,
                message: err.to_string(),
            })
    }
}
