use std::cell::{Cell, RefCell};
use std::rc::Rc;

use materia_core::{ClassType, Instance, ObjectRef, Sequence, Ty, Value};
use materia_plan::{
    Association, CompiledRoutine, MetaMemberRef, MetaType, MetaTypeRef, RowContext, RuntimeError,
};

use crate::buffer::MemoryCursor;
use crate::cursor::{CursorError, RowCursor};
use crate::services::{DataServices, DeferredSourceFactory, IdentityServices};
use crate::session::Session;

/// In-memory cursor whose closed flag is observable from outside.
///
/// Setting the flag from a test simulates cancellation.
pub struct VecCursor {
    inner: MemoryCursor,
    closed: Rc<Cell<bool>>,
}

impl VecCursor {
    pub fn new(names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            inner: MemoryCursor::new(names, rows),
            closed: Rc::default(),
        }
    }

    pub fn with_result(mut self, names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.inner = self.inner.with_result(names, rows);
        self
    }

    pub fn closed_flag(&self) -> Rc<Cell<bool>> {
        self.closed.clone()
    }

    pub fn session(self) -> Session {
        Session::builder(Box::new(self)).build()
    }
}

impl RowCursor for VecCursor {
    fn read(&mut self) -> Result<bool, CursorError> {
        if self.closed.get() {
            return Err(CursorError::Closed);
        }
        self.inner.read()
    }

    fn field_count(&self) -> usize {
        self.inner.field_count()
    }

    fn name(&self, ordinal: usize) -> Result<&str, CursorError> {
        self.inner.name(ordinal)
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        self.inner.value(ordinal)
    }

    fn next_result(&mut self) -> Result<bool, CursorError> {
        self.inner.next_result()
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn close(&mut self) {
        self.closed.set(true);
        self.inner.close();
    }
}

pub fn ids(values: &[i32]) -> Vec<Vec<Value>> {
    values.iter().map(|v| vec![Value::I32(*v)]).collect()
}

/// Routine yielding column 0 as `int32`.
pub fn first_column() -> CompiledRoutine {
    CompiledRoutine::builder(Ty::I32).build(|ctx: &mut dyn RowContext| ctx.column(0, &Ty::I32))
}

/// Routine yielding a named column, null when absent.
pub fn named_column(name: &str, required: bool) -> CompiledRoutine {
    let mut builder = CompiledRoutine::builder(Ty::nullable(Ty::String));
    let slot = builder.named_column(name.into(), required);
    builder.build(move |ctx| match ctx.named_ordinal(slot) {
        Some(ordinal) => ctx.column(ordinal, &Ty::String),
        None => Ok(Value::Null),
    })
}

/// Routine that reads `count` from column 0 and gathers column 1 over that
/// many rows.
pub fn joined_strings() -> CompiledRoutine {
    CompiledRoutine::builder(Ty::list(Ty::String)).build(|ctx| {
        let count = ctx.column(0, &Ty::I32)?.as_i64().unwrap_or(0);
        let mut items = Vec::new();
        for i in 0..count {
            if i > 0 && !ctx.read()? {
                break;
            }
            items.push(ctx.column(1, &Ty::String)?);
        }
        Ok(Value::List(items))
    })
}

pub struct Catalog {
    pub customer: MetaTypeRef,
    pub orders: MetaMemberRef,
}

impl Catalog {
    pub fn new() -> Self {
        let order = ClassType::reference("Order");
        let customer = MetaType::builder(&ClassType::reference("Customer"))
            .entity()
            .key("Id", Ty::I32)
            .field("Name", Ty::String)
            .association("Orders", Ty::entity_set(Ty::class(&order)), Association::Many, true)
            .build();
        let orders = match customer.member("Orders") {
            Some(member) => member.clone(),
            None => panic!("Customer has no Orders member"),
        };
        Self { customer, orders }
    }

    /// Routine building a `Customer` from `(Id, Name)` through the
    /// identity map, the way compiled `New` nodes do.
    pub fn customer_routine(&self) -> CompiledRoutine {
        let meta = self.customer.clone();
        CompiledRoutine::builder(meta.ty()).build(move |ctx| {
            let instance = ObjectRef::new(Instance::new(meta.class().clone()));
            instance.set("Id".into(), ctx.column(0, &Ty::I32)?);
            let canonical = ctx.insert_lookup(&meta, instance.clone())?;
            if canonical.ptr_eq(&instance) {
                instance.set("Name".into(), ctx.column(1, &Ty::String)?);
                ctx.entity_materialized(&meta, &instance)?;
            }
            Ok(Value::Object(canonical))
        })
    }

    /// Routine returning the deferred `Orders` source keyed by column 0.
    pub fn orders_routine(&self) -> CompiledRoutine {
        let orders = self.orders.clone();
        let mut builder = CompiledRoutine::builder(Ty::seq(Ty::Any));
        let slot = builder.local();
        builder.build(move |ctx| {
            let key = ctx.column(0, &Ty::I32)?;
            Ok(Value::Sequence(ctx.link_source(slot, &orders, vec![key])?))
        })
    }
}

/// Deferred-source factory recording the keys it was asked for.
#[derive(Default)]
pub struct RecordingFactory {
    pub requests: RefCell<Vec<String>>,
}

impl DeferredSourceFactory for RecordingFactory {
    fn create_deferred_source(&self, keys: Vec<Value>) -> Sequence {
        self.requests.borrow_mut().push(format!("keys {keys:?}"));
        Sequence::from_vec(keys)
    }

    fn create_nested_source(&self, owner: Value) -> Sequence {
        self.requests.borrow_mut().push(format!("owner {owner:?}"));
        Sequence::empty()
    }
}

/// Services that count factory lookups and delegate the rest.
pub struct CountingServices {
    pub inner: IdentityServices,
    pub lookups: Cell<usize>,
}

impl DataServices for CountingServices {
    fn insert_lookup(&self, meta: &MetaTypeRef, instance: ObjectRef) -> Result<ObjectRef, RuntimeError> {
        self.inner.insert_lookup(meta, instance)
    }

    fn can_defer_load(&self) -> bool {
        self.inner.can_defer_load()
    }

    fn deferred_source_factory(&self, member: &MetaMemberRef) -> Result<Rc<dyn DeferredSourceFactory>, RuntimeError> {
        self.lookups.set(self.lookups.get() + 1);
        self.inner.deferred_source_factory(member)
    }
}

/// Materializes every row of a fresh reader.
pub fn read_all(session: &Session, routine: CompiledRoutine) -> Result<Vec<Value>, RuntimeError> {
    crate::reader::ObjectReader::open(session, routine, false)?.collect()
}
