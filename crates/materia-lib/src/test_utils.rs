use std::cell::{Cell, RefCell};
use std::rc::Rc;

use materia_core::{ClassType, Instance, ObjectRef, Sequence, Ty, Value};
use materia_plan::{Association, MetaMemberRef, MetaType, MetaTypeRef, PlanNode};
use materia_reader::{CursorError, DeferredSourceFactory, MemoryCursor, RowCursor};

/// Cursor counting row reads, with an observable closed flag.
pub struct CountingCursor {
    inner: MemoryCursor,
    pub reads: Rc<Cell<usize>>,
    pub closed: Rc<Cell<bool>>,
}

impl CountingCursor {
    pub fn new(names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            inner: MemoryCursor::new(names, rows),
            reads: Rc::default(),
            closed: Rc::default(),
        }
    }

    pub fn with_result(mut self, names: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.inner = self.inner.with_result(names, rows);
        self
    }
}

impl RowCursor for CountingCursor {
    fn read(&mut self) -> Result<bool, CursorError> {
        self.reads.set(self.reads.get() + 1);
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

/// `Customer` and `Order` mappings.
pub struct Shop {
    pub customer: MetaTypeRef,
    pub order: MetaTypeRef,
    pub orders: MetaMemberRef,
}

impl Shop {
    pub fn new() -> Self {
        let order_class = ClassType::reference("Order");
        let order = MetaType::builder(&order_class)
            .entity()
            .key("Id", Ty::I32)
            .field("Total", Ty::F64)
            .build();
        let customer = MetaType::builder(&ClassType::reference("Customer"))
            .entity()
            .key("Id", Ty::I32)
            .field("Name", Ty::String)
            .association("Orders", Ty::entity_set(Ty::class(&order_class)), Association::Many, true)
            .build();
        let orders = match customer.member("Orders") {
            Some(member) => member.clone(),
            None => panic!("Customer has no Orders member"),
        };
        Self { customer, order, orders }
    }

    /// `new Customer { Id = col0, Name = col1 }`
    pub fn customer_plan(&self) -> PlanNode {
        PlanNode::new_object(
            &self.customer,
            vec![("Id", PlanNode::column(0, Ty::I32)), ("Name", PlanNode::column(1, Ty::String))],
        )
    }

    /// `new Customer { Id = col0, Orders = link(col0) }`
    pub fn customer_with_orders_plan(&self) -> PlanNode {
        PlanNode::new_object(
            &self.customer,
            vec![
                ("Id", PlanNode::column(0, Ty::I32)),
                ("Orders", PlanNode::link(&self.orders, vec![PlanNode::column(0, Ty::I32)])),
            ],
        )
    }

    pub fn order(&self, id: i32, total: f64) -> Value {
        let mut instance = Instance::new(self.order.class().clone());
        instance.set("Id".into(), Value::I32(id));
        instance.set("Total".into(), Value::F64(total));
        Value::Object(ObjectRef::new(instance))
    }
}

/// Factory serving one order per requested key, or per owner `Id`.
pub struct OrdersFactory {
    pub shop: Rc<Shop>,
    pub requests: RefCell<Vec<String>>,
}

impl OrdersFactory {
    pub fn new(shop: Rc<Shop>) -> Self {
        Self {
            shop,
            requests: RefCell::default(),
        }
    }

    fn orders_for(&self, ids: &[Value]) -> Sequence {
        let orders = ids
            .iter()
            .filter_map(Value::as_i64)
            .map(|id| self.shop.order(id as i32 * 10, 1.5))
            .collect();
        Sequence::from_vec(orders)
    }
}

impl DeferredSourceFactory for OrdersFactory {
    fn create_deferred_source(&self, keys: Vec<Value>) -> Sequence {
        self.requests.borrow_mut().push(format!("keys {keys:?}"));
        self.orders_for(&keys)
    }

    fn create_nested_source(&self, owner: Value) -> Sequence {
        let id = owner.member("Id").unwrap_or(Value::Null);
        self.requests.borrow_mut().push(format!("owner {id:?}"));
        self.orders_for(&[id])
    }
}

pub fn customer_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::I32(1), Value::from("a")],
        vec![Value::I32(2), Value::from("b")],
        vec![Value::I32(1), Value::from("a")],
    ]
}

pub fn object(value: &Value) -> &ObjectRef {
    match value.as_object() {
        Some(object) => object,
        None => panic!("expected an object, found {value:?}"),
    }
}
