use materia_core::{ClassType, KeyPart, ObjectRef, Sequence, Ty, Value};
use materia_plan::{
    Association, CompiledRoutine, Literal, MetaMemberRef, MetaType, MetaTypeRef, RowContext, RuntimeError,
};

/// Mapping fixtures shared by compiler tests.
pub struct Shop {
    pub customer: MetaTypeRef,
    pub order: MetaTypeRef,
    pub point: MetaTypeRef,
    pub person: MetaTypeRef,
    pub employee: MetaTypeRef,
}

impl Shop {
    pub fn new() -> Self {
        let order_class = ClassType::reference("Order");
        let customer_class = ClassType::reference("Customer");
        let order = MetaType::builder(&order_class)
            .entity()
            .key("Id", Ty::I32)
            .field("Total", Ty::F64)
            .association("Customer", Ty::lazy(Ty::class(&customer_class)), Association::One, true)
            .build();
        let customer = MetaType::builder(&customer_class)
            .entity()
            .key("Id", Ty::I32)
            .field("Name", Ty::String)
            .property("Display", Ty::String, false)
            .field("Tags", Ty::list(Ty::String))
            .association("Orders", Ty::entity_set(Ty::class(&order_class)), Association::Many, true)
            .build();
        let point = MetaType::builder(&ClassType::value("Point"))
            .field("X", Ty::I32)
            .field("Y", Ty::I32)
            .constructor(&["X"])
            .build();

        let person_class = ClassType::reference("Person");
        let employee_class = ClassType::derived("Employee", &person_class);
        let person = MetaType::builder(&person_class)
            .field("Name", Ty::String)
            .inheritance_code(Literal::I32(1), Ty::class(&person_class), true)
            .inheritance_code(Literal::I32(2), Ty::class(&employee_class), false)
            .build();
        let employee = MetaType::builder(&employee_class)
            .field("Name", Ty::String)
            .field("Salary", Ty::F64)
            .build();

        Self {
            customer,
            order,
            point,
            person,
            employee,
        }
    }

    pub fn member(&self, meta: &MetaTypeRef, name: &str) -> MetaMemberRef {
        match meta.member(name) {
            Some(member) => member.clone(),
            None => panic!("no member {name} on {}", meta.name()),
        }
    }
}

/// In-memory row context with a simple identity map keyed by `Id`.
#[derive(Default)]
pub struct TestRow {
    pub rows: Vec<Vec<Value>>,
    pub position: usize,
    pub named: Vec<Option<usize>>,
    pub args: Vec<Value>,
    pub defer: bool,
    pub link_items: Vec<Value>,
    pub subquery_results: Vec<Vec<Value>>,
    pub identities: Vec<(String, KeyPart, ObjectRef)>,
    pub log: Vec<String>,
}

impl TestRow {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn cell(&self, ordinal: usize) -> Result<&Value, RuntimeError> {
        self.rows
            .get(self.position)
            .and_then(|row| row.get(ordinal))
            .ok_or_else(|| RuntimeError::Cursor {
                message: format!("no column {ordinal} in row {}", self.position),
            })
    }

    /// Materializes every remaining row.
    pub fn run(&mut self, routine: &CompiledRoutine) -> Result<Vec<Value>, RuntimeError> {
        let mut out = Vec::new();
        if self.rows.is_empty() {
            return Ok(out);
        }
        loop {
            out.push(routine.materialize(self)?);
            if !self.read()? {
                return Ok(out);
            }
        }
    }
}

impl RowContext for TestRow {
    fn is_null(&mut self, ordinal: usize) -> Result<bool, RuntimeError> {
        Ok(self.cell(ordinal)?.is_null())
    }

    fn column(&mut self, ordinal: usize, _wire: &Ty) -> Result<Value, RuntimeError> {
        self.cell(ordinal).cloned()
    }

    fn named_ordinal(&self, slot: usize) -> Option<usize> {
        self.named.get(slot).copied().flatten()
    }

    fn argument(&self, index: usize) -> Result<Value, RuntimeError> {
        self.args.get(index).cloned().ok_or(RuntimeError::ArgumentOutOfRange {
            index,
            count: self.args.len(),
        })
    }

    fn read(&mut self) -> Result<bool, RuntimeError> {
        if self.position + 1 < self.rows.len() {
            self.position += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn insert_lookup(&mut self, meta: &MetaTypeRef, instance: ObjectRef) -> Result<ObjectRef, RuntimeError> {
        let key = instance
            .get("Id")
            .and_then(|id| id.key_part())
            .unwrap_or(KeyPart::Null);
        self.log.push(format!("lookup {} {key:?}", meta.name()));
        let existing = self
            .identities
            .iter()
            .find(|(name, k, _)| name == meta.name() && *k == key)
            .map(|(_, _, obj)| obj.clone());
        match existing {
            Some(obj) => Ok(obj),
            None => {
                self.identities.push((meta.name().to_string(), key, instance.clone()));
                Ok(instance)
            }
        }
    }

    fn entity_materialized(&mut self, meta: &MetaTypeRef, _instance: &ObjectRef) -> Result<(), RuntimeError> {
        self.log.push(format!("materialized {}", meta.name()));
        Ok(())
    }

    fn can_defer_load(&self) -> bool {
        self.defer
    }

    fn link_source(
        &mut self,
        slot: usize,
        member: &MetaMemberRef,
        keys: Vec<Value>,
    ) -> Result<Sequence, RuntimeError> {
        self.log.push(format!("link {} slot {slot} keys {keys:?}", member.id()));
        Ok(Sequence::from_vec(self.link_items.clone()))
    }

    fn nested_link_source(
        &mut self,
        slot: usize,
        member: &MetaMemberRef,
        owner: &Value,
    ) -> Result<Sequence, RuntimeError> {
        self.log.push(format!("nested {} slot {slot} owner {owner:?}", member.id()));
        Ok(Sequence::from_vec(self.link_items.clone()))
    }

    fn execute_subquery(&mut self, index: usize, args: Vec<Value>) -> Result<Sequence, RuntimeError> {
        self.log.push(format!("subquery {index} {args:?}"));
        match self.subquery_results.get(index) {
            Some(items) => Ok(Sequence::from_vec(items.clone())),
            None => Err(RuntimeError::SubQueryNotFound { index }),
        }
    }
}
