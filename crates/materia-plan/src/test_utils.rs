use materia_core::{ClassType, Ty};

use crate::meta::{Association, MetaMemberRef, MetaType, MetaTypeRef};

pub struct Shop {
    pub customer: MetaTypeRef,
    pub order: MetaTypeRef,
}

impl Shop {
    pub fn new() -> Self {
        let order_class = ClassType::reference("Order");
        let order = MetaType::builder(&order_class)
            .entity()
            .key("Id", Ty::I32)
            .field("CustomerId", Ty::I32)
            .field("Total", Ty::F64)
            .build();

        let customer = MetaType::builder(&ClassType::reference("Customer"))
            .entity()
            .key("Id", Ty::I32)
            .field("Name", Ty::String)
            .property("Display", Ty::String, false)
            .association("Orders", Ty::entity_set(Ty::class(&order_class)), Association::Many, true)
            .build();

        Self { customer, order }
    }

    pub fn member(&self, meta: &MetaTypeRef, name: &str) -> MetaMemberRef {
        match meta.member(name) {
            Some(member) => member.clone(),
            None => panic!("no member {name} on {}", meta.name()),
        }
    }
}
