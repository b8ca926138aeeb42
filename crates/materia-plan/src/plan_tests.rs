use materia_core::{Ty, Value};

use crate::plan::{ClientWhen, Literal, PlanKind, PlanNode};
use crate::test_utils::Shop;

#[test]
fn builders_derive_types() {
    let element = PlanNode::column(2, Ty::String);
    let joined = PlanNode::joined_collection(element, PlanNode::column(1, Ty::I32));
    assert_eq!(joined.ty(), &Ty::list(Ty::String));

    let group = PlanNode::grouping(PlanNode::column(0, Ty::I32), joined);
    assert_eq!(group.ty(), &Ty::grouping(Ty::I32, Ty::String));

    let unwrapped = PlanNode::value_of(PlanNode::column(0, Ty::nullable(Ty::I32)));
    assert_eq!(unwrapped.ty(), &Ty::I32);

    let shop = Shop::new();
    let name = shop.member(&shop.customer, "Name");
    let read = PlanNode::member(PlanNode::unnamed_column(shop.customer.ty()), &name);
    assert_eq!(read.ty(), &Ty::String);
}

#[test]
fn column_wire_type_defaults_to_declared() {
    let node = PlanNode::column(3, Ty::nullable(Ty::I64));
    let PlanKind::ColumnRef { ordinal, column_type } = node.kind() else {
        panic!("expected a column reference");
    };
    assert_eq!(*ordinal, 3);
    assert_eq!(column_type, &Ty::I64);
}

#[test]
fn without_sources_strips_every_level() {
    let shop = Shop::new();
    let plan = PlanNode::new_object(
        &shop.customer,
        vec![
            ("Id", PlanNode::column(0, Ty::I32).with_source("c.Id")),
            ("Name", PlanNode::column(1, Ty::String).with_source("c.Name")),
        ],
    )
    .with_source("new Customer");

    assert_eq!(plan.source().as_str(), Some("new Customer"));
    let stripped = plan.without_sources();
    assert!(stripped.source().is_none());
    assert!(stripped.children().iter().all(|child| child.source().is_none()));
    assert_eq!(plan.children()[0].source().to_string(), "c.Id");
}

#[test]
fn depth_counts_levels() {
    assert_eq!(PlanNode::literal(1).depth(), 1);

    let case = PlanNode::client_case(
        PlanNode::column(0, Ty::String),
        vec![ClientWhen {
            matches: Some(PlanNode::literal("a")),
            value: PlanNode::lift(PlanNode::literal(1), Ty::I64),
        }],
        Ty::I64,
    );
    assert_eq!(case.depth(), 3);
    assert!(case.exceeds_depth(2));
    assert!(!case.exceeds_depth(3));
}

#[test]
fn literal_matching() {
    assert!(Literal::I32(1).matches(&Value::I64(1)));
    assert!(Literal::from("E").matches(&Value::from("E")));
    assert!(!Literal::from("E").matches(&Value::from("e")));
    assert!(Literal::Null.matches(&Value::Null));
    assert!(!Literal::I32(0).matches(&Value::Null));
    assert_eq!(Literal::from(7i64).to_value(), Value::I64(7));
}
