use std::sync::Arc;

use materia_core::{Ty, Value};

use crate::compare::{has_side_effect, is_cacheable, structurally_equal};
use crate::meta::{MetaType, MetaTypeRef, Method};
use crate::plan::{ArrayOrigin, ClientWhen, PlanNode};
use crate::test_utils::Shop;

fn customer_plan(shop: &Shop, name_ordinal: usize) -> PlanNode {
    PlanNode::new_object(
        &shop.customer,
        vec![
            ("Id", PlanNode::column(0, Ty::I32)),
            ("Name", PlanNode::column(name_ordinal, Ty::String)),
        ],
    )
}

#[test]
fn equal_shapes_compare_equal() {
    let shop = Shop::new();
    assert!(structurally_equal(&customer_plan(&shop, 1), &customer_plan(&shop, 1)));
    assert!(!structurally_equal(&customer_plan(&shop, 1), &customer_plan(&shop, 2)));
}

#[test]
fn metadata_matches_by_identity() {
    let shop = Shop::new();
    let lookalike = MetaType::builder(shop.customer.class())
        .entity()
        .key("Id", Ty::I32)
        .field("Name", Ty::String)
        .build();
    let plan = |meta: &MetaTypeRef| PlanNode::new_object(meta, vec![("Id", PlanNode::column(0, Ty::I32))]);

    assert!(structurally_equal(&plan(&shop.customer), &plan(&shop.customer)));
    assert!(!structurally_equal(&plan(&shop.customer), &plan(&lookalike)));

    let discriminated = |meta: &MetaTypeRef| PlanNode::discriminated_type(PlanNode::column(0, Ty::String), meta);
    assert!(structurally_equal(&discriminated(&shop.customer), &discriminated(&shop.customer)));
    assert!(!structurally_equal(&discriminated(&shop.customer), &discriminated(&lookalike)));
}

#[test]
fn source_handles_are_ignored() {
    let a = PlanNode::column(0, Ty::I32).with_source("x.Id");
    let b = PlanNode::column(0, Ty::I32).with_source("y.Id");
    assert!(structurally_equal(&a, &b));
}

#[test]
fn payload_differences() {
    assert!(!structurally_equal(
        &PlanNode::column(0, Ty::I32),
        &PlanNode::column(0, Ty::I64)
    ));
    assert!(!structurally_equal(&PlanNode::literal(1), &PlanNode::literal(2)));
    assert!(!structurally_equal(
        &PlanNode::user_column("Total", Ty::F64, true),
        &PlanNode::user_column("Total", Ty::F64, false)
    ));
    assert!(!structurally_equal(
        &PlanNode::client_query(0, vec![], Ty::seq(Ty::I32)),
        &PlanNode::client_query(1, vec![], Ty::seq(Ty::I32))
    ));

    let case = |default: i32| {
        PlanNode::client_case(
            PlanNode::column(0, Ty::String),
            vec![
                ClientWhen {
                    matches: Some(PlanNode::literal("a")),
                    value: PlanNode::literal(1),
                },
                ClientWhen {
                    matches: None,
                    value: PlanNode::literal(default),
                },
            ],
            Ty::I32,
        )
    };
    assert!(structurally_equal(&case(0), &case(0)));
    assert!(!structurally_equal(&case(0), &case(9)));
}

#[test]
fn member_identity() {
    let shop = Shop::new();
    let source = || PlanNode::unnamed_column(shop.customer.ty());
    let id = shop.member(&shop.customer, "Id");
    let name = shop.member(&shop.customer, "Name");

    let by_name = PlanNode::member(source(), &name);
    assert!(structurally_equal(&by_name, &PlanNode::member(source(), &name)));

    let by_id = PlanNode::lift(PlanNode::member(source(), &id), Ty::String);
    let by_name = PlanNode::lift(PlanNode::member(source(), &name), Ty::String);
    assert!(!structurally_equal(&by_id, &by_name));
}

#[test]
fn parameters_match_only_themselves() {
    let p = PlanNode::parameter(0, Ty::I32);
    assert!(structurally_equal(&p, &p));
    assert!(!structurally_equal(&p, &p.clone()));
}

#[test]
fn cacheability() {
    let shop = Shop::new();
    assert!(is_cacheable(&customer_plan(&shop, 1)));
    assert!(!is_cacheable(&PlanNode::parameter(0, Ty::I32)));

    let literal = PlanNode::client_array(vec![PlanNode::literal(1)], Ty::I32, ArrayOrigin::Literal);
    let captured = PlanNode::client_array(vec![PlanNode::literal(1)], Ty::I32, ArrayOrigin::Captured);
    assert!(is_cacheable(&literal));
    assert!(!is_cacheable(&captured));

    let now = Arc::new(Method::new("Clock", "Now", vec![], Ty::I64, |_, _| Ok(Value::I64(0))).nondeterministic());
    assert!(!is_cacheable(&PlanNode::method_call(None, &now, vec![])));

    // Arguments of a client query are not inspected.
    let query = PlanNode::client_query(0, vec![PlanNode::parameter(0, Ty::I32)], Ty::seq(Ty::I32));
    assert!(is_cacheable(&query));

    let nested = PlanNode::new_object(&shop.order, vec![("Id", PlanNode::parameter(1, Ty::I32))]);
    assert!(!is_cacheable(&nested));
}

#[test]
fn side_effects() {
    let shop = Shop::new();
    let joined = PlanNode::joined_collection(PlanNode::column(2, Ty::String), PlanNode::column(1, Ty::I32));
    assert!(has_side_effect(&joined));

    let wrapped = PlanNode::new_object(&shop.customer, vec![("Name", PlanNode::lift(joined.clone(), Ty::String))]);
    assert!(has_side_effect(&wrapped));

    let query = PlanNode::client_query(0, vec![joined], Ty::seq(Ty::String));
    assert!(!has_side_effect(&query));
    assert!(!has_side_effect(&customer_plan(&shop, 1)));
}
