use materia_core::{ClassType, Instance, KeyPart, ObjectRef, Ty, Value};
use materia_plan::{Literal, MetaType, MetaTypeRef};

use crate::services::{DataServices, IdentityKey, IdentityMap, IdentityServices};
use crate::test_utils::Catalog;

fn instance(meta: &MetaTypeRef, id: Value) -> ObjectRef {
    let mut instance = Instance::new(meta.class().clone());
    instance.set("Id".into(), id);
    ObjectRef::new(instance)
}

#[test]
fn identity_key_uses_primary_keys() {
    let catalog = Catalog::new();
    let key = IdentityKey::of(&catalog.customer, &instance(&catalog.customer, Value::I32(4))).unwrap();
    assert_eq!(key.root, "Customer");
    assert_eq!(key.parts, vec![KeyPart::Int(4)]);

    let keyless = MetaType::builder(&ClassType::reference("Note"))
        .field("Id", Ty::I32)
        .build();
    assert!(IdentityKey::of(&keyless, &instance(&keyless, Value::I32(4))).is_none());
}

#[test]
fn identity_map_returns_first_instance() {
    let catalog = Catalog::new();
    let map = IdentityMap::new();

    let first = instance(&catalog.customer, Value::I32(1));
    let again = instance(&catalog.customer, Value::I64(1));
    let other = instance(&catalog.customer, Value::I32(2));

    assert!(map.insert_lookup(&catalog.customer, first.clone()).ptr_eq(&first));
    assert!(map.insert_lookup(&catalog.customer, again).ptr_eq(&first));
    assert!(map.insert_lookup(&catalog.customer, other.clone()).ptr_eq(&other));

    let instances = map.instances();
    assert_eq!(instances.len(), 2);
    assert!(instances[0].ptr_eq(&first));

    map.clear();
    assert!(map.is_empty());
}

#[test]
fn derived_types_share_root_identity() {
    let person_class = ClassType::reference("Person");
    let employee_class = ClassType::derived("Employee", &person_class);
    let person = MetaType::builder(&person_class)
        .entity()
        .key("Id", Ty::I32)
        .inheritance_code(Literal::I32(1), Ty::class(&person_class), true)
        .build();
    let employee = MetaType::builder(&employee_class)
        .entity()
        .key("Id", Ty::I32)
        .build();
    let map = IdentityMap::new();

    let employee_one = instance(&employee, Value::I32(1));
    map.insert_lookup(&employee, employee_one.clone());

    let looked_up = map.insert_lookup(&person, instance(&person, Value::I32(1)));
    assert!(looked_up.ptr_eq(&employee_one));
    assert_eq!(map.len(), 1);
}

#[test]
fn identity_services_defaults() {
    let catalog = Catalog::new();
    let services = IdentityServices::new();

    assert!(!services.can_defer_load());
    assert!(services.deferred_loading(true).can_defer_load());

    let services = IdentityServices::new();
    let customer = instance(&catalog.customer, Value::I32(1));
    services.on_entity_materialized(&catalog.customer, &customer).unwrap();
    assert_eq!(services.materialized_count(), 1);
    assert!(services.deferred_source_factory(&catalog.orders).is_err());
}
