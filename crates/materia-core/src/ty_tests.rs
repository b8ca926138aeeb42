use super::*;

#[test]
fn value_types() {
    assert!(Ty::I32.is_value_type());
    assert!(Ty::nullable(Ty::I32).is_value_type());
    assert!(Ty::class(&ClassType::value("Point")).is_value_type());
    assert!(!Ty::String.is_value_type());
    assert!(!Ty::Any.is_value_type());
    assert!(!Ty::class(&ClassType::reference("Customer")).is_value_type());
}

#[test]
fn accepts_null() {
    assert!(Ty::String.accepts_null());
    assert!(Ty::nullable(Ty::I64).accepts_null());
    assert!(!Ty::I64.accepts_null());
    assert!(!Ty::Bool.accepts_null());
}

#[test]
fn element_type() {
    assert_eq!(Ty::seq(Ty::I32).element_type(), &Ty::I32);
    assert_eq!(Ty::entity_set(Ty::String).element_type(), &Ty::String);
    assert_eq!(Ty::grouping(Ty::I32, Ty::String).element_type(), &Ty::String);
    assert_eq!(Ty::I32.element_type(), &Ty::I32);
    assert!(!Ty::lazy(Ty::I32).is_sequence());
}

#[test]
fn subclassing() {
    let person = ClassType::reference("Person");
    let employee = ClassType::derived("Employee", &person);
    let manager = ClassType::derived("Manager", &employee);

    assert!(manager.is_subclass_of(&person));
    assert!(manager.is_subclass_of(&employee));
    assert!(!person.is_subclass_of(&manager));
    assert!(!person.is_subclass_of(&person));

    assert!(Ty::class(&person).is_assignable_from(&Ty::class(&manager)));
    assert!(!Ty::class(&manager).is_assignable_from(&Ty::class(&person)));
    assert!(Ty::Any.is_assignable_from(&Ty::class(&person)));
    assert!(!Ty::Any.is_assignable_from(&Ty::I32));
}

#[test]
fn sequence_covariance() {
    let person = ClassType::reference("Person");
    let employee = ClassType::derived("Employee", &person);

    assert!(Ty::seq(Ty::class(&person)).is_assignable_from(&Ty::list(Ty::class(&employee))));
    assert!(!Ty::seq(Ty::I64).is_assignable_from(&Ty::list(Ty::I32)));
}

#[test]
fn class_equality_is_by_name() {
    assert_eq!(ClassType::reference("A"), ClassType::reference("A"));
    assert_ne!(ClassType::reference("A"), ClassType::value("A"));
}

#[test]
fn defaults() {
    assert_eq!(Ty::I32.default_value(), Value::I32(0));
    assert_eq!(Ty::Bool.default_value(), Value::Bool(false));
    assert_eq!(Ty::nullable(Ty::I32).default_value(), Value::Null);
    assert_eq!(Ty::String.default_value(), Value::Null);
}

#[test]
fn display() {
    let ty = Ty::grouping(
        Ty::nullable(Ty::I32),
        Ty::list(Ty::class(&ClassType::reference("Order"))),
    );
    assert_eq!(ty.to_string(), "grouping<int32?, list<Order>>");
    assert_eq!(Ty::array(Ty::String).to_string(), "string[]");
}
