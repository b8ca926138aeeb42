use materia_core::{ClassType, Ty, Value};
use materia_plan::{ClientWhen, CompiledRoutine, Literal, MetaType, PlanNode, SearchedWhen, TypeWhen};

use crate::compile::{CompileError, MaterializerCompiler};
use crate::test_utils::{Shop, TestRow};

fn compile(plan: &PlanNode) -> Result<CompiledRoutine, CompileError> {
    MaterializerCompiler::default().compile_uncached(plan, plan.ty())
}

fn rows(values: Vec<Value>) -> TestRow {
    TestRow::new(values.into_iter().map(|v| vec![v]).collect())
}

fn when(matches: &str, value: i32) -> ClientWhen {
    ClientWhen {
        matches: Some(PlanNode::literal(matches)),
        value: PlanNode::literal(value),
    }
}

#[test]
fn client_case_with_default() {
    let plan = PlanNode::client_case(
        PlanNode::column(0, Ty::String),
        vec![
            when("a", 1),
            when("b", 2),
            ClientWhen {
                matches: None,
                value: PlanNode::literal(0),
            },
        ],
        Ty::I32,
    );
    let routine = compile(&plan).unwrap();

    let mut row = rows(vec![Value::from("a"), Value::from("b"), Value::from("z")]);
    assert_eq!(
        row.run(&routine).unwrap(),
        vec![Value::I32(1), Value::I32(2), Value::I32(0)]
    );
}

#[test]
fn client_case_without_default() {
    let plan = PlanNode::client_case(PlanNode::column(0, Ty::String), vec![when("a", 1)], Ty::nullable(Ty::I32));
    let routine = compile(&plan).unwrap();

    let mut row = rows(vec![Value::from("a"), Value::from("z")]);
    assert_eq!(row.run(&routine).unwrap(), vec![Value::I32(1), Value::Null]);
}

#[test]
fn client_case_compares_integers_by_value() {
    let plan = PlanNode::client_case(
        PlanNode::column(0, Ty::I64),
        vec![ClientWhen {
            matches: Some(PlanNode::literal(2)),
            value: PlanNode::literal("two"),
        }],
        Ty::String,
    );
    let routine = compile(&plan).unwrap();

    let mut row = rows(vec![Value::I64(2), Value::I64(3)]);
    assert_eq!(row.run(&routine).unwrap(), vec![Value::from("two"), Value::Null]);
}

#[test]
fn searched_case() {
    let plan = PlanNode::searched_case(
        vec![SearchedWhen {
            condition: PlanNode::column(0, Ty::nullable(Ty::Bool)),
            value: PlanNode::literal("yes"),
        }],
        Some(PlanNode::literal("other")),
        Ty::String,
    );
    let routine = compile(&plan).unwrap();

    let mut row = rows(vec![Value::Bool(true), Value::Null, Value::Bool(false)]);
    assert_eq!(
        row.run(&routine).unwrap(),
        vec![Value::from("yes"), Value::from("other"), Value::from("other")]
    );
}

#[test]
fn searched_case_without_otherwise() {
    let plan = PlanNode::searched_case(
        vec![SearchedWhen {
            condition: PlanNode::column(0, Ty::Bool),
            value: PlanNode::literal(5),
        }],
        None,
        Ty::I32,
    );
    let routine = compile(&plan).unwrap();

    let mut row = rows(vec![Value::Bool(false)]);
    assert_eq!(row.run(&routine).unwrap(), vec![Value::I32(0)]);
}

fn person_case(shop: &Shop, default_first: bool) -> PlanNode {
    let employee = TypeWhen {
        matches: Some(Literal::I32(2)),
        binding: PlanNode::new_object(
            &shop.employee,
            vec![("Name", PlanNode::column(1, Ty::String)), ("Salary", PlanNode::column(2, Ty::F64))],
        ),
    };
    let person = TypeWhen {
        matches: None,
        binding: PlanNode::new_object(&shop.person, vec![("Name", PlanNode::column(1, Ty::String))]),
    };
    let whens = if default_first {
        vec![person, employee]
    } else {
        vec![employee, person]
    };
    PlanNode::type_case(PlanNode::column(0, Ty::I32), whens, shop.person.ty())
}

#[test]
fn type_case_dispatches_on_code() {
    let shop = Shop::new();
    let routine = compile(&person_case(&shop, false)).unwrap();

    let mut row = TestRow::new(vec![
        vec![Value::I32(2), Value::from("Eve"), Value::F64(10.0)],
        vec![Value::I32(1), Value::from("Pat"), Value::F64(0.0)],
    ]);
    let out = row.run(&routine).unwrap();

    let classes: Vec<_> = out
        .iter()
        .map(|v| v.as_object().map(|o| o.class().name().to_owned()))
        .collect();
    assert_eq!(classes, vec![Some("Employee".to_owned()), Some("Person".to_owned())]);
    assert_eq!(out[0].member("Salary"), Some(Value::F64(10.0)));
}

#[test]
fn type_case_default_must_be_last() {
    let shop = Shop::new();
    let err = compile(&person_case(&shop, true)).unwrap_err();
    insta::assert_snapshot!(err, @"cannot translate TypeCase at <unknown>: the default type binding must come last");
}

#[test]
fn discriminated_type() {
    let shop = Shop::new();
    let plan = PlanNode::discriminated_type(PlanNode::column(0, Ty::I32), &shop.person);
    let routine = compile(&plan).unwrap();

    let mut row = rows(vec![Value::I32(2), Value::I32(9)]);
    assert_eq!(
        row.run(&routine).unwrap(),
        vec![
            Value::Type(Ty::class(shop.employee.class())),
            Value::Type(Ty::class(shop.person.class())),
        ]
    );
}

#[test]
fn discriminated_type_without_default() {
    let shape = ClassType::reference("Shape");
    let circle = ClassType::derived("Circle", &shape);
    let meta = MetaType::builder(&shape)
        .inheritance_code(Literal::I32(1), Ty::class(&circle), false)
        .build();
    let plan = PlanNode::discriminated_type(PlanNode::column(0, Ty::I32), &meta);
    let routine = compile(&plan).unwrap();

    let mut row = rows(vec![Value::I32(1), Value::I32(5)]);
    assert_eq!(
        row.run(&routine).unwrap(),
        vec![Value::Type(Ty::class(&circle)), Value::Null]
    );
}
