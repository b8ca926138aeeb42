use std::sync::Arc;

use materia_core::{CoerceError, Ty, Value};
use materia_plan::{Global, Literal, Method, NamedColumn, PlanNode, RowContext, RuntimeError};

use crate::compile::{CompileError, CompileLimits, CompileOptions, MaterializerCompiler};
use crate::test_utils::{Shop, TestRow};

fn compile(plan: &PlanNode, element: &Ty) -> Result<materia_plan::CompiledRoutine, CompileError> {
    MaterializerCompiler::default().compile_uncached(plan, element)
}

#[test]
fn column_converts_wire_type() {
    let plan = PlanNode::column_as(0, Ty::I64, Ty::I32);
    let routine = compile(&plan, &Ty::I64).unwrap();

    let mut row = TestRow::new(vec![vec![Value::I32(7)]]);
    assert_eq!(row.run(&routine).unwrap(), vec![Value::I64(7)]);
}

#[test]
fn null_into_value_type_column() {
    let plan = PlanNode::column(0, Ty::I32);
    let routine = compile(&plan, &Ty::I32).unwrap();

    let mut row = TestRow::new(vec![vec![Value::Null]]);
    let err = routine.materialize(&mut row).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Column {
            ordinal: 0,
            error: CoerceError::NullAssignment { .. }
        }
    ));
    insta::assert_snapshot!(err, @"column 0: cannot assign null to non-nullable int32");
}

#[test]
fn null_substitution_yields_default() {
    let options = CompileOptions::new().null_substitution(true);
    let routine = MaterializerCompiler::new(options)
        .compile_uncached(&PlanNode::column(0, Ty::I32), &Ty::I32)
        .unwrap();

    let mut row = TestRow::new(vec![vec![Value::Null]]);
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::I32(0));
}

#[test]
fn nullable_column_reads_null() {
    let ty = Ty::nullable(Ty::I32);
    let routine = compile(&PlanNode::column(0, ty.clone()), &ty).unwrap();

    let mut row = TestRow::new(vec![vec![Value::Null], vec![Value::I32(3)]]);
    assert_eq!(row.run(&routine).unwrap(), vec![Value::Null, Value::I32(3)]);
}

#[test]
fn depth_limit() {
    let mut plan = PlanNode::column(0, Ty::I32);
    for _ in 0..5 {
        plan = PlanNode::lift(plan, Ty::I32);
    }

    let tight = CompileOptions::new().limits(CompileLimits::new().max_depth(3));
    let err = MaterializerCompiler::new(tight)
        .compile_uncached(&plan, &Ty::I32)
        .unwrap_err();
    assert!(matches!(err, CompileError::DepthLimitExceeded { limit: 3 }));
    insta::assert_snapshot!(err, @"plan is nested deeper than 3 levels");

    assert!(compile(&plan, &Ty::I32).is_ok());
    assert_eq!(CompileLimits::default().get_max_depth(), 500);
}

#[test]
fn incompatible_root_type() {
    let plan = PlanNode::column(0, Ty::I32).with_source("c.Id");
    let err = compile(&plan, &Ty::list(Ty::I32)).unwrap_err();
    assert!(matches!(err, CompileError::Coercion { node: "ColumnRef", .. }));
    assert!(err.to_string().starts_with("ColumnRef at c.Id: cannot convert int32 to list<int32>"));
}

#[test]
fn named_user_column() {
    let plan = PlanNode::user_column("Total", Ty::F64, true);
    let routine = compile(&plan, &Ty::F64).unwrap();
    assert_eq!(
        routine.named_columns(),
        &[NamedColumn {
            name: Arc::from("Total"),
            required: true,
        }]
    );

    let mut row = TestRow::new(vec![vec![Value::I32(0), Value::F64(2.5)]]);
    row.named = vec![Some(1)];
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::F64(2.5));

    row.named = vec![None];
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::F64(0.0));
}

#[test]
fn unnamed_user_column_reads_first_column() {
    let routine = compile(&PlanNode::unnamed_column(Ty::String), &Ty::String).unwrap();
    assert!(routine.named_columns().is_empty());

    let mut row = TestRow::new(vec![vec![Value::from("only")]]);
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::from("only"));
}

#[test]
fn literals_are_registered_as_globals() {
    let routine = compile(&PlanNode::literal("hello"), &Ty::String).unwrap();
    assert!(matches!(
        routine.globals(),
        [Global::Literal(Literal::String(s))] if s.as_ref() == "hello"
    ));

    let mut row = TestRow::new(vec![vec![]]);
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::from("hello"));
}

#[test]
fn parameters() {
    let routine = compile(&PlanNode::parameter(1, Ty::String), &Ty::String).unwrap();

    let mut row = TestRow::new(vec![vec![]]);
    row.args = vec![Value::from("a"), Value::from("b")];
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::from("b"));

    row.args.truncate(1);
    let err = routine.materialize(&mut row).unwrap_err();
    assert!(matches!(err, RuntimeError::ArgumentOutOfRange { index: 1, count: 1 }));
}

#[test]
fn member_access() {
    let shop = Shop::new();
    let name = shop.member(&shop.customer, "Name");
    let customer = PlanNode::new_object(
        &shop.customer,
        vec![("Id", PlanNode::column(0, Ty::I32)), ("Name", PlanNode::column(1, Ty::String))],
    );
    let routine = compile(&PlanNode::member(customer, &name), &Ty::String).unwrap();

    let mut row = TestRow::new(vec![vec![Value::I32(1), Value::from("Ada")]]);
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::from("Ada"));
}

#[test]
fn member_of_null() {
    let shop = Shop::new();
    let name = shop.member(&shop.customer, "Name");
    let target = PlanNode::literal_as(Literal::Null, shop.customer.ty());
    let routine = compile(&PlanNode::member(target, &name), &Ty::String).unwrap();

    let mut row = TestRow::new(vec![vec![]]);
    let err = routine.materialize(&mut row).unwrap_err();
    insta::assert_snapshot!(err, @"cannot read member 'Customer.Name' of a null value");
}

fn double() -> Arc<Method> {
    Arc::new(Method::new("Math", "Double", vec![Ty::I64], Ty::I64, |_, args| {
        match args.first().and_then(Value::as_i64) {
            Some(n) => Ok(Value::I64(n * 2)),
            None => Err("expected an integer".to_owned()),
        }
    }))
}

#[test]
fn method_call_coerces_arguments() {
    let plan = PlanNode::method_call(None, &double(), vec![PlanNode::column(0, Ty::I32)]);
    let routine = compile(&plan, &Ty::I64).unwrap();
    assert!(matches!(routine.globals(), [Global::Method(_)]));

    let mut row = TestRow::new(vec![vec![Value::I32(21)]]);
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::I64(42));
}

#[test]
fn method_call_arity() {
    let plan = PlanNode::method_call(None, &double(), vec![]);
    let err = compile(&plan, &Ty::I64).unwrap_err();
    insta::assert_snapshot!(err, @"cannot translate MethodCall at <unknown>: Math.Double takes 1 arguments but 0 were supplied");
}

#[test]
fn method_failure() {
    let plan = PlanNode::method_call(None, &double(), vec![PlanNode::column(0, Ty::Any)]);
    let routine = compile(&plan, &Ty::I64).unwrap();

    let mut row = TestRow::new(vec![vec![Value::from("x")]]);
    let err = routine.materialize(&mut row).unwrap_err();
    assert!(matches!(err, RuntimeError::Coercion(_) | RuntimeError::Column { .. }));

    let fail = Arc::new(Method::new("Math", "Fail", vec![], Ty::I64, |_, _| Err("boom".to_owned())));
    let routine = compile(&PlanNode::method_call(None, &fail, vec![]), &Ty::I64).unwrap();
    let err = routine.materialize(&mut row).unwrap_err();
    insta::assert_snapshot!(err, @"method Math.Fail failed: boom");
}

#[test]
fn optional_value() {
    let plan = PlanNode::optional_value(
        PlanNode::column(0, Ty::nullable(Ty::I32)),
        PlanNode::column(1, Ty::I32),
    );
    let routine = compile(&plan, &Ty::I32).unwrap();

    let mut row = TestRow::new(vec![
        vec![Value::Null, Value::I32(5)],
        vec![Value::I32(1), Value::I32(5)],
    ]);
    assert_eq!(row.run(&routine).unwrap(), vec![Value::I32(0), Value::I32(5)]);
}

#[test]
fn value_of_nullable() {
    let plan = PlanNode::value_of(PlanNode::column(0, Ty::nullable(Ty::I32)));
    assert_eq!(plan.ty(), &Ty::I32);
    let routine = compile(&plan, &Ty::I32).unwrap();

    let mut row = TestRow::new(vec![vec![Value::I32(3)], vec![Value::Null]]);
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::I32(3));
    assert!(row.read().unwrap());
    let err = routine.materialize(&mut row).unwrap_err();
    assert!(matches!(err, RuntimeError::Coercion(CoerceError::NullAssignment { .. })));
}

#[test]
fn outer_joined_value_passes_through() {
    let ty = Ty::nullable(Ty::I32);
    let plan = PlanNode::outer_joined(PlanNode::column(0, ty.clone()));
    let routine = compile(&plan, &ty).unwrap();

    let mut row = TestRow::new(vec![vec![Value::Null]]);
    assert_eq!(routine.materialize(&mut row).unwrap(), Value::Null);
}
