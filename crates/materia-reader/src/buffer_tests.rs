use materia_core::{Ty, Value};

use crate::buffer::{BufferedResult, MemoryCursor};
use crate::cursor::{CursorError, RowCursor};

fn cursor() -> MemoryCursor {
    MemoryCursor::new(
        &["Id", "Name"],
        vec![
            vec![Value::I32(1), Value::from("a")],
            vec![Value::I32(2), Value::Null],
            vec![Value::I32(3), Value::from("c")],
        ],
    )
}

#[test]
fn snapshot_keeps_current_row() {
    let mut cursor = cursor();
    assert!(cursor.read().unwrap());
    assert!(cursor.read().unwrap());

    let mut snapshot = BufferedResult::snapshot(&mut cursor, true).unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.names(), &["Id".to_owned(), "Name".to_owned()]);
    assert_eq!(snapshot.value(0).unwrap(), Value::I32(2));
    assert!(snapshot.is_null(1).unwrap());

    assert!(snapshot.read().unwrap());
    assert_eq!(snapshot.value(0).unwrap(), Value::I32(3));
    assert!(!snapshot.read().unwrap());
    assert!(!snapshot.read().unwrap());
    assert_eq!(snapshot.value(0), Err(CursorError::NoRow));
}

#[test]
fn snapshot_before_first_row() {
    let mut cursor = cursor();
    let mut snapshot = BufferedResult::snapshot(&mut cursor, false).unwrap();

    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.value(0), Err(CursorError::NoRow));
    assert!(snapshot.read().unwrap());
    assert_eq!(snapshot.get_string(1).unwrap(), "a");
    assert!(!cursor.read().unwrap());
}

#[test]
fn memory_cursor_result_sets() {
    let mut cursor = MemoryCursor::new(&["A"], vec![vec![Value::I32(1)]]).with_result(&["B"], vec![]);

    assert_eq!(cursor.name(0).unwrap(), "A");
    assert!(cursor.read().unwrap());
    assert!(!cursor.read().unwrap());

    assert!(cursor.next_result().unwrap());
    assert_eq!(cursor.name(0).unwrap(), "B");
    assert!(!cursor.read().unwrap());

    assert!(!cursor.next_result().unwrap());
    assert_eq!(cursor.field_count(), 0);

    cursor.close();
    assert!(cursor.is_closed());
    assert_eq!(cursor.read(), Err(CursorError::Closed));
}

#[test]
fn typed_getters() {
    let mut cursor = cursor();
    cursor.read().unwrap();

    assert_eq!(cursor.get_typed(0, &Ty::I32).unwrap(), Value::I32(1));
    assert_eq!(cursor.get_typed(0, &Ty::nullable(Ty::I32)).unwrap(), Value::I32(1));
    assert_eq!(cursor.get_typed(1, &Ty::Any).unwrap(), Value::from("a"));

    let err = cursor.get_typed(1, &Ty::I32).unwrap_err();
    insta::assert_snapshot!(err, @"column 1 holds string, not int32");

    let err = cursor.value(5).unwrap_err();
    insta::assert_snapshot!(err, @"ordinal 5 is out of range (2 columns)");
}
