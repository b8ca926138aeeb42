//! Dynamic conversion by target type, the last rule of the table.

use crate::error::CoerceError;
use crate::ty::Ty;
use crate::value::Value;

use super::conforms;

/// Converts `value` to `target`, failing if the value cannot represent it.
pub fn change_type(value: Value, target: &Ty) -> Result<Value, CoerceError> {
    match target {
        Ty::Any => return Ok(value),
        Ty::Nullable(inner) => {
            if value.is_null() {
                return Ok(Value::Null);
            }
            return change_type(value, inner);
        }
        _ => {}
    }

    if value.is_null() {
        return if target.accepts_null() {
            Ok(Value::Null)
        } else {
            Err(CoerceError::NullAssignment { ty: target.clone() })
        };
    }

    let actual = value.runtime_ty();
    let fail = |reason: &str| CoerceError::conversion(&actual, target, reason);

    match target {
        Ty::Bool => match &value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::F64(f) => Ok(Value::Bool(*f != 0.0)),
            Value::String(s) => parse_bool(s).map(Value::Bool).ok_or_else(|| fail("not a boolean")),
            other => other
                .as_i64()
                .map(|n| Value::Bool(n != 0))
                .ok_or_else(|| fail("not convertible to bool")),
        },
        Ty::I16 => to_integer(&value)
            .map_err(|reason| fail(reason))
            .and_then(|n| i16::try_from(n).map(Value::I16).map_err(|_| fail("value out of range"))),
        Ty::I32 => to_integer(&value)
            .map_err(|reason| fail(reason))
            .and_then(|n| i32::try_from(n).map(Value::I32).map_err(|_| fail("value out of range"))),
        Ty::I64 => to_integer(&value)
            .map(Value::I64)
            .map_err(|reason| fail(reason)),
        Ty::F64 => match &value {
            Value::F64(f) => Ok(Value::F64(*f)),
            Value::Bool(b) => Ok(Value::F64(if *b { 1.0 } else { 0.0 })),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::F64)
                .map_err(|_| fail("not a number")),
            other => other
                .as_i64()
                .map(|n| Value::F64(n as f64))
                .ok_or_else(|| fail("not convertible to float64")),
        },
        Ty::String => match value {
            Value::String(s) => Ok(Value::String(s)),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::I16(n) => Ok(Value::String(n.to_string())),
            Value::I32(n) => Ok(Value::String(n.to_string())),
            Value::I64(n) => Ok(Value::String(n.to_string())),
            Value::F64(f) => Ok(Value::String(f.to_string())),
            Value::Bytes(bytes) => String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|_| fail("bytes are not valid UTF-8")),
            _ => Err(fail("not convertible to string")),
        },
        Ty::Bytes => match value {
            Value::Bytes(bytes) => Ok(Value::Bytes(bytes)),
            Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
            _ => Err(fail("not convertible to bytes")),
        },
        _ if conforms(&value, target) => Ok(value),
        _ => Err(fail("value is not of the expected type")),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s == "0" {
        Some(false)
    } else {
        None
    }
}

fn to_integer(value: &Value) -> Result<i64, &'static str> {
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::F64(f) => {
            let rounded = f.round_ties_even();
            if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
                Ok(rounded as i64)
            } else {
                Err("value out of range")
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| "not an integer"),
        other => other.as_i64().ok_or("not convertible to an integer"),
    }
}
