//! Ordered coercion rules between logical types.
//!
//! Rule selection happens once per `(actual, expected)` pair and yields a
//! [`Coercion`]; applying it is a per-value operation. Rules are tried in
//! table order; later rules assume earlier ones already handled the
//! simpler cases.

mod convert;
mod rules;


pub use convert::change_type;
pub use rules::rule_names;

use crate::error::CoerceError;
use crate::sequence::{EntitySet, LazyRef, Sequence};
use crate::ty::Ty;
use crate::value::Value;

/// How a sequence is reduced to a single element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingletonPolicy {
    /// Empty yields the element default; more than one element is an error.
    #[default]
    SingleOrDefault,
    /// Exactly one element, else an error.
    Single,
}

/// Options affecting rule selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoercionOptions {
    pub(crate) singleton: SingletonPolicy,
}

impl CoercionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sequence-to-singleton policy.
    pub fn singleton_policy(mut self, policy: SingletonPolicy) -> Self {
        self.singleton = policy;
        self
    }

    pub fn get_singleton_policy(&self) -> SingletonPolicy {
        self.singleton
    }
}

/// Sequence adapter flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqFlavor {
    Ordered,
    Queryable,
}

/// A selected coercion, ready to apply to values.
#[derive(Clone, Debug, PartialEq)]
pub enum Coercion {
    /// Same type, or an upcast.
    Identity,
    /// Value type into `any`.
    Box,
    /// `any` into a value type; checked per value.
    Unbox(Ty),
    /// Reference downcast; checked per value.
    Cast(Ty),
    /// Lazy per-element cast check.
    CastElements(Ty),
    /// Lazy per-element conversion.
    ConvertElements(Box<Coercion>),
    /// Sequence reduced to one element.
    Singleton { element: Ty, policy: SingletonPolicy },
    WrapNullable,
    /// Null becomes the default of the underlying type.
    UnwrapOrDefault(Ty),
    /// Value wrapped into a loaded lazy reference.
    LazyFromValue(Box<Coercion>),
    /// Lazy reference holding the single element of a sequence.
    LazyFromSequence { element: Ty, policy: SingletonPolicy },
    /// Ordered/queryable adapter over converted elements.
    Adapt {
        flavor: SeqFlavor,
        elements: Box<Coercion>,
    },
    /// New entity set assigned from the converted elements.
    EntitySet(Box<Coercion>),
    ToList(Box<Coercion>),
    ToArray(Box<Coercion>),
    /// `value != 0`.
    IntToBool,
    /// Last resort: convert by target type.
    Dynamic(Ty),
}

impl Coercion {
    /// Selects the first rule that applies to `actual -> expected`.
    ///
    /// Fails only for pairs that can never convert.
    pub fn resolve(actual: &Ty, expected: &Ty, options: &CoercionOptions) -> Result<Self, CoerceError> {
        rules::resolve(actual, expected, options)
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Coercion::Identity | Coercion::Box | Coercion::WrapNullable)
    }

    /// Name of the rule that produced this coercion.
    pub fn rule(&self) -> &'static str {
        match self {
            Coercion::Identity => "identity",
            Coercion::Box => "box",
            Coercion::Unbox(_) => "unbox",
            Coercion::Cast(_) => "cast",
            Coercion::CastElements(_) => "cast-elements",
            Coercion::ConvertElements(_) => "convert-elements",
            Coercion::Singleton { .. } => "singleton",
            Coercion::WrapNullable => "wrap-nullable",
            Coercion::UnwrapOrDefault(_) => "unwrap-or-default",
            Coercion::LazyFromValue(_) => "lazy-from-value",
            Coercion::LazyFromSequence { .. } => "lazy-from-sequence",
            Coercion::Adapt {
                flavor: SeqFlavor::Ordered,
                ..
            } => "ordered",
            Coercion::Adapt {
                flavor: SeqFlavor::Queryable,
                ..
            } => "queryable",
            Coercion::EntitySet(_) => "entity-set",
            Coercion::ToList(_) => "to-list",
            Coercion::ToArray(_) => "to-array",
            Coercion::IntToBool => "int-to-bool",
            Coercion::Dynamic(_) => "dynamic",
        }
    }

    pub fn apply(&self, value: Value) -> Result<Value, CoerceError> {
        match self {
            Coercion::Identity | Coercion::Box | Coercion::WrapNullable => Ok(value),
            Coercion::Unbox(ty) => {
                if value.is_null() {
                    return if ty.accepts_null() {
                        Ok(Value::Null)
                    } else {
                        Err(CoerceError::NullAssignment { ty: ty.clone() })
                    };
                }
                check_conforms(value, ty, "value is not of the expected type")
            }
            Coercion::Cast(ty) => check_conforms(value, ty, "invalid cast"),
            Coercion::CastElements(ty) => {
                let ty = ty.clone();
                map_sequence(value, move |item| check_conforms(item, &ty, "invalid cast"))
            }
            Coercion::ConvertElements(inner) | Coercion::Adapt { elements: inner, .. } => {
                if inner.is_identity() {
                    return passthrough_sequence(value);
                }
                let inner = inner.as_ref().clone();
                map_sequence(value, move |item| inner.apply(item))
            }
            Coercion::Singleton { element, policy } => match into_sequence(value)? {
                Some(seq) => seq.single(element, *policy),
                None => Sequence::empty().single(element, *policy),
            },
            Coercion::UnwrapOrDefault(ty) => {
                if value.is_null() {
                    Ok(ty.default_value())
                } else {
                    Ok(value)
                }
            }
            Coercion::LazyFromValue(inner) => {
                Ok(Value::Lazy(LazyRef::loaded(inner.apply(value)?)))
            }
            Coercion::LazyFromSequence { element, policy } => {
                let single = match into_sequence(value)? {
                    Some(seq) => seq.single(element, *policy)?,
                    None => Value::Null,
                };
                Ok(Value::Lazy(LazyRef::loaded(single)))
            }
            Coercion::EntitySet(inner) => {
                let Some(seq) = converted_sequence(value, inner)? else {
                    return Ok(Value::Null);
                };
                let set = EntitySet::new();
                set.assign(&seq)?;
                Ok(Value::EntitySet(set))
            }
            Coercion::ToList(inner) => Ok(converted_sequence(value, inner)?
                .map(|seq| seq.to_vec())
                .transpose()?
                .map_or(Value::Null, Value::List)),
            Coercion::ToArray(inner) => Ok(converted_sequence(value, inner)?
                .map(|seq| seq.to_vec())
                .transpose()?
                .map_or(Value::Null, Value::Array)),
            Coercion::IntToBool => match value {
                Value::Null => Err(CoerceError::NullAssignment { ty: Ty::Bool }),
                other => match other.as_i64() {
                    Some(n) => Ok(Value::Bool(n != 0)),
                    None => Err(CoerceError::conversion(
                        &other.runtime_ty(),
                        &Ty::Bool,
                        "expected an integer",
                    )),
                },
            },
            Coercion::Dynamic(ty) => change_type(value, ty),
        }
    }
}

/// Coerces `value` from `actual` to `expected` with default options.
pub fn coerce(actual: &Ty, expected: &Ty, value: Value) -> Result<Value, CoerceError> {
    coerce_with(actual, expected, value, &CoercionOptions::default())
}

pub fn coerce_with(
    actual: &Ty,
    expected: &Ty,
    value: Value,
    options: &CoercionOptions,
) -> Result<Value, CoerceError> {
    Coercion::resolve(actual, expected, options)?.apply(value)
}

/// Views a sequence-shaped value as a `Sequence`. Null yields `None`.
pub fn into_sequence(value: Value) -> Result<Option<Sequence>, CoerceError> {
    match value {
        Value::Null => Ok(None),
        Value::Sequence(seq) => Ok(Some(seq)),
        Value::List(items) | Value::Array(items) => Ok(Some(Sequence::from_vec(items))),
        Value::EntitySet(set) => Ok(Some(set.as_sequence())),
        Value::Group(group) => Ok(Some(group.items().clone())),
        other => Err(CoerceError::conversion(
            &other.runtime_ty(),
            &Ty::seq(Ty::Any),
            "value is not a sequence",
        )),
    }
}

/// Whether a runtime value inhabits `ty`.
pub fn conforms(value: &Value, ty: &Ty) -> bool {
    match (value, ty) {
        (_, Ty::Any) => true,
        (Value::Null, ty) => ty.accepts_null(),
        (value, Ty::Nullable(inner)) => conforms(value, inner),
        (Value::Bool(_), Ty::Bool)
        | (Value::I16(_), Ty::I16)
        | (Value::I32(_), Ty::I32)
        | (Value::I64(_), Ty::I64)
        | (Value::F64(_), Ty::F64)
        | (Value::String(_), Ty::String)
        | (Value::Bytes(_), Ty::Bytes)
        | (Value::Type(_), Ty::TypeToken) => true,
        (Value::Object(obj), Ty::Class(class)) => {
            let actual = obj.class();
            &actual == class || actual.is_subclass_of(class)
        }
        (Value::Record(rec), Ty::Class(class)) => rec.class() == class,
        (Value::Lazy(_), Ty::Lazy(_)) => true,
        (Value::EntitySet(_), Ty::EntitySet(_)) => true,
        (Value::Group(_), Ty::Grouping(..)) => true,
        (Value::Sequence(_) | Value::List(_) | Value::Array(_) | Value::Group(_), ty) => {
            matches!(ty, Ty::Seq(_) | Ty::Ordered(_) | Ty::Queryable(_))
                || matches!((value, ty), (Value::List(_), Ty::List(_)) | (Value::Array(_), Ty::Array(_)))
        }
        (Value::EntitySet(_), Ty::Seq(_)) => true,
        _ => false,
    }
}

fn check_conforms(value: Value, ty: &Ty, reason: &str) -> Result<Value, CoerceError> {
    if conforms(&value, ty) {
        Ok(value)
    } else {
        Err(CoerceError::conversion(&value.runtime_ty(), ty, reason))
    }
}

fn passthrough_sequence(value: Value) -> Result<Value, CoerceError> {
    Ok(into_sequence(value)?.map_or(Value::Null, Value::Sequence))
}

fn map_sequence<F>(value: Value, f: F) -> Result<Value, CoerceError>
where
    F: Fn(Value) -> Result<Value, CoerceError> + 'static,
{
    Ok(into_sequence(value)?.map_or(Value::Null, |seq| Value::Sequence(seq.map(f))))
}

fn converted_sequence(value: Value, elements: &Coercion) -> Result<Option<Sequence>, CoerceError> {
    let Some(seq) = into_sequence(value)? else {
        return Ok(None);
    };
    if elements.is_identity() {
        return Ok(Some(seq));
    }
    let elements = elements.clone();
    Ok(Some(seq.map(move |item| elements.apply(item))))
}
