//! The coercion rule table.

use crate::error::CoerceError;
use crate::ty::Ty;

use super::{Coercion, CoercionOptions, SeqFlavor};

type Select = fn(&Ty, &Ty, &CoercionOptions) -> Option<Result<Coercion, CoerceError>>;

struct Rule {
    name: &'static str,
    select: Select,
}

/// Rules in priority order.
const RULES: &[Rule] = &[
    Rule {
        name: "identity",
        select: identity,
    },
    Rule {
        name: "box",
        select: boxing,
    },
    Rule {
        name: "unbox",
        select: unboxing,
    },
    Rule {
        name: "cast",
        select: reference_cast,
    },
    Rule {
        name: "sequence",
        select: sequence_to_seq,
    },
    Rule {
        name: "singleton",
        select: sequence_to_singleton,
    },
    Rule {
        name: "wrap-nullable",
        select: wrap_nullable,
    },
    Rule {
        name: "unwrap-or-default",
        select: unwrap_nullable,
    },
    Rule {
        name: "lazy",
        select: lazy_reference,
    },
    Rule {
        name: "adapter",
        select: ordered_or_queryable,
    },
    Rule {
        name: "entity-set",
        select: entity_set,
    },
    Rule {
        name: "to-list",
        select: to_list,
    },
    Rule {
        name: "to-array",
        select: to_array,
    },
    Rule {
        name: "int-to-bool",
        select: int_to_bool,
    },
    Rule {
        name: "dynamic",
        select: dynamic,
    },
];

/// Names of the rules, in the order they are tried.
pub fn rule_names() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|rule| rule.name)
}

pub(super) fn resolve(
    actual: &Ty,
    expected: &Ty,
    options: &CoercionOptions,
) -> Result<Coercion, CoerceError> {
    for rule in RULES {
        if let Some(selected) = (rule.select)(actual, expected, options) {
            return selected;
        }
    }
    Err(CoerceError::conversion(actual, expected, "no coercion rule applies"))
}

/// Coercion for the elements of a sequence.
fn elements(actual: &Ty, expected: &Ty, options: &CoercionOptions) -> Result<Coercion, CoerceError> {
    if actual == expected || actual == &Ty::Any {
        // Untyped elements are checked, not converted.
        return Ok(if actual == expected {
            Coercion::Identity
        } else {
            Coercion::Cast(expected.clone())
        });
    }
    resolve(actual, expected, options)
}

fn identity(actual: &Ty, expected: &Ty, _: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    (actual == expected || actual.is_subclass_of(expected)).then_some(Ok(Coercion::Identity))
}

fn boxing(actual: &Ty, expected: &Ty, _: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    (expected == &Ty::Any && actual.is_value_type()).then_some(Ok(Coercion::Box))
}

fn unboxing(actual: &Ty, expected: &Ty, _: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    (actual == &Ty::Any && expected.is_value_type()).then(|| Ok(Coercion::Unbox(expected.clone())))
}

/// Between related reference types that are not both sequence-shaped.
fn reference_cast(
    actual: &Ty,
    expected: &Ty,
    _: &CoercionOptions,
) -> Option<Result<Coercion, CoerceError>> {
    if actual.is_value_type() || expected.is_value_type() {
        return None;
    }
    if actual.is_sequence() && expected.is_sequence() {
        return None;
    }
    if expected.is_assignable_from(actual) {
        return Some(Ok(Coercion::Identity));
    }
    if actual.is_assignable_from(expected) {
        return Some(Ok(Coercion::Cast(expected.clone())));
    }
    None
}

fn sequence_to_seq(
    actual: &Ty,
    expected: &Ty,
    options: &CoercionOptions,
) -> Option<Result<Coercion, CoerceError>> {
    let Ty::Seq(target) = expected else {
        return None;
    };
    let source = actual.sequence_element()?;
    if source == target.as_ref() {
        return Some(Ok(Coercion::Identity));
    }
    let compatible = |a: &Ty, b: &Ty| a.accepts_null() && b.accepts_null() && b.is_assignable_from(a);
    if compatible(source, target) || compatible(target, source) {
        return Some(Ok(Coercion::CastElements(target.as_ref().clone())));
    }
    Some(elements(source, target, options).map(|inner| Coercion::ConvertElements(Box::new(inner))))
}

fn sequence_to_singleton(
    actual: &Ty,
    expected: &Ty,
    options: &CoercionOptions,
) -> Option<Result<Coercion, CoerceError>> {
    let element = actual.sequence_element()?;
    (element == expected).then(|| {
        Ok(Coercion::Singleton {
            element: expected.clone(),
            policy: options.singleton,
        })
    })
}

fn wrap_nullable(actual: &Ty, expected: &Ty, _: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    matches!(expected, Ty::Nullable(inner) if inner.as_ref() == actual).then_some(Ok(Coercion::WrapNullable))
}

fn unwrap_nullable(actual: &Ty, expected: &Ty, _: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    matches!(actual, Ty::Nullable(inner) if inner.as_ref() == expected)
        .then(|| Ok(Coercion::UnwrapOrDefault(expected.clone())))
}

fn lazy_reference(
    actual: &Ty,
    expected: &Ty,
    options: &CoercionOptions,
) -> Option<Result<Coercion, CoerceError>> {
    let Ty::Lazy(target) = expected else {
        return None;
    };
    if target.is_assignable_from(actual) {
        let inner = if target.as_ref() == actual {
            Coercion::Identity
        } else {
            Coercion::Cast(target.as_ref().clone())
        };
        return Some(Ok(Coercion::LazyFromValue(Box::new(inner))));
    }
    if let Some(element) = actual.sequence_element()
        && target.is_assignable_from(element)
    {
        return Some(Ok(Coercion::LazyFromSequence {
            element: target.as_ref().clone(),
            policy: options.singleton,
        }));
    }
    Some(Err(CoerceError::conversion(
        actual,
        expected,
        "cannot build a lazy reference from this type",
    )))
}

fn ordered_or_queryable(
    actual: &Ty,
    expected: &Ty,
    options: &CoercionOptions,
) -> Option<Result<Coercion, CoerceError>> {
    let (flavor, target) = match expected {
        Ty::Ordered(target) => (SeqFlavor::Ordered, target),
        Ty::Queryable(target) => (SeqFlavor::Queryable, target),
        _ => return None,
    };
    let source = actual.sequence_element()?;
    Some(elements(source, target, options).map(|inner| Coercion::Adapt {
        flavor,
        elements: Box::new(inner),
    }))
}

fn entity_set(actual: &Ty, expected: &Ty, options: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    let Ty::EntitySet(target) = expected else {
        return None;
    };
    let source = actual.sequence_element()?;
    Some(elements(source, target, options).map(|inner| Coercion::EntitySet(Box::new(inner))))
}

fn to_list(actual: &Ty, expected: &Ty, options: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    let Ty::List(target) = expected else {
        return None;
    };
    let source = actual.sequence_element()?;
    Some(elements(source, target, options).map(|inner| Coercion::ToList(Box::new(inner))))
}

fn to_array(actual: &Ty, expected: &Ty, options: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    let Ty::Array(target) = expected else {
        return None;
    };
    let source = actual.sequence_element()?;
    Some(elements(source, target, options).map(|inner| Coercion::ToArray(Box::new(inner))))
}

fn int_to_bool(actual: &Ty, expected: &Ty, _: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    (actual.is_integer() && expected == &Ty::Bool).then_some(Ok(Coercion::IntToBool))
}

/// Scalars (and `any`) convert dynamically; anything else cannot convert.
fn dynamic(actual: &Ty, expected: &Ty, _: &CoercionOptions) -> Option<Result<Coercion, CoerceError>> {
    let scalar = |ty: &Ty| ty.non_nullable().is_primitive() || ty == &Ty::Any;
    if actual == &Ty::Any || (scalar(actual) && scalar(expected)) {
        return Some(Ok(Coercion::Dynamic(expected.clone())));
    }
    Some(Err(CoerceError::conversion(actual, expected, "no coercion rule applies")))
}
