//! Plan comparison and cacheability.
//!
//! Two plans that compare equal here compile to interchangeable routines.
//! Source handles never take part in the comparison.

use std::sync::Arc;

use crate::plan::{ArrayOrigin, PlanKind, PlanNode};

/// Whether a routine compiled from `node` may be shared across queries.
///
/// Plans that embed per-query state (caller parameters, captured arrays,
/// non-deterministic calls) are compiled fresh every time. Nested client
/// queries are compiled on their own and do not affect the outer plan.
pub fn is_cacheable(node: &PlanNode) -> bool {
    match node.kind() {
        PlanKind::ClientParameter { .. } => false,
        PlanKind::ClientArray {
            origin: ArrayOrigin::Captured,
            ..
        } => false,
        PlanKind::MethodCall { method, .. } if !method.is_deterministic() => false,
        PlanKind::ClientQuery { .. } => true,
        _ => node.children().into_iter().all(is_cacheable),
    }
}

/// Whether evaluating `node` advances the cursor.
///
/// Joined collections read ahead on the shared cursor; client queries run on
/// their own cursor and do not count.
pub fn has_side_effect(node: &PlanNode) -> bool {
    match node.kind() {
        PlanKind::JoinedCollection { .. } => true,
        PlanKind::ClientQuery { .. } => false,
        _ => node.children().into_iter().any(has_side_effect),
    }
}

/// Structural equality of two plan trees.
///
/// Type metadata matches by identity: two descriptors that share a class
/// name may still differ in members or keys.
pub fn structurally_equal(a: &PlanNode, b: &PlanNode) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    if a.ty() != b.ty() {
        return false;
    }
    match (a.kind(), b.kind()) {
        (
            PlanKind::ColumnRef {
                ordinal: o1,
                column_type: t1,
            },
            PlanKind::ColumnRef {
                ordinal: o2,
                column_type: t2,
            },
        ) => o1 == o2 && t1 == t2,
        (
            PlanKind::UserColumn {
                name: n1,
                required: r1,
            },
            PlanKind::UserColumn {
                name: n2,
                required: r2,
            },
        ) => n1 == n2 && r1 == r2,
        (PlanKind::Value(l1), PlanKind::Value(l2)) => l1 == l2,
        // Parameters only match by reference; such plans are never cached anyway.
        (PlanKind::ClientParameter { .. }, PlanKind::ClientParameter { .. }) => false,
        (PlanKind::New(n1), PlanKind::New(n2)) => {
            Arc::ptr_eq(&n1.meta, &n2.meta)
                && all_equal(&n1.args, &n2.args)
                && n1.members.len() == n2.members.len()
                && n1
                    .members
                    .iter()
                    .zip(&n2.members)
                    .all(|(m1, m2)| m1.member == m2.member && structurally_equal(&m1.expr, &m2.expr))
        }
        (PlanKind::Link(l1), PlanKind::Link(l2)) => {
            l1.member.id() == l2.member.id()
                && all_equal(&l1.keys, &l2.keys)
                && option_equal(l1.expansion.as_deref(), l2.expansion.as_deref())
        }
        (
            PlanKind::JoinedCollection {
                expression: e1,
                count: c1,
            },
            PlanKind::JoinedCollection {
                expression: e2,
                count: c2,
            },
        ) => structurally_equal(e1, e2) && structurally_equal(c1, c2),
        (PlanKind::Grouping { key: k1, group: g1 }, PlanKind::Grouping { key: k2, group: g2 }) => {
            structurally_equal(k1, k2) && structurally_equal(g1, g2)
        }
        (
            PlanKind::ClientArray {
                elements: e1,
                origin: o1,
            },
            PlanKind::ClientArray {
                elements: e2,
                origin: o2,
            },
        ) => o1 == o2 && all_equal(e1, e2),
        (
            PlanKind::ClientCase {
                discriminant: d1,
                whens: w1,
            },
            PlanKind::ClientCase {
                discriminant: d2,
                whens: w2,
            },
        ) => {
            structurally_equal(d1, d2)
                && w1.len() == w2.len()
                && w1.iter().zip(w2).all(|(a, b)| {
                    option_equal(a.matches.as_ref(), b.matches.as_ref())
                        && structurally_equal(&a.value, &b.value)
                })
        }
        (
            PlanKind::SearchedCase {
                whens: w1,
                otherwise: o1,
            },
            PlanKind::SearchedCase {
                whens: w2,
                otherwise: o2,
            },
        ) => {
            w1.len() == w2.len()
                && w1.iter().zip(w2).all(|(a, b)| {
                    structurally_equal(&a.condition, &b.condition) && structurally_equal(&a.value, &b.value)
                })
                && option_equal(o1.as_deref(), o2.as_deref())
        }
        (
            PlanKind::TypeCase {
                discriminator: d1,
                whens: w1,
            },
            PlanKind::TypeCase {
                discriminator: d2,
                whens: w2,
            },
        ) => {
            structurally_equal(d1, d2)
                && w1.len() == w2.len()
                && w1
                    .iter()
                    .zip(w2)
                    .all(|(a, b)| a.matches == b.matches && structurally_equal(&a.binding, &b.binding))
        }
        (
            PlanKind::DiscriminatedType {
                discriminator: d1,
                target: t1,
            },
            PlanKind::DiscriminatedType {
                discriminator: d2,
                target: t2,
            },
        ) => Arc::ptr_eq(t1, t2) && structurally_equal(d1, d2),
        (PlanKind::Member { expr: e1, member: m1 }, PlanKind::Member { expr: e2, member: m2 }) => {
            m1.id() == m2.id() && structurally_equal(e1, e2)
        }
        (
            PlanKind::MethodCall {
                object: o1,
                method: m1,
                args: a1,
            },
            PlanKind::MethodCall {
                object: o2,
                method: m2,
                args: a2,
            },
        ) => {
            m1.same_identity(m2) && option_equal(o1.as_deref(), o2.as_deref()) && all_equal(a1, a2)
        }
        (
            PlanKind::ClientQuery {
                subquery: s1,
                args: a1,
            },
            PlanKind::ClientQuery {
                subquery: s2,
                args: a2,
            },
        ) => s1 == s2 && all_equal(a1, a2),
        (
            PlanKind::OptionalValue {
                has_value: h1,
                value: v1,
            },
            PlanKind::OptionalValue {
                has_value: h2,
                value: v2,
            },
        ) => structurally_equal(h1, h2) && structurally_equal(v1, v2),
        (PlanKind::ValueOf(x), PlanKind::ValueOf(y))
        | (PlanKind::OuterJoinedValue(x), PlanKind::OuterJoinedValue(y))
        | (PlanKind::Lift(x), PlanKind::Lift(y)) => structurally_equal(x, y),
        _ => false,
    }
}

fn all_equal(a: &[PlanNode], b: &[PlanNode]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structurally_equal(x, y))
}

fn option_equal(a: Option<&PlanNode>, b: Option<&PlanNode>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => structurally_equal(x, y),
        _ => false,
    }
}
