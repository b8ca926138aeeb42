//! Projection plan tree.
//!
//! A plan describes how each output value is built from the current row:
//! columns, literals, constructors, links to related data, nested
//! collections and conditionals. Every node carries its logical type and an
//! optional source handle used in diagnostics. Source handles are ignored by
//! the structural comparison that keys the routine cache.

use std::fmt;
use std::sync::Arc;

use materia_core::{Ty, Value};

use crate::meta::{MetaMemberRef, MetaTypeRef, MethodRef};

/// Diagnostic pointer back to the query text that produced a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceHandle(Option<Arc<str>>);

impl SourceHandle {
    pub fn new(text: &str) -> Self {
        Self(Some(Arc::from(text)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(text) => f.write_str(text),
            None => f.write_str("<unknown>"),
        }
    }
}

/// Constant embedded in a plan.
///
/// Unlike [`Value`] this is thread-safe, so it can live inside cached
/// routines.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    Type(Ty),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::I16(n) => Value::I16(*n),
            Literal::I32(n) => Value::I32(*n),
            Literal::I64(n) => Value::I64(*n),
            Literal::F64(n) => Value::F64(*n),
            Literal::String(s) => Value::String(s.to_string()),
            Literal::Bytes(b) => Value::Bytes(b.to_vec()),
            Literal::Type(ty) => Value::Type(ty.clone()),
        }
    }

    /// Natural type of the constant.
    pub fn ty(&self) -> Ty {
        match self {
            Literal::Null => Ty::Any,
            Literal::Bool(_) => Ty::Bool,
            Literal::I16(_) => Ty::I16,
            Literal::I32(_) => Ty::I32,
            Literal::I64(_) => Ty::I64,
            Literal::F64(_) => Ty::F64,
            Literal::String(_) => Ty::String,
            Literal::Bytes(_) => Ty::Bytes,
            Literal::Type(_) => Ty::TypeToken,
        }
    }

    /// Equality against a runtime discriminator value.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Null, Value::Null) => true,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::String(a), Value::String(b)) => a.as_ref() == b,
            (Literal::Bytes(a), Value::Bytes(b)) => a.as_ref() == b.as_slice(),
            (Literal::F64(a), Value::F64(b)) => a == b,
            (Literal::Type(a), Value::Type(b)) => a == b,
            (lit, value) => match (lit.to_value().as_i64(), value.as_i64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::I16(n) => write!(f, "{n}"),
            Literal::I32(n) => write!(f, "{n}"),
            Literal::I64(n) => write!(f, "{n}L"),
            Literal::F64(n) => write!(f, "{n:?}"),
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Literal::Type(ty) => write!(f, "typeof({ty})"),
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::I32(n)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::I64(n)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(Arc::from(s))
    }
}

/// Where a client-side array came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayOrigin {
    /// Written inline in the query.
    Literal,
    /// Captured from a caller variable; never cached.
    Captured,
}

#[derive(Clone, Debug)]
pub struct NewObject {
    pub meta: MetaTypeRef,
    pub args: Vec<PlanNode>,
    pub members: Vec<MemberAssign>,
}

#[derive(Clone, Debug)]
pub struct MemberAssign {
    pub member: Arc<str>,
    pub expr: PlanNode,
}

#[derive(Clone, Debug)]
pub struct Link {
    pub member: MetaMemberRef,
    pub keys: Vec<PlanNode>,
    /// Inline projection of already-fetched related data.
    pub expansion: Option<Box<PlanNode>>,
}

#[derive(Clone, Debug)]
pub struct ClientWhen {
    /// `None` marks the default branch.
    pub matches: Option<PlanNode>,
    pub value: PlanNode,
}

#[derive(Clone, Debug)]
pub struct SearchedWhen {
    pub condition: PlanNode,
    pub value: PlanNode,
}

#[derive(Clone, Debug)]
pub struct TypeWhen {
    /// `None` marks the default branch.
    pub matches: Option<Literal>,
    pub binding: PlanNode,
}

#[derive(Clone, Debug)]
pub enum PlanKind {
    /// Object construction with constructor arguments and member assignments.
    New(NewObject),
    /// Positional column read; `column_type` is the type read off the wire.
    ColumnRef { ordinal: usize, column_type: Ty },
    /// Column bound by name when the reader opens; `None` means unnamed.
    UserColumn { name: Option<Arc<str>>, required: bool },
    Value(Literal),
    /// Caller-supplied argument, read from the session at run time.
    ClientParameter { index: usize },
    /// Association link resolved through data services or inline expansion.
    Link(Link),
    /// Nested collection read from subsequent rows of the same cursor.
    JoinedCollection {
        expression: Box<PlanNode>,
        count: Box<PlanNode>,
    },
    Grouping {
        key: Box<PlanNode>,
        group: Box<PlanNode>,
    },
    ClientArray {
        elements: Vec<PlanNode>,
        origin: ArrayOrigin,
    },
    ClientCase {
        discriminant: Box<PlanNode>,
        whens: Vec<ClientWhen>,
    },
    SearchedCase {
        whens: Vec<SearchedWhen>,
        otherwise: Option<Box<PlanNode>>,
    },
    /// Polymorphic construction selected by a discriminator code.
    TypeCase {
        discriminator: Box<PlanNode>,
        whens: Vec<TypeWhen>,
    },
    /// Runtime type token chosen by inheritance code.
    DiscriminatedType {
        discriminator: Box<PlanNode>,
        target: MetaTypeRef,
    },
    Member {
        expr: Box<PlanNode>,
        member: MetaMemberRef,
    },
    MethodCall {
        object: Option<Box<PlanNode>>,
        method: MethodRef,
        args: Vec<PlanNode>,
    },
    /// Nested query executed per row.
    ClientQuery { subquery: usize, args: Vec<PlanNode> },
    /// Value guarded by a has-value flag; absent yields null.
    OptionalValue {
        has_value: Box<PlanNode>,
        value: Box<PlanNode>,
    },
    /// Underlying value of a nullable.
    ValueOf(Box<PlanNode>),
    /// Value from an outer join; nulls pass through.
    OuterJoinedValue(Box<PlanNode>),
    /// Conversion of a computed value to the node's type.
    Lift(Box<PlanNode>),
}

impl PlanKind {
    pub fn name(&self) -> &'static str {
        match self {
            PlanKind::New(_) => "New",
            PlanKind::ColumnRef { .. } => "ColumnRef",
            PlanKind::UserColumn { .. } => "UserColumn",
            PlanKind::Value(_) => "Value",
            PlanKind::ClientParameter { .. } => "ClientParameter",
            PlanKind::Link(_) => "Link",
            PlanKind::JoinedCollection { .. } => "JoinedCollection",
            PlanKind::Grouping { .. } => "Grouping",
            PlanKind::ClientArray { .. } => "ClientArray",
            PlanKind::ClientCase { .. } => "ClientCase",
            PlanKind::SearchedCase { .. } => "SearchedCase",
            PlanKind::TypeCase { .. } => "TypeCase",
            PlanKind::DiscriminatedType { .. } => "DiscriminatedType",
            PlanKind::Member { .. } => "Member",
            PlanKind::MethodCall { .. } => "MethodCall",
            PlanKind::ClientQuery { .. } => "ClientQuery",
            PlanKind::OptionalValue { .. } => "OptionalValue",
            PlanKind::ValueOf(_) => "ValueOf",
            PlanKind::OuterJoinedValue(_) => "OuterJoinedValue",
            PlanKind::Lift(_) => "Lift",
        }
    }
}

/// A node of the projection plan.
#[derive(Clone, Debug)]
pub struct PlanNode {
    kind: PlanKind,
    ty: Ty,
    source: SourceHandle,
}

impl PlanNode {
    pub fn new(kind: PlanKind, ty: Ty) -> Self {
        Self {
            kind,
            ty,
            source: SourceHandle::none(),
        }
    }

    pub fn with_source(mut self, text: &str) -> Self {
        self.source = SourceHandle::new(text);
        self
    }

    pub fn kind(&self) -> &PlanKind {
        &self.kind
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    /// Column read with the declared type as wire type.
    pub fn column(ordinal: usize, ty: Ty) -> Self {
        let column_type = ty.non_nullable().clone();
        Self::new(PlanKind::ColumnRef { ordinal, column_type }, ty)
    }

    /// Column read whose wire type differs from its declared type.
    pub fn column_as(ordinal: usize, ty: Ty, column_type: Ty) -> Self {
        Self::new(PlanKind::ColumnRef { ordinal, column_type }, ty)
    }

    pub fn user_column(name: &str, ty: Ty, required: bool) -> Self {
        Self::new(
            PlanKind::UserColumn {
                name: Some(Arc::from(name)),
                required,
            },
            ty,
        )
    }

    pub fn unnamed_column(ty: Ty) -> Self {
        Self::new(
            PlanKind::UserColumn {
                name: None,
                required: false,
            },
            ty,
        )
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        let lit = value.into();
        let ty = lit.ty();
        Self::new(PlanKind::Value(lit), ty)
    }

    pub fn literal_as(value: impl Into<Literal>, ty: Ty) -> Self {
        Self::new(PlanKind::Value(value.into()), ty)
    }

    pub fn parameter(index: usize, ty: Ty) -> Self {
        Self::new(PlanKind::ClientParameter { index }, ty)
    }

    /// Constructs `meta` assigning the given members.
    pub fn new_object(meta: &MetaTypeRef, members: Vec<(&str, PlanNode)>) -> Self {
        Self::construct(meta, Vec::new(), members)
    }

    pub fn construct(meta: &MetaTypeRef, args: Vec<PlanNode>, members: Vec<(&str, PlanNode)>) -> Self {
        let members = members
            .into_iter()
            .map(|(name, expr)| MemberAssign {
                member: Arc::from(name),
                expr,
            })
            .collect();
        Self::new(
            PlanKind::New(NewObject {
                meta: meta.clone(),
                args,
                members,
            }),
            meta.ty(),
        )
    }

    pub fn link(member: &MetaMemberRef, keys: Vec<PlanNode>) -> Self {
        Self::new(
            PlanKind::Link(Link {
                member: member.clone(),
                keys,
                expansion: None,
            }),
            member.ty().clone(),
        )
    }

    pub fn expanded_link(member: &MetaMemberRef, keys: Vec<PlanNode>, expansion: PlanNode) -> Self {
        Self::new(
            PlanKind::Link(Link {
                member: member.clone(),
                keys,
                expansion: Some(Box::new(expansion)),
            }),
            member.ty().clone(),
        )
    }

    pub fn joined_collection(expression: PlanNode, count: PlanNode) -> Self {
        let ty = Ty::list(expression.ty.clone());
        Self::new(
            PlanKind::JoinedCollection {
                expression: Box::new(expression),
                count: Box::new(count),
            },
            ty,
        )
    }

    pub fn grouping(key: PlanNode, group: PlanNode) -> Self {
        let ty = Ty::grouping(key.ty.clone(), group.ty.element_type().clone());
        Self::new(
            PlanKind::Grouping {
                key: Box::new(key),
                group: Box::new(group),
            },
            ty,
        )
    }

    pub fn client_array(elements: Vec<PlanNode>, element: Ty, origin: ArrayOrigin) -> Self {
        Self::new(PlanKind::ClientArray { elements, origin }, Ty::array(element))
    }

    pub fn client_case(discriminant: PlanNode, whens: Vec<ClientWhen>, ty: Ty) -> Self {
        Self::new(
            PlanKind::ClientCase {
                discriminant: Box::new(discriminant),
                whens,
            },
            ty,
        )
    }

    pub fn searched_case(whens: Vec<SearchedWhen>, otherwise: Option<PlanNode>, ty: Ty) -> Self {
        Self::new(
            PlanKind::SearchedCase {
                whens,
                otherwise: otherwise.map(Box::new),
            },
            ty,
        )
    }

    pub fn type_case(discriminator: PlanNode, whens: Vec<TypeWhen>, ty: Ty) -> Self {
        Self::new(
            PlanKind::TypeCase {
                discriminator: Box::new(discriminator),
                whens,
            },
            ty,
        )
    }

    pub fn discriminated_type(discriminator: PlanNode, target: &MetaTypeRef) -> Self {
        Self::new(
            PlanKind::DiscriminatedType {
                discriminator: Box::new(discriminator),
                target: target.clone(),
            },
            Ty::TypeToken,
        )
    }

    pub fn member(expr: PlanNode, member: &MetaMemberRef) -> Self {
        Self::new(
            PlanKind::Member {
                expr: Box::new(expr),
                member: member.clone(),
            },
            member.ty().clone(),
        )
    }

    pub fn method_call(object: Option<PlanNode>, method: &MethodRef, args: Vec<PlanNode>) -> Self {
        Self::new(
            PlanKind::MethodCall {
                object: object.map(Box::new),
                method: method.clone(),
                args,
            },
            method.returns().clone(),
        )
    }

    pub fn client_query(subquery: usize, args: Vec<PlanNode>, ty: Ty) -> Self {
        Self::new(PlanKind::ClientQuery { subquery, args }, ty)
    }

    pub fn optional_value(has_value: PlanNode, value: PlanNode) -> Self {
        let ty = value.ty.clone();
        Self::new(
            PlanKind::OptionalValue {
                has_value: Box::new(has_value),
                value: Box::new(value),
            },
            ty,
        )
    }

    pub fn value_of(operand: PlanNode) -> Self {
        let ty = operand.ty.non_nullable().clone();
        Self::new(PlanKind::ValueOf(Box::new(operand)), ty)
    }

    pub fn outer_joined(operand: PlanNode) -> Self {
        let ty = operand.ty.clone();
        Self::new(PlanKind::OuterJoinedValue(Box::new(operand)), ty)
    }

    pub fn lift(operand: PlanNode, ty: Ty) -> Self {
        Self::new(PlanKind::Lift(Box::new(operand)), ty)
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&PlanNode> {
        let mut out = Vec::new();
        match &self.kind {
            PlanKind::ColumnRef { .. }
            | PlanKind::UserColumn { .. }
            | PlanKind::Value(_)
            | PlanKind::ClientParameter { .. } => {}
            PlanKind::New(new) => {
                out.extend(&new.args);
                out.extend(new.members.iter().map(|m| &m.expr));
            }
            PlanKind::Link(link) => {
                out.extend(&link.keys);
                out.extend(link.expansion.as_deref());
            }
            PlanKind::JoinedCollection { expression, count } => {
                out.push(count.as_ref());
                out.push(expression.as_ref());
            }
            PlanKind::Grouping { key, group } => {
                out.push(key.as_ref());
                out.push(group.as_ref());
            }
            PlanKind::ClientArray { elements, .. } => out.extend(elements),
            PlanKind::ClientCase { discriminant, whens } => {
                out.push(discriminant.as_ref());
                for when in whens {
                    out.extend(when.matches.as_ref());
                    out.push(&when.value);
                }
            }
            PlanKind::SearchedCase { whens, otherwise } => {
                for when in whens {
                    out.push(&when.condition);
                    out.push(&when.value);
                }
                out.extend(otherwise.as_deref());
            }
            PlanKind::TypeCase { discriminator, whens } => {
                out.push(discriminator.as_ref());
                out.extend(whens.iter().map(|w| &w.binding));
            }
            PlanKind::DiscriminatedType { discriminator, .. } => out.push(discriminator.as_ref()),
            PlanKind::Member { expr, .. } => out.push(expr.as_ref()),
            PlanKind::MethodCall { object, args, .. } => {
                out.extend(object.as_deref());
                out.extend(args);
            }
            PlanKind::ClientQuery { args, .. } => out.extend(args),
            PlanKind::OptionalValue { has_value, value } => {
                out.push(has_value.as_ref());
                out.push(value.as_ref());
            }
            PlanKind::ValueOf(inner) | PlanKind::OuterJoinedValue(inner) | PlanKind::Lift(inner) => {
                out.push(inner.as_ref())
            }
        }
        out
    }

    fn children_mut(&mut self) -> Vec<&mut PlanNode> {
        let mut out = Vec::new();
        match &mut self.kind {
            PlanKind::ColumnRef { .. }
            | PlanKind::UserColumn { .. }
            | PlanKind::Value(_)
            | PlanKind::ClientParameter { .. } => {}
            PlanKind::New(new) => {
                out.extend(new.args.iter_mut());
                out.extend(new.members.iter_mut().map(|m| &mut m.expr));
            }
            PlanKind::Link(link) => {
                out.extend(link.keys.iter_mut());
                out.extend(link.expansion.as_deref_mut());
            }
            PlanKind::JoinedCollection { expression, count } => {
                out.push(count.as_mut());
                out.push(expression.as_mut());
            }
            PlanKind::Grouping { key, group } => {
                out.push(key.as_mut());
                out.push(group.as_mut());
            }
            PlanKind::ClientArray { elements, .. } => out.extend(elements.iter_mut()),
            PlanKind::ClientCase { discriminant, whens } => {
                out.push(discriminant.as_mut());
                for when in whens {
                    out.extend(when.matches.as_mut());
                    out.push(&mut when.value);
                }
            }
            PlanKind::SearchedCase { whens, otherwise } => {
                for when in whens {
                    out.push(&mut when.condition);
                    out.push(&mut when.value);
                }
                out.extend(otherwise.as_deref_mut());
            }
            PlanKind::TypeCase { discriminator, whens } => {
                out.push(discriminator.as_mut());
                out.extend(whens.iter_mut().map(|w| &mut w.binding));
            }
            PlanKind::DiscriminatedType { discriminator, .. } => out.push(discriminator.as_mut()),
            PlanKind::Member { expr, .. } => out.push(expr.as_mut()),
            PlanKind::MethodCall { object, args, .. } => {
                out.extend(object.as_deref_mut());
                out.extend(args.iter_mut());
            }
            PlanKind::ClientQuery { args, .. } => out.extend(args.iter_mut()),
            PlanKind::OptionalValue { has_value, value } => {
                out.push(has_value.as_mut());
                out.push(value.as_mut());
            }
            PlanKind::ValueOf(inner) | PlanKind::OuterJoinedValue(inner) | PlanKind::Lift(inner) => {
                out.push(inner.as_mut())
            }
        }
        out
    }

    /// Copy of the tree with every source handle cleared.
    ///
    /// Cache keys hold stripped plans so cached entries do not pin query text.
    pub fn without_sources(&self) -> PlanNode {
        let mut copy = self.clone();
        copy.strip_sources();
        copy
    }

    fn strip_sources(&mut self) {
        self.source = SourceHandle::none();
        for child in self.children_mut() {
            child.strip_sources();
        }
    }

    /// Height of the tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children().into_iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    /// Whether the tree is more than `limit` levels deep.
    ///
    /// Walks with an explicit stack and stops at the first node past the
    /// limit, so it is safe on trees too deep for the recursive passes.
    pub fn exceeds_depth(&self, limit: usize) -> bool {
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            if depth > limit {
                return true;
            }
            stack.extend(node.children().into_iter().map(|child| (child, depth + 1)));
        }
        false
    }
}
