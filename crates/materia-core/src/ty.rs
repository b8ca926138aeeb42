//! Logical type descriptors.
//!
//! `Ty` describes both the declared type of a plan node and the runtime
//! shape of a value. Classes are named and may derive from a single base.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::value::{Instance, Value};

/// A named class.
///
/// Reference classes produce instances with identity; value classes are
/// copied on assignment. Equality is by name.
#[derive(Clone)]
pub struct ClassType(Arc<ClassDef>);

struct ClassDef {
    name: String,
    base: Option<ClassType>,
    value_type: bool,
}

impl ClassType {
    /// A reference class with no base.
    pub fn reference(name: impl Into<String>) -> Self {
        Self(Arc::new(ClassDef {
            name: name.into(),
            base: None,
            value_type: false,
        }))
    }

    /// A value class (struct-like, copied by value).
    pub fn value(name: impl Into<String>) -> Self {
        Self(Arc::new(ClassDef {
            name: name.into(),
            base: None,
            value_type: true,
        }))
    }

    /// A reference class deriving from `base`.
    pub fn derived(name: impl Into<String>, base: &ClassType) -> Self {
        Self(Arc::new(ClassDef {
            name: name.into(),
            base: Some(base.clone()),
            value_type: false,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn base(&self) -> Option<&ClassType> {
        self.0.base.as_ref()
    }

    pub fn is_value_type(&self) -> bool {
        self.0.value_type
    }

    /// Strict subclass check: walks the base chain, excluding `self`.
    pub fn is_subclass_of(&self, other: &ClassType) -> bool {
        let mut current = self.base();
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.base();
        }
        false
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.name == other.0.name && self.0.value_type == other.0.value_type)
    }
}

impl Eq for ClassType {}

impl Hash for ClassType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Logical type of a plan node or runtime value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// Top type; holds any value. Reference-typed.
    Any,
    Bool,
    I16,
    I32,
    I64,
    F64,
    String,
    Bytes,
    /// `T?` over a value type.
    Nullable(Box<Ty>),
    Class(ClassType),
    /// Lazily enumerated sequence.
    Seq(Box<Ty>),
    List(Box<Ty>),
    Array(Box<Ty>),
    /// Sequence carrying an ordering.
    Ordered(Box<Ty>),
    /// Sequence that can be further composed by a query provider.
    Queryable(Box<Ty>),
    /// Association collection that can be loaded lazily.
    EntitySet(Box<Ty>),
    /// Association reference that can be loaded lazily.
    Lazy(Box<Ty>),
    /// Key plus a sequence of elements.
    Grouping(Box<Ty>, Box<Ty>),
    /// A reference to a type (result of discriminator dispatch).
    TypeToken,
}

impl Ty {
    pub fn nullable(inner: Ty) -> Self {
        Ty::Nullable(Box::new(inner))
    }

    pub fn class(class: &ClassType) -> Self {
        Ty::Class(class.clone())
    }

    pub fn seq(element: Ty) -> Self {
        Ty::Seq(Box::new(element))
    }

    pub fn list(element: Ty) -> Self {
        Ty::List(Box::new(element))
    }

    pub fn array(element: Ty) -> Self {
        Ty::Array(Box::new(element))
    }

    pub fn ordered(element: Ty) -> Self {
        Ty::Ordered(Box::new(element))
    }

    pub fn queryable(element: Ty) -> Self {
        Ty::Queryable(Box::new(element))
    }

    pub fn entity_set(element: Ty) -> Self {
        Ty::EntitySet(Box::new(element))
    }

    pub fn lazy(element: Ty) -> Self {
        Ty::Lazy(Box::new(element))
    }

    pub fn grouping(key: Ty, element: Ty) -> Self {
        Ty::Grouping(Box::new(key), Box::new(element))
    }

    /// Bool, numeric, string and bytes.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Ty::Bool | Ty::I16 | Ty::I32 | Ty::I64 | Ty::F64 | Ty::String | Ty::Bytes
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::I16 | Ty::I32 | Ty::I64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Ty::F64)
    }

    /// Value types cannot hold null unless wrapped in `Nullable`.
    pub fn is_value_type(&self) -> bool {
        match self {
            Ty::Bool | Ty::I16 | Ty::I32 | Ty::I64 | Ty::F64 | Ty::Nullable(_) => true,
            Ty::Class(class) => class.is_value_type(),
            _ => false,
        }
    }

    pub fn is_reference_type(&self) -> bool {
        !self.is_value_type()
    }

    pub fn is_nullable_value(&self) -> bool {
        matches!(self, Ty::Nullable(_))
    }

    /// Whether a null value is a legal inhabitant.
    pub fn accepts_null(&self) -> bool {
        self.is_reference_type() || self.is_nullable_value()
    }

    /// Strips one `Nullable` wrapper.
    pub fn non_nullable(&self) -> &Ty {
        match self {
            Ty::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Element of a sequence-shaped type.
    pub fn sequence_element(&self) -> Option<&Ty> {
        match self {
            Ty::Seq(e)
            | Ty::List(e)
            | Ty::Array(e)
            | Ty::Ordered(e)
            | Ty::Queryable(e)
            | Ty::EntitySet(e)
            | Ty::Grouping(_, e) => Some(e),
            _ => None,
        }
    }

    /// Element of a sequence-shaped type, or the type itself.
    pub fn element_type(&self) -> &Ty {
        self.sequence_element().unwrap_or(self)
    }

    pub fn is_sequence(&self) -> bool {
        self.sequence_element().is_some()
    }

    /// Strict subclass relation between class types.
    pub fn is_subclass_of(&self, other: &Ty) -> bool {
        match (self, other) {
            (Ty::Class(a), Ty::Class(b)) => a.is_subclass_of(b),
            _ => false,
        }
    }

    /// Whether a value of type `other` may be stored where `self` is
    /// expected without conversion.
    pub fn is_assignable_from(&self, other: &Ty) -> bool {
        if self == other || other.is_subclass_of(self) {
            return true;
        }
        match (self, other) {
            (Ty::Any, other) => other.is_reference_type(),
            (Ty::Seq(e), other) => other.sequence_element().is_some_and(|o| {
                o == e.as_ref() || (o.is_reference_type() && e.is_assignable_from(o))
            }),
            _ => false,
        }
    }

    /// Default value: zero for value types, null otherwise.
    pub fn default_value(&self) -> Value {
        match self {
            Ty::Bool => Value::Bool(false),
            Ty::I16 => Value::I16(0),
            Ty::I32 => Value::I32(0),
            Ty::I64 => Value::I64(0),
            Ty::F64 => Value::F64(0.0),
            Ty::Class(class) if class.is_value_type() => {
                Value::Record(Box::new(Instance::new(class.clone())))
            }
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Any => f.write_str("any"),
            Ty::Bool => f.write_str("bool"),
            Ty::I16 => f.write_str("int16"),
            Ty::I32 => f.write_str("int32"),
            Ty::I64 => f.write_str("int64"),
            Ty::F64 => f.write_str("float64"),
            Ty::String => f.write_str("string"),
            Ty::Bytes => f.write_str("bytes"),
            Ty::Nullable(inner) => write!(f, "{inner}?"),
            Ty::Class(class) => f.write_str(class.name()),
            Ty::Seq(e) => write!(f, "seq<{e}>"),
            Ty::List(e) => write!(f, "list<{e}>"),
            Ty::Array(e) => write!(f, "{e}[]"),
            Ty::Ordered(e) => write!(f, "ordered<{e}>"),
            Ty::Queryable(e) => write!(f, "queryable<{e}>"),
            Ty::EntitySet(e) => write!(f, "entity_set<{e}>"),
            Ty::Lazy(e) => write!(f, "lazy<{e}>"),
            Ty::Grouping(k, e) => write!(f, "grouping<{k}, {e}>"),
            Ty::TypeToken => f.write_str("type"),
        }
    }
}
