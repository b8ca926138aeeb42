//! Runtime values produced by materialization.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::sequence::{EntitySet, Group, LazyRef, Sequence};
use crate::ty::{ClassType, Ty};

/// Field storage of a class instance, in assignment order.
#[derive(Clone)]
pub struct Instance {
    class: ClassType,
    fields: IndexMap<Arc<str>, Value>,
}

impl Instance {
    pub fn new(class: ClassType) -> Self {
        Self {
            class,
            fields: IndexMap::new(),
        }
    }

    pub fn class(&self) -> &ClassType {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: Arc<str>, value: Value) {
        self.fields.insert(name, value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_ref(), v))
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.fields == other.fields
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.name());
        for (name, value) in &self.fields {
            s.field(name, value);
        }
        s.finish()
    }
}

/// Shared handle to a reference-type instance.
///
/// Equality is identity: two handles are equal iff they point to the same
/// instance.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Instance>>);

impl ObjectRef {
    pub fn new(instance: Instance) -> Self {
        Self(Rc::new(RefCell::new(instance)))
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn class(&self) -> ClassType {
        self.0.borrow().class.clone()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: Arc<str>, value: Value) {
        self.0.borrow_mut().set(name, value);
    }

    pub fn borrow(&self) -> Ref<'_, Instance> {
        self.0.borrow()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    // Object graphs may be cyclic; only the class is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.0.borrow().class.name())
    }
}

/// Runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Reference-type instance with identity.
    Object(ObjectRef),
    /// Value-type instance.
    Record(Box<Instance>),
    Sequence(Sequence),
    List(Vec<Value>),
    Array(Vec<Value>),
    EntitySet(EntitySet),
    Lazy(LazyRef),
    Group(Group),
    Type(Ty),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The runtime type of this value. Null reports `Any`.
    pub fn runtime_ty(&self) -> Ty {
        match self {
            Value::Null => Ty::Any,
            Value::Bool(_) => Ty::Bool,
            Value::I16(_) => Ty::I16,
            Value::I32(_) => Ty::I32,
            Value::I64(_) => Ty::I64,
            Value::F64(_) => Ty::F64,
            Value::String(_) => Ty::String,
            Value::Bytes(_) => Ty::Bytes,
            Value::Object(obj) => Ty::Class(obj.class()),
            Value::Record(rec) => Ty::Class(rec.class().clone()),
            Value::Sequence(_) => Ty::seq(Ty::Any),
            Value::List(_) => Ty::list(Ty::Any),
            Value::Array(_) => Ty::array(Ty::Any),
            Value::EntitySet(_) => Ty::entity_set(Ty::Any),
            Value::Lazy(_) => Ty::lazy(Ty::Any),
            Value::Group(_) => Ty::grouping(Ty::Any, Ty::Any),
            Value::Type(_) => Ty::TypeToken,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I16(v) => Some(i64::from(*v)),
            Value::I32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Reads a member of an object or record.
    pub fn member(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.get(name),
            Value::Record(rec) => rec.get(name).cloned(),
            _ => None,
        }
    }

    /// Key part usable in identity maps. Only scalars qualify.
    pub fn key_part(&self) -> Option<KeyPart> {
        match self {
            Value::Null => Some(KeyPart::Null),
            Value::Bool(b) => Some(KeyPart::Bool(*b)),
            Value::I16(_) | Value::I32(_) | Value::I64(_) => self.as_i64().map(KeyPart::Int),
            Value::F64(f) => Some(KeyPart::Float(f.to_bits())),
            Value::String(s) => Some(KeyPart::String(s.clone())),
            Value::Bytes(b) => Some(KeyPart::Bytes(b.clone())),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) | (Value::Array(a), Value::Array(b)) => a == b,
            (Value::EntitySet(a), Value::EntitySet(b)) => a.ptr_eq(b),
            (Value::Lazy(a), Value::Lazy(b)) => a.ptr_eq(b),
            (Value::Group(a), Value::Group(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Hashable scalar used to build identity keys.
///
/// Integers of every width collapse into `Int` so that a key read as
/// `int16` matches the same key read as `int64`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
    Bytes(Vec<u8>),
}

/// Serializes a value for diagnostics.
///
/// Deferred associations that have not been loaded serialize as null.
/// Sequences are enumerated. Cyclic object graphs are not detected.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Object(obj) => serialize_instance(&obj.borrow(), serializer),
            Value::Record(rec) => serialize_instance(rec, serializer),
            Value::Sequence(seq) => {
                let items = seq.to_vec().map_err(S::Error::custom)?;
                serialize_items(&items, serializer)
            }
            Value::List(items) | Value::Array(items) => serialize_items(items, serializer),
            Value::EntitySet(set) => match set.loaded_items() {
                Some(items) => serialize_items(&items, serializer),
                None => serializer.serialize_none(),
            },
            Value::Lazy(lazy) => match lazy.loaded_value() {
                Some(value) => value.serialize(serializer),
                None => serializer.serialize_none(),
            },
            Value::Group(group) => {
                let items = group.items().to_vec().map_err(S::Error::custom)?;
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("key", group.key())?;
                map.serialize_entry("items", &items)?;
                map.end()
            }
            Value::Type(ty) => serializer.serialize_str(&ty.to_string()),
        }
    }
}

fn serialize_instance<S: Serializer>(instance: &Instance, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(instance.fields.len()))?;
    for (name, value) in &instance.fields {
        map.serialize_entry(name.as_ref(), value)?;
    }
    map.end()
}

fn serialize_items<S: Serializer>(items: &[Value], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(items.len()))?;
    for item in items {
        seq.serialize_element(item)?;
    }
    seq.end()
}
