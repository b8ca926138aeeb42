//! Mapping metadata: types, members, methods and load options.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use materia_core::{ClassType, Ty, Value};

use crate::plan::Literal;

pub type MetaTypeRef = Arc<MetaType>;
pub type MetaMemberRef = Arc<MetaMember>;
pub type MethodRef = Arc<Method>;

/// How a member is read and written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberAccess {
    Field,
    Property { writable: bool },
}

/// Cardinality of an association member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Association {
    One,
    Many,
}

/// Identity of a member: declaring type plus name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId {
    pub declaring: Arc<str>,
    pub name: Arc<str>,
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring, self.name)
    }
}

#[derive(Debug)]
pub struct MetaMember {
    id: MemberId,
    ty: Ty,
    ordinal: u32,
    primary_key: bool,
    deferred: bool,
    access: MemberAccess,
    association: Option<Association>,
}

impl MetaMember {
    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.id.name
    }

    pub fn declaring_type(&self) -> &str {
        &self.id.declaring
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    /// Declared position; assignments run in this order.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn access(&self) -> MemberAccess {
        self.access
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self.access, MemberAccess::Property { writable: false })
    }

    pub fn association(&self) -> Option<Association> {
        self.association
    }

    /// Element type of the associated entity.
    pub fn association_element(&self) -> &Ty {
        match &self.ty {
            Ty::Lazy(inner) => inner,
            other => other.element_type(),
        }
    }
}

/// One inheritance-code mapping of a discriminated hierarchy.
#[derive(Clone, Debug)]
pub struct InheritanceCase {
    pub code: Literal,
    pub ty: Ty,
    pub is_default: bool,
}

/// Mapping of a class: its members, constructor and inheritance codes.
#[derive(Debug)]
pub struct MetaType {
    class: ClassType,
    entity: bool,
    members: Vec<MetaMemberRef>,
    constructor: Option<Vec<Arc<str>>>,
    inheritance: Vec<InheritanceCase>,
}

impl MetaType {
    pub fn builder(class: &ClassType) -> MetaTypeBuilder {
        MetaTypeBuilder::new(class)
    }

    pub fn name(&self) -> &str {
        self.class.name()
    }

    pub fn class(&self) -> &ClassType {
        &self.class
    }

    pub fn ty(&self) -> Ty {
        Ty::Class(self.class.clone())
    }

    /// Whether instances participate in identity mapping.
    pub fn is_entity(&self) -> bool {
        self.entity
    }

    pub fn members(&self) -> &[MetaMemberRef] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MetaMemberRef> {
        self.members.iter().find(|m| m.name().as_ref() == name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &MetaMemberRef> {
        self.members.iter().filter(|m| m.is_primary_key())
    }

    /// Constructor parameters, each naming the member it initializes.
    pub fn constructor(&self) -> Option<&[Arc<str>]> {
        self.constructor.as_deref()
    }

    pub fn inheritance(&self) -> &[InheritanceCase] {
        &self.inheritance
    }
}

/// Builder for `MetaType`. Members get ordinals in declaration order.
pub struct MetaTypeBuilder {
    class: ClassType,
    entity: bool,
    members: Vec<MetaMember>,
    constructor: Option<Vec<Arc<str>>>,
    inheritance: Vec<InheritanceCase>,
}

impl MetaTypeBuilder {
    pub fn new(class: &ClassType) -> Self {
        Self {
            class: class.clone(),
            entity: false,
            members: Vec::new(),
            constructor: None,
            inheritance: Vec::new(),
        }
    }

    /// Mark the type as an identity-mapped entity.
    pub fn entity(mut self) -> Self {
        self.entity = true;
        self
    }

    fn push(
        mut self,
        name: &str,
        ty: Ty,
        access: MemberAccess,
        configure: impl FnOnce(&mut MetaMember),
    ) -> Self {
        let mut member = MetaMember {
            id: MemberId {
                declaring: Arc::from(self.class.name()),
                name: Arc::from(name),
            },
            ty,
            ordinal: self.members.len() as u32,
            primary_key: false,
            deferred: false,
            access,
            association: None,
        };
        configure(&mut member);
        self.members.push(member);
        self
    }

    /// Primary-key field.
    pub fn key(self, name: &str, ty: Ty) -> Self {
        self.push(name, ty, MemberAccess::Field, |m| m.primary_key = true)
    }

    pub fn field(self, name: &str, ty: Ty) -> Self {
        self.push(name, ty, MemberAccess::Field, |_| {})
    }

    pub fn property(self, name: &str, ty: Ty, writable: bool) -> Self {
        self.push(name, ty, MemberAccess::Property { writable }, |_| {})
    }

    /// Association member; `deferred` allows lazy loading.
    pub fn association(self, name: &str, ty: Ty, kind: Association, deferred: bool) -> Self {
        self.push(name, ty, MemberAccess::Field, |m| {
            m.association = Some(kind);
            m.deferred = deferred;
        })
    }

    /// Constructor taking the named members as parameters, in order.
    pub fn constructor(mut self, params: &[&str]) -> Self {
        self.constructor = Some(params.iter().map(|p| Arc::from(*p)).collect());
        self
    }

    pub fn inheritance_code(mut self, code: Literal, ty: Ty, is_default: bool) -> Self {
        self.inheritance.push(InheritanceCase {
            code,
            ty,
            is_default,
        });
        self
    }

    pub fn build(self) -> MetaTypeRef {
        Arc::new(MetaType {
            class: self.class,
            entity: self.entity,
            members: self.members.into_iter().map(Arc::new).collect(),
            constructor: self.constructor,
            inheritance: self.inheritance,
        })
    }
}

pub type MethodBody = dyn Fn(Option<&Value>, &[Value]) -> Result<Value, String> + Send + Sync;

/// A callable used by `MethodCall` plan nodes.
pub struct Method {
    declaring: Arc<str>,
    name: Arc<str>,
    params: Vec<Ty>,
    returns: Ty,
    deterministic: bool,
    body: Arc<MethodBody>,
}

impl Method {
    pub fn new<F>(declaring: &str, name: &str, params: Vec<Ty>, returns: Ty, body: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            declaring: Arc::from(declaring),
            name: Arc::from(name),
            params,
            returns,
            deterministic: true,
            body: Arc::new(body),
        }
    }

    /// Mark the method as non-deterministic; plans calling it are never cached.
    pub fn nondeterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring
    }

    pub fn params(&self) -> &[Ty] {
        &self.params
    }

    pub fn returns(&self) -> &Ty {
        &self.returns
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Same declaring type, name and signature.
    pub fn same_identity(&self, other: &Method) -> bool {
        self.declaring == other.declaring
            && self.name == other.name
            && self.params == other.params
            && self.returns == other.returns
    }

    pub fn invoke(&self, receiver: Option<&Value>, args: &[Value]) -> Result<Value, String> {
        (self.body)(receiver, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring, self.name)
    }
}

/// Members requested for eager loading; part of the cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LoadOptions {
    preloaded: BTreeSet<MemberId>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request eager loading of `member`.
    pub fn preload(mut self, member: &MetaMember) -> Self {
        self.preloaded.insert(member.id().clone());
        self
    }

    pub fn is_preloaded(&self, member: &MetaMember) -> bool {
        self.preloaded.contains(member.id())
    }

    pub fn is_empty(&self) -> bool {
        self.preloaded.is_empty()
    }
}

/// Opaque identity of the mapping source; part of the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MappingIdentity(Arc<str>);

impl MappingIdentity {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl Default for MappingIdentity {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Opaque identity of the cursor implementation; part of the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceShape(Arc<str>);

impl SourceShape {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl Default for SourceShape {
    fn default() -> Self {
        Self::new("default")
    }
}
