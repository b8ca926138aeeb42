//! Lazy sequences and association handles.
//!
//! A `Sequence` pulls from its source at most once per element and keeps
//! what it pulled, so it can be enumerated again from the start.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::coerce::SingletonPolicy;
use crate::error::{CoerceError, SequenceCount};
use crate::ty::Ty;
use crate::value::Value;

type Pending = Box<dyn Iterator<Item = Result<Value, CoerceError>>>;

enum Source {
    Done,
    Iter(Pending),
    /// Not yet produced; the thunk runs on first pull.
    Deferred(Box<dyn FnOnce() -> Sequence>),
}

struct SeqState {
    items: Vec<Value>,
    source: Source,
}

/// Single-pass source, restartable over its buffer.
#[derive(Clone)]
pub struct Sequence(Rc<RefCell<SeqState>>);

impl Sequence {
    fn with_source(items: Vec<Value>, source: Source) -> Self {
        Self(Rc::new(RefCell::new(SeqState { items, source })))
    }

    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Fully loaded sequence.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self::with_source(items, Source::Done)
    }

    /// Lazily pulls from `iter`.
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        Self::from_fallible(iter.into_iter().map(Ok))
    }

    /// Lazily pulls from a fallible iterator.
    pub fn from_fallible<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<Value, CoerceError>> + 'static,
    {
        Self::with_source(Vec::new(), Source::Iter(Box::new(iter)))
    }

    /// Runs `produce` on first access and enumerates its result.
    pub fn deferred(produce: impl FnOnce() -> Sequence + 'static) -> Self {
        Self::with_source(Vec::new(), Source::Deferred(Box::new(produce)))
    }

    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the source has been drained (or never existed).
    pub fn is_loaded(&self) -> bool {
        matches!(self.0.borrow().source, Source::Done)
    }

    /// Number of elements pulled so far.
    pub fn buffered_len(&self) -> usize {
        self.0.borrow().items.len()
    }

    /// Pulls one element into the buffer. Returns false once drained.
    ///
    /// No borrow is held while the source runs, so sources may enumerate
    /// other sequences freely.
    fn pull(&self) -> Result<bool, CoerceError> {
        loop {
            let source = std::mem::replace(&mut self.0.borrow_mut().source, Source::Done);
            match source {
                Source::Done => return Ok(false),
                Source::Deferred(produce) => {
                    let inner = produce();
                    self.0.borrow_mut().source = Source::Iter(Box::new(inner.iter()));
                }
                Source::Iter(mut iter) => {
                    let next = iter.next();
                    let mut state = self.0.borrow_mut();
                    return match next {
                        Some(Ok(value)) => {
                            state.items.push(value);
                            state.source = Source::Iter(iter);
                            Ok(true)
                        }
                        Some(Err(err)) => {
                            state.source = Source::Iter(iter);
                            Err(err)
                        }
                        None => Ok(false),
                    };
                }
            }
        }
    }

    /// Element at `index`, pulling as needed.
    pub fn get(&self, index: usize) -> Result<Option<Value>, CoerceError> {
        loop {
            if let Some(value) = self.0.borrow().items.get(index) {
                return Ok(Some(value.clone()));
            }
            if !self.pull()? {
                return Ok(None);
            }
        }
    }

    /// Enumerates from the first element.
    pub fn iter(&self) -> SeqIter {
        SeqIter {
            seq: self.clone(),
            index: 0,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<Value>, CoerceError> {
        self.iter().collect()
    }

    /// Lazy projection.
    pub fn map<F>(&self, f: F) -> Sequence
    where
        F: Fn(Value) -> Result<Value, CoerceError> + 'static,
    {
        Sequence::from_fallible(self.iter().map(move |item| item.and_then(&f)))
    }

    /// Reduces the sequence to one element according to `policy`.
    ///
    /// Never pulls more than two elements.
    pub fn single(&self, element: &Ty, policy: SingletonPolicy) -> Result<Value, CoerceError> {
        let Some(first) = self.get(0)? else {
            return match policy {
                SingletonPolicy::SingleOrDefault => Ok(element.default_value()),
                SingletonPolicy::Single => Err(CoerceError::Cardinality {
                    element: element.clone(),
                    found: SequenceCount::Empty,
                }),
            };
        };
        if self.get(1)?.is_some() {
            return Err(CoerceError::Cardinality {
                element: element.clone(),
                found: SequenceCount::Many,
            });
        }
        Ok(first)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("Sequence")
            .field("buffered", &state.items.len())
            .field("loaded", &matches!(state.source, Source::Done))
            .finish()
    }
}

/// Iterator over a `Sequence`, starting at its first element.
pub struct SeqIter {
    seq: Sequence,
    index: usize,
}

impl Iterator for SeqIter {
    type Item = Result<Value, CoerceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.seq.get(self.index) {
            Ok(Some(value)) => {
                self.index += 1;
                Some(Ok(value))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

enum LazyState {
    Loaded(Value),
    Deferred {
        source: Sequence,
        element: Ty,
        policy: SingletonPolicy,
    },
}

/// Single-valued association, optionally resolved on first access.
#[derive(Clone)]
pub struct LazyRef(Rc<RefCell<LazyState>>);

impl LazyRef {
    pub fn loaded(value: Value) -> Self {
        Self(Rc::new(RefCell::new(LazyState::Loaded(value))))
    }

    pub fn deferred(source: Sequence, element: Ty, policy: SingletonPolicy) -> Self {
        Self(Rc::new(RefCell::new(LazyState::Deferred {
            source,
            element,
            policy,
        })))
    }

    pub fn ptr_eq(&self, other: &LazyRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.0.borrow(), LazyState::Loaded(_))
    }

    pub fn loaded_value(&self) -> Option<Value> {
        match &*self.0.borrow() {
            LazyState::Loaded(value) => Some(value.clone()),
            LazyState::Deferred { .. } => None,
        }
    }

    /// Resolves the reference, loading it if needed.
    pub fn value(&self) -> Result<Value, CoerceError> {
        let (source, element, policy) = match &*self.0.borrow() {
            LazyState::Loaded(value) => return Ok(value.clone()),
            LazyState::Deferred {
                source,
                element,
                policy,
            } => (source.clone(), element.clone(), *policy),
        };
        let value = source.single(&element, policy)?;
        *self.0.borrow_mut() = LazyState::Loaded(value.clone());
        Ok(value)
    }
}

impl fmt::Debug for LazyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.borrow() {
            LazyState::Loaded(value) => f.debug_tuple("Lazy").field(value).finish(),
            LazyState::Deferred { element, .. } => write!(f, "Lazy(<deferred {element}>)"),
        }
    }
}

struct SetState {
    items: Vec<Value>,
    source: Option<Sequence>,
}

/// Collection-valued association.
///
/// Either holds assigned items or a deferred source that is loaded on
/// first enumeration.
#[derive(Clone)]
pub struct EntitySet(Rc<RefCell<SetState>>);

impl EntitySet {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SetState {
            items: Vec::new(),
            source: None,
        })))
    }

    pub fn ptr_eq(&self, other: &EntitySet) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Installs a deferred source, discarding assigned items.
    pub fn set_source(&self, source: Sequence) {
        let mut state = self.0.borrow_mut();
        state.items.clear();
        state.source = Some(source);
    }

    /// Replaces the contents with the elements of `items`.
    pub fn assign(&self, items: &Sequence) -> Result<(), CoerceError> {
        let loaded = items.to_vec()?;
        let mut state = self.0.borrow_mut();
        state.items = loaded;
        state.source = None;
        Ok(())
    }

    pub fn is_deferred(&self) -> bool {
        self.0.borrow().source.is_some()
    }

    /// Items, if nothing remains to load.
    pub fn loaded_items(&self) -> Option<Vec<Value>> {
        let state = self.0.borrow();
        match state.source {
            Some(_) => None,
            None => Some(state.items.clone()),
        }
    }

    /// Loads the deferred source if present and returns the items.
    pub fn load(&self) -> Result<Vec<Value>, CoerceError> {
        let source = self.0.borrow_mut().source.take();
        if let Some(source) = source {
            let items = source.to_vec()?;
            self.0.borrow_mut().items = items;
        }
        Ok(self.0.borrow().items.clone())
    }

    /// View as a sequence without forcing a deferred source.
    pub fn as_sequence(&self) -> Sequence {
        let state = self.0.borrow();
        match &state.source {
            Some(source) => source.clone(),
            None => Sequence::from_vec(state.items.clone()),
        }
    }
}

impl Default for EntitySet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        match state.source {
            Some(_) => f.write_str("EntitySet(<deferred>)"),
            None => f.debug_tuple("EntitySet").field(&state.items).finish(),
        }
    }
}

/// Grouping result: a key and the elements sharing it.
#[derive(Clone, Debug)]
pub struct Group {
    key: Box<Value>,
    items: Sequence,
}

impl Group {
    pub fn new(key: Value, items: Sequence) -> Self {
        Self {
            key: Box::new(key),
            items,
        }
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn items(&self) -> &Sequence {
        &self.items
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.items.ptr_eq(&other.items)
    }
}
