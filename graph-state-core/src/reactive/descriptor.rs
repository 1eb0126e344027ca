//! Node descriptors.
//!
//! A [`GraphNode`] is the immutable definition of one piece of state: an
//! identity, a `get` resolver and an optional `set` resolver. Descriptors
//! carry no per-store state, so the same descriptor can be read by any number
//! of stores at once.
//!
//! # Write capability
//!
//! - A node with a `set` resolver translates writes through it.
//! - A constant node without `set` is a writable atom: writes are committed
//!   directly.
//! - A derived node without `set` is read-only. Writing to it is reported as
//!   [`GraphError::ReadOnly`].
//!
//! # Equality
//!
//! Change detection uses the descriptor's equality rule, `PartialEq` unless
//! overridden with [`NodeBuilder::equality`]. Values that should compare by
//! reference identity can be wrapped in [`Identity`].

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use smallvec::SmallVec;

use super::context::{Context, Setup};
use super::store::Store;
use crate::error::GraphError;
use crate::graph::{NodeId, StoredValue};

/// The value a node resolves to: a success or the failure that was cached in
/// its place.
pub type Resolved<T> = Result<T, GraphError>;

type GetFn<T> = dyn Fn(&mut Context<'_, T>) -> Resolved<T> + Send + Sync;
type SetFn<T> = dyn Fn(&mut Context<'_, T>, T) -> Result<(), GraphError> + Send + Sync;

/// The `get` resolver of a node.
pub enum Getter<T> {
    /// A literal value.
    Constant(T),

    /// A function of the resolution context.
    Derive(Arc<GetFn<T>>),
}

impl<T> Clone for Getter<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Constant(value) => Self::Constant(value.clone()),
            Self::Derive(f) => Self::Derive(Arc::clone(f)),
        }
    }
}

struct NodeDef<T> {
    id: NodeId,
    key: Option<Arc<str>>,
    label: Option<Arc<str>>,
    get: Getter<T>,
    set: Option<Arc<SetFn<T>>>,
    equals: fn(&T, &T) -> bool,
}

/// Immutable descriptor of a node in the graph.
///
/// Cloning is cheap and yields the same node.
pub struct GraphNode<T> {
    inner: Arc<NodeDef<T>>,
}

impl<T> GraphNode<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// A writable node holding a literal value.
    pub fn constant(value: T) -> Self {
        NodeBuilder::constant(value).build()
    }

    /// A read-only node computed from other nodes.
    pub fn derived<F>(get: F) -> Self
    where
        F: Fn(&mut Context<'_, T>) -> Resolved<T> + Send + Sync + 'static,
    {
        NodeBuilder::derived(get).build()
    }
}

impl<T> GraphNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the node's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Cache key, set for stale-while-revalidate nodes.
    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    /// Debug name used in log events.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Whether `update_state` is allowed on this node.
    pub fn is_writable(&self) -> bool {
        self.inner.set.is_some() || matches!(self.inner.get, Getter::Constant(_))
    }

    pub(crate) fn setter(&self) -> Option<&Arc<SetFn<T>>> {
        self.inner.set.as_ref()
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedNode> {
        Arc::clone(&self.inner) as Arc<dyn ErasedNode>
    }
}

impl<T> Clone for GraphNode<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for GraphNode<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for GraphNode<T> {}

impl<T> fmt::Debug for GraphNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("key", &self.inner.key)
            .field("writable", &(self.inner.set.is_some() || matches!(self.inner.get, Getter::Constant(_))))
            .finish()
    }
}

/// Builder for node descriptors.
///
/// ```rust,ignore
/// let fahrenheit = GraphNode::constant(32.0);
///
/// let celsius = NodeBuilder::derived({
///     let fahrenheit = fahrenheit.clone();
///     move |ctx| Ok((ctx.get(&fahrenheit)? - 32.0) * 5.0 / 9.0)
/// })
/// .set({
///     let fahrenheit = fahrenheit.clone();
///     move |ctx, celsius| ctx.set(&fahrenheit, celsius * 9.0 / 5.0 + 32.0)
/// })
/// .label("celsius")
/// .build();
/// ```
pub struct NodeBuilder<T> {
    get: Getter<T>,
    set: Option<Arc<SetFn<T>>>,
    key: Option<Arc<str>>,
    label: Option<Arc<str>>,
    equals: fn(&T, &T) -> bool,
}

impl<T> NodeBuilder<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn constant(value: T) -> Self {
        Self::with_getter(Getter::Constant(value))
    }

    pub fn derived<F>(get: F) -> Self
    where
        F: Fn(&mut Context<'_, T>) -> Resolved<T> + Send + Sync + 'static,
    {
        Self::with_getter(Getter::Derive(Arc::new(get)))
    }

    fn with_getter(get: Getter<T>) -> Self {
        Self {
            get,
            set: None,
            key: None,
            label: None,
            equals: T::eq,
        }
    }
}

impl<T> NodeBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start from a getter for a type without `PartialEq`. An equality rule
    /// must be supplied.
    pub fn with_equality(get: Getter<T>, equals: fn(&T, &T) -> bool) -> Self {
        Self {
            get,
            set: None,
            key: None,
            label: None,
            equals,
        }
    }

    /// Translate writes on this node into writes on other nodes.
    pub fn set<F>(mut self, set: F) -> Self
    where
        F: Fn(&mut Context<'_, T>, T) -> Result<(), GraphError> + Send + Sync + 'static,
    {
        self.set = Some(Arc::new(set));
        self
    }

    pub fn key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Override the equality rule used for change detection.
    pub fn equality(mut self, equals: fn(&T, &T) -> bool) -> Self {
        self.equals = equals;
        self
    }

    pub fn build(self) -> GraphNode<T> {
        GraphNode {
            inner: Arc::new(NodeDef {
                id: NodeId::new(),
                key: self.key,
                label: self.label,
                get: self.get,
                set: self.set,
                equals: self.equals,
            }),
        }
    }
}

/// Wrapper that compares by reference identity instead of by value.
///
/// Cloning shares the allocation, so a clone is equal to its original while
/// two separately built values never are, whatever their contents.
pub struct Identity<T>(Arc<T>);

impl<T> Identity<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl<T> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for Identity<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for Identity<T> {}

impl<T> Deref for Identity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity").field(&self.0).finish()
    }
}

/// Result of running a `get` resolver once.
pub(crate) struct Resolution {
    pub(crate) value: StoredValue,
    pub(crate) ok: bool,
    pub(crate) dependencies: SmallVec<[NodeId; 4]>,
    pub(crate) setups: Vec<Setup>,
}

/// Type-erased view of a descriptor, stored alongside the node's state so
/// the store can recompute and compare without knowing `T`.
pub(crate) trait ErasedNode: Send + Sync {
    fn id(&self) -> NodeId;

    fn label(&self) -> Option<&str>;

    /// Run the `get` resolver against `store`.
    fn resolve(self: Arc<Self>, store: &Store, revalidation: bool) -> Resolution;

    /// Compare two stored values with the descriptor's equality rule.
    fn same(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool;
}

impl<T> ErasedNode for NodeDef<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn resolve(self: Arc<Self>, store: &Store, revalidation: bool) -> Resolution {
        let node = GraphNode { inner: self };

        let (result, dependencies, setups) = match &node.inner.get {
            Getter::Constant(value) => (Ok(value.clone()), SmallVec::new(), Vec::new()),
            Getter::Derive(get) => {
                let get = Arc::clone(get);
                let previous = store.previous_value(&node);
                let mut ctx = Context::resolving(store, node.clone(), previous, revalidation);
                let result = get(&mut ctx);
                let (dependencies, setups) = ctx.finish();
                (result, dependencies, setups)
            }
        };

        Resolution {
            ok: result.is_ok(),
            value: Arc::new(result),
            dependencies,
            setups,
        }
    }

    fn same(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        let (Some(a), Some(b)) = (
            a.downcast_ref::<Resolved<T>>(),
            b.downcast_ref::<Resolved<T>>(),
        ) else {
            return false;
        };

        match (a, b) {
            (Ok(a), Ok(b)) => (self.equals)(a, b),
            (Err(a), Err(b)) => a.is_same(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_have_unique_ids() {
        let a = GraphNode::constant(1);
        let b = GraphNode::constant(1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
    }

    #[test]
    fn write_capability_follows_getter_and_setter() {
        let atom = GraphNode::constant(1);
        let derived = GraphNode::<i32>::derived(|_| Ok(1));
        let two_way = NodeBuilder::<i32>::derived(|_| Ok(1))
            .set(|_, _| Ok(()))
            .build();

        assert!(atom.is_writable());
        assert!(!derived.is_writable());
        assert!(two_way.is_writable());
    }

    #[test]
    fn builder_sets_key_and_label() {
        let node = NodeBuilder::constant(0).key("users").label("user list").build();
        assert_eq!(node.key(), Some("users"));
        assert_eq!(node.label(), Some("user list"));
    }

    #[test]
    fn identity_compares_by_reference() {
        let a = Identity::new(vec![1, 2, 3]);
        let b = Identity::new(vec![1, 2, 3]);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn erased_same_uses_equality_rule() {
        let node = NodeBuilder::constant(10)
            .equality(|a: &i32, b: &i32| a / 10 == b / 10)
            .build();
        let erased = node.erased();

        let a: Resolved<i32> = Ok(11);
        let b: Resolved<i32> = Ok(19);
        let c: Resolved<i32> = Ok(21);

        assert!(erased.same(&a, &b));
        assert!(!erased.same(&a, &c));
    }
}
