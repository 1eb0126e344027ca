//! Graph Nodes
//!
//! This module defines the per-store state that lives behind every node
//! descriptor. Descriptors are shared and immutable; everything that changes
//! (value, status, edges, listeners, cleanups) lives here, owned by exactly
//! one store.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::reactive::{Cleanup, ErasedNode, ListenerSet};

/// Unique identifier for a node descriptor.
///
/// Identifiers are process-wide, so the same descriptor addresses its state
/// in every store it is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a node inside one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Never resolved, or reset since the last resolution.
    Uninitialized,

    /// The `get` resolver is running right now.
    Resolving,

    /// The cached value is a success.
    Resolved,

    /// The cached value is a failure.
    Failed,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// The node might need to recompute. One of its transitive dependencies
    /// changed, but none of its direct dependencies has been seen to change.
    MaybeDirty,

    /// The node definitely needs to recompute. A direct dependency changed.
    Dirty,
}

/// Type-erased cached value. Always holds a `Result<T, GraphError>` for the
/// node's `T`.
pub(crate) type StoredValue = Arc<dyn Any + Send + Sync>;

/// Per-store state of one node.
pub(crate) struct NodeState {
    /// The descriptor this state belongs to.
    def: Arc<dyn ErasedNode>,

    pub(crate) value: Option<StoredValue>,

    pub(crate) status: NodeStatus,

    pub(crate) dirty: DirtyState,

    /// Nodes read during the last resolution, in read order.
    dependencies: SmallVec<[NodeId; 4]>,

    /// Nodes whose last resolution read this node.
    dependents: IndexSet<NodeId>,

    pub(crate) listeners: ListenerSet,

    /// Teardown functions returned by subscription setups.
    pub(crate) cleanups: Vec<Cleanup>,

    /// Set when a recomputation produced a different value and listeners
    /// have not been told yet.
    pub(crate) pending_notify: bool,
}

impl NodeState {
    pub(crate) fn new(def: Arc<dyn ErasedNode>) -> Self {
        Self {
            def,
            value: None,
            status: NodeStatus::Uninitialized,
            dirty: DirtyState::Clean,
            dependencies: SmallVec::new(),
            dependents: IndexSet::new(),
            listeners: ListenerSet::default(),
            cleanups: Vec::new(),
            pending_notify: false,
        }
    }

    pub(crate) fn def(&self) -> &Arc<dyn ErasedNode> {
        &self.def
    }

    /// Whether the node holds a value (success or failure).
    pub(crate) fn is_settled(&self) -> bool {
        matches!(self.status, NodeStatus::Resolved | NodeStatus::Failed)
    }

    /// Mark the node as maybe dirty (a transitive dependency changed).
    pub(crate) fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    /// Mark the node as definitely dirty (needs recomputation).
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub(crate) fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub(crate) fn set_dependencies(&mut self, dependencies: SmallVec<[NodeId; 4]>) {
        self.dependencies = dependencies;
    }

    pub(crate) fn add_dependency(&mut self, node_id: NodeId) {
        if !self.dependencies.contains(&node_id) {
            self.dependencies.push(node_id);
        }
    }

    pub(crate) fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    pub(crate) fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub(crate) fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("id", &self.def.id())
            .field("status", &self.status)
            .field("dirty", &self.dirty)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("listeners", &self.listeners.len())
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}
