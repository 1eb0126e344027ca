//! Resolution Context
//!
//! The context is the capability object handed to a node's `get` and `set`
//! resolvers. It reads and writes other nodes through the owning store and,
//! while a `get` resolver runs, records every node read so the store can wire
//! dependency edges once the resolution commits.
//!
//! # Tracking
//!
//! Only reads made through the context during the current pass are tracked.
//! An async resolver that suspends cannot carry the context past its first
//! await, so reads made after resumption go through a [`NodeHandle`] and are
//! never recorded as edges of the pass that started them.

use std::fmt;
use std::future::Future;

use smallvec::SmallVec;

use super::action::Action;
use super::descriptor::{GraphNode, Resolved};
use super::store::{NodeHandle, Store};
use crate::error::GraphError;
use crate::graph::NodeId;

/// Teardown returned by a subscription setup.
pub struct Cleanup(Option<Box<dyn FnOnce() + Send>>);

impl Cleanup {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Some(Box::new(f)))
    }

    /// A setup with nothing to tear down.
    pub fn none() -> Self {
        Self(None)
    }

    pub(crate) fn run(self) {
        if let Some(f) = self.0 {
            f();
        }
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cleanup").field(&self.0.is_some()).finish()
    }
}

pub(crate) type Setup = Box<dyn FnOnce() -> Cleanup + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Running a `get` resolver: reads are tracked, subscriptions collected.
    Resolve,
    /// Running a `set` resolver: nothing is tracked.
    Write,
}

/// Context passed to `get` and `set` resolvers.
pub struct Context<'a, T> {
    store: &'a Store,
    node: GraphNode<T>,
    mode: Mode,
    previous: Option<T>,
    revalidation: bool,
    dependencies: SmallVec<[NodeId; 4]>,
    setups: Vec<Setup>,
}

impl<'a, T> Context<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn resolving(
        store: &'a Store,
        node: GraphNode<T>,
        previous: Option<T>,
        revalidation: bool,
    ) -> Self {
        Self {
            store,
            node,
            mode: Mode::Resolve,
            previous,
            revalidation,
            dependencies: SmallVec::new(),
            setups: Vec::new(),
        }
    }

    pub(crate) fn writing(store: &'a Store, node: GraphNode<T>, previous: Option<T>) -> Self {
        Self {
            store,
            node,
            mode: Mode::Write,
            previous,
            revalidation: false,
            dependencies: SmallVec::new(),
            setups: Vec::new(),
        }
    }

    /// Read another node, recording it as a dependency of this resolution.
    ///
    /// A failed dependency is returned as an error, so `?` propagates it.
    pub fn get<U>(&mut self, node: &GraphNode<U>) -> Resolved<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        if self.mode == Mode::Resolve && !self.dependencies.contains(&node.id()) {
            self.dependencies.push(node.id());
        }
        self.store.get_state(node)
    }

    /// Write another node, exactly as [`Store::update_state`] would.
    pub fn set<U>(&mut self, node: &GraphNode<U>, action: impl Into<Action<U>>) -> Result<(), GraphError>
    where
        U: Clone + Send + Sync + 'static,
    {
        self.store.update_state(node, action)
    }

    /// Commit a new value to the node this context belongs to.
    ///
    /// Called during a resolution, the write is applied once the resolution
    /// has committed.
    pub fn mutate_self(&mut self, action: impl Into<Action<T>>) -> Result<(), GraphError> {
        self.store.mutate_state(&self.node, action)
    }

    /// Register a setup that runs once the resolution commits.
    ///
    /// The returned [`Cleanup`] runs when the node is reset, when the store is
    /// disposed, and before the node resolves again. Subscriptions only apply
    /// to `get` resolvers; a `set` resolver registering one is ignored.
    pub fn subscription<F>(&mut self, setup: F)
    where
        F: FnOnce() -> Cleanup + Send + 'static,
    {
        if self.mode == Mode::Resolve {
            self.setups.push(Box::new(setup));
        } else {
            tracing::debug!(node = %self.node.id(), "ignoring subscription registered outside of get");
        }
    }

    /// A handle to this node that outlives the resolution, for timers and
    /// tasks that mutate the node later.
    pub fn handle(&self) -> NodeHandle<T> {
        NodeHandle::new(self.store.downgrade(), self.node.clone())
    }

    /// Drive a future on the store's executor.
    pub fn spawn<F>(&self, future: F) -> Result<(), GraphError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.store.spawn(future)
    }

    /// The node's last successful value, if any.
    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    /// Whether this resolution replaces a value the node already held.
    pub fn is_revalidation(&self) -> bool {
        self.revalidation
    }

    /// The node being resolved or written.
    pub fn node(&self) -> &GraphNode<T> {
        &self.node
    }

    pub fn store(&self) -> &'a Store {
        self.store
    }

    /// Nodes read so far in this pass.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub(crate) fn finish(self) -> (SmallVec<[NodeId; 4]>, Vec<Setup>) {
        (self.dependencies, self.setups)
    }
}

impl<T> fmt::Debug for Context<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("node", &self.node.id())
            .field("mode", &self.mode)
            .field("revalidation", &self.revalidation)
            .field("dependencies", &self.dependencies)
            .field("setups", &self.setups.len())
            .finish()
    }
}
