//! Graph Store
//!
//! The store is the per-root container that maps node identity to live state.
//! It resolves nodes lazily, records dependency edges, commits writes and
//! fans out notifications.
//!
//! # How It Works
//!
//! 1. `get_state` settles the node: an uninitialized or dirty node runs its
//!    `get` resolver, a maybe-dirty node first settles its dependencies.
//!
//! 2. `update_state` normalizes the action, runs the `set` resolver or
//!    commits the value, and if the value changed:
//!    a. marks direct dependents dirty and everything downstream maybe dirty
//!    b. notifies the written node's listeners
//!    c. settles every marked node in topological order, notifying each one
//!       whose value changed
//!
//! # Turns
//!
//! Every operation runs inside a turn: a re-entrant lock that serializes
//! threads, plus a depth counter. Writes issued while a turn is already
//! running on this thread (from resolvers, setters, listeners or cleanups)
//! are queued and drained in order once the outermost turn ends, so a
//! notification pass is never interleaved with another write.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use super::action::Action;
use super::context::Context;
use super::descriptor::{ErasedNode, GraphNode, Resolved};
use super::listener::Listener;
use crate::config::StoreConfig;
use crate::error::GraphError;
use crate::graph::{DirtyState, NodeId, NodeStatus, StoredValue, UpdateScheduler};
use crate::resource::{Spawn, SwrCache, TokioSpawner};

type Deferred = Box<dyn FnOnce(&Store) -> Result<(), GraphError> + Send>;

struct Inner {
    graph: UpdateScheduler,
    depth: usize,
    draining: bool,
    queue: VecDeque<Deferred>,
    /// Possibly stale nodes whose dependencies are being walked.
    settling: HashSet<NodeId>,
    disposed: bool,
}

struct Shared {
    turn: ReentrantMutex<()>,
    inner: Mutex<Inner>,
    swr: SwrCache,
    spawner: Arc<dyn Spawn>,
    config: StoreConfig,
}

impl Drop for Shared {
    fn drop(&mut self) {
        for state in self.inner.get_mut().graph.drain() {
            for cleanup in state.cleanups {
                cleanup.run();
            }
        }
    }
}

/// A graph store.
///
/// Cloning is cheap and yields a handle to the same store. Stores are fully
/// independent of each other; node descriptors can be shared between them.
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

/// Non-owning reference to a store, held by tasks and timers so they do not
/// keep a disposed store alive.
#[derive(Clone)]
pub struct WeakStore {
    shared: Weak<Shared>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.shared.upgrade().map(|shared| Store { shared })
    }
}

impl fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder {
    config: StoreConfig,
    spawner: Option<Arc<dyn Spawn>>,
}

impl StoreBuilder {
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Executor used for pending computations. Defaults to the ambient tokio
    /// runtime.
    pub fn spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn build(self) -> Store {
        Store {
            shared: Arc::new(Shared {
                turn: ReentrantMutex::new(()),
                inner: Mutex::new(Inner {
                    graph: UpdateScheduler::new(),
                    depth: 0,
                    draining: false,
                    queue: VecDeque::new(),
                    settling: HashSet::new(),
                    disposed: false,
                }),
                swr: SwrCache::new(),
                spawner: self
                    .spawner
                    .unwrap_or_else(|| Arc::new(TokioSpawner) as Arc<dyn Spawn>),
                config: self.config,
            }),
        }
    }
}

struct Turn<'a> {
    store: &'a Store,
    nested: bool,
    _lock: ReentrantMutexGuard<'a, ()>,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let drain = {
            let mut inner = self.store.shared.inner.lock();
            inner.depth -= 1;
            inner.depth == 0 && !inner.draining && !inner.queue.is_empty()
        };
        if drain {
            self.store.drain();
        }
    }
}

struct DrainGuard<'a>(&'a Store);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.shared.inner.lock().draining = false;
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder {
            config: StoreConfig::default(),
            spawner: None,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// The store's stale-while-revalidate cache.
    pub fn swr(&self) -> &SwrCache {
        &self.shared.swr
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Whether two handles point at the same store.
    pub fn same_store(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.inner.lock().disposed
    }

    /// Drive a future on the store's executor.
    pub fn spawn<F>(&self, future: F) -> Result<(), GraphError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shared.spawner.spawn(Box::pin(future))
    }

    // ------------------------------------------------------------------
    // Collaborator interface
    // ------------------------------------------------------------------

    /// Current value of a node, resolving it first if needed.
    ///
    /// The result is either the previously committed value or the fully
    /// resolved next one, never an intermediate state.
    pub fn get_state<T>(&self, node: &GraphNode<T>) -> Resolved<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let _turn = self.enter()?;
        self.settle(&node.erased())?;
        self.cached(node)
    }

    /// Write a node through its `set` resolver, or directly if it is a
    /// writable atom.
    ///
    /// Writes issued from inside a resolver or listener are applied after the
    /// current pass completes.
    pub fn update_state<T>(&self, node: &GraphNode<T>, action: impl Into<Action<T>>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !node.is_writable() {
            return Err(GraphError::ReadOnly { node: node.id() });
        }
        let node = node.clone();
        let action = action.into();
        self.write(Box::new(move |store| store.apply_update(&node, action)))
    }

    /// Register a change listener. Registering the same listener twice is a
    /// no-op.
    pub fn add_listener<T>(&self, node: &GraphNode<T>, listener: &Listener<T>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut inner = self.shared.inner.lock();
        if inner.disposed {
            return Err(GraphError::Disposed);
        }
        inner
            .graph
            .ensure(&node.erased())
            .listeners
            .insert(listener.id(), listener.erase());
        Ok(())
    }

    /// Remove a change listener. Removing an unknown listener is a no-op.
    pub fn remove_listener<T>(&self, node: &GraphNode<T>, listener: &Listener<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut inner = self.shared.inner.lock();
        if let Some(state) = inner.graph.get_mut(node.id()) {
            state.listeners.remove(listener.id());
        }
    }

    // ------------------------------------------------------------------
    // Additional operations
    // ------------------------------------------------------------------

    /// Commit a value to a node, bypassing its `set` resolver. This is the
    /// path taken by `mutate_self`.
    pub fn mutate_state<T>(&self, node: &GraphNode<T>, action: impl Into<Action<T>>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let node = node.clone();
        let action = action.into();
        self.write(Box::new(move |store| store.apply_mutate(&node, action)))
    }

    /// Return a node to `Uninitialized`, running its subscription cleanups.
    ///
    /// Dependents are marked dirty and re-read the node the next time they
    /// settle. Listeners are not notified; see [`Store::refresh_state`].
    pub fn reset_state<T>(&self, node: &GraphNode<T>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = node.id();
        self.write(Box::new(move |store| store.apply_reset(id)))
    }

    /// Reset a node, resolve it again and notify if the value changed.
    pub fn refresh_state<T>(&self, node: &GraphNode<T>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let def = node.erased();
        self.write(Box::new(move |store| store.apply_refresh(&def)))
    }

    /// Re-run a node's resolver while keeping its current value as the
    /// previous one, then propagate like a write.
    pub fn invalidate_state<T>(&self, node: &GraphNode<T>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let def = node.erased();
        self.write(Box::new(move |store| store.apply_invalidate(&def)))
    }

    /// Cached value of a node without resolving it.
    pub fn peek_state<T>(&self, node: &GraphNode<T>) -> Option<Resolved<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = self.stored(node.id())?;
        value.downcast_ref::<Resolved<T>>().cloned()
    }

    pub fn status<T>(&self, node: &GraphNode<T>) -> NodeStatus
    where
        T: Clone + Send + Sync + 'static,
    {
        self.shared
            .inner
            .lock()
            .graph
            .get(node.id())
            .map_or(NodeStatus::Uninitialized, |state| state.status)
    }

    /// Nodes read by the node's last resolution.
    pub fn dependencies<T>(&self, node: &GraphNode<T>) -> Vec<NodeId>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.shared
            .inner
            .lock()
            .graph
            .get(node.id())
            .map(|state| state.dependencies().to_vec())
            .unwrap_or_default()
    }

    /// Nodes whose last resolution read this node.
    pub fn dependents<T>(&self, node: &GraphNode<T>) -> Vec<NodeId>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.shared
            .inner
            .lock()
            .graph
            .get(node.id())
            .map(|state| state.dependents().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn listener_count<T>(&self, node: &GraphNode<T>) -> usize
    where
        T: Clone + Send + Sync + 'static,
    {
        self.shared
            .inner
            .lock()
            .graph
            .get(node.id())
            .map_or(0, |state| state.listeners.len())
    }

    /// Number of nodes with live state in this store.
    pub fn node_count(&self) -> usize {
        self.shared.inner.lock().graph.node_count()
    }

    /// Tear the store down: run every cleanup, drop every node and cache
    /// entry. Later operations fail with [`GraphError::Disposed`].
    pub fn dispose(&self) {
        let states = {
            let _turn = self.shared.turn.lock();
            let mut inner = self.shared.inner.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.queue.clear();
            inner.graph.drain()
        };
        self.shared.swr.clear();

        debug!(store = self.name(), nodes = states.len(), "disposing store");
        for mut state in states {
            state.listeners.clear();
            for cleanup in state.cleanups {
                cleanup.run();
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn name(&self) -> &str {
        self.shared.config.name.as_deref().unwrap_or("default")
    }

    fn enter(&self) -> Result<Turn<'_>, GraphError> {
        let lock = self.shared.turn.lock();
        let nested = {
            let mut inner = self.shared.inner.lock();
            if inner.disposed {
                return Err(GraphError::Disposed);
            }
            inner.depth += 1;
            inner.depth > 1
        };
        Ok(Turn {
            store: self,
            nested,
            _lock: lock,
        })
    }

    /// Run `f` inside a turn, so no other thread can touch the store until it
    /// returns. Writes made by `f` are applied when it returns.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce(&Store) -> R) -> Result<R, GraphError> {
        let _turn = self.enter()?;
        Ok(f(self))
    }

    fn write(&self, op: Deferred) -> Result<(), GraphError> {
        let turn = self.enter()?;
        if turn.nested {
            trace!(store = self.name(), "deferring write until the current pass completes");
            self.shared.inner.lock().queue.push_back(op);
            return Ok(());
        }
        op(self)
    }

    fn drain(&self) {
        self.shared.inner.lock().draining = true;
        let _guard = DrainGuard(self);
        let limit = self.shared.config.max_deferred_updates;
        let mut processed = 0usize;

        loop {
            let Some(op) = self.shared.inner.lock().queue.pop_front() else {
                break;
            };

            processed += 1;
            if processed > limit {
                let dropped = {
                    let mut inner = self.shared.inner.lock();
                    let dropped = inner.queue.len() + 1;
                    inner.queue.clear();
                    dropped
                };
                error!(store = self.name(), limit, dropped, "deferred write limit reached, dropping queued writes");
                break;
            }

            let result = match self.enter() {
                Ok(_turn) => op(self),
                Err(error) => Err(error),
            };
            if let Err(error) = result {
                warn!(store = self.name(), %error, "deferred write failed");
            }
        }
    }

    fn stored(&self, id: NodeId) -> Option<StoredValue> {
        self.shared
            .inner
            .lock()
            .graph
            .get(id)
            .and_then(|state| state.value.clone())
    }

    fn cached<T>(&self, node: &GraphNode<T>) -> Resolved<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = self.stored(node.id()).ok_or(GraphError::Disposed)?;
        value
            .downcast_ref::<Resolved<T>>()
            .cloned()
            .unwrap_or(Err(GraphError::TypeMismatch { node: node.id() }))
    }

    /// Last successful value, handed to resolvers as `previous`.
    pub(crate) fn previous_value<T>(&self, node: &GraphNode<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = self.stored(node.id())?;
        match value.downcast_ref::<Resolved<T>>() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    fn def_of(&self, id: NodeId) -> Option<Arc<dyn ErasedNode>> {
        self.shared
            .inner
            .lock()
            .graph
            .get(id)
            .map(|state| Arc::clone(state.def()))
    }

    /// Bring a node up to date.
    fn settle(&self, def: &Arc<dyn ErasedNode>) -> Result<(), GraphError> {
        let id = def.id();
        let (status, dirty, dependencies) = {
            let mut inner = self.shared.inner.lock();
            if inner.disposed {
                return Err(GraphError::Disposed);
            }
            let state = inner.graph.ensure(def);
            let dependencies: SmallVec<[NodeId; 4]> = state.dependencies().iter().copied().collect();
            (state.status, state.dirty, dependencies)
        };

        match status {
            NodeStatus::Uninitialized => return self.resolve(def),
            NodeStatus::Resolving => return Err(GraphError::Cycle { node: id }),
            NodeStatus::Resolved | NodeStatus::Failed => {}
        }

        match dirty {
            DirtyState::Clean => Ok(()),
            DirtyState::Dirty => self.resolve(def),
            DirtyState::MaybeDirty => {
                // A failed cycle keeps its edges, so walking them can lead
                // back here.
                if !self.shared.inner.lock().settling.insert(id) {
                    return Err(GraphError::Cycle { node: id });
                }
                let result = self.settle_dependencies(def, dependencies);
                self.shared.inner.lock().settling.remove(&id);
                result
            }
        }
    }

    fn settle_dependencies(
        &self,
        def: &Arc<dyn ErasedNode>,
        dependencies: SmallVec<[NodeId; 4]>,
    ) -> Result<(), GraphError> {
        let id = def.id();
        for dep_id in dependencies {
            if let Some(dep) = self.def_of(dep_id) {
                if let Err(error) = self.settle(&dep) {
                    trace!(node = %id, dependency = %dep_id, %error, "dependency failed to settle");
                }
            }
            if self.dirty_state(id) == Some(DirtyState::Dirty) {
                break;
            }
        }

        match self.dirty_state(id) {
            Some(DirtyState::Dirty) => self.resolve(def),
            Some(_) => {
                if let Some(state) = self.shared.inner.lock().graph.get_mut(id) {
                    state.dirty = DirtyState::Clean;
                }
                Ok(())
            }
            None => Err(GraphError::Disposed),
        }
    }

    fn dirty_state(&self, id: NodeId) -> Option<DirtyState> {
        self.shared.inner.lock().graph.get(id).map(|state| state.dirty)
    }

    /// Run a node's `get` resolver and commit the result.
    fn resolve(&self, def: &Arc<dyn ErasedNode>) -> Result<(), GraphError> {
        let id = def.id();
        let (cleanups, revalidation) = {
            let mut inner = self.shared.inner.lock();
            let state = inner.graph.ensure(def);
            if state.status == NodeStatus::Resolving {
                return Err(GraphError::Cycle { node: id });
            }
            state.status = NodeStatus::Resolving;
            (std::mem::take(&mut state.cleanups), state.value.is_some())
        };

        for cleanup in cleanups {
            cleanup.run();
        }

        trace!(node = %id, label = def.label(), revalidation, "resolving");
        let resolution = Arc::clone(def).resolve(self, revalidation);
        let ok = resolution.ok;

        let setups = {
            let mut inner = self.shared.inner.lock();
            let dependents: Vec<NodeId> = {
                let Some(state) = inner.graph.get_mut(id) else {
                    return Err(GraphError::Disposed);
                };
                let changed = state
                    .value
                    .as_ref()
                    .is_some_and(|previous| !def.same(previous.as_ref(), resolution.value.as_ref()));

                state.value = Some(resolution.value);
                state.status = if ok { NodeStatus::Resolved } else { NodeStatus::Failed };
                state.dirty = DirtyState::Clean;

                state.pending_notify = changed;
                if changed {
                    state.dependents().iter().copied().collect()
                } else {
                    Vec::new()
                }
            };

            if ok {
                inner.graph.replace_dependencies(id, resolution.dependencies);
            } else {
                inner.graph.extend_dependencies(id, &resolution.dependencies);
            }

            for dependent_id in dependents {
                if let Some(dependent) = inner.graph.get_mut(dependent_id) {
                    if dependent.is_settled() {
                        dependent.mark_dirty();
                    }
                }
            }

            resolution.setups
        };

        if !ok {
            debug!(node = %id, label = def.label(), "resolution failed, caching failure");
        }

        for setup in setups {
            let cleanup = setup();
            let mut inner = self.shared.inner.lock();
            match inner.graph.get_mut(id) {
                Some(state) => state.cleanups.push(cleanup),
                None => {
                    drop(inner);
                    cleanup.run();
                }
            }
        }

        Ok(())
    }

    fn apply_update<T>(&self, node: &GraphNode<T>, action: Action<T>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let next = action.apply_with(|| self.get_state(node))?;

        match node.setter() {
            Some(set) => {
                let set = Arc::clone(set);
                let previous = self.previous_value(node);
                let mut ctx = Context::writing(self, node.clone(), previous);
                set(&mut ctx, next)
            }
            None => self.commit(node, Ok(next)),
        }
    }

    fn apply_mutate<T>(&self, node: &GraphNode<T>, action: Action<T>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let next = action.apply_with(|| self.get_state(node))?;
        self.commit(node, Ok(next))
    }

    fn commit<T>(&self, node: &GraphNode<T>, value: Resolved<T>) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let def = node.erased();
        let id = node.id();
        // A node written before it was ever read still needs its edges and
        // subscriptions in place.
        if let Err(error) = self.settle(&def) {
            trace!(node = %id, %error, "node failed to settle before write");
        }

        let ok = value.is_ok();
        let value: StoredValue = Arc::new(value);
        {
            let mut inner = self.shared.inner.lock();
            let state = inner.graph.get_mut(id).ok_or(GraphError::Disposed)?;
            if let Some(current) = &state.value {
                if def.same(current.as_ref(), value.as_ref()) {
                    trace!(node = %id, "write is equal to the current value, skipping");
                    return Ok(());
                }
            }
            state.value = Some(value);
            state.status = if ok { NodeStatus::Resolved } else { NodeStatus::Failed };
            state.dirty = DirtyState::Clean;
        }

        debug!(node = %id, label = def.label(), "committed new value");
        self.propagate(id, true);
        Ok(())
    }

    fn apply_reset(&self, id: NodeId) -> Result<(), GraphError> {
        let cleanups = {
            let mut inner = self.shared.inner.lock();
            let cleanups = {
                let Some(state) = inner.graph.get_mut(id) else {
                    return Ok(());
                };
                state.status = NodeStatus::Uninitialized;
                state.value = None;
                state.dirty = DirtyState::Clean;
                state.pending_notify = false;
                std::mem::take(&mut state.cleanups)
            };
            inner.graph.replace_dependencies(id, SmallVec::new());
            inner.graph.mark_changed(id);
            cleanups
        };

        debug!(node = %id, cleanups = cleanups.len(), "reset node");
        for cleanup in cleanups {
            cleanup.run();
        }
        Ok(())
    }

    fn apply_refresh(&self, def: &Arc<dyn ErasedNode>) -> Result<(), GraphError> {
        let id = def.id();
        let before = self.stored(id);
        self.apply_reset(id)?;
        self.settle(def)?;

        let changed = match (before, self.stored(id)) {
            (Some(before), Some(after)) => !def.same(before.as_ref(), after.as_ref()),
            _ => true,
        };
        self.propagate(id, changed);
        Ok(())
    }

    fn apply_invalidate(&self, def: &Arc<dyn ErasedNode>) -> Result<(), GraphError> {
        let id = def.id();
        let settled = {
            let mut inner = self.shared.inner.lock();
            let state = inner.graph.ensure(def);
            state.pending_notify = false;
            if state.is_settled() {
                state.mark_dirty();
            }
            state.is_settled()
        };
        self.settle(def)?;
        if !settled {
            return Ok(());
        }

        let changed = self
            .shared
            .inner
            .lock()
            .graph
            .get_mut(id)
            .is_some_and(|state| std::mem::take(&mut state.pending_notify));
        self.propagate(id, changed);
        Ok(())
    }

    /// Notify a changed node, then settle and notify its dependents in
    /// topological order.
    fn propagate(&self, id: NodeId, notify_source: bool) {
        let affected = {
            let mut inner = self.shared.inner.lock();
            let affected = inner.graph.mark_changed(id);
            for node_id in &affected {
                if let Some(state) = inner.graph.get_mut(*node_id) {
                    state.pending_notify = false;
                }
            }
            affected
        };

        if notify_source {
            self.notify(id);
        }

        for node_id in affected {
            let Some(def) = self.def_of(node_id) else {
                continue;
            };
            if let Err(error) = self.settle(&def) {
                trace!(node = %node_id, %error, "dependent failed to settle");
            }

            let changed = self
                .shared
                .inner
                .lock()
                .graph
                .get_mut(node_id)
                .is_some_and(|state| std::mem::take(&mut state.pending_notify));
            if changed {
                self.notify(node_id);
            }
        }
    }

    fn notify(&self, id: NodeId) {
        let (listeners, value) = {
            let inner = self.shared.inner.lock();
            let Some(state) = inner.graph.get(id) else {
                return;
            };
            (state.listeners.snapshot(), state.value.clone())
        };
        let Some(value) = value else {
            return;
        };

        trace!(node = %id, listeners = listeners.len(), "notifying listeners");
        for listener in listeners {
            listener(value.as_ref());
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Store")
            .field("name", &self.shared.config.name)
            .field("nodes", &inner.graph.node_count())
            .field("queued", &inner.queue.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

/// A node bound to a store, usable after the resolution that produced it.
///
/// The handle holds the store weakly: once the store is dropped, writes
/// through the handle fail with [`GraphError::Disposed`].
pub struct NodeHandle<T> {
    store: WeakStore,
    node: GraphNode<T>,
}

impl<T> NodeHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(store: WeakStore, node: GraphNode<T>) -> Self {
        Self { store, node }
    }

    pub fn node(&self) -> &GraphNode<T> {
        &self.node
    }

    pub fn store(&self) -> Option<Store> {
        self.store.upgrade()
    }

    /// Read the node's current value.
    pub fn get(&self) -> Resolved<T> {
        self.store()
            .ok_or(GraphError::Disposed)?
            .get_state(&self.node)
    }

    /// Commit a new value to the node, bypassing its `set` resolver.
    pub fn mutate(&self, action: impl Into<Action<T>>) -> Result<(), GraphError> {
        self.store()
            .ok_or(GraphError::Disposed)?
            .mutate_state(&self.node, action)
    }
}

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            node: self.node.clone(),
        }
    }
}

impl<T> fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("node", &self.node)
            .field("store", &self.store)
            .finish()
    }
}
