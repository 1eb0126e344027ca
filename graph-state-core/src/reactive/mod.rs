//! Reactive State Graph
//!
//! This module implements the synchronous core of the engine: node
//! descriptors, the resolution context, the store and its listener bus.
//!
//! # Concepts
//!
//! ## Nodes
//!
//! A [`GraphNode`] describes one piece of state with a `get` resolver and an
//! optional `set` resolver. Descriptors are immutable and hold no state; the
//! value of a node lives in a [`Store`].
//!
//! ## Resolution
//!
//! When a node is read, the store runs its `get` resolver with a [`Context`].
//! Every node read through the context becomes a dependency, recorded only
//! once the resolution commits. Dependencies are rebuilt from scratch on every
//! resolution, so conditional reads are tracked exactly.
//!
//! ## Propagation
//!
//! A write that changes a node's value marks everything downstream stale and
//! re-resolves it in topological order. Each node whose value changed then
//! notifies its [`Listener`]s, always after the nodes it depends on.
//!
//! ## Domains
//!
//! [`GraphDomain`] scopes a store to the current thread, for code that has no
//! store handle of its own.

mod action;
mod context;
mod descriptor;
mod domain;
mod listener;
mod store;

pub use action::Action;
pub use context::{Cleanup, Context};
pub use descriptor::{Getter, GraphNode, Identity, NodeBuilder, Resolved};
pub use domain::{DomainGuard, GraphDomain};
pub use listener::{Listener, ListenerId};
pub use store::{NodeHandle, Store, StoreBuilder, WeakStore};

pub(crate) use descriptor::ErasedNode;
pub(crate) use listener::ListenerSet;
