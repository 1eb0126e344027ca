//! Asynchronous Resolution
//!
//! Pending computations enter the graph as [`Promise`] values. A promise node
//! is an ordinary node, so it is cached and shared like any other: however
//! many readers ask for it, one computation runs.
//!
//! Two views turn a pending computation into something listeners can follow:
//!
//! - [`resource`] wraps a promise node and reports `Pending`, then the settled
//!   value, committing results only for the promise that is still current.
//! - [`SwrNode`] reads through a keyed [`SwrCache`] entry with
//!   stale-while-revalidate semantics.
//!
//! Futures are driven by the store's [`Spawn`] implementation, the ambient
//! tokio runtime by default.

mod promise;
#[allow(clippy::module_inception)]
mod resource;
mod spawn;
mod swr;
mod swr_node;

pub use promise::{async_node, Promise};
pub use resource::{resource, Resource};
pub use spawn::{HandleSpawner, Spawn, TokioSpawner};
pub use swr::{SwrCache, SwrEntry, SwrStatus};
pub use swr_node::SwrNode;
