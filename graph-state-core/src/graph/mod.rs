//! Dependency Graph
//!
//! This module implements the per-store dependency graph that tracks
//! relationships between nodes.
//!
//! # Overview
//!
//! - Nodes are the live state behind node descriptors
//! - Edges represent dependencies: if A read B during its last resolution,
//!   there is an edge from B to A
//!
//! When a node changes, we traverse the graph to find all affected nodes and
//! mark them as dirty. The store then settles them in topological order.
//!
//! # Design Decisions
//!
//! 1. State is arena-indexed by node identity inside one store, never
//!    embedded in the descriptor, so one descriptor can back many stores.
//!
//! 2. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod node;
mod scheduler;

pub use node::{DirtyState, NodeId, NodeStatus};
pub(crate) use node::StoredValue;
pub(crate) use scheduler::UpdateScheduler;
