//! Graph State Core
//!
//! This crate provides a reactive state-graph engine. State is described as
//! a graph of nodes, each with a `get` resolver that derives its value from
//! other nodes and an optional `set` resolver that translates writes. It
//! implements:
//!
//! - Lazy resolution with automatic, per-resolution dependency tracking
//! - Change propagation in dependency order with equality short-circuiting
//! - Change listeners and subscription lifecycles
//! - Pending computations and a stale-while-revalidate cache
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Node descriptors, resolution context, store and listeners
//! - `graph`: Per-node state and the dependency graph scheduler
//! - `resource`: Promises, resource nodes and the SWR cache
//! - `config`: Store and cache configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use graph_state_core::reactive::{GraphNode, Listener, NodeBuilder, Store};
//!
//! let fahrenheit = GraphNode::constant(32.0_f64);
//! let celsius = NodeBuilder::derived({
//!     let fahrenheit = fahrenheit.clone();
//!     move |ctx| Ok((ctx.get(&fahrenheit)? - 32.0) * 5.0 / 9.0)
//! })
//! .set({
//!     let fahrenheit = fahrenheit.clone();
//!     move |ctx, celsius: f64| ctx.set(&fahrenheit, celsius * 9.0 / 5.0 + 32.0)
//! })
//! .build();
//!
//! let store = Store::new();
//! store.add_listener(&fahrenheit, &Listener::new(|f| println!("F = {f:?}")))?;
//!
//! store.update_state(&celsius, 100.0)?;
//! // Listener prints: "F = Ok(212.0)"
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod resource;

pub use config::{StoreConfig, SwrConfig};
pub use error::{ConfigError, GraphError};
pub use reactive::{Action, Context, GraphDomain, GraphNode, Listener, NodeBuilder, Resolved, Store};
pub use resource::{async_node, resource, Promise, Resource, SwrNode};
