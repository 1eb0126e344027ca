//! Error types for the graph engine.
//!
//! Every failure in this crate is scoped to a node, a cache key or a store.
//! Nothing here is fatal to the process: resolution failures are cached as the
//! node's value and handed to whoever reads it next.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::graph::NodeId;

/// Errors produced by the graph engine.
///
/// `GraphError` is `Clone` because a failed resolution is cached as the node's
/// current value and may be handed to many readers.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A collaborator tried to reach the graph while no store was in scope.
    #[error("no graph domain is active on this thread")]
    OutOfDomain,

    /// The store was disposed before the operation ran.
    #[error("graph store has been disposed")]
    Disposed,

    /// A write was attempted on a derived node that has no `set` resolver.
    #[error("node {node} has no set resolver and cannot be written")]
    ReadOnly { node: NodeId },

    /// A resolver failed or a pending computation settled with an error.
    #[error("resolution failed: {0}")]
    Failed(Arc<dyn StdError + Send + Sync>),

    /// A node was read while it was already resolving on the same stack.
    #[error("dependency cycle detected while resolving node {node}")]
    Cycle { node: NodeId },

    /// The cached value of a node could not be viewed as the requested type.
    #[error("node {node} holds a value of a different type")]
    TypeMismatch { node: NodeId },

    /// A cache key is already bound to an entry of another value type.
    #[error("cache key `{key}` is already bound to a different value type")]
    KeyTypeMismatch { key: String },

    /// A pending computation needed an executor and none was available.
    #[error("no async executor available to drive pending computations")]
    NoExecutor,
}

impl GraphError {
    /// Wrap an arbitrary error as a resolution failure.
    pub fn failed<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Failed(Arc::new(error))
    }

    /// Build a resolution failure from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::Failed(Arc::new(Message(message.to_string())))
    }

    /// Whether two errors describe the same failure.
    ///
    /// Resolution failures compare by identity, so a failure propagated from a
    /// dependency is the same failure in every reader. Structural variants
    /// compare by their fields.
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Failed(a), Self::Failed(b)) => Arc::ptr_eq(a, b),
            (Self::ReadOnly { node: a }, Self::ReadOnly { node: b })
            | (Self::Cycle { node: a }, Self::Cycle { node: b })
            | (Self::TypeMismatch { node: a }, Self::TypeMismatch { node: b }) => a == b,
            (Self::KeyTypeMismatch { key: a }, Self::KeyTypeMismatch { key: b }) => a == b,
            (Self::OutOfDomain, Self::OutOfDomain)
            | (Self::Disposed, Self::Disposed)
            | (Self::NoExecutor, Self::NoExecutor) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_deferred_updates must be greater than zero")]
    ZeroQueueLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_compare_by_identity() {
        let a = GraphError::msg("boom");
        let b = a.clone();
        let c = GraphError::msg("boom");

        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
    }

    #[test]
    fn structural_variants_compare_by_fields() {
        let node = NodeId::new();
        assert!(GraphError::Cycle { node }.is_same(&GraphError::Cycle { node }));
        assert!(!GraphError::Cycle { node }.is_same(&GraphError::ReadOnly { node }));
        assert!(GraphError::Disposed.is_same(&GraphError::Disposed));
    }

    #[test]
    fn message_is_displayed() {
        let error = GraphError::msg("network down");
        assert_eq!(error.to_string(), "resolution failed: network down");
    }
}
