//! Stale-while-revalidate nodes.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use super::resource::Resource;
use super::swr::{SwrEntry, SwrStatus};
use crate::config::SwrConfig;
use crate::error::GraphError;
use crate::reactive::{Cleanup, Context, GraphNode, NodeBuilder, Resolved, Store};

/// A node backed by a keyed [`SwrEntry`](super::SwrEntry).
///
/// Resolving the node returns whatever the entry holds right away and starts
/// a fetch unless one is already running or the data is still fresh. A
/// resolution caused by a dependency change, or by [`SwrNode::trigger`],
/// always fetches. The node follows every transition of its entry, so
/// listeners see `Pending`, then the settled value.
pub struct SwrNode<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    key: Arc<str>,
    config: SwrConfig,
    node: GraphNode<Resource<T>>,
}

impl<T> SwrNode<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Build a node for `key`.
    ///
    /// `fetch` runs as part of the node's resolution: reads made through the
    /// context are tracked, and the returned future is only driven when a
    /// fetch actually starts.
    pub fn new<F, Fut>(key: impl Into<Arc<str>>, config: SwrConfig, fetch: F) -> Self
    where
        F: Fn(&mut Context<'_, Resource<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Resolved<T>> + Send + 'static,
    {
        let key: Arc<str> = key.into();
        let node = NodeBuilder::derived({
            let key = key.clone();
            move |ctx: &mut Context<'_, Resource<T>>| {
                let entry = ctx.store().swr().entry::<T>(&key)?;
                let fetching = fetch(ctx);

                if let Some(token) = entry.begin(ctx.is_revalidation(), &config) {
                    let fetch_entry = Arc::clone(&entry);
                    ctx.spawn(async move {
                        let result = fetching.await;
                        fetch_entry.commit(token, result);
                    })?;
                } else {
                    trace!(key = %key, "serving cached entry without fetching");
                }

                let handle = ctx.handle();
                let weak: Weak<SwrEntry<T>> = Arc::downgrade(&entry);
                let key = key.clone();
                ctx.subscription(move || {
                    let Some(entry) = weak.upgrade() else {
                        return Cleanup::none();
                    };

                    let follow = {
                        let weak = weak.clone();
                        let handle = handle.clone();
                        move |_: SwrStatus| {
                            let Some(entry) = weak.upgrade() else {
                                return;
                            };
                            if let Err(error) = handle.mutate(entry.snapshot(&config)) {
                                debug!(key = %key, %error, "dropping cache update for detached node");
                            }
                        }
                    };
                    let id = entry.add_listener(follow);

                    // Catch transitions that happened between resolution and
                    // subscription.
                    if let Err(error) = handle.mutate(entry.snapshot(&config)) {
                        debug!(%error, "failed to sync node with cache entry");
                    }

                    Cleanup::new(move || {
                        if let Some(entry) = weak.upgrade() {
                            entry.remove_listener(id);
                        }
                    })
                });

                Ok(entry.snapshot(&config))
            }
        })
        .key(key.clone())
        .label(format!("swr:{key}"))
        .build();

        Self { key, config, node }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &SwrConfig {
        &self.config
    }

    /// The underlying graph node, for reading through a context or attaching
    /// listeners.
    pub fn node(&self) -> &GraphNode<Resource<T>> {
        &self.node
    }

    pub fn get(&self, store: &Store) -> Resolved<Resource<T>> {
        store.get_state(&self.node)
    }

    /// The cache entry behind this node in `store`.
    pub fn entry(&self, store: &Store) -> Result<Arc<SwrEntry<T>>, GraphError> {
        store.swr().entry::<T>(&self.key)
    }

    /// Write data to the cache without fetching. Any fetch in flight is
    /// superseded.
    pub fn mutate(&self, store: &Store, data: T) -> Result<(), GraphError> {
        self.entry(store)?.mutate(data);
        Ok(())
    }

    /// Force a revalidation, even if the data is fresh.
    pub fn trigger(&self, store: &Store) -> Result<(), GraphError> {
        store.invalidate_state(&self.node)
    }
}

impl<T> Clone for SwrNode<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            config: self.config,
            node: self.node.clone(),
        }
    }
}

impl<T> fmt::Debug for SwrNode<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwrNode")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("node", &self.node.id())
            .finish()
    }
}
