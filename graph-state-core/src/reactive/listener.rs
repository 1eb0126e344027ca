//! Listener types for the notification bus.
//!
//! A Listener is a callback invoked when a node's resolved value changes.
//! Listener sets are plain per-node collections kept in the store, so node
//! descriptors never carry subscriber state themselves.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::GraphError;

/// Unique identifier for a listener.
///
/// Clones of a [`Listener`] share the same ID, which is what makes
/// registration idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// A change callback for a node of type `T`.
///
/// The callback receives the node's new value, which is a failure if the node
/// failed to resolve.
pub struct Listener<T> {
    callback: Arc<dyn Fn(&Result<T, GraphError>) + Send + Sync>,
}

impl<T> Listener<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new listener with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Result<T, GraphError>) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Get the listener's identity.
    pub fn id(&self) -> ListenerId {
        ListenerId(Arc::as_ptr(&self.callback) as *const () as usize)
    }

    /// Invoke the callback directly.
    pub fn notify(&self, value: &Result<T, GraphError>) {
        (self.callback)(value);
    }

    pub(crate) fn erase(&self) -> ErasedListener {
        let callback = Arc::clone(&self.callback);
        Arc::new(move |value: &(dyn Any + Send + Sync)| {
            if let Some(value) = value.downcast_ref::<Result<T, GraphError>>() {
                callback(value);
            }
        })
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &(Arc::as_ptr(&self.callback) as *const () as usize))
            .finish()
    }
}

pub(crate) type ErasedListener = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;

/// Ordered, identity-keyed set of listeners for one node.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: IndexMap<ListenerId, ErasedListener>,
}

impl ListenerSet {
    /// Register a listener. Returns `false` if it was already registered, in
    /// which case its original position is kept.
    pub(crate) fn insert(&mut self, id: ListenerId, listener: ErasedListener) -> bool {
        if self.listeners.contains_key(&id) {
            return false;
        }
        self.listeners.insert(id, listener);
        true
    }

    /// Remove a listener. Unknown listeners are ignored.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.shift_remove(&id).is_some()
    }

    /// Copy the current listeners in insertion order.
    ///
    /// Notification iterates over the snapshot, so listeners added or removed
    /// while it runs only affect the next notification.
    pub(crate) fn snapshot(&self) -> Vec<ErasedListener> {
        self.listeners.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }
}
