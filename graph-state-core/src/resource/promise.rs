//! Pending computations as node values.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;

use crate::reactive::{Context, GraphNode, Resolved};

static NEXT_PROMISE: AtomicU64 = AtomicU64::new(0);

/// A shared, lazily driven computation.
///
/// Clones share the same underlying future, so however many readers await a
/// promise the computation runs once. Nothing runs until the promise is first
/// awaited. Promises compare by identity: two promises are equal only if one
/// is a clone of the other.
pub struct Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: u64,
    shared: Shared<BoxFuture<'static, Resolved<T>>>,
}

impl<T> Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Resolved<T>> + Send + 'static,
    {
        Self {
            id: NEXT_PROMISE.fetch_add(1, Ordering::Relaxed),
            shared: future.boxed().shared(),
        }
    }

    /// A promise that is already settled.
    pub fn ready(value: Resolved<T>) -> Self {
        Self::new(futures_util::future::ready(value))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The settled value, if the computation has completed.
    pub fn peek(&self) -> Option<Resolved<T>> {
        self.shared.peek().cloned()
    }

    pub fn is_settled(&self) -> bool {
        self.shared.peek().is_some()
    }

    /// Drive the computation (or join it if it is already running) and
    /// return its result.
    pub async fn wait(&self) -> Resolved<T> {
        self.shared.clone().await
    }
}

impl<T> Clone for Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: self.shared.clone(),
        }
    }
}

impl<T> PartialEq for Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Promise<T> where T: Clone + Send + Sync + 'static {}

impl<T> fmt::Debug for Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// A node whose value is a pending computation.
///
/// `f` runs synchronously as the node's `get` resolver: reads made through
/// the context before the future is returned are tracked as usual, and a
/// change to any of them replaces the promise with a new one. The returned
/// future must own everything it needs.
///
/// ```rust,ignore
/// let user_id = GraphNode::constant(7);
/// let user = async_node({
///     let user_id = user_id.clone();
///     move |ctx| {
///         let id = ctx.get(&user_id);
///         async move { fetch_user(id?).await }
///     }
/// });
/// ```
pub fn async_node<T, F, Fut>(f: F) -> GraphNode<Promise<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&mut Context<'_, Promise<T>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Resolved<T>> + Send + 'static,
{
    GraphNode::derived(move |ctx| Ok(Promise::new(f(ctx))))
}
