//! Resource nodes: the synchronous view of a pending computation.

use tracing::debug;

use super::promise::Promise;
use crate::error::GraphError;
use crate::reactive::{GraphNode, Resolved};

/// The observable state of an asynchronous value.
#[derive(Debug, Clone)]
pub enum Resource<T> {
    /// Still running. `stale` is the last successful value, if there was one.
    Pending { stale: Option<T> },

    Success(T),

    Failure(GraphError),
}

impl<T> Resource<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// The freshest data available: the settled value, or the stale one while
    /// pending.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Pending { stale } => stale.as_ref(),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&GraphError> {
        match self {
            Self::Failure(error) => Some(error),
            _ => None,
        }
    }
}

impl<T> From<Resolved<T>> for Resource<T> {
    fn from(result: Resolved<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}

impl<T: PartialEq> PartialEq for Resource<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Pending { stale: a }, Self::Pending { stale: b }) => a == b,
            (Self::Success(a), Self::Success(b)) => a == b,
            (Self::Failure(a), Self::Failure(b)) => a.is_same(b),
            _ => false,
        }
    }
}

/// Expose a promise node as a [`Resource`].
///
/// While the source's promise is running the resource is `Pending`, carrying
/// the previous success as stale data. Once the promise settles its result is
/// committed to the resource, which notifies listeners. A result is dropped
/// if the source has moved on to a different promise in the meantime.
pub fn resource<T>(source: &GraphNode<Promise<T>>) -> GraphNode<Resource<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let source = source.clone();
    GraphNode::derived(move |ctx| {
        let promise = match ctx.get(&source) {
            Ok(promise) => promise,
            Err(error) => return Ok(Resource::Failure(error)),
        };
        if let Some(settled) = promise.peek() {
            return Ok(settled.into());
        }

        let stale = ctx.previous().and_then(Resource::data).cloned();
        let handle = ctx.handle();
        let source = source.clone();
        ctx.spawn(async move {
            let result = promise.wait().await;
            let Some(store) = handle.store() else {
                return;
            };

            let committed = store.exclusive(|store| {
                let current = matches!(store.peek_state(&source), Some(Ok(ref latest)) if *latest == promise);
                if !current {
                    debug!(node = %handle.node().id(), promise = promise.id(), "discarding superseded result");
                    return Ok(());
                }
                store.mutate_state(handle.node(), Resource::from(result))
            });
            if let Ok(Err(error)) | Err(error) = committed {
                debug!(node = %handle.node().id(), %error, "failed to commit settled result");
            }
        })?;

        Ok(Resource::Pending { stale })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Store;
    use crate::resource::async_node;
    use std::time::Duration;

    #[test]
    fn resource_data_prefers_settled_then_stale() {
        let success = Resource::Success(1);
        let pending = Resource::Pending { stale: Some(2) };
        let empty: Resource<i32> = Resource::Pending { stale: None };
        let failure: Resource<i32> = Resource::Failure(GraphError::msg("x"));

        assert_eq!(success.data(), Some(&1));
        assert_eq!(pending.data(), Some(&2));
        assert_eq!(empty.data(), None);
        assert!(failure.error().is_some());
    }

    #[test]
    fn settled_promise_resolves_immediately() {
        let store = Store::new();
        let source = async_node(|_| async { Ok(3) });
        let promise = store.get_state(&source).unwrap();
        futures_util::FutureExt::now_or_never(promise.wait()).unwrap().unwrap();

        let res = resource(&source);
        assert_eq!(store.get_state(&res).unwrap(), Resource::Success(3));
    }

    #[test]
    fn pending_without_runtime_reports_no_executor() {
        let store = Store::new();
        let source = async_node(|_| futures_util::future::pending());
        let res: GraphNode<Resource<i32>> = resource(&source);

        assert!(matches!(store.get_state(&res), Err(GraphError::NoExecutor)));
    }

    #[tokio::test(start_paused = true)]
    async fn result_is_committed_once_promise_settles() {
        let store = Store::new();
        let source = async_node(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("done".to_string())
        });
        let res = resource(&source);

        assert_eq!(store.get_state(&res).unwrap(), Resource::Pending { stale: None });
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get_state(&res).unwrap(), Resource::Success("done".to_string()));
    }
}
