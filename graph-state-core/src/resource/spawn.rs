//! Executors for pending computations.

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;

use crate::error::GraphError;

/// Something that can drive a future to completion in the background.
///
/// The engine never spawns threads of its own; every pending computation is
/// handed to the store's `Spawn` implementation.
pub trait Spawn: Send + Sync {
    fn spawn(&self, future: BoxFuture<'static, ()>) -> Result<(), GraphError>;
}

/// Spawns onto the tokio runtime the caller is running in.
///
/// Fails with [`GraphError::NoExecutor`] when called outside a runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl Spawn for TokioSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) -> Result<(), GraphError> {
        let handle = Handle::try_current().map_err(|_| GraphError::NoExecutor)?;
        handle.spawn(future);
        Ok(())
    }
}

/// Spawns onto a fixed runtime, for stores used from threads that are not
/// part of one.
#[derive(Debug, Clone)]
pub struct HandleSpawner {
    handle: Handle,
}

impl HandleSpawner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Spawn for HandleSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) -> Result<(), GraphError> {
        self.handle.spawn(future);
        Ok(())
    }
}
