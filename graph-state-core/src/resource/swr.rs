//! Stale-While-Revalidate Cache
//!
//! Each store owns one [`SwrCache`], mapping string keys to typed
//! [`SwrEntry`] values. An entry remembers the last good data for its key,
//! the last error, and which fetch is allowed to commit next.
//!
//! # Fetch tokens
//!
//! Every fetch started through [`SwrEntry::begin`] gets a fresh token, and
//! only the fetch holding the entry's current token may commit. Starting a
//! new fetch or writing locally with [`SwrEntry::mutate`] supersedes whatever
//! was in flight, so results that arrive out of order are dropped.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use super::resource::Resource;
use crate::config::SwrConfig;
use crate::error::GraphError;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwrStatus {
    /// Nothing has been fetched yet.
    Empty,
    /// A fetch is in flight. Earlier data, if any, is still available.
    Pending,
    Success,
    Failure,
}

type EntryListener = Arc<dyn Fn(SwrStatus) + Send + Sync>;

struct EntryState<T> {
    data: Option<T>,
    error: Option<GraphError>,
    status: SwrStatus,
    inflight: Option<u64>,
    next_token: u64,
    settled_at: Option<Instant>,
}

/// Cached state for one key.
pub struct SwrEntry<T> {
    key: String,
    state: Mutex<EntryState<T>>,
    listeners: Mutex<IndexMap<u64, EntryListener>>,
    next_listener: AtomicU64,
}

impl<T> SwrEntry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            state: Mutex::new(EntryState {
                data: None,
                error: None,
                status: SwrStatus::Empty,
                inflight: None,
                next_token: 0,
                settled_at: None,
            }),
            listeners: Mutex::new(IndexMap::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> SwrStatus {
        self.state.lock().status
    }

    /// Last good data, however old.
    pub fn data(&self) -> Option<T> {
        self.state.lock().data.clone()
    }

    pub fn error(&self) -> Option<GraphError> {
        self.state.lock().error.clone()
    }

    pub fn is_inflight(&self) -> bool {
        self.state.lock().inflight.is_some()
    }

    /// Whether the entry settled less than `fresh_age` ago.
    pub fn is_fresh(&self, config: &SwrConfig) -> bool {
        self.state
            .lock()
            .settled_at
            .is_some_and(|at| at.elapsed() < config.fresh_age)
    }

    /// Claim the right to fetch.
    ///
    /// Without `force`, no token is handed out while a fetch is in flight or
    /// while the entry is fresh. With `force`, a new fetch always starts and
    /// supersedes the one in flight.
    pub fn begin(&self, force: bool, config: &SwrConfig) -> Option<u64> {
        let token = {
            let mut state = self.state.lock();
            if !force {
                if state.inflight.is_some() {
                    return None;
                }
                if state.settled_at.is_some_and(|at| at.elapsed() < config.fresh_age) {
                    return None;
                }
            }

            let token = state.next_token;
            state.next_token += 1;
            state.inflight = Some(token);
            state.status = SwrStatus::Pending;
            token
        };

        debug!(key = %self.key, token, force, "starting fetch");
        self.notify(SwrStatus::Pending);
        Some(token)
    }

    /// Settle the fetch holding `token`. Returns `false`, leaving the entry
    /// untouched, if the fetch was superseded.
    pub fn commit(&self, token: u64, result: Result<T, GraphError>) -> bool {
        let status = {
            let mut state = self.state.lock();
            if state.inflight != Some(token) {
                debug!(key = %self.key, token, "discarding superseded fetch");
                return false;
            }

            state.inflight = None;
            state.settled_at = Some(Instant::now());
            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                    state.status = SwrStatus::Success;
                }
                Err(error) => {
                    state.error = Some(error);
                    state.status = SwrStatus::Failure;
                }
            }
            state.status
        };

        debug!(key = %self.key, token, ?status, "fetch settled");
        self.notify(status);
        true
    }

    /// Write data locally. Any fetch in flight is superseded.
    pub fn mutate(&self, data: T) {
        self.write(data);
        self.notify(SwrStatus::Success);
    }

    fn write(&self, data: T) {
        let mut state = self.state.lock();
        state.inflight = None;
        state.data = Some(data);
        state.error = None;
        state.status = SwrStatus::Success;
        state.settled_at = Some(Instant::now());
    }

    /// The entry as a [`Resource`]. Data older than `fresh_age + stale_age`
    /// is withheld.
    pub fn snapshot(&self, config: &SwrConfig) -> Resource<T> {
        let state = self.state.lock();
        let servable = match (&state.data, state.settled_at) {
            (Some(data), Some(at)) if at.elapsed() <= config.max_age() => Some(data.clone()),
            _ => None,
        };

        match state.status {
            SwrStatus::Empty => Resource::Pending { stale: None },
            SwrStatus::Pending => Resource::Pending { stale: servable },
            SwrStatus::Success => match servable {
                Some(data) => Resource::Success(data),
                None => Resource::Pending { stale: None },
            },
            SwrStatus::Failure => match &state.error {
                Some(error) => Resource::Failure(error.clone()),
                None => Resource::Pending { stale: servable },
            },
        }
    }

    /// Register a callback fired on every status transition. Returns an id for
    /// [`SwrEntry::remove_listener`].
    pub fn add_listener<F>(&self, listener: F) -> u64
    where
        F: Fn(SwrStatus) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, Arc::new(listener));
        id
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        self.listeners.lock().shift_remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn notify(&self, status: SwrStatus) {
        let listeners: Vec<EntryListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(status);
        }
    }
}

impl<T> fmt::Debug for SwrEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SwrEntry")
            .field("key", &self.key)
            .field("status", &state.status)
            .field("inflight", &state.inflight)
            .field("has_data", &state.data.is_some())
            .finish()
    }
}

/// Per-store map from cache key to entry.
#[derive(Default)]
pub struct SwrCache {
    entries: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl SwrCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `key`, created empty on first access.
    ///
    /// A key is bound to the value type of whoever created its entry; asking
    /// for it with another type fails with [`GraphError::KeyTypeMismatch`].
    pub fn entry<T>(&self, key: &str) -> Result<Arc<SwrEntry<T>>, GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let erased = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(SwrEntry::<T>::new(key)) as Arc<dyn Any + Send + Sync>)
            .value()
            .clone();

        erased
            .downcast::<SwrEntry<T>>()
            .map_err(|_| GraphError::KeyTypeMismatch { key: key.to_owned() })
    }

    /// The entry for `key` if one exists.
    pub fn get<T>(&self, key: &str) -> Result<Option<Arc<SwrEntry<T>>>, GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let Some(erased) = self.entries.get(key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        erased
            .downcast::<SwrEntry<T>>()
            .map(Some)
            .map_err(|_| GraphError::KeyTypeMismatch { key: key.to_owned() })
    }

    /// Seed or overwrite the data for `key`. With `notify`, nodes reading the
    /// key see the new value; without it the data is only picked up on their
    /// next resolution.
    pub fn set<T>(&self, key: &str, data: T, notify: bool) -> Result<(), GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = self.entry::<T>(key)?;
        if notify {
            entry.mutate(data);
        } else {
            entry.write(data);
        }
        Ok(())
    }

    /// Drop the entry for `key`. Nodes holding it keep their copy until they
    /// resolve again.
    pub fn evict(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            debug!(key, "evicted cache entry");
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}

impl fmt::Debug for SwrCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwrCache").field("entries", &self.entries.len()).finish()
    }
}
