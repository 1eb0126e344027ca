//! Store and cache configuration.
//!
//! Both structs deserialize from JSON with every field optional, so a config
//! file only has to name what it overrides. Durations are written as
//! milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Store`](crate::reactive::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Optional name, attached to log events emitted by the store.
    pub name: Option<String>,

    /// Upper bound on writes drained from the deferred queue in one turn.
    ///
    /// A listener that writes to the node it listens to, with a value that
    /// never settles, would otherwise loop forever.
    pub max_deferred_updates: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: None,
            max_deferred_updates: 10_000,
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.max_deferred_updates == 0 {
            return Err(ConfigError::ZeroQueueLimit);
        }
        Ok(config)
    }
}

/// Freshness policy for stale-while-revalidate nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwrConfig {
    /// How long settled data counts as fresh. Fresh data is served without
    /// starting a new fetch.
    #[serde(with = "millis")]
    pub fresh_age: Duration,

    /// How long data stays servable after it stops being fresh. Data older
    /// than `fresh_age + stale_age` is dropped instead of served.
    #[serde(with = "millis")]
    pub stale_age: Duration,
}

impl Default for SwrConfig {
    fn default() -> Self {
        Self {
            fresh_age: Duration::from_secs(2),
            stale_age: Duration::from_secs(30),
        }
    }
}

impl SwrConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// A policy that never treats data as fresh: every activation revalidates.
    pub fn always_revalidate() -> Self {
        Self {
            fresh_age: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Total time after which settled data is no longer served.
    pub fn max_age(&self) -> Duration {
        self.fresh_age.saturating_add(self.stale_age)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
