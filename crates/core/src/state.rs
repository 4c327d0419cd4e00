//! Durable poll cursor and running totals.
//!
//! The state file is a single JSON object with every number written as a
//! decimal string, read and rewritten whole.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use alloy::primitives::{I256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid state. Never replaced by defaults.
    #[error("state file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Numbers as decimal strings.
mod decimal {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }

    pub mod map {
        use std::collections::BTreeMap;
        use std::fmt::Display;
        use std::str::FromStr;

        use serde::ser::SerializeMap;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<T: Display, S: Serializer>(
            map: &BTreeMap<String, T>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let mut out = serializer.serialize_map(Some(map.len()))?;
            for (key, value) in map {
                out.serialize_entry(key, &value.to_string())?;
            }
            out.end()
        }

        pub fn deserialize<'de, T, D>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
        where
            T: FromStr,
            T::Err: Display,
            D: Deserializer<'de>,
        {
            BTreeMap::<String, String>::deserialize(deserializer)?
                .into_iter()
                .map(|(key, value)| {
                    value
                        .parse()
                        .map(|parsed| (key, parsed))
                        .map_err(de::Error::custom)
                })
                .collect()
        }
    }
}

/// The only durable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    /// Last block whose events were fully processed
    #[serde(with = "decimal")]
    pub last_polled_block: u64,

    /// Head block of the last daily summary
    #[serde(with = "decimal")]
    pub last_daily_block: u64,

    /// Net BOLD minted in the last daily window
    #[serde(with = "decimal", default)]
    pub last_net_minted: I256,

    /// Net stability pool flow per asset in the last daily window
    #[serde(with = "decimal::map", default)]
    pub last_net_stability_pool_by_asset: BTreeMap<String, I256>,

    /// Wrapped-token exchange rates at the last daily summary
    #[serde(with = "decimal::map", default)]
    pub last_exchange_rate_snapshot: BTreeMap<String, U256>,
}

impl PollState {
    /// Fresh state starting at `block` with zero totals.
    pub fn baseline(block: u64) -> Self {
        Self {
            last_polled_block: block,
            last_daily_block: block,
            last_net_minted: I256::ZERO,
            last_net_stability_pool_by_asset: BTreeMap::new(),
            last_exchange_rate_snapshot: BTreeMap::new(),
        }
    }

    pub fn from_json(path: &Path, bytes: &[u8]) -> Result<Self, StateError> {
        serde_json::from_slice(bytes).map_err(|e| StateError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Durable storage for [`PollState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored state; the baseline when nothing has been stored yet.
    async fn load(&self) -> Result<PollState, StateError>;

    async fn save(&self, state: &PollState) -> Result<(), StateError>;
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    async fn load(&self) -> Result<PollState, StateError> {
        (**self).load().await
    }

    async fn save(&self, state: &PollState) -> Result<(), StateError> {
        (**self).save(state).await
    }
}

/// JSON flat file, replaced atomically through a temp file and rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    baseline_block: u64,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, baseline_block: u64) -> Self {
        Self {
            path: path.into(),
            baseline_block,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PollState, StateError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => PollState::from_json(&self.path, &bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    path = %self.path.display(),
                    block = self.baseline_block,
                    "No state file, starting from baseline"
                );
                Ok(PollState::baseline(self.baseline_block))
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, state: &PollState) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| StateError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(
            path = %self.path.display(),
            last_polled_block = state.last_polled_block,
            last_daily_block = state.last_daily_block,
            "State saved"
        );
        Ok(())
    }
}

/// In-memory store. Optionally refuses saves.
#[derive(Debug)]
pub struct MemoryStore {
    baseline_block: u64,
    state: Mutex<Option<PollState>>,
    failing: Mutex<bool>,
}

impl MemoryStore {
    pub fn new(baseline_block: u64) -> Self {
        Self {
            baseline_block,
            state: Mutex::new(None),
            failing: Mutex::new(false),
        }
    }

    pub fn with_state(state: PollState) -> Self {
        let store = Self::new(state.last_polled_block);
        *store.state.lock() = Some(state);
        store
    }

    /// Last saved state.
    pub fn snapshot(&self) -> Option<PollState> {
        self.state.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<PollState, StateError> {
        Ok(self
            .snapshot()
            .unwrap_or_else(|| PollState::baseline(self.baseline_block)))
    }

    async fn save(&self, state: &PollState) -> Result<(), StateError> {
        if *self.failing.lock() {
            return Err(StateError::Io {
                path: PathBuf::from("memory"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "store unavailable"),
            });
        }
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}
