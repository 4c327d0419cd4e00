//! BOLD monitor core logic.
//!
//! This crate provides the monitoring pipeline:
//! - Asset registry with price feed conversions
//! - Per-asset oracle price caches and LTV calculation
//! - Correlation of trove operations with their resulting state
//! - Liquidation, redemption and batch manager records
//! - Daily protocol statistics
//! - Poll orchestration with a persisted block cursor

mod aggregator;
mod assets;
pub mod config;
mod correlator;
mod error;
pub mod format;
mod ltv;
mod poller;
mod price_cache;
mod records;
mod state;
pub mod u256_math;

pub use aggregator::{DailyAggregator, DailyStats, OperationCounts, PoolFlow};
pub use assets::{AssetRegistry, PriceConversion, TrackedAsset};
pub use config::{load_config, AssetConfig, MonitorConfig, PollConfig, ThresholdConfig};
pub use correlator::{correlate, group_by_transaction, LogicalOperation, TxGroup};
pub use error::MonitorError;
pub use ltv::{Ltv, PriceOracle};
pub use poller::{CycleReport, Poller, PollerSettings};
pub use price_cache::{PriceCache, PriceCacheManager, PriceSample, RefreshOutcome};
pub use records::{extract_records, ProtocolRecord, RecordDetail, RecordMeta, RecordThresholds};
pub use state::{JsonFileStore, MemoryStore, PollState, StateError, StateStore};
