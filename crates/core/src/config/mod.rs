//! Monitor configuration.
//!
//! This module provides:
//! - Runtime parameters (polling, thresholds, endpoints)
//! - Tracked asset entries, defaulting to the mainnet branches
//! - Loading from TOML with environment expansion and overrides

mod asset_config;
mod loader;
mod monitor;

pub use asset_config::{default_assets, AssetConfig, ConversionConfig};
pub use loader::{expand_env, load_config};
pub use monitor::{MonitorConfig, PollConfig, ThresholdConfig};
