//! Monitor runtime configuration.
//!
//! Every field has a default describing the Liquity v2 mainnet deployment, so
//! an empty TOML file (or none at all) yields a working configuration once
//! `RPC_URL` and `SLACK_WEBHOOK_URL` are set.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::asset_config::{default_assets, AssetConfig};
use crate::error::MonitorError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// JSON-RPC endpoint, `${VAR}` references are expanded
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Slack incoming webhook
    #[serde(default = "default_webhook_url")]
    pub slack_webhook_url: String,

    /// Path of the poll state file
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// BOLD debt token
    #[serde(default = "default_bold_token")]
    pub bold_token: String,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Tracked collateral branches
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetConfig>,
}

fn default_rpc_url() -> String {
    "${RPC_URL}".to_string()
}
fn default_webhook_url() -> String {
    "${SLACK_WEBHOOK_URL}".to_string()
}
fn default_state_file() -> String {
    "state.json".to_string()
}
fn default_bold_token() -> String {
    "0x6440f144b7e50d6a8439336510312d2f54beb01d".to_string()
}

/// Polling cadence and RPC batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Blocks in the daily window (24h at 12s per block)
    #[serde(default = "default_blocks_per_day")]
    pub blocks_per_day: u64,

    /// Maximum span of one `eth_getLogs` request
    #[serde(default = "default_log_chunk_size")]
    pub log_chunk_size: u64,

    /// Block the cursor starts from when no state exists
    #[serde(default = "default_deployment_block")]
    pub deployment_block: u64,

    /// Parallel block header requests when stamping events
    #[serde(default = "default_timestamp_concurrency")]
    pub timestamp_concurrency: usize,

    /// Blocks of timestamps kept between cycles
    #[serde(default = "default_timestamp_retain")]
    pub timestamp_retain_blocks: u64,
}

fn default_interval() -> u64 {
    600
}
fn default_blocks_per_day() -> u64 {
    7200
}
fn default_log_chunk_size() -> u64 {
    1000
}
fn default_deployment_block() -> u64 {
    22_516_078
}
fn default_timestamp_concurrency() -> usize {
    8
}
fn default_timestamp_retain() -> u64 {
    7200
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            blocks_per_day: default_blocks_per_day(),
            log_chunk_size: default_log_chunk_size(),
            deployment_block: default_deployment_block(),
            timestamp_concurrency: default_timestamp_concurrency(),
            timestamp_retain_blocks: default_timestamp_retain(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Minimum amounts (BOLD, 18 decimals, decimal strings) below which single
/// redemptions and liquidations are not reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_min_amount")]
    pub min_redemption: String,

    #[serde(default = "default_min_amount")]
    pub min_liquidation: String,
}

fn default_min_amount() -> String {
    "0".to_string()
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_redemption: default_min_amount(),
            min_liquidation: default_min_amount(),
        }
    }
}

impl ThresholdConfig {
    pub fn min_redemption(&self) -> Result<U256, MonitorError> {
        parse_amount("min_redemption", &self.min_redemption)
    }

    pub fn min_liquidation(&self) -> Result<U256, MonitorError> {
        parse_amount("min_liquidation", &self.min_liquidation)
    }
}

fn parse_amount(field: &str, value: &str) -> Result<U256, MonitorError> {
    U256::from_str_radix(value.trim(), 10)
        .map_err(|e| MonitorError::Config(format!("invalid {field} '{value}': {e}")))
}

pub(crate) fn parse_address(field: &str, value: &str) -> Result<Address, MonitorError> {
    value
        .trim()
        .parse()
        .map_err(|e| MonitorError::Config(format!("invalid {field} address '{value}': {e}")))
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            slack_webhook_url: default_webhook_url(),
            state_file: default_state_file(),
            bold_token: default_bold_token(),
            poll: PollConfig::default(),
            thresholds: ThresholdConfig::default(),
            assets: default_assets(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn bold_token(&self) -> Result<Address, MonitorError> {
        parse_address("bold_token", &self.bold_token)
    }

    /// Log the effective configuration. The webhook url is not printed.
    pub fn log_config(&self) {
        tracing::info!(
            rpc_url = %self.rpc_url,
            state_file = %self.state_file,
            bold_token = %self.bold_token,
            webhook_set = !self.slack_webhook_url.is_empty(),
            "Monitor configuration loaded"
        );
        tracing::info!(
            interval_secs = self.poll.interval_secs,
            blocks_per_day = self.poll.blocks_per_day,
            log_chunk_size = self.poll.log_chunk_size,
            deployment_block = self.poll.deployment_block,
            timestamp_concurrency = self.poll.timestamp_concurrency,
            timestamp_retain_blocks = self.poll.timestamp_retain_blocks,
            "Polling parameters"
        );
        tracing::info!(
            min_redemption = %self.thresholds.min_redemption,
            min_liquidation = %self.thresholds.min_liquidation,
            "Notification thresholds"
        );
        for asset in &self.assets {
            tracing::info!(
                label = %asset.label,
                trove_manager = %asset.trove_manager,
                stability_pool = %asset.stability_pool,
                price_feed = %asset.price_feed,
                horizon_blocks = asset.horizon_blocks,
                "Tracked asset"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_mainnet() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll.blocks_per_day, 7200);
        assert_eq!(config.poll.log_chunk_size, 1000);
        assert_eq!(config.poll.deployment_block, 22_516_078);
        assert_eq!(config.poll.interval(), Duration::from_secs(600));
        assert_eq!(config.assets.len(), 3);
        assert!(config.bold_token().is_ok());
        assert_eq!(config.thresholds.min_redemption().unwrap(), U256::ZERO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            state_file = "/var/lib/monitor/state.json"

            [poll]
            interval_secs = 30

            [thresholds]
            min_redemption = "50000000000000000000000"
            "#,
        )
        .unwrap();

        assert_eq!(config.state_file, "/var/lib/monitor/state.json");
        assert_eq!(config.poll.interval_secs, 30);
        assert_eq!(config.poll.blocks_per_day, 7200);
        assert_eq!(
            config.thresholds.min_redemption().unwrap(),
            U256::from(50_000u64) * crate::u256_math::WAD
        );
        assert_eq!(config.assets.len(), 3);
    }

    #[test]
    fn test_bad_amount_is_config_error() {
        let thresholds = ThresholdConfig {
            min_redemption: "lots".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            thresholds.min_redemption(),
            Err(MonitorError::Config(_))
        ));
    }
}
