//! Tracked asset entries as they appear in the TOML file.

use serde::{Deserialize, Serialize};

use super::monitor::parse_address;
use crate::assets::{PriceConversion, TrackedAsset};
use crate::error::MonitorError;

/// One collateral branch (TOML-loadable, addresses as hex strings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Branch label used in messages and state keys (e.g. "WETH")
    pub label: String,
    pub trove_manager: String,
    pub stability_pool: String,
    /// Chainlink feed (proxy or aggregator)
    pub price_feed: String,
    /// Whether `price_feed` is a proxy to resolve to its aggregator at startup
    #[serde(default = "default_true")]
    pub feed_is_proxy: bool,
    #[serde(default = "default_feed_decimals")]
    pub feed_decimals: u8,
    /// Lookback guaranteeing a price sample before the earliest priced event
    #[serde(default = "default_horizon")]
    pub horizon_blocks: u64,
    #[serde(default)]
    pub conversion: ConversionConfig,
}

fn default_true() -> bool {
    true
}
fn default_feed_decimals() -> u8 {
    8
}
fn default_horizon() -> u64 {
    400
}

/// How a feed answer becomes a USD price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionConfig {
    #[default]
    Usd,
    ViaAsset {
        quote: String,
    },
    ViaExchangeRate {
        rate_provider: String,
    },
}

impl AssetConfig {
    pub fn to_tracked(&self) -> Result<TrackedAsset, MonitorError> {
        let price_feed = parse_address("price_feed", &self.price_feed)?;
        let conversion = match &self.conversion {
            ConversionConfig::Usd => PriceConversion::Usd,
            ConversionConfig::ViaAsset { quote } => PriceConversion::ViaAsset {
                quote: quote.clone(),
            },
            ConversionConfig::ViaExchangeRate { rate_provider } => {
                PriceConversion::ViaExchangeRate {
                    rate_provider: parse_address("rate_provider", rate_provider)?,
                }
            }
        };

        Ok(TrackedAsset {
            label: self.label.clone(),
            trove_manager: parse_address("trove_manager", &self.trove_manager)?,
            stability_pool: parse_address("stability_pool", &self.stability_pool)?,
            price_feed,
            feed_proxy: self.feed_is_proxy.then_some(price_feed),
            feed_decimals: self.feed_decimals,
            horizon_blocks: self.horizon_blocks,
            conversion,
        })
    }
}

fn branch(
    label: &str,
    trove_manager: &str,
    stability_pool: &str,
    price_feed: &str,
    feed_decimals: u8,
    horizon_blocks: u64,
    conversion: ConversionConfig,
) -> AssetConfig {
    AssetConfig {
        label: label.to_string(),
        trove_manager: trove_manager.to_string(),
        stability_pool: stability_pool.to_string(),
        price_feed: price_feed.to_string(),
        feed_is_proxy: true,
        feed_decimals,
        horizon_blocks,
        conversion,
    }
}

/// Mainnet WETH, wstETH and rETH branches.
pub fn default_assets() -> Vec<AssetConfig> {
    vec![
        // ETH/USD, 1h heartbeat
        branch(
            "WETH",
            "0x7bcb64b2c9206a5b699ed43363f6f98d4776cf5a",
            "0x5721cbbd64fc7ae3ef44a0a3f9a790a9264cf9bf",
            "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419",
            8,
            400,
            ConversionConfig::Usd,
        ),
        // STETH/USD times stETH per wstETH
        branch(
            "WSTETH",
            "0xa2895d6a3bf110561dfe4b71ca539d84e1928b22",
            "0x9502b7c397e9aa22fe9db7ef7daf21cd2aebe56b",
            "0xCfE54B5cD566aB89272946F602D76Ea879CAb4a8",
            8,
            400,
            ConversionConfig::ViaExchangeRate {
                rate_provider: "0x7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0".to_string(),
            },
        ),
        // RETH/ETH, 24h heartbeat
        branch(
            "RETH",
            "0xb2b2abeb5c357a234363ff5d180912d319e3e19e",
            "0xd442e41019b7f5c4dd78f50dc03726c446148695",
            "0x536218f9E9Eb48863970252233c8F271f554C2d0",
            18,
            7300,
            ConversionConfig::ViaAsset {
                quote: "WETH".to_string(),
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_assets_parse() {
        let tracked: Vec<TrackedAsset> = default_assets()
            .iter()
            .map(AssetConfig::to_tracked)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tracked[0].label, "WETH");
        assert_eq!(tracked[0].conversion, PriceConversion::Usd);
        assert_eq!(tracked[2].feed_decimals, 18);
        assert_eq!(
            tracked[2].conversion,
            PriceConversion::ViaAsset {
                quote: "WETH".to_string()
            }
        );
        assert!(tracked.iter().all(|a| a.feed_proxy == Some(a.price_feed)));
    }

    #[test]
    fn test_conversion_from_toml() {
        let asset: AssetConfig = toml::from_str(
            r#"
            label = "TEST"
            trove_manager = "0x0000000000000000000000000000000000000001"
            stability_pool = "0x0000000000000000000000000000000000000002"
            price_feed = "0x0000000000000000000000000000000000000003"
            feed_is_proxy = false
            conversion = { kind = "via_asset", quote = "WETH" }
            "#,
        )
        .unwrap();
        assert_eq!(asset.feed_decimals, 8);
        assert_eq!(asset.horizon_blocks, 400);

        let tracked = asset.to_tracked().unwrap();
        assert_eq!(tracked.feed_proxy, None);
        assert!(matches!(tracked.conversion, PriceConversion::ViaAsset { .. }));
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let mut asset = default_assets().remove(0);
        asset.trove_manager = "0x1234".to_string();
        assert!(matches!(asset.to_tracked(), Err(MonitorError::Config(_))));
    }
}
