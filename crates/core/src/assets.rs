//! Tracked collateral branches.
//!
//! Each branch has its own trove manager, stability pool and price feed. The
//! registry is built once at startup from configuration and never mutated.

use alloy::primitives::Address;
use monitor_chain::{ChainClient, ChainError};
use tracing::info;

use crate::config::MonitorConfig;
use crate::error::MonitorError;

/// How a feed answer becomes a USD price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceConversion {
    /// Feed quotes USD
    Usd,
    /// Feed quotes another tracked asset (e.g. RETH/ETH)
    ViaAsset { quote: String },
    /// Feed quotes the underlying of a wrapped token (e.g. STETH/USD for
    /// wstETH); multiplied by the wrapped-token exchange rate
    ViaExchangeRate { rate_provider: Address },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAsset {
    pub label: String,
    pub trove_manager: Address,
    pub stability_pool: Address,
    /// Contract emitting `AnswerUpdated`
    pub price_feed: Address,
    /// Proxy `price_feed` was resolved from, if any
    pub feed_proxy: Option<Address>,
    pub feed_decimals: u8,
    pub horizon_blocks: u64,
    pub conversion: PriceConversion,
}

#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: Vec<TrackedAsset>,
}

impl AssetRegistry {
    /// Validates label uniqueness and that every `ViaAsset` quote names a
    /// USD-quoted asset of the registry.
    pub fn new(assets: Vec<TrackedAsset>) -> Result<Self, MonitorError> {
        for (i, asset) in assets.iter().enumerate() {
            if assets[..i].iter().any(|other| other.label == asset.label) {
                return Err(MonitorError::Config(format!(
                    "duplicate asset label '{}'",
                    asset.label
                )));
            }
        }

        for asset in &assets {
            if let PriceConversion::ViaAsset { quote } = &asset.conversion {
                match assets.iter().find(|a| &a.label == quote) {
                    Some(q) if q.conversion == PriceConversion::Usd => {}
                    Some(_) => {
                        return Err(MonitorError::Config(format!(
                            "asset '{}' is quoted in '{}', which is not USD-quoted",
                            asset.label, quote
                        )))
                    }
                    None => {
                        return Err(MonitorError::Config(format!(
                            "asset '{}' is quoted in unknown asset '{}'",
                            asset.label, quote
                        )))
                    }
                }
            }
        }

        Ok(Self { assets })
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, MonitorError> {
        let assets = config
            .assets
            .iter()
            .map(|a| a.to_tracked())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(assets)
    }

    /// Replace every proxied feed with the aggregator currently behind it.
    pub async fn resolve_feeds<C: ChainClient + ?Sized>(
        self,
        client: &C,
    ) -> Result<Self, ChainError> {
        let mut assets = self.assets;
        for asset in &mut assets {
            if let Some(proxy) = asset.feed_proxy {
                asset.price_feed = client.feed_aggregator(proxy).await?;
                info!(
                    label = %asset.label,
                    proxy = %proxy,
                    aggregator = %asset.price_feed,
                    "Resolved price feed"
                );
            }
        }
        Ok(Self { assets })
    }

    pub fn get(&self, label: &str) -> Option<&TrackedAsset> {
        self.assets.iter().find(|a| a.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedAsset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// `(label, rate provider)` of every exchange-rate priced asset.
    pub fn rate_providers(&self) -> impl Iterator<Item = (&str, Address)> {
        self.assets.iter().filter_map(|a| match a.conversion {
            PriceConversion::ViaExchangeRate { rate_provider } => {
                Some((a.label.as_str(), rate_provider))
            }
            _ => None,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn asset(label: &str, byte: u8, conversion: PriceConversion) -> TrackedAsset {
        TrackedAsset {
            label: label.to_string(),
            trove_manager: Address::repeat_byte(byte),
            stability_pool: Address::repeat_byte(byte + 1),
            price_feed: Address::repeat_byte(byte + 2),
            feed_proxy: None,
            feed_decimals: 8,
            horizon_blocks: 400,
            conversion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::asset;
    use super::*;
    use monitor_chain::mock::MockChainClient;

    #[test]
    fn test_default_registry() {
        let registry = AssetRegistry::from_config(&MonitorConfig::default()).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("RETH").is_some());
        let providers: Vec<_> = registry.rate_providers().map(|(l, _)| l).collect();
        assert_eq!(providers, vec!["WSTETH"]);
    }

    #[test]
    fn test_rejects_duplicate_and_unknown_quotes() {
        let dup = AssetRegistry::new(vec![
            asset("WETH", 0x10, PriceConversion::Usd),
            asset("WETH", 0x20, PriceConversion::Usd),
        ]);
        assert!(matches!(dup, Err(MonitorError::Config(_))));

        let unknown = AssetRegistry::new(vec![asset(
            "RETH",
            0x10,
            PriceConversion::ViaAsset {
                quote: "WETH".to_string(),
            },
        )]);
        assert!(matches!(unknown, Err(MonitorError::Config(_))));

        let chained = AssetRegistry::new(vec![
            asset("A", 0x10, PriceConversion::Usd),
            asset("B", 0x20, PriceConversion::ViaAsset { quote: "A".to_string() }),
            asset("C", 0x30, PriceConversion::ViaAsset { quote: "B".to_string() }),
        ]);
        assert!(matches!(chained, Err(MonitorError::Config(_))));
    }

    #[tokio::test]
    async fn test_resolve_feeds() {
        let mut proxied = asset("WETH", 0x10, PriceConversion::Usd);
        let proxy = Address::repeat_byte(0x99);
        let aggregator = Address::repeat_byte(0x98);
        proxied.price_feed = proxy;
        proxied.feed_proxy = Some(proxy);
        let direct = asset("OTHER", 0x20, PriceConversion::Usd);

        let client = MockChainClient::new();
        client.set_aggregator(proxy, aggregator);

        let registry = AssetRegistry::new(vec![proxied, direct.clone()])
            .unwrap()
            .resolve_feeds(&client)
            .await
            .unwrap();
        assert_eq!(registry.get("WETH").unwrap().price_feed, aggregator);
        assert_eq!(registry.get("OTHER").unwrap().price_feed, direct.price_feed);
    }
}
