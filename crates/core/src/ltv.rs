//! Loan-to-value from cached oracle prices.

use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::U256;

use crate::assets::{AssetRegistry, PriceConversion, TrackedAsset};
use crate::price_cache::PriceCacheManager;
use crate::u256_math::{scale_to_wad, wad_mul, wad_to_f64, WAD};

/// Debt over collateral value, 18 decimals, or no value when the position
/// cannot be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ltv {
    Ratio(U256),
    Unavailable,
}

impl Ltv {
    /// `debt * 1e18 * 1e18 / (coll * price)`, truncating.
    pub fn compute(debt: U256, coll: U256, price: Option<U256>) -> Self {
        let Some(price) = price else {
            return Self::Unavailable;
        };
        let Some(denominator) = coll.checked_mul(price) else {
            return Self::Unavailable;
        };
        if denominator.is_zero() {
            return Self::Unavailable;
        }
        match debt.checked_mul(WAD).and_then(|v| v.checked_mul(WAD)) {
            Some(numerator) => Self::Ratio(numerator / denominator),
            None => Self::Unavailable,
        }
    }

    pub fn ratio(&self) -> Option<U256> {
        match self {
            Self::Ratio(r) => Some(*r),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for Ltv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ratio(r) => write!(f, "{:.2}%", wad_to_f64(*r) * 100.0),
            Self::Unavailable => f.write_str("n/a"),
        }
    }
}

/// Everything needed to price an asset at a block.
#[derive(Debug, Clone, Copy)]
pub struct PriceOracle<'a> {
    pub registry: &'a AssetRegistry,
    pub caches: &'a PriceCacheManager,
    /// Wrapped-token rates from the last daily snapshot, by asset label
    pub exchange_rates: &'a BTreeMap<String, U256>,
}

impl<'a> PriceOracle<'a> {
    /// Feed answer before `block`, scaled to 18 decimals.
    fn feed_price(&self, asset: &TrackedAsset, block: u64) -> Option<U256> {
        let sample = self.caches.nearest_prior(&asset.label, block)?;
        scale_to_wad(sample.positive_answer()?, asset.feed_decimals)
    }

    /// USD price of one unit of `asset` (18 decimals) as of the last oracle
    /// update strictly before `block`.
    pub fn usd_price(&self, asset: &TrackedAsset, block: u64) -> Option<U256> {
        let scaled = self.feed_price(asset, block)?;
        match &asset.conversion {
            PriceConversion::Usd => Some(scaled),
            PriceConversion::ViaAsset { quote } => {
                let quote_asset = self.registry.get(quote)?;
                let quote_usd = self.feed_price(quote_asset, block)?;
                wad_mul(scaled, quote_usd)
            }
            PriceConversion::ViaExchangeRate { .. } => {
                let rate = self.exchange_rates.get(&asset.label)?;
                wad_mul(scaled, *rate)
            }
        }
    }

    pub fn ltv(&self, asset: &TrackedAsset, debt: U256, coll: U256, block: u64) -> Ltv {
        Ltv::compute(debt, coll, self.usd_price(asset, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::test_support::asset;
    use crate::price_cache::{PriceCache, PriceSample};
    use alloy::primitives::I256;

    fn wad(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    fn cache(samples: &[(u64, i128)]) -> PriceCache {
        PriceCache::from_samples(
            samples
                .iter()
                .map(|&(block, answer)| PriceSample {
                    block_number: block,
                    timestamp: 0,
                    answer: I256::try_from(answer).unwrap(),
                    round_id: U256::ZERO,
                })
                .collect(),
            0,
        )
    }

    fn registry() -> AssetRegistry {
        let mut reth = asset(
            "RETH",
            0x20,
            PriceConversion::ViaAsset {
                quote: "WETH".to_string(),
            },
        );
        reth.feed_decimals = 18;
        AssetRegistry::new(vec![
            asset("WETH", 0x10, PriceConversion::Usd),
            reth,
            asset(
                "WSTETH",
                0x30,
                PriceConversion::ViaExchangeRate {
                    rate_provider: alloy::primitives::Address::repeat_byte(0x40),
                },
            ),
        ])
        .unwrap()
    }

    fn caches() -> PriceCacheManager {
        let mut caches = PriceCacheManager::default();
        // ETH/USD $2000 then $2500 (8 decimals)
        caches.insert("WETH", cache(&[(100, 200_000_000_000), (200, 250_000_000_000)]));
        // RETH/ETH 1.1 (18 decimals)
        caches.insert("RETH", cache(&[(150, 1_100_000_000_000_000_000)]));
        // STETH/USD $2000
        caches.insert("WSTETH", cache(&[(100, 200_000_000_000)]));
        caches
    }

    #[test]
    fn test_ltv_formula() {
        // 1000 debt against 1 coll at $2000 -> 50%
        let ltv = Ltv::compute(wad(1000), wad(1), Some(wad(2000)));
        assert_eq!(ltv, Ltv::Ratio(WAD / U256::from(2u64)));
        assert_eq!(ltv.to_string(), "50.00%");

        // truncating division
        let ltv = Ltv::compute(U256::from(1u64), U256::from(3u64), Some(WAD));
        assert_eq!(ltv, Ltv::Ratio(WAD / U256::from(3u64)));
    }

    #[test]
    fn test_unavailable_iff_zero_value_or_missing_input() {
        let cases = [
            (wad(1), wad(0), Some(wad(2000))),
            (wad(1), wad(1), Some(U256::ZERO)),
            (wad(1), wad(1), None),
            (wad(0), wad(0), Some(wad(2000))),
        ];
        for (debt, coll, price) in cases {
            assert_eq!(Ltv::compute(debt, coll, price), Ltv::Unavailable);
        }

        for (debt, coll, price) in [(0u64, 1u64, 1u64), (5, 7, 11), (1_000_000, 3, 2_000)] {
            let expected = U256::from(debt) * WAD * WAD / (U256::from(coll) * U256::from(price));
            assert_eq!(
                Ltv::compute(U256::from(debt), U256::from(coll), Some(U256::from(price))),
                Ltv::Ratio(expected)
            );
        }
        assert_eq!(Ltv::compute(U256::MAX, wad(1), Some(wad(1))), Ltv::Unavailable);
        assert_eq!(Ltv::compute(wad(1), U256::MAX, Some(wad(2))), Ltv::Unavailable);
        assert_eq!(Ltv::Unavailable.to_string(), "n/a");
    }

    #[test]
    fn test_usd_price_conversions() {
        let registry = registry();
        let caches = caches();
        let mut rates = BTreeMap::new();
        rates.insert("WSTETH".to_string(), wad(12) / U256::from(10u64));
        let oracle = PriceOracle {
            registry: &registry,
            caches: &caches,
            exchange_rates: &rates,
        };

        let weth = registry.get("WETH").unwrap();
        assert_eq!(oracle.usd_price(weth, 100), None);
        assert_eq!(oracle.usd_price(weth, 101), Some(wad(2000)));
        assert_eq!(oracle.usd_price(weth, 201), Some(wad(2500)));

        // 1.1 ETH at $2000 (sample at 100, before 160)
        let reth = registry.get("RETH").unwrap();
        assert_eq!(oracle.usd_price(reth, 160), Some(wad(2200)));
        assert_eq!(oracle.usd_price(reth, 250), Some(wad(2750)));
        assert_eq!(oracle.usd_price(reth, 150), None);

        let wsteth = registry.get("WSTETH").unwrap();
        assert_eq!(oracle.usd_price(wsteth, 101), Some(wad(2400)));

        assert_eq!(
            oracle.ltv(weth, wad(1000), wad(1), 101),
            Ltv::Ratio(WAD / U256::from(2u64))
        );
    }

    #[test]
    fn test_missing_rate_or_non_positive_answer() {
        let registry = registry();
        let mut caches = caches();
        caches.insert("WETH", cache(&[(100, 0), (110, -5)]));
        let rates = BTreeMap::new();
        let oracle = PriceOracle {
            registry: &registry,
            caches: &caches,
            exchange_rates: &rates,
        };

        let weth = registry.get("WETH").unwrap();
        assert_eq!(oracle.usd_price(weth, 105), None);
        assert_eq!(oracle.ltv(weth, wad(1), wad(1), 120), Ltv::Unavailable);
        // quote asset unpriceable
        assert_eq!(oracle.usd_price(registry.get("RETH").unwrap(), 160), None);
        // no exchange-rate snapshot
        assert_eq!(oracle.usd_price(registry.get("WSTETH").unwrap(), 101), None);
    }
}
