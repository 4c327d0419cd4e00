//! RPC capability used by the monitor, and its alloy implementation.
//!
//! Providers are built per call from the HTTP url, which keeps
//! `AlloyChainClient` cheap to clone and free of connection state.

use std::sync::Arc;

use alloy::eips::BlockId;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::contracts::{IAggregatorProxy, IWstEth};
use crate::error::ChainError;
use crate::events::{decode_log, EventKind, RawEvent};

/// One `eth_getLogs` request: a single contract, a set of event kinds and an
/// inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub kinds: Vec<EventKind>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogQuery {
    pub fn new(address: Address, kinds: &[EventKind], from_block: u64, to_block: u64) -> Self {
        Self {
            address,
            kinds: kinds.to_vec(),
            from_block,
            to_block,
        }
    }

    pub fn topics(&self) -> Vec<B256> {
        self.kinds.iter().map(EventKind::signature).collect()
    }
}

/// Read-only chain access.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Decoded logs matching the query, in the order the node returned them.
    async fn get_logs(&self, query: LogQuery) -> Result<Vec<RawEvent>, ChainError>;

    /// Block time in seconds.
    async fn block_timestamp(&self, block: u64) -> Result<u64, ChainError>;

    /// Current head block.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Wrapped-token exchange rate (underlying per wrapped token, 18 decimals)
    /// read at `block`.
    async fn exchange_rate(&self, contract: Address, block: u64) -> Result<U256, ChainError>;

    /// Aggregator currently behind a Chainlink feed proxy.
    async fn feed_aggregator(&self, proxy: Address) -> Result<Address, ChainError>;
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    async fn get_logs(&self, query: LogQuery) -> Result<Vec<RawEvent>, ChainError> {
        (**self).get_logs(query).await
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, ChainError> {
        (**self).block_timestamp(block).await
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        (**self).block_number().await
    }

    async fn exchange_rate(&self, contract: Address, block: u64) -> Result<U256, ChainError> {
        (**self).exchange_rate(contract, block).await
    }

    async fn feed_aggregator(&self, proxy: Address) -> Result<Address, ChainError> {
        (**self).feed_aggregator(proxy).await
    }
}

/// [`ChainClient`] over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct AlloyChainClient {
    rpc_url: String,
}

impl AlloyChainClient {
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, ChainError> {
        let rpc_url = rpc_url.into();
        rpc_url
            .parse::<alloy::transports::http::reqwest::Url>()
            .map_err(|_| ChainError::InvalidUrl(rpc_url.clone()))?;
        Ok(Self { rpc_url })
    }

    /// Construct and verify the endpoint answers.
    pub async fn connect(rpc_url: impl Into<String>) -> Result<Self, ChainError> {
        let client = Self::new(rpc_url)?;
        let head = client.block_number().await?;
        info!(url = %client.rpc_url, head, "RPC connection verified");
        Ok(client)
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    fn url(&self) -> Result<alloy::transports::http::reqwest::Url, ChainError> {
        self.rpc_url
            .parse()
            .map_err(|_| ChainError::InvalidUrl(self.rpc_url.clone()))
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn get_logs(&self, query: LogQuery) -> Result<Vec<RawEvent>, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        let filter = Filter::new()
            .address(query.address)
            .event_signature(query.topics())
            .from_block(query.from_block)
            .to_block(query.to_block);

        let logs = provider
            .get_logs(&filter)
            .await
            .map_err(|e| ChainError::rpc("eth_getLogs", e))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            if let Some(event) = decode_log(log)? {
                events.push(event);
            }
        }

        debug!(
            address = %query.address,
            from = query.from_block,
            to = query.to_block,
            logs = logs.len(),
            decoded = events.len(),
            "Fetched logs"
        );
        Ok(events)
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        let header = provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .map_err(|e| ChainError::rpc("eth_getBlockByNumber", e))?
            .ok_or(ChainError::BlockNotFound(block))?;
        Ok(header.header.timestamp)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::rpc("eth_blockNumber", e))
    }

    async fn exchange_rate(&self, contract: Address, block: u64) -> Result<U256, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        let token = IWstEth::new(contract, &provider);
        let rate = token
            .stEthPerToken()
            .block(BlockId::number(block))
            .call()
            .await
            .map_err(|e| ChainError::rpc("stEthPerToken", e))?;
        Ok(rate._0)
    }

    async fn feed_aggregator(&self, proxy: Address) -> Result<Address, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        let feed = IAggregatorProxy::new(proxy, &provider);
        let aggregator = feed
            .aggregator()
            .call()
            .await
            .map_err(|e| ChainError::rpc("aggregator", e))?;
        Ok(aggregator._0)
    }
}
