//! Range-limited log retrieval.

use alloy::primitives::Address;
use tracing::{debug, instrument};

use crate::error::ChainError;
use crate::events::{EventKind, RawEvent};
use crate::provider::{ChainClient, LogQuery};

/// Default span accepted by most public RPC endpoints.
pub const DEFAULT_CHUNK_SIZE: u64 = 1000;

/// Splits `eth_getLogs` requests into block spans the provider accepts.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedLogFetcher {
    chunk_size: u64,
}

impl Default for ChunkedLogFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedLogFetcher {
    /// A zero chunk size is treated as one block per request.
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Inclusive, non-overlapping spans covering `[from, to]`.
    pub fn spans(&self, from: u64, to: u64) -> Vec<(u64, u64)> {
        let mut spans = Vec::new();
        let mut start = from;
        while start <= to {
            let end = start.saturating_add(self.chunk_size - 1).min(to);
            spans.push((start, end));
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        spans
    }

    /// All matching logs in `[from, to]`, ascending by block then log index.
    ///
    /// A failed span fails the whole call.
    #[instrument(skip(self, client, kinds), fields(address = %address))]
    pub async fn fetch<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        address: Address,
        kinds: &[EventKind],
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, ChainError> {
        let spans = self.spans(from, to);
        let mut events = Vec::new();
        for &(start, end) in &spans {
            let mut chunk = client
                .get_logs(LogQuery::new(address, kinds, start, end))
                .await?;
            events.append(&mut chunk);
        }
        events.sort_by_key(RawEvent::position);

        debug!(from, to, chunks = spans.len(), events = events.len(), "Range fetched");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ProtocolEvent, Transfer};
    use crate::mock::MockChainClient;
    use alloy::primitives::{B256, U256};

    fn transfer(token: Address, block: u64, log_index: u64) -> RawEvent {
        RawEvent {
            contract: token,
            event: ProtocolEvent::Transfer(Transfer {
                from: Address::ZERO,
                to: Address::repeat_byte(1),
                value: U256::from(block),
            }),
            block_number: block,
            transaction_hash: B256::from(U256::from(block * 1000 + log_index).to_be_bytes::<32>()),
            log_index,
            timestamp: None,
        }
    }

    #[test]
    fn test_spans_cover_range_without_overlap() {
        let fetcher = ChunkedLogFetcher::new(1000);
        assert_eq!(
            fetcher.spans(100, 2600),
            vec![(100, 1099), (1100, 2099), (2100, 2600)]
        );
        assert_eq!(fetcher.spans(5, 5), vec![(5, 5)]);
        assert!(fetcher.spans(6, 5).is_empty());
    }

    #[test]
    fn test_zero_chunk_size() {
        let fetcher = ChunkedLogFetcher::new(0);
        assert_eq!(fetcher.spans(1, 3), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[tokio::test]
    async fn test_fetch_is_split_invariant() {
        let token = Address::repeat_byte(0xb0);
        let client = MockChainClient::new();
        for block in [10u64, 11, 250, 251, 999, 1000, 1001, 2047] {
            client.push_event(transfer(token, block, 1));
            client.push_event(transfer(token, block, 0));
        }
        client.push_event(transfer(Address::repeat_byte(2), 500, 0));

        let whole = ChunkedLogFetcher::new(10_000)
            .fetch(&client, token, EventKind::BOLD_TOKEN, 0, 3000)
            .await
            .unwrap();
        assert_eq!(whole.len(), 16);

        for chunk in [1u64, 7, 100, 1000, 2048] {
            let split = ChunkedLogFetcher::new(chunk)
                .fetch(&client, token, EventKind::BOLD_TOKEN, 0, 3000)
                .await
                .unwrap();
            assert_eq!(split, whole, "chunk size {chunk}");
        }

        let positions: Vec<_> = whole.iter().map(RawEvent::position).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[tokio::test]
    async fn test_span_failure_aborts() {
        let token = Address::repeat_byte(0xb0);
        let client = MockChainClient::new();
        client.push_event(transfer(token, 10, 0));
        client.fail_logs_at(1500);

        let result = ChunkedLogFetcher::new(1000)
            .fetch(&client, token, EventKind::BOLD_TOKEN, 0, 3000)
            .await;
        assert!(matches!(result, Err(ChainError::Rpc { .. })));
    }

    #[tokio::test]
    async fn test_respects_provider_range_limit() {
        let token = Address::repeat_byte(0xb0);
        let client = MockChainClient::new().with_max_log_range(1000);
        client.push_event(transfer(token, 4000, 0));

        assert!(ChunkedLogFetcher::new(5000)
            .fetch(&client, token, EventKind::BOLD_TOKEN, 0, 4999)
            .await
            .is_err());
        let events = ChunkedLogFetcher::new(1000)
            .fetch(&client, token, EventKind::BOLD_TOKEN, 0, 4999)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(client.log_calls(), 6);
    }
}
