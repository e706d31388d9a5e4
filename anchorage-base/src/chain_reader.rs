use std::collections::HashMap;
use std::ops::RangeInclusive;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use anchorage_core::{
    AnchorLogSource, AnchorRecord, BlockPointer, ChainResult, Cursor, GetRangeOptions,
    LedgerError, LedgerReader, ReadResult, H256,
};

/// Configuration for an [`AnchorEventReader`].
#[derive(Clone, Copy, Debug)]
pub struct ChainReaderConfig {
    /// Window width of one incremental `read` scan.
    pub default_batch_size: u64,
    /// Widest range a single `get_range` should see; wider requests log a
    /// range-too-large advisory and still proceed.
    pub max_batch_size: u64,
    /// Block the anchor contract was deployed at. Resolved by binary
    /// search when not configured.
    pub contract_deployment_block: Option<u64>,
}

/// Reads anchor records out of the contract's event log.
///
/// Sits on top of an [`AnchorLogSource`] transport and owns record
/// ordering, anchor-string encoding, cursor validation, and the reorg
/// probe. No persistent state.
#[derive(Debug)]
pub struct AnchorEventReader<S> {
    source: S,
    default_batch_size: u64,
    max_batch_size: u64,
    deployment_block: u64,
}

impl<S> AnchorEventReader<S>
where
    S: AnchorLogSource,
{
    /// Construct a reader, binary-searching the deployment block when the
    /// operator did not configure one.
    pub async fn new(source: S, config: ChainReaderConfig) -> ChainResult<Self> {
        let deployment_block = match config.contract_deployment_block {
            Some(block) => block,
            None => Self::find_deployment_block(&source).await?,
        };
        Ok(Self {
            source,
            default_batch_size: config.default_batch_size,
            max_batch_size: config.max_batch_size,
            deployment_block,
        })
    }

    /// Block the anchor contract was deployed at.
    pub fn deployment_block(&self) -> u64 {
        self.deployment_block
    }

    /// Lowest block at which the anchor contract has code. O(log n) RPC
    /// probes; operator configuration is preferred.
    #[instrument(level = "debug", err, skip(source))]
    async fn find_deployment_block(source: &S) -> ChainResult<u64> {
        let tip = source.latest_block().await?.height;
        if !source.code_exists_at(tip).await? {
            return Err(LedgerError::Custom(
                "anchor contract has no code at the chain tip".to_owned(),
            ));
        }
        let (mut low, mut high) = (0u64, tip);
        while low < high {
            let mid = low + (high - low) / 2;
            if source.code_exists_at(mid).await? {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        debug!(deployment_block = low, "derived contract deployment block");
        Ok(low)
    }

    /// Fetch, order, and decode the logs of one block range.
    async fn fetch_sorted_records(
        &self,
        range: RangeInclusive<u64>,
        opts: &GetRangeOptions,
    ) -> ChainResult<Vec<AnchorRecord>> {
        let mut logs = self.source.fetch_logs(range, opts.filter.as_ref()).await?;
        // Block number then log index; the contract issues transaction
        // numbers in the same order.
        logs.sort();

        let mut timestamps: HashMap<u64, Option<u64>> = HashMap::new();
        let mut records = Vec::with_capacity(logs.len());
        for log in logs {
            let timestamp = if opts.omit_timestamp {
                None
            } else {
                match timestamps.get(&log.block_number) {
                    Some(known) => *known,
                    None => {
                        let fetched = self.source.block_timestamp(log.block_number).await?;
                        timestamps.insert(log.block_number, fetched);
                        fetched
                    }
                }
            };
            records.push(log.into_record(timestamp));
        }
        records.sort();
        Ok(records)
    }
}

#[async_trait]
impl<S> LedgerReader for AnchorEventReader<S>
where
    S: AnchorLogSource,
{
    async fn latest_time(&self) -> ChainResult<BlockPointer> {
        self.source.latest_block().await
    }

    #[instrument(level = "debug", err, skip(self))]
    async fn read(&self, cursor: Option<Cursor>) -> ChainResult<ReadResult> {
        let tip = self.source.latest_block().await?;
        let from = match cursor {
            Some(c) => self
                .source
                .block_number_by_hash(c.transaction_time_hash)
                .await?
                .ok_or(LedgerError::InvalidCursor {
                    transaction_number: c.transaction_number,
                    transaction_time_hash: c.transaction_time_hash,
                })?,
            None => self.deployment_block,
        };

        let to = u64::min(from.saturating_add(self.default_batch_size), tip.height);
        let mut transactions = self
            .fetch_sorted_records(from..=to, &GetRangeOptions::default())
            .await?;
        if let Some(c) = cursor {
            transactions.retain(|record| record.transaction_number > c.transaction_number);
        }

        Ok(ReadResult {
            more_transactions: to < tip.height,
            transactions,
        })
    }

    #[instrument(level = "debug", err, skip(self, opts))]
    async fn get_range(
        &self,
        from_block: u64,
        to_block: u64,
        opts: GetRangeOptions,
    ) -> ChainResult<Vec<AnchorRecord>> {
        if to_block < from_block {
            return Ok(Vec::new());
        }
        let span = to_block - from_block;
        if span > self.max_batch_size {
            // Advisory only; the transport may or may not cope.
            warn!(
                span,
                max = self.max_batch_size,
                "block range exceeds the configured maximum"
            );
        }
        self.fetch_sorted_records(from_block..=to_block, &opts).await
    }

    async fn first_valid_record(
        &self,
        candidates: &[AnchorRecord],
    ) -> ChainResult<Option<AnchorRecord>> {
        for candidate in candidates {
            let canonical = self
                .source
                .block_number_by_hash(candidate.transaction_time_hash)
                .await?;
            if canonical == Some(candidate.transaction_time) {
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    async fn block_number_by_hash(&self, hash: H256) -> ChainResult<Option<u64>> {
        self.source.block_number_by_hash(hash).await
    }
}
