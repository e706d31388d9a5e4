//! Chain-side capabilities. The observer never reaches into a concrete
//! client; it binds to behavior through these traits so that transports can
//! be swapped without touching the sync machinery.

use std::fmt::Debug;
use std::ops::RangeInclusive;

use async_trait::async_trait;
use auto_impl::auto_impl;
use primitive_types::{H160, H256};

use crate::{AnchorLog, AnchorRecord, BlockPointer, ChainResult, Cursor, ReadResult};

/// Topic / indexed-argument filter passed through to the log transport
/// untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Restrict to anchors from one writer.
    pub writer: Option<H160>,
    /// Additional raw topics, transport-interpreted.
    pub topics: Vec<H256>,
}

/// Options for an explicit-range read.
#[derive(Clone, Debug, Default)]
pub struct GetRangeOptions {
    /// Skip the block-header lookup that annotates records with a
    /// wall-clock timestamp; faster.
    pub omit_timestamp: bool,
    /// Pass-through log filter.
    pub filter: Option<LogFilter>,
}

/// Transport collaborator beneath the chain reader: raw RPC plumbing that
/// yields already-ABI-decoded anchor logs and block metadata.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait AnchorLogSource: Send + Sync + Debug {
    /// The latest block the transport considers settled.
    async fn latest_block(&self) -> ChainResult<BlockPointer>;

    /// Hash of the block at `height`, if the transport knows it.
    async fn block_hash(&self, height: u64) -> ChainResult<Option<H256>>;

    /// Header timestamp of the block at `height`.
    async fn block_timestamp(&self, height: u64) -> ChainResult<Option<u64>>;

    /// Height of the block with the given hash on the canonical chain, or
    /// `None` if the hash is no longer (or never was) canonical.
    async fn block_number_by_hash(&self, hash: H256) -> ChainResult<Option<u64>>;

    /// Fetch anchor logs emitted between the bounds, inclusive. Order is
    /// transport-defined; the chain reader sorts.
    async fn fetch_logs(
        &self,
        range: RangeInclusive<u64>,
        filter: Option<&LogFilter>,
    ) -> ChainResult<Vec<AnchorLog>>;

    /// Whether the anchor contract has code at the given height. Used only
    /// by the deployment-block binary search fallback.
    async fn code_exists_at(&self, height: u64) -> ChainResult<bool>;
}

/// The chain-client capability the observer consumes.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait LedgerReader: Send + Sync + Debug {
    /// Current chain tip.
    async fn latest_time(&self) -> ChainResult<BlockPointer>;

    /// Cursor-driven incremental read. `None` starts from the contract
    /// deployment. Returns `LedgerError::InvalidCursor` when the cursor
    /// hash no longer matches the chain at its height.
    async fn read(&self, cursor: Option<Cursor>) -> ChainResult<ReadResult>;

    /// Explicit-range read, chronological by transaction number.
    async fn get_range(
        &self,
        from_block: u64,
        to_block: u64,
        opts: GetRangeOptions,
    ) -> ChainResult<Vec<AnchorRecord>>;

    /// Reorg probe: the first record in `candidates` whose
    /// `(transaction_time, transaction_time_hash)` still matches the chain.
    /// Callers pass candidates newest first.
    async fn first_valid_record(
        &self,
        candidates: &[AnchorRecord],
    ) -> ChainResult<Option<AnchorRecord>>;

    /// Height of the block with the given hash, if still canonical.
    async fn block_number_by_hash(&self, hash: H256) -> ChainResult<Option<u64>>;
}
