//! Persistent-store capabilities. Implementations are expected to be
//! concurrency-safe; the observer calls them from multiple tasks.

use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;
use eyre::Result;

use crate::{AnchorRecord, AnchoredOperation};

/// Store of observed anchor records, keyed by transaction number.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait TransactionStore: Send + Sync + Debug {
    /// Insert (or overwrite, keyed by transaction number) one record.
    async fn add_transaction(&self, record: AnchorRecord) -> Result<()>;

    /// The record with the greatest transaction number, if any.
    async fn get_last_transaction(&self) -> Result<Option<AnchorRecord>>;

    /// Delete every record with transaction number strictly greater than
    /// `transaction_number`; `None` deletes everything.
    async fn remove_transactions_later_than(&self, transaction_number: Option<u64>) -> Result<()>;

    /// An exponentially spaced sample of past records: indices 1, 2, 4,
    /// 8, ... from the tail, newest first. Fed to the reorg probe.
    async fn get_exponentially_spaced_transactions(&self) -> Result<Vec<AnchorRecord>>;
}

/// Store of DID operations extracted from resolved anchors.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait OperationStore: Send + Sync + Debug {
    /// Insert a batch, replacing rows with the same
    /// `(did_suffix, transaction_number, operation_index)` key.
    async fn insert_or_replace(&self, operations: &[AnchoredOperation]) -> Result<()>;

    /// Delete every operation sourced from a transaction number strictly
    /// greater than `transaction_number`; `None` deletes everything.
    async fn delete(&self, transaction_number: Option<u64>) -> Result<()>;

    /// Prune update operations older than the given transaction number.
    /// Commitment-chain compaction; never called during a reorg rewind.
    async fn delete_updates_earlier_than(&self, transaction_number: u64) -> Result<()>;
}

/// Store of anchor records whose off-chain data could not be fetched yet.
/// The store owns the due-for-retry policy (exponential backoff with an
/// attempt counter); the observer only drives the sweep.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait UnresolvableTransactionStore: Send + Sync + Debug {
    /// Record one more failed fetch attempt for `record`, scheduling the
    /// next retry per the store's backoff policy.
    async fn record_unresolvable_transaction_fetch_attempt(
        &self,
        record: &AnchorRecord,
    ) -> Result<()>;

    /// Drop `record` from the retry set (it resolved, or was reorged away).
    async fn remove_unresolvable_transaction(&self, record: &AnchorRecord) -> Result<()>;

    /// Records whose next retry time has passed.
    async fn get_unresolvable_transactions_due_for_retry(
        &self,
        max_count: usize,
    ) -> Result<Vec<AnchorRecord>>;

    /// Delete every entry with transaction number strictly greater than
    /// `transaction_number`; `None` deletes everything.
    async fn remove_unresolvable_transactions_later_than(
        &self,
        transaction_number: Option<u64>,
    ) -> Result<()>;
}
