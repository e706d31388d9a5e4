use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use auto_impl::auto_impl;
use eyre::Result;

use crate::AnchorRecord;

/// A protocol-version-specific transaction processor. Implementations
/// decode the anchor string, download the referenced index/chunk/proof
/// files from the CAS, and persist the extracted operations.
///
/// Return contract:
/// * `Ok(true)`: full success; the record may be consolidated.
/// * `Ok(false)`: logical failure (size limits, malformed deltas, content
///   missing after timeout); the record is unresolvable for now.
/// * `Err(_)`: fatal; the pipeline fences and re-derives its cursor.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait TransactionProcessor: Send + Sync + Debug {
    /// Process one anchor record.
    async fn process_transaction(&self, record: &AnchorRecord) -> Result<bool>;
}

/// Registry of protocol versions, banded by `transaction_time`. Decides
/// which processor handles a record and how many records from one block a
/// version admits per pass.
#[auto_impl(&, Box, Arc)]
pub trait VersionManager: Send + Sync + Debug {
    /// The processor whose version band covers `transaction_time`.
    fn transaction_processor(&self, transaction_time: u64) -> Arc<dyn TransactionProcessor>;

    /// Cap on records from a single block admitted for processing in one
    /// pass, for the version covering `transaction_time`.
    fn max_records_per_block(&self, transaction_time: u64) -> usize;
}
