use std::time::Duration;

use eyre::{ensure, Result};
use tokio::time::sleep;
use tracing::{debug, warn};

use anchorage_core::{AnchorRecord, ChainResult, GetRangeOptions, LedgerReader};

/// Pagination bounds for explicit-range reads.
#[derive(Clone, Copy, Debug)]
pub struct PaginationConfig {
    /// Width of one sub-range request.
    pub default_batch_size: u64,
    /// Widest range the underlying reader should ever see.
    pub max_batch_size: u64,
    /// Attempts per sub-range before the walk aborts.
    pub max_retries: u32,
    /// Base of the linear backoff between attempts.
    pub retry_delay: Duration,
}

/// Wraps a [`LedgerReader`] so that arbitrarily wide range requests become
/// sequences of bounded sub-range requests with per-range retry.
///
/// A sub-range whose final attempt fails aborts the walk with the last
/// error; everything already returned to the caller stays valid, so a
/// restart resumes from the persisted prefix.
#[derive(Debug)]
pub struct PaginatedReader<R> {
    reader: R,
    config: PaginationConfig,
}

impl<R> PaginatedReader<R>
where
    R: LedgerReader,
{
    /// Construct a paginator. `0 < default_batch_size <= max_batch_size`
    /// and at least one attempt are required.
    pub fn new(reader: R, config: PaginationConfig) -> Result<Self> {
        ensure!(
            config.default_batch_size > 0,
            "pagination default batch size must be positive"
        );
        ensure!(
            config.default_batch_size <= config.max_batch_size,
            "pagination default batch size {} exceeds maximum {}",
            config.default_batch_size,
            config.max_batch_size
        );
        ensure!(config.max_retries > 0, "at least one attempt is required");
        Ok(Self { reader, config })
    }

    /// Fetch `[from_block, to_block]` in chronological order.
    pub async fn fetch_range(
        &self,
        from_block: u64,
        to_block: u64,
        opts: GetRangeOptions,
    ) -> ChainResult<Vec<AnchorRecord>> {
        let mut records = Vec::new();
        let mut start = from_block;
        while start <= to_block {
            let end = u64::min(
                start.saturating_add(self.config.default_batch_size - 1),
                to_block,
            );
            debug!(start, end, "fetching anchor sub-range");
            records.extend(self.fetch_with_retry(start, end, &opts).await?);
            start = end + 1;
        }
        Ok(records)
    }

    async fn fetch_with_retry(
        &self,
        from_block: u64,
        to_block: u64,
        opts: &GetRangeOptions,
    ) -> ChainResult<Vec<AnchorRecord>> {
        let mut last_error = None;
        for attempt in 1..=self.config.max_retries {
            match self
                .reader
                .get_range(from_block, to_block, opts.clone())
                .await
            {
                Ok(records) => return Ok(records),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    warn!(
                        from_block,
                        to_block,
                        attempt,
                        error = %err,
                        "anchor sub-range fetch failed"
                    );
                    last_error = Some(err);
                    if attempt < self.config.max_retries {
                        sleep(self.config.retry_delay * attempt).await;
                    }
                }
            }
        }
        // max_retries >= 1 is enforced at construction, so at least one
        // attempt ran and recorded its error.
        Err(last_error.unwrap_or_else(|| {
            anchorage_core::LedgerError::Custom("range fetch made no attempts".to_owned())
        }))
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use anchorage_core::{LedgerError, H256};
    use anchorage_test::mocks::MockLedger;
    use mockall::Sequence;

    use super::*;

    fn config(default: u64, retries: u32) -> PaginationConfig {
        PaginationConfig {
            default_batch_size: default,
            max_batch_size: 10_000,
            max_retries: retries,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn rejects_degenerate_bounds() {
        assert!(PaginatedReader::new(MockLedger::new(), config(0, 3)).is_err());
        assert!(PaginatedReader::new(
            MockLedger::new(),
            PaginationConfig {
                default_batch_size: 100,
                max_batch_size: 10,
                max_retries: 3,
                retry_delay: Duration::from_millis(1),
            }
        )
        .is_err());
        assert!(PaginatedReader::new(MockLedger::new(), config(100, 0)).is_err());
    }

    #[tokio::test]
    async fn splits_wide_requests_into_contiguous_subranges() {
        let mut ledger = MockLedger::new();
        let mut seq = Sequence::new();
        for (from, to) in [(0u64, 999u64), (1_000, 1_999), (2_000, 2_500)] {
            ledger
                .expect__get_range()
                .times(1)
                .in_sequence(&mut seq)
                .withf(move |f, t| (*f, *t) == (from, to))
                .returning(|_, _| Ok(vec![]));
        }

        let paginator = PaginatedReader::new(ledger, config(1_000, 3)).unwrap();
        let records = paginator
            .fetch_range(0, 2_500, GetRangeOptions::default())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut ledger = MockLedger::new();
        let seen = calls.clone();
        ledger.expect__get_range().times(3).returning(move |_, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::RateLimited)
            } else {
                Ok(vec![])
            }
        });

        let paginator = PaginatedReader::new(ledger, config(1_000, 3)).unwrap();
        paginator
            .fetch_range(0, 500, GetRangeOptions::default())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_after_exhausting_retries() {
        let mut ledger = MockLedger::new();
        ledger
            .expect__get_range()
            .times(2)
            .returning(|_, _| Err(LedgerError::Timeout(10_000)));

        let paginator = PaginatedReader::new(ledger, config(1_000, 2)).unwrap();
        let err = paginator
            .fetch_range(0, 500, GetRangeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
    }

    #[tokio::test]
    async fn does_not_retry_invalid_cursor() {
        let mut ledger = MockLedger::new();
        ledger.expect__get_range().times(1).returning(|_, _| {
            Err(LedgerError::InvalidCursor {
                transaction_number: 3,
                transaction_time_hash: H256::zero(),
            })
        });

        let paginator = PaginatedReader::new(ledger, config(1_000, 5)).unwrap();
        let err = paginator
            .fetch_range(0, 500, GetRangeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCursor { .. }));
    }
}
