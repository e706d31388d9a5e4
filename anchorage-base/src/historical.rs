use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tokio::time::sleep;
use tracing::{info, warn};

use anchorage_core::{
    GetRangeOptions, LedgerReader, SyncPhase, TransactionStore, UnresolvableTransactionStore,
    VersionManager,
};

use crate::{fmt_catch_up_time, CatchUpEtaCalculator, ObserverMetrics, PaginatedReader, SyncTracker};

/// Time window for the moving average used in the eta calculator.
const ETA_TIME_WINDOW: f64 = 2. * 60.;

/// Knobs of the historical walk.
#[derive(Clone, Copy, Debug)]
pub struct HistoricalSyncConfig {
    /// Blocks per batch.
    pub batch_size: u64,
    /// Sleep between batches, so catch-up does not starve the RPC
    /// endpoint.
    pub rate_limit_delay: Duration,
}

/// Walks `[deployment_block, target_block]` in rate-limited batches,
/// processing and persisting anchor records strictly in transaction-number
/// order. One-shot: once the walk reaches the target the tracker flips to
/// the live phase and `run` returns.
pub struct HistoricalSync {
    paginator: PaginatedReader<Arc<dyn LedgerReader>>,
    versions: Arc<dyn VersionManager>,
    transaction_store: Arc<dyn TransactionStore>,
    unresolvable_store: Arc<dyn UnresolvableTransactionStore>,
    tracker: Arc<SyncTracker>,
    metrics: ObserverMetrics,
    stop: Arc<AtomicBool>,
    config: HistoricalSyncConfig,
}

impl HistoricalSync {
    /// Wire up a walk over the given collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        paginator: PaginatedReader<Arc<dyn LedgerReader>>,
        versions: Arc<dyn VersionManager>,
        transaction_store: Arc<dyn TransactionStore>,
        unresolvable_store: Arc<dyn UnresolvableTransactionStore>,
        tracker: Arc<SyncTracker>,
        metrics: ObserverMetrics,
        stop: Arc<AtomicBool>,
        config: HistoricalSyncConfig,
    ) -> Self {
        Self {
            paginator,
            versions,
            transaction_store,
            unresolvable_store,
            tracker,
            metrics,
            stop,
            config,
        }
    }

    /// Run the walk to completion (or until the stop flag is raised).
    ///
    /// A fatal processor error aborts with the already-persisted prefix
    /// intact; the next start resumes from it via cursor recovery.
    pub async fn run(&self) -> Result<()> {
        // Batches overlap by one block at each boundary; records at or
        // below the last seen number are skipped instead of re-processed.
        let mut last_seen = self
            .transaction_store
            .get_last_transaction()
            .await?
            .map(|record| record.transaction_number);

        let start = self.tracker.snapshot();
        let mut eta =
            CatchUpEtaCalculator::new(start.last_synced_block, start.target_block, ETA_TIME_WINDOW);
        info!(
            from = start.last_synced_block,
            target = start.target_block,
            "starting historical sync"
        );

        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested; leaving historical sync");
                return Ok(());
            }

            let state = self.tracker.snapshot();
            if state.last_synced_block >= state.target_block {
                self.tracker.update(|s| {
                    s.phase = SyncPhase::Live;
                    s.is_complete = true;
                });
                info!(
                    target = state.target_block,
                    "historical sync complete; switching to live processing"
                );
                return Ok(());
            }

            let from = state.last_synced_block;
            let to = u64::min(
                from.saturating_add(self.config.batch_size),
                state.target_block,
            );
            let records = self
                .paginator
                .fetch_range(from, to, GetRangeOptions::default())
                .await
                .wrap_err("historical range fetch failed")?;

            for record in records {
                if last_seen.is_some_and(|seen| record.transaction_number <= seen) {
                    continue;
                }
                let number = record.transaction_number;
                let processor = self.versions.transaction_processor(record.transaction_time);
                match processor.process_transaction(&record).await {
                    Ok(true) => {
                        self.transaction_store.add_transaction(record).await?;
                        self.metrics.stored_transactions.inc();
                    }
                    Ok(false) => {
                        warn!(
                            transaction_number = number,
                            "anchor data unresolvable; recorded for retry"
                        );
                        self.unresolvable_store
                            .record_unresolvable_transaction_fetch_attempt(&record)
                            .await?;
                        self.metrics.unresolvable_attempts.inc();
                    }
                    Err(err) => {
                        return Err(
                            err.wrap_err(format!("fatal processing failure at transaction {number}"))
                        );
                    }
                }
                last_seen = Some(number);
            }

            self.tracker.update(|s| s.last_synced_block = to);
            self.metrics.last_synced_block.set(to as i64);
            self.metrics.target_block.set(state.target_block as i64);
            let snapshot = self.tracker.snapshot();
            let estimate = eta.calculate(to, snapshot.target_block);
            info!(
                last_synced_block = to,
                target_block = snapshot.target_block,
                percent = format!("{:.1}", snapshot.progress() * 100.0),
                eta = %fmt_catch_up_time(estimate),
                "historical sync progress"
            );

            sleep(self.config.rate_limit_delay).await;
        }
    }
}
