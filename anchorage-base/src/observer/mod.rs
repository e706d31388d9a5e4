//! The live observer: a periodic, cursor-driven incremental reader with a
//! bounded concurrent processing pipeline, error fencing, and reorg
//! rollback. Drives the historical walk first when the sync-state machine
//! says the gap is too wide for incremental reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eyre::{eyre, Result};
use tokio::time::sleep;
use tracing::instrument::Instrumented;
use tracing::{debug, info, info_span, warn, Instrument};

use anchorage_core::{
    AnchorRecord, AtomicStatus, EventEmitter, LedgerError, LedgerReader, ObserverEvent,
    OperationStore, SyncPhase, SyncState, TransactionProcessor, TransactionStatus,
    TransactionStore, UnresolvableTransactionStore, VersionManager,
};

use crate::{
    resolve_start_state, run_all, HistoricalSync, HistoricalSyncConfig, ObserverMetrics,
    PaginatedReader, PaginationConfig, ProgressMonitor, SyncTracker,
};

use pending::{PendingQueue, PendingTransaction};

mod pending;

mod throughput;
pub use throughput::ThroughputLimiter;

/// Poll cadence for backpressure and drain waits.
const CAPACITY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How many unresolvable records one retry sweep pulls from the store.
const UNRESOLVABLE_RETRY_BATCH: usize = 100;

/// Cadence of the read-only progress monitor.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

/// Knobs of the observer lifecycle.
#[derive(Clone, Copy, Debug)]
pub struct ObserverConfig {
    /// Block the anchor contract was deployed at.
    pub contract_deployment_block: u64,
    /// Historical-walk batching and rate limiting.
    pub historical: HistoricalSyncConfig,
    /// Range splitting and retry policy for explicit-range reads.
    pub pagination: PaginationConfig,
    /// Bound on concurrently processing anchor records.
    pub max_concurrent_downloads: usize,
    /// Delay between live passes once the loop has drained.
    pub observing_interval: Duration,
}

/// The anchor observer. Constructed once, started with [`Observer::start`],
/// stopped cooperatively with [`Observer::stop`]; holds no global state.
pub struct Observer {
    ledger: Arc<dyn LedgerReader>,
    versions: Arc<dyn VersionManager>,
    transaction_store: Arc<dyn TransactionStore>,
    operation_store: Arc<dyn OperationStore>,
    unresolvable_store: Arc<dyn UnresolvableTransactionStore>,
    events: Arc<dyn EventEmitter>,
    metrics: ObserverMetrics,
    limiter: ThroughputLimiter,
    pending: PendingQueue,
    /// Most recently admitted record; the read cursor between passes.
    /// Cleared by fences and reorgs so the next pass re-derives it from
    /// the transaction store.
    last_known: Mutex<Option<AnchorRecord>>,
    tracker: Arc<SyncTracker>,
    stop: Arc<AtomicBool>,
    config: ObserverConfig,
}

impl Observer {
    /// Wire up an observer over its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        versions: Arc<dyn VersionManager>,
        transaction_store: Arc<dyn TransactionStore>,
        operation_store: Arc<dyn OperationStore>,
        unresolvable_store: Arc<dyn UnresolvableTransactionStore>,
        events: Arc<dyn EventEmitter>,
        metrics: ObserverMetrics,
        config: ObserverConfig,
    ) -> Result<Self> {
        eyre::ensure!(
            config.max_concurrent_downloads >= 1,
            "at least one concurrent download is required"
        );
        let tracker = Arc::new(SyncTracker::new(SyncState {
            phase: SyncPhase::Historical,
            last_synced_block: config.contract_deployment_block,
            target_block: config.contract_deployment_block,
            contract_deployment_block: config.contract_deployment_block,
            is_complete: false,
        }));
        Ok(Self {
            ledger,
            limiter: ThroughputLimiter::new(versions.clone()),
            versions,
            transaction_store,
            operation_store,
            unresolvable_store,
            events,
            metrics,
            pending: PendingQueue::default(),
            last_known: Mutex::new(None),
            tracker,
            stop: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Read-only view of sync progress, for operators watching for stalls.
    pub fn sync_state(&self) -> SyncState {
        self.tracker.snapshot()
    }

    /// Request a cooperative shutdown. Both loops exit between batches;
    /// in-flight processing tasks are allowed to finish.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Spawn the observer lifecycle alongside its progress monitor. The
    /// returned handle resolves when the observer stops (or fails fatally
    /// during historical catch-up).
    pub fn start(self: Arc<Self>) -> Instrumented<tokio::task::JoinHandle<Result<()>>> {
        let monitor =
            ProgressMonitor::new(self.tracker.clone(), self.metrics.clone(), PROGRESS_INTERVAL)
                .spawn();
        let observer = self;
        let main = tokio::spawn(async move { observer.run().await })
            .instrument(info_span!("ObserverLoop"));
        run_all(vec![main, monitor])
    }

    /// Resolve the start state, catch up historically if needed, then poll
    /// live until stopped.
    async fn run(&self) -> Result<()> {
        let resolved = resolve_start_state(
            &self.ledger,
            &self.transaction_store,
            self.config.contract_deployment_block,
            self.config.historical.batch_size,
        )
        .await?;
        self.tracker.update(|state| *state = resolved);

        if resolved.phase == SyncPhase::Historical {
            let paginator = PaginatedReader::new(self.ledger.clone(), self.config.pagination)?;
            let historical = HistoricalSync::new(
                paginator,
                self.versions.clone(),
                self.transaction_store.clone(),
                self.unresolvable_store.clone(),
                self.tracker.clone(),
                self.metrics.clone(),
                self.stop.clone(),
                self.config.historical,
            );
            historical.run().await?;
        }

        self.run_live().await;
        Ok(())
    }

    /// The periodic live loop. Exits only on the stop flag.
    async fn run_live(&self) {
        info!(
            interval = ?self.config.observing_interval,
            "starting live transaction processing"
        );
        loop {
            if self.stopped() {
                break;
            }
            self.observe().await;
            if self.stopped() {
                break;
            }
            sleep(self.config.observing_interval).await;
        }
        // Let in-flight work settle so the stores stay consistent across a
        // shutdown.
        self.drain_in_flight().await;
        if let Err(err) = self.consolidate().await {
            warn!(error = ?err, "final consolidation failed during shutdown");
        }
        info!("live transaction processing stopped");
    }

    /// One scheduled pass, with outcome accounting. Never propagates: a
    /// failed pass is retried on the next tick without advancing the
    /// cursor.
    async fn observe(&self) {
        match self.process_transactions().await {
            Ok(()) => {
                self.metrics.loop_runs.with_label_values(&["success"]).inc();
                self.events.emit(ObserverEvent::LoopSuccess);
            }
            Err(err) => {
                warn!(error = ?err, "live pass failed; will retry on the next tick");
                self.metrics.loop_runs.with_label_values(&["failure"]).inc();
                self.events.emit(ObserverEvent::LoopFailure {
                    reason: format!("{err:#}"),
                });
            }
        }
    }

    /// One live pass: iterate while the chain reports more work or a reorg
    /// forced a re-read, then sweep unresolvable records due for retry.
    async fn process_transactions(&self) -> Result<()> {
        let mut keep_going = true;
        while keep_going && !self.stopped() {
            keep_going = self.process_new_transactions().await?;
        }
        // Settle the pass before sweeping: retried records must never race
        // their first attempt, and an error that surfaced after the last
        // fence check must not survive into the next pass's read.
        self.drain_in_flight().await;
        if self.pending.has_error() {
            self.fence().await?;
        } else {
            self.consolidate().await?;
        }
        self.retry_unresolvable_transactions().await?;
        Ok(())
    }

    /// One iteration of the live state machine: consolidate, read, admit,
    /// backpressure, error fence, reorg handling. Returns whether another
    /// iteration should run immediately.
    async fn process_new_transactions(&self) -> Result<bool> {
        self.consolidate().await?;

        let cursor_record = self.cursor_record().await?;
        let cursor = cursor_record.as_ref().map(AnchorRecord::cursor);

        match self.ledger.read(cursor).await {
            Ok(result) => {
                let fetched = result.transactions.len();
                let mut admitted = self.limiter.admit(result.transactions);
                admitted.sort();
                if fetched > 0 {
                    debug!(fetched, admitted = admitted.len(), "admitting anchor records");
                }
                for record in admitted {
                    self.wait_for_capacity().await;
                    self.spawn_processing(record, true);
                }
                self.wait_for_capacity().await;

                if self.pending.has_error() {
                    self.fence().await?;
                }
                Ok(result.more_transactions)
            }
            Err(LedgerError::InvalidCursor { .. }) => {
                let Some(stale) = cursor_record else {
                    return Err(eyre!("ledger reported an invalid cursor for a genesis read"));
                };
                let tip = self.ledger.latest_time().await?;
                if stale.transaction_time <= tip.height {
                    self.handle_reorg().await?;
                    Ok(true)
                } else {
                    // The chain client has fallen behind the blocks we have
                    // already seen; nothing can be validated or rewound yet.
                    info!(
                        cursor_time = stale.transaction_time,
                        tip = tip.height,
                        "chain client behind the cursor; idling"
                    );
                    Ok(false)
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Step 1: persist every consecutive head `Processed` entry, in order.
    /// An entry leaves the queue only after its record is safely stored.
    async fn consolidate(&self) -> Result<()> {
        while let Some(record) = self.pending.peek_processed() {
            self.transaction_store.add_transaction(record).await?;
            self.pending.pop_head();
            self.metrics.stored_transactions.inc();
        }
        self.metrics.pending_transactions.set(self.pending.len() as i64);
        Ok(())
    }

    /// The record the next read resumes after: the most recently admitted
    /// one, falling back to the last persisted record.
    async fn cursor_record(&self) -> Result<Option<AnchorRecord>> {
        if let Some(record) = self.last_known.lock().unwrap().clone() {
            return Ok(Some(record));
        }
        let last = self.transaction_store.get_last_transaction().await?;
        if let Some(record) = &last {
            *self.last_known.lock().unwrap() = Some(record.clone());
        }
        Ok(last)
    }

    /// Append one record to the under-processing sequence and spawn its
    /// processing task.
    fn spawn_processing(&self, record: AnchorRecord, advance_cursor: bool) {
        let status = Arc::new(AtomicStatus::new());
        let processor = self.versions.transaction_processor(record.transaction_time);
        let unresolvable_store = self.unresolvable_store.clone();
        let metrics = self.metrics.clone();
        let task_record = record.clone();
        let task_status = status.clone();
        let handle = tokio::spawn(async move {
            process_transaction(processor, unresolvable_store, metrics, task_record, task_status)
                .await;
        });

        if advance_cursor {
            *self.last_known.lock().unwrap() = Some(record.clone());
        }
        self.pending.push(PendingTransaction::new(record, status, handle));
        self.metrics.pending_transactions.set(self.pending.len() as i64);
    }

    /// Step 4: hold the loop while the processing pipeline is saturated,
    /// polling at one-second intervals.
    async fn wait_for_capacity(&self) {
        while self.pending.in_flight() >= self.config.max_concurrent_downloads {
            sleep(CAPACITY_POLL_INTERVAL).await;
        }
    }

    async fn drain_in_flight(&self) {
        while self.pending.in_flight() > 0 {
            sleep(CAPACITY_POLL_INTERVAL).await;
        }
    }

    /// Step 5: a failed prerequisite fences the pipeline. Drain all
    /// in-flight work, persist the clean prefix, then discard the rest
    /// along with the cursor so the next iteration re-derives its position
    /// from storage. No gap can be introduced by racing past the failure.
    async fn fence(&self) -> Result<()> {
        warn!("processing error detected; fencing the pipeline");
        self.drain_in_flight().await;
        self.consolidate().await?;
        let discarded = self.pending.clear();
        if discarded > 0 {
            warn!(discarded, "discarded entries queued past a failed transaction");
        }
        *self.last_known.lock().unwrap() = None;
        self.metrics.pending_transactions.set(0);
        Ok(())
    }

    /// Step 6 and the rewind: quiesce in-flight work, probe for the
    /// deepest still-valid anchor, and roll derived stores back to it.
    /// Deletion order (operations, then unresolvables, then transactions)
    /// keeps an interruption mid-rewind recoverable: operations without a
    /// transaction are re-derivable, the converse is not.
    async fn handle_reorg(&self) -> Result<()> {
        warn!("chain reorganization detected; rewinding derived state");
        self.metrics.reorgs.inc();
        self.events.emit(ObserverEvent::BlockReorganization);

        self.drain_in_flight().await;
        self.pending.clear();
        self.metrics.pending_transactions.set(0);

        let sample = self
            .transaction_store
            .get_exponentially_spaced_transactions()
            .await?;
        let valid = self.ledger.first_valid_record(&sample).await?;
        let valid_number = valid.as_ref().map(|record| record.transaction_number);
        info!(?valid_number, "rolling back past the reorganized suffix");

        self.operation_store.delete(valid_number).await?;
        self.unresolvable_store
            .remove_unresolvable_transactions_later_than(valid_number)
            .await?;
        self.transaction_store
            .remove_transactions_later_than(valid_number)
            .await?;

        *self.last_known.lock().unwrap() = None;
        Ok(())
    }

    /// Step 7's sweep: push unresolvable records due for retry through the
    /// same under-processing discipline and wait for them to settle before
    /// the next scheduled pass. Retried records never move the cursor.
    async fn retry_unresolvable_transactions(&self) -> Result<()> {
        let due = self
            .unresolvable_store
            .get_unresolvable_transactions_due_for_retry(UNRESOLVABLE_RETRY_BATCH)
            .await?;
        if due.is_empty() {
            return Ok(());
        }
        info!(count = due.len(), "retrying unresolvable transactions");
        for record in due {
            self.wait_for_capacity().await;
            self.spawn_processing(record, false);
        }
        self.drain_in_flight().await;
        if self.pending.has_error() {
            self.fence().await?;
        } else {
            self.consolidate().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Body of one processing task. Owns the status cell: every exit path
/// reports an outcome so the consolidator never waits on a ghost.
async fn process_transaction(
    processor: Arc<dyn TransactionProcessor>,
    unresolvable_store: Arc<dyn UnresolvableTransactionStore>,
    metrics: ObserverMetrics,
    record: AnchorRecord,
    status: Arc<AtomicStatus>,
) {
    match processor.process_transaction(&record).await {
        Ok(true) => {
            // Best-effort: the record may never have been unresolvable.
            if let Err(err) = unresolvable_store
                .remove_unresolvable_transaction(&record)
                .await
            {
                debug!(
                    error = ?err,
                    transaction_number = record.transaction_number,
                    "could not clear unresolvable entry"
                );
            }
            status.store(TransactionStatus::Processed);
        }
        Ok(false) => {
            warn!(
                transaction_number = record.transaction_number,
                "anchor data unresolvable; recorded for retry"
            );
            match unresolvable_store
                .record_unresolvable_transaction_fetch_attempt(&record)
                .await
            {
                Ok(()) => {
                    metrics.unresolvable_attempts.inc();
                    status.store(TransactionStatus::Processed);
                }
                Err(err) => {
                    warn!(error = ?err, "unresolvable store rejected the fetch attempt");
                    status.store(TransactionStatus::Error);
                }
            }
        }
        Err(err) => {
            warn!(
                error = ?err,
                transaction_number = record.transaction_number,
                "transaction processing failed"
            );
            status.store(TransactionStatus::Error);
        }
    }
}

#[cfg(test)]
mod test {
    use anchorage_core::{
        AnchorLog, AnchoredData, BlockPointer, ContentAddressableStore, Cursor, FetchResult,
        FetchResultCode, ReadResult, H160, H256, U256,
    };
    use anchorage_test::mocks::{MockCas, MockLedger, RecordingEmitter};
    use anchorage_test::processors::{ProcessOutcome, ScriptedProcessor, StaticVersionManager};
    use anchorage_test::stores::{
        InMemoryOperationStore, InMemoryTransactionStore, InMemoryUnresolvableStore,
    };
    use mockall::Sequence;

    use super::*;

    fn hash(block: u64) -> H256 {
        H256::from_low_u64_be(block)
    }

    fn record(number: u64, block: u64) -> AnchorRecord {
        AnchorLog {
            anchor_file_hash: H256::repeat_byte(number as u8),
            number_of_operations: 2,
            transaction_number: number,
            writer: H160::zero(),
            transaction_fee_paid: U256::zero(),
            block_number: block,
            block_hash: hash(block),
            log_index: 0,
        }
        .into_record(None)
    }

    fn operation(number: u64) -> anchorage_core::AnchoredOperation {
        anchorage_core::AnchoredOperation {
            did_suffix: format!("did-{number}"),
            transaction_number: number,
            operation_index: 0,
            operation_buffer: vec![0xaa],
        }
    }

    fn config(max_concurrent_downloads: usize) -> ObserverConfig {
        ObserverConfig {
            contract_deployment_block: 0,
            historical: HistoricalSyncConfig {
                batch_size: 1_000,
                rate_limit_delay: Duration::from_millis(1),
            },
            pagination: PaginationConfig {
                default_batch_size: 1_000,
                max_batch_size: 10_000,
                max_retries: 3,
                retry_delay: Duration::from_millis(1),
            },
            max_concurrent_downloads,
            observing_interval: Duration::from_millis(10),
        }
    }

    struct Harness {
        observer: Observer,
        transactions: Arc<InMemoryTransactionStore>,
        operations: Arc<InMemoryOperationStore>,
        unresolvables: Arc<InMemoryUnresolvableStore>,
        emitter: Arc<RecordingEmitter>,
    }

    fn harness(
        ledger: MockLedger,
        processor: Arc<dyn TransactionProcessor>,
        max_records_per_block: usize,
        max_concurrent_downloads: usize,
    ) -> Harness {
        let transactions = Arc::new(InMemoryTransactionStore::default());
        let operations = Arc::new(InMemoryOperationStore::default());
        let unresolvables = Arc::new(InMemoryUnresolvableStore::default());
        let emitter = Arc::new(RecordingEmitter::default());

        let observer = Observer::new(
            Arc::new(ledger),
            Arc::new(StaticVersionManager::new(processor, max_records_per_block)),
            transactions.clone(),
            operations.clone(),
            unresolvables.clone(),
            emitter.clone(),
            ObserverMetrics::standalone(),
            config(max_concurrent_downloads),
        )
        .unwrap();

        Harness {
            observer,
            transactions,
            operations,
            unresolvables,
            emitter,
        }
    }

    #[tokio::test]
    async fn live_read_at_the_tip_is_quiet() {
        let mut ledger = MockLedger::new();
        ledger
            .expect__read()
            .times(1)
            .withf(|cursor| {
                *cursor
                    == Some(Cursor {
                        transaction_number: 2,
                        transaction_time_hash: hash(200),
                    })
            })
            .returning(|_| Ok(ReadResult::default()));

        let processor = Arc::new(ScriptedProcessor::new());
        let h = harness(ledger, processor.clone(), 100, 2);
        h.transactions
            .seed([record(0, 100), record(1, 150), record(2, 200)]);

        h.observer.observe().await;

        assert_eq!(h.emitter.events(), vec![ObserverEvent::LoopSuccess]);
        assert!(processor.processed().is_empty());
        assert_eq!(h.transactions.numbers(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn reorg_rewinds_every_derived_store() {
        let mut ledger = MockLedger::new();
        let mut seq = Sequence::new();
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|cursor| cursor.map(|c| c.transaction_number) == Some(10))
            .returning(|_| {
                Err(LedgerError::InvalidCursor {
                    transaction_number: 10,
                    transaction_time_hash: hash(20),
                })
            });
        ledger
            .expect__latest_time()
            .times(1)
            .returning(|| Ok(BlockPointer {
                height: 20,
                hash: hash(20),
            }));
        ledger
            .expect__first_valid_record()
            .times(1)
            .returning(|_| Ok(Some(record(7, 17))));
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|cursor| {
                *cursor
                    == Some(Cursor {
                        transaction_number: 7,
                        transaction_time_hash: hash(17),
                    })
            })
            .returning(|_| Ok(ReadResult::default()));

        let h = harness(ledger, Arc::new(ScriptedProcessor::new()), 100, 2);
        h.transactions
            .seed((0..=10).map(|n| record(n, 10 + n)));
        h.operations.seed((0..=10).map(operation));
        h.unresolvables.seed([record(9, 19)]);

        h.observer.observe().await;

        // No orphaned state later than the last valid transaction remains.
        assert_eq!(h.transactions.numbers(), (0..=7).collect::<Vec<_>>());
        assert!(h
            .operations
            .operations()
            .iter()
            .all(|op| op.transaction_number <= 7));
        assert!(h.unresolvables.numbers().is_empty());
        assert_eq!(
            h.emitter.events(),
            vec![
                ObserverEvent::BlockReorganization,
                ObserverEvent::LoopSuccess
            ]
        );
    }

    #[tokio::test]
    async fn lagging_chain_client_idles_without_rewind() {
        let mut ledger = MockLedger::new();
        ledger.expect__read().times(1).returning(|_| {
            Err(LedgerError::InvalidCursor {
                transaction_number: 10,
                transaction_time_hash: hash(20),
            })
        });
        // The chain client knows fewer blocks than the cursor's height.
        ledger
            .expect__latest_time()
            .times(1)
            .returning(|| Ok(BlockPointer {
                height: 15,
                hash: hash(15),
            }));

        let h = harness(ledger, Arc::new(ScriptedProcessor::new()), 100, 2);
        h.transactions.seed((0..=10).map(|n| record(n, 10 + n)));

        h.observer.observe().await;

        assert_eq!(h.transactions.numbers(), (0..=10).collect::<Vec<_>>());
        assert_eq!(h.emitter.events(), vec![ObserverEvent::LoopSuccess]);
    }

    #[tokio::test(start_paused = true)]
    async fn backpressure_bounds_concurrent_processing() {
        let mut ledger = MockLedger::new();
        let mut seq = Sequence::new();
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(ReadResult {
                    more_transactions: false,
                    transactions: (1..=10).map(|n| record(n, 100 + n)).collect(),
                })
            });
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ReadResult::default()));

        let processor =
            Arc::new(ScriptedProcessor::new().with_delay(Duration::from_millis(50)));
        let h = harness(ledger, processor.clone(), 100, 2);

        h.observer.observe().await;

        assert!(
            processor.max_concurrent_seen() <= 2,
            "saw {} concurrent downloads",
            processor.max_concurrent_seen()
        );
        assert_eq!(processor.processed().len(), 10);

        // The next pass consolidates the drained queue in order.
        h.observer.observe().await;
        assert_eq!(h.transactions.numbers(), (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn processor_fault_fences_the_pipeline() {
        let mut ledger = MockLedger::new();
        let mut seq = Sequence::new();
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(ReadResult {
                    more_transactions: false,
                    transactions: (1..=10).map(|n| record(n, 100 + n)).collect(),
                })
            });
        // After the fence the cursor is re-derived from storage: record 3.
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|cursor| cursor.map(|c| c.transaction_number) == Some(3))
            .returning(|_| Ok(ReadResult::default()));

        let processor = Arc::new(ScriptedProcessor::new());
        processor.script(4, ProcessOutcome::Fatal);
        let h = harness(ledger, processor.clone(), 100, 10);

        h.observer.observe().await;

        // Only the clean prefix before the failure was persisted.
        assert_eq!(h.transactions.numbers(), vec![1, 2, 3]);
        assert_eq!(h.observer.pending.len(), 0);
        assert!(h.observer.last_known.lock().unwrap().is_none());
        assert_eq!(h.emitter.events(), vec![ObserverEvent::LoopSuccess]);

        h.observer.observe().await;
        assert_eq!(h.transactions.numbers(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn store_outage_fails_the_pass_without_advancing() {
        let mut ledger = MockLedger::new();
        ledger
            .expect__read()
            .times(1)
            .returning(|_| Err(LedgerError::Timeout(10_000)));

        let h = harness(ledger, Arc::new(ScriptedProcessor::new()), 100, 2);
        h.observer.observe().await;

        assert!(matches!(
            h.emitter.events().as_slice(),
            [ObserverEvent::LoopFailure { .. }]
        ));
        assert!(h.transactions.numbers().is_empty());
    }

    /// Processor that treats its core index file as resolvable only once
    /// the CAS can serve it.
    #[derive(Debug)]
    struct CasBackedProcessor {
        cas: Arc<dyn ContentAddressableStore>,
    }

    #[async_trait::async_trait]
    impl TransactionProcessor for CasBackedProcessor {
        async fn process_transaction(&self, record: &AnchorRecord) -> Result<bool> {
            let anchored: AnchoredData = record.anchor_string.parse()?;
            let fetched = self
                .cas
                .read(
                    &anchored.core_index_file_uri,
                    1 << 20,
                    Duration::from_secs(10),
                )
                .await?;
            Ok(fetched.code == FetchResultCode::Success)
        }
    }

    #[tokio::test]
    async fn cas_timeout_schedules_retry_that_later_succeeds() {
        let mut ledger = MockLedger::new();
        let mut seq = Sequence::new();
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(ReadResult {
                    more_transactions: false,
                    transactions: vec![record(5, 105)],
                })
            });
        ledger
            .expect__read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ReadResult::default()));

        let mut cas = MockCas::new();
        let mut cas_seq = Sequence::new();
        // First fetch times out (reported as not found), the retry serves
        // the content.
        cas.expect__read()
            .times(1)
            .in_sequence(&mut cas_seq)
            .returning(|_, _| Ok(FetchResult::code(FetchResultCode::NotFound)));
        cas.expect__read()
            .times(1)
            .in_sequence(&mut cas_seq)
            .returning(|_, _| Ok(FetchResult::success(vec![1, 2, 3])));

        let processor = Arc::new(CasBackedProcessor { cas: Arc::new(cas) });
        let h = harness(ledger, processor, 100, 2);

        h.observer.observe().await;
        assert_eq!(h.unresolvables.numbers(), vec![5]);
        assert_eq!(h.unresolvables.attempts(5), 1);

        h.unresolvables.mark_all_due();
        h.observer.observe().await;

        assert!(h.unresolvables.numbers().is_empty());
        assert_eq!(h.transactions.numbers(), vec![5]);
        assert_eq!(
            h.emitter.events(),
            vec![ObserverEvent::LoopSuccess, ObserverEvent::LoopSuccess]
        );
    }

    #[tokio::test]
    async fn start_and_stop_round_trip() {
        let mut ledger = MockLedger::new();
        ledger
            .expect__latest_time()
            .returning(|| Ok(BlockPointer {
                height: 0,
                hash: hash(0),
            }));
        ledger.expect__read().returning(|_| Ok(ReadResult::default()));

        let h = harness(ledger, Arc::new(ScriptedProcessor::new()), 100, 2);
        let observer = Arc::new(h.observer);

        let handle = observer.clone().start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        observer.stop();

        let result = handle.into_inner().await.unwrap();
        assert!(result.is_ok());
        let state = observer.sync_state();
        assert_eq!(state.phase, SyncPhase::Live);
        assert!(state.is_complete);
    }
}
