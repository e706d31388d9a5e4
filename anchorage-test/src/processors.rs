//! Scripted processors and version registries for exercising the pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{eyre, Result};

use anchorage_core::{
    AnchorRecord, AnchoredOperation, OperationStore, TransactionProcessor, VersionManager,
};

/// Scripted outcome for one processing attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// `Ok(true)`: resolved in full.
    Success,
    /// `Ok(false)`: content not resolvable this attempt.
    Unresolvable,
    /// `Err(_)`: fatal processor fault.
    Fatal,
}

/// A processor whose per-record outcomes are scripted by the test.
/// Unscripted records succeed. Successful records write one operation row
/// when an operation store is attached, before the outcome is reported.
#[derive(Debug, Default)]
pub struct ScriptedProcessor {
    outcomes: Mutex<HashMap<u64, Vec<ProcessOutcome>>>,
    processed: Mutex<Vec<u64>>,
    operation_store: Option<Arc<dyn OperationStore>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProcessor {
    /// A processor that succeeds on everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one operation row per success into `store`.
    pub fn with_operation_store(mut self, store: Arc<dyn OperationStore>) -> Self {
        self.operation_store = Some(store);
        self
    }

    /// Hold each record for `delay` before reporting its outcome; used by
    /// backpressure tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue `outcome` for the next attempt on `transaction_number`.
    pub fn script(&self, transaction_number: u64, outcome: ProcessOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .entry(transaction_number)
            .or_default()
            .push(outcome);
    }

    /// Transaction numbers processed so far, in completion order.
    pub fn processed(&self) -> Vec<u64> {
        self.processed.lock().unwrap().clone()
    }

    /// Highest number of concurrently running attempts observed.
    pub fn max_concurrent_seen(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionProcessor for ScriptedProcessor {
    async fn process_transaction(&self, record: &AnchorRecord) -> Result<bool> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let outcome = {
            let mut guard = self.outcomes.lock().unwrap();
            match guard.get_mut(&record.transaction_number) {
                Some(queue) if !queue.is_empty() => queue.remove(0),
                _ => ProcessOutcome::Success,
            }
        };
        self.processed.lock().unwrap().push(record.transaction_number);
        match outcome {
            ProcessOutcome::Success => {
                if let Some(store) = &self.operation_store {
                    store
                        .insert_or_replace(&[AnchoredOperation {
                            did_suffix: format!("did-{}", record.transaction_number),
                            transaction_number: record.transaction_number,
                            operation_index: 0,
                            operation_buffer: record.anchor_string.clone().into_bytes(),
                        }])
                        .await?;
                }
                Ok(true)
            }
            ProcessOutcome::Unresolvable => Ok(false),
            ProcessOutcome::Fatal => Err(eyre!(
                "processor fault on transaction {}",
                record.transaction_number
            )),
        }
    }
}

/// A version registry with a single version band covering all of time.
#[derive(Debug)]
pub struct StaticVersionManager {
    processor: Arc<dyn TransactionProcessor>,
    max_records_per_block: usize,
}

impl StaticVersionManager {
    /// One processor for every block, with a per-block admission cap.
    pub fn new(processor: Arc<dyn TransactionProcessor>, max_records_per_block: usize) -> Self {
        Self {
            processor,
            max_records_per_block,
        }
    }
}

impl VersionManager for StaticVersionManager {
    fn transaction_processor(&self, _transaction_time: u64) -> Arc<dyn TransactionProcessor> {
        self.processor.clone()
    }

    fn max_records_per_block(&self, _transaction_time: u64) -> usize {
        self.max_records_per_block
    }
}
