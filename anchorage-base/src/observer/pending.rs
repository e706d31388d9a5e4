use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use anchorage_core::{AnchorRecord, AtomicStatus, TransactionStatus};

/// One anchor record travelling through the concurrent pipeline. The
/// spawned task owns the status cell; the queue owns the join handle.
#[derive(Debug)]
pub(crate) struct PendingTransaction {
    pub record: AnchorRecord,
    status: Arc<AtomicStatus>,
    handle: JoinHandle<()>,
}

impl PendingTransaction {
    pub fn new(record: AnchorRecord, status: Arc<AtomicStatus>, handle: JoinHandle<()>) -> Self {
        Self {
            record,
            status,
            handle,
        }
    }

    /// Status as seen by the consolidator. A task that stopped without
    /// reporting an outcome (it panicked) counts as an error.
    fn effective_status(&self) -> TransactionStatus {
        match self.status.load() {
            TransactionStatus::Processing if self.handle.is_finished() => TransactionStatus::Error,
            status => status,
        }
    }
}

/// The under-processing sequence: appended by the live loop, trimmed from
/// the head by the consolidator, statuses written by the owning tasks.
/// Insertion order is consumption order.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    entries: Mutex<VecDeque<PendingTransaction>>,
}

impl PendingQueue {
    pub fn push(&self, entry: PendingTransaction) {
        self.entries.lock().unwrap().push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Entries whose task is still running.
    pub fn in_flight(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.effective_status() == TransactionStatus::Processing)
            .count()
    }

    /// Whether any entry failed fatally.
    pub fn has_error(&self) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|entry| entry.effective_status() == TransactionStatus::Error)
    }

    /// The head record, if it is ready to be consolidated.
    pub fn peek_processed(&self) -> Option<AnchorRecord> {
        let guard = self.entries.lock().unwrap();
        guard
            .front()
            .filter(|entry| entry.effective_status() == TransactionStatus::Processed)
            .map(|entry| entry.record.clone())
    }

    /// Drop the head entry after it was persisted.
    pub fn pop_head(&self) {
        self.entries.lock().unwrap().pop_front();
    }

    /// Discard every entry; returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut guard = self.entries.lock().unwrap();
        let discarded = guard.len();
        guard.clear();
        discarded
    }
}
