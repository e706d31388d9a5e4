use std::sync::atomic::{AtomicU8, Ordering};

/// Processing status of one anchor record in the under-processing sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    /// The processing task is still running.
    Processing,
    /// The processing task finished; the record may be consolidated.
    Processed,
    /// The processing task failed fatally; the pipeline must fence.
    Error,
}

/// Lock-free status cell shared between a processing task (writer) and the
/// consolidator (reader).
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

const PROCESSING: u8 = 0;
const PROCESSED: u8 = 1;
const ERROR: u8 = 2;

impl AtomicStatus {
    /// A fresh cell in the `Processing` state.
    pub fn new() -> Self {
        Self(AtomicU8::new(PROCESSING))
    }

    /// Current status.
    pub fn load(&self) -> TransactionStatus {
        match self.0.load(Ordering::Acquire) {
            PROCESSING => TransactionStatus::Processing,
            PROCESSED => TransactionStatus::Processed,
            _ => TransactionStatus::Error,
        }
    }

    /// Record the outcome of the owning task.
    pub fn store(&self, status: TransactionStatus) {
        let raw = match status {
            TransactionStatus::Processing => PROCESSING,
            TransactionStatus::Processed => PROCESSED,
            TransactionStatus::Error => ERROR,
        };
        self.0.store(raw, Ordering::Release);
    }
}

impl Default for AtomicStatus {
    fn default() -> Self {
        Self::new()
    }
}
