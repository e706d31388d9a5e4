use std::sync::Arc;

use derive_new::new;
use tracing::warn;

use anchorage_core::{AnchorRecord, VersionManager};

/// Caps how many records from a single block are admitted per pass, so one
/// oversized block cannot monopolize the download pipeline. The cap comes
/// from the protocol version active at the record's block.
#[derive(Debug, new)]
pub struct ThroughputLimiter {
    versions: Arc<dyn VersionManager>,
}

impl ThroughputLimiter {
    /// Admit a chronological batch. Admission stops at the first record
    /// that would overflow its block's cap: the admitted set is a
    /// contiguous prefix, so the read cursor never advances past a dropped
    /// record and the remainder is re-read on a later pass.
    pub fn admit(&self, records: Vec<AnchorRecord>) -> Vec<AnchorRecord> {
        let total = records.len();
        let mut admitted = Vec::with_capacity(total);
        let mut current_block = None;
        let mut cap = 0usize;
        let mut taken_in_block = 0usize;

        for record in records {
            if current_block != Some(record.transaction_time) {
                current_block = Some(record.transaction_time);
                cap = self.versions.max_records_per_block(record.transaction_time);
                taken_in_block = 0;
            }
            if taken_in_block >= cap {
                warn!(
                    block = record.transaction_time,
                    cap,
                    deferred = total - admitted.len(),
                    "block overflows the per-pass admission cap; deferring the remainder"
                );
                break;
            }
            taken_in_block += 1;
            admitted.push(record);
        }
        admitted
    }
}
