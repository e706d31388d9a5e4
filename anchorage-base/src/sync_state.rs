use std::sync::RwLock;

use eyre::Result;
use tracing::info;

use anchorage_core::{LedgerReader, SyncPhase, SyncState, TransactionStore};

/// Owner of the process-local [`SyncState`]. Written only by the state
/// machine and the historical loop; everything else (the progress monitor
/// included) takes read-only snapshots.
#[derive(Debug)]
pub struct SyncTracker {
    state: RwLock<SyncState>,
}

impl SyncTracker {
    /// Wrap a resolved start state.
    pub fn new(state: SyncState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// A point-in-time copy of the state.
    pub fn snapshot(&self) -> SyncState {
        *self.state.read().unwrap()
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut SyncState)) {
        let mut guard = self.state.write().unwrap();
        apply(&mut guard);
        debug_assert!(
            guard.phase != SyncPhase::Historical
                || (guard.contract_deployment_block <= guard.last_synced_block
                    && guard.last_synced_block <= guard.target_block),
            "historical sync invariant violated: {guard:?}"
        );
    }
}

/// Decide between historical catch-up and live polling from the last
/// persisted anchor record and the current chain tip.
///
/// The historical batch size is the cheapest probe: a gap below it is
/// caught up by a single live-loop iteration, so historical mode is not
/// worth entering.
pub async fn resolve_start_state<L, T>(
    ledger: &L,
    transaction_store: &T,
    contract_deployment_block: u64,
    batch_size: u64,
) -> Result<SyncState>
where
    L: LedgerReader + ?Sized,
    T: TransactionStore + ?Sized,
{
    let tip = ledger.latest_time().await?;
    let last = transaction_store.get_last_transaction().await?;

    let state = match last {
        None => SyncState {
            phase: SyncPhase::Historical,
            last_synced_block: contract_deployment_block,
            target_block: tip.height.max(contract_deployment_block),
            contract_deployment_block,
            is_complete: false,
        },
        Some(record) => {
            // A hash no longer known to the chain means the record sits on
            // a reorged-away fork; its claimed height is still the best
            // resume hint, and the live loop's cursor validation will
            // handle the rewind.
            let synced_height = ledger
                .block_number_by_hash(record.transaction_time_hash)
                .await?
                .unwrap_or(record.transaction_time)
                .max(contract_deployment_block);
            let gap = tip.height.saturating_sub(synced_height);
            if gap > batch_size {
                SyncState {
                    phase: SyncPhase::Historical,
                    last_synced_block: synced_height,
                    target_block: tip.height,
                    contract_deployment_block,
                    is_complete: false,
                }
            } else {
                SyncState {
                    phase: SyncPhase::Live,
                    last_synced_block: synced_height,
                    target_block: tip.height,
                    contract_deployment_block,
                    is_complete: true,
                }
            }
        }
    };

    info!(
        phase = ?state.phase,
        last_synced_block = state.last_synced_block,
        target_block = state.target_block,
        "resolved sync start state"
    );
    Ok(state)
}
