use serde::{Deserialize, Serialize};

/// Which of the two mutually exclusive loops is driving the observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    /// Batch catch-up across `[deployment_block, target_block]`.
    Historical,
    /// Periodic cursor-driven incremental reads at the tip.
    Live,
}

/// Process-local sync progress. Never persisted; rebuilt on every start
/// from the transaction store and the chain tip.
///
/// Invariant while `phase == Historical`:
/// `contract_deployment_block <= last_synced_block <= target_block`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Current phase.
    pub phase: SyncPhase,
    /// Highest block the historical walk has fully covered.
    pub last_synced_block: u64,
    /// Chain tip observed when the walk (re)started.
    pub target_block: u64,
    /// Block the anchor contract was deployed at.
    pub contract_deployment_block: u64,
    /// True once historical catch-up has reached `target_block`.
    pub is_complete: bool,
}

impl SyncState {
    /// Fraction of the historical walk completed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.target_block <= self.contract_deployment_block {
            return 1.0;
        }
        let covered = self.last_synced_block - self.contract_deployment_block;
        let span = self.target_block - self.contract_deployment_block;
        (covered as f64 / span as f64).min(1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn progress_fraction() {
        let state = SyncState {
            phase: SyncPhase::Historical,
            last_synced_block: 500,
            target_block: 1_000,
            contract_deployment_block: 0,
            is_complete: false,
        };
        assert!((state.progress() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_is_full_when_target_reached() {
        let state = SyncState {
            phase: SyncPhase::Live,
            last_synced_block: 42,
            target_block: 42,
            contract_deployment_block: 42,
            is_complete: true,
        };
        assert!((state.progress() - 1.0).abs() < f64::EPSILON);
    }
}
