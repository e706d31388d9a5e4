use serde::{Deserialize, Serialize};

/// Lifecycle events the observer emits to a generic sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObserverEvent {
    /// A chain reorganization was detected and derived state was rewound.
    BlockReorganization,
    /// A live-loop pass drained all pending work without error.
    LoopSuccess,
    /// A live-loop pass aborted; the cursor did not advance.
    LoopFailure {
        /// Human-readable failure cause.
        reason: String,
    },
}
