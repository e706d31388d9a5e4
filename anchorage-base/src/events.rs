use anchorage_core::{EventEmitter, ObserverEvent};
use tracing::{info, warn};

/// Default event sink: forwards observer lifecycle events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEventEmitter;

impl EventEmitter for LogEventEmitter {
    fn emit(&self, event: ObserverEvent) {
        match &event {
            ObserverEvent::BlockReorganization => warn!(?event, "block reorganization detected"),
            ObserverEvent::LoopFailure { reason } => warn!(%reason, "observer loop failed"),
            ObserverEvent::LoopSuccess => info!(?event, "observer loop drained"),
        }
    }
}
