use std::fmt::Debug;

use auto_impl::auto_impl;

use crate::ObserverEvent;

/// Generic sink for observer lifecycle events. Emission is fire-and-forget;
/// a sink must not block the loop.
#[auto_impl(&, Box, Arc)]
pub trait EventEmitter: Send + Sync + Debug {
    /// Deliver one event.
    fn emit(&self, event: ObserverEvent);
}
