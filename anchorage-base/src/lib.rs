//! This crate contains the anchor observer machinery: the chain reader,
//! the paginated historical fetcher, the sync-state machine, the live
//! processing loop with reorg handling, and the ambient glue (settings,
//! metrics, tracing) shared by embedders.

// Forbid unsafe code outside of tests
#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(missing_docs)]

#[doc(hidden)]
#[macro_use]
pub mod macros;

mod agent;
pub use agent::*;

mod chain_reader;
pub use chain_reader::*;

mod events;
pub use events::*;

mod historical;
pub use historical::*;

mod metrics;
pub use metrics::*;

mod observer;
pub use observer::*;

mod paginator;
pub use paginator::*;

mod progress;
pub use progress::*;

mod settings;
pub use settings::*;

mod sync_state;
pub use sync_state::*;
