//! This crate contains core primitives, capability traits, and types for the
//! anchorage observer: the receive side of a DID network whose operation
//! batches are anchored as smart-contract log entries.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use error::{ChainResult, LedgerError};
pub use traits::*;
pub use types::*;

/// Async capability traits binding the observer to its collaborators
mod traits;

/// Core observer data structures
mod types;

mod error;
