use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use auto_impl::auto_impl;
use eyre::Result;

/// Default deadline for one CAS read.
pub const DEFAULT_CAS_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome classification of a CAS read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchResultCode {
    /// Content fetched in full.
    Success,
    /// Content unknown to the store, or the read timed out.
    NotFound,
    /// Content exists but exceeds the caller's size cap.
    MaxSizeExceeded,
    /// The URI does not decode to a supported multihash.
    InvalidHash,
}

/// Result of a CAS read.
#[derive(Clone, Debug)]
pub struct FetchResult {
    /// Outcome classification.
    pub code: FetchResultCode,
    /// Content bytes when `code == Success`.
    pub content: Option<Vec<u8>>,
}

impl FetchResult {
    /// A successful fetch carrying `content`.
    pub fn success(content: Vec<u8>) -> Self {
        Self {
            code: FetchResultCode::Success,
            content: Some(content),
        }
    }

    /// A contentless outcome.
    pub fn code(code: FetchResultCode) -> Self {
        Self {
            code,
            content: None,
        }
    }
}

/// Content-addressable store capability. Per-version processors read index,
/// chunk, and proof files through this; the observer core never touches
/// content itself.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait ContentAddressableStore: Send + Sync + Debug {
    /// Read the content behind `uri`, bounded by `max_size_bytes`. An
    /// implementation maps its own timeout to `NotFound` so that slow
    /// content is indistinguishable from absent content, per the retry
    /// semantics of the unresolvable store.
    async fn read(&self, uri: &str, max_size_bytes: u64, timeout: Duration)
        -> Result<FetchResult>;

    /// Write content and return its URI. Used by the anchoring side, not by
    /// the observer.
    async fn write(&self, content: &[u8]) -> Result<String>;
}
