use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};

use primitive_types::H256;

/// The result of interacting with the anchoring ledger.
pub type ChainResult<T> = Result<T, LedgerError>;

/// Errors returned when reading from the anchoring ledger.
///
/// `InvalidCursor` is an expected signal (the reorg canary) rather than a
/// failure; everything else is either retryable transport noise or a hard
/// provider fault.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The `(transaction_number, transaction_time_hash)` cursor no longer
    /// matches the chain at that height.
    #[error("cursor (number={transaction_number}, hash={transaction_time_hash:?}) no longer on the canonical chain")]
    InvalidCursor {
        /// Transaction number of the stale cursor
        transaction_number: u64,
        /// Block hash that no longer matches the chain
        transaction_time_hash: H256,
    },
    /// A requested block range spans more blocks than the reader's maximum.
    #[error("block range of {span} blocks exceeds the maximum of {max}")]
    RangeTooLarge {
        /// Number of blocks requested
        span: u64,
        /// Maximum permitted by the reader
        max: u64,
    },
    /// The provider did not answer within the deadline.
    #[error("ledger call timed out after {0}ms")]
    Timeout(u64),
    /// The provider asked us to back off.
    #[error("ledger provider rate limited the request")]
    RateLimited,
    /// Any other provider-side error.
    #[error(transparent)]
    Provider(Box<dyn StdError + Send + Sync>),
    /// Any other error; no `From` impl so it cannot absorb other variants.
    #[error("{0}")]
    Custom(String),
}

impl LedgerError {
    /// Wrap any provider error.
    pub fn from_provider<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Provider(Box::new(err))
    }

    /// Create an error from a static string.
    pub fn from_other_str(err: &'static str) -> Self {
        #[derive(Debug)]
        struct StringError(&'static str);
        impl Display for StringError {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.0)
            }
        }
        impl StdError for StringError {}

        Self::Provider(Box::new(StringError(err)))
    }

    /// Whether the paginator may retry the call that produced this error.
    ///
    /// A stale cursor is a signal, not a fault; retrying it verbatim would
    /// only reproduce it.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidCursor { .. })
    }
}
