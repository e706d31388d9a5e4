use serde::{Deserialize, Serialize};

/// An opaque operation row destined for the operation store. The operation
/// wire format belongs to the per-version processors; the observer only
/// needs the source transaction number for reorg rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchoredOperation {
    /// Unique suffix of the DID the operation applies to.
    pub did_suffix: String,
    /// Transaction number of the anchor record this operation came from.
    pub transaction_number: u64,
    /// Position of the operation within its anchor batch.
    pub operation_index: u32,
    /// Raw operation payload.
    pub operation_buffer: Vec<u8>,
}
