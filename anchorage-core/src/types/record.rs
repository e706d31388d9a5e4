use std::cmp::Ordering;

use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};

use super::AnchoredData;

/// One log entry from the anchor contract, wrapping a pointer to off-chain
/// operation data. Immutable once produced by the chain reader.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRecord {
    /// Monotonically increasing identifier issued by the contract; the
    /// primary ordering key.
    pub transaction_number: u64,
    /// Block height of the emitting log.
    pub transaction_time: u64,
    /// Block hash at that height; the reorg canary.
    pub transaction_time_hash: H256,
    /// Opaque anchor string of shape `"<count>.<cas-uri>"`.
    pub anchor_string: String,
    /// Issuer address.
    pub writer: H160,
    /// Fee paid for the anchoring transaction. May be zero.
    pub transaction_fee_paid: U256,
    /// Fee normalized by the active protocol version. May be zero.
    pub normalized_transaction_fee: Option<U256>,
    /// Optional wall-clock annotation from the block header.
    pub transaction_timestamp: Option<u64>,
}

impl AnchorRecord {
    /// The cursor identifying this record.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            transaction_number: self.transaction_number,
            transaction_time_hash: self.transaction_time_hash,
        }
    }
}

// Ordering assumes both records were emitted by the same contract; the
// contract issues transaction numbers chronologically.
impl PartialOrd for AnchorRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnchorRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.transaction_number.cmp(&other.transaction_number)
    }
}

/// A raw, already-ABI-decoded log from the anchor contract, as handed over
/// by the transport collaborator behind [`crate::AnchorLogSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorLog {
    /// Raw 32-byte digest of the core index file.
    pub anchor_file_hash: H256,
    /// Number of operations batched under this anchor.
    pub number_of_operations: u32,
    /// Contract-issued transaction number.
    pub transaction_number: u64,
    /// Issuer address.
    pub writer: H160,
    /// Fee paid for the anchoring transaction.
    pub transaction_fee_paid: U256,
    /// The block in which the log was emitted.
    pub block_number: u64,
    /// The hash of that block.
    pub block_hash: H256,
    /// Log index position in the block; tie-breaker for ordering.
    pub log_index: u64,
}

impl AnchorLog {
    /// Convert into an [`AnchorRecord`], encoding the canonical anchor
    /// string from the raw digest.
    pub fn into_record(self, timestamp: Option<u64>) -> AnchorRecord {
        let anchored = AnchoredData::from_log_hash(self.anchor_file_hash, self.number_of_operations);
        AnchorRecord {
            transaction_number: self.transaction_number,
            transaction_time: self.block_number,
            transaction_time_hash: self.block_hash,
            anchor_string: anchored.to_string(),
            writer: self.writer,
            transaction_fee_paid: self.transaction_fee_paid,
            normalized_transaction_fee: None,
            transaction_timestamp: timestamp,
        }
    }
}

// Chronological within one chain: block number, then log index.
impl PartialOrd for AnchorLog {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnchorLog {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.block_number.cmp(&other.block_number) {
            Ordering::Equal => self.log_index.cmp(&other.log_index),
            ord => ord,
        }
    }
}

/// A `(height, hash)` pointer to a block; the result of
/// [`crate::LedgerReader::latest_time`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPointer {
    /// Block height.
    pub height: u64,
    /// Block hash at that height.
    pub hash: H256,
}

/// The `(transaction_number, transaction_time_hash)` pair identifying the
/// most recently processed anchor record. Derived from the transaction
/// store; absent means "start from the contract deployment".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Transaction number of the last processed record.
    pub transaction_number: u64,
    /// Block hash the record was anchored under.
    pub transaction_time_hash: H256,
}

/// Result of a cursor-driven incremental read.
#[derive(Clone, Debug, Default)]
pub struct ReadResult {
    /// Whether the chain may hold more anchors past the scanned window. A
    /// spurious value either way is tolerated by the live loop.
    pub more_transactions: bool,
    /// Anchor records found past the cursor, chronological.
    pub transactions: Vec<AnchorRecord>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn log(block: u64, index: u64, number: u64) -> AnchorLog {
        AnchorLog {
            anchor_file_hash: H256::from_low_u64_be(number),
            number_of_operations: 4,
            transaction_number: number,
            writer: H160::repeat_byte(7),
            transaction_fee_paid: U256::zero(),
            block_number: block,
            block_hash: H256::from_low_u64_be(block),
            log_index: index,
        }
    }

    #[test]
    fn logs_order_by_block_then_index() {
        let mut logs = vec![log(10, 3, 2), log(9, 0, 0), log(10, 1, 1)];
        logs.sort();
        let numbers: Vec<_> = logs.iter().map(|l| l.transaction_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = log(12, 0, 3).into_record(None);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("transactionNumber").is_some());
        assert!(json.get("transactionTimeHash").is_some());
        assert!(json.get("anchorString").is_some());
        let round_tripped: AnchorRecord = serde_json::from_value(json).unwrap();
        assert_eq!(round_tripped, record);
    }

    #[test]
    fn record_carries_canonical_anchor_string() {
        let record = log(12, 0, 3).into_record(Some(1_700_000_000));
        let anchored: AnchoredData = record.anchor_string.parse().unwrap();
        assert_eq!(anchored.num_operations, 4);
        assert_eq!(anchored.to_log_hash().unwrap(), H256::from_low_u64_be(3));
        assert_eq!(record.transaction_timestamp, Some(1_700_000_000));
    }
}
