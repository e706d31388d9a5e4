use std::fmt::{Display, Formatter};
use std::str::FromStr;

use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// Multihash prefix for a 32-byte SHA-256 digest (0x12 = sha2-256, 0x20 = 32
/// bytes). The anchor contract stores the raw digest; the CAS addresses the
/// same content by the base58-encoded multihash.
const MULTIHASH_SHA256_PREFIX: [u8; 2] = [0x12, 0x20];

/// Parsed form of the anchor string `"<count>.<cas-uri>"`.
///
/// The encoding is canonical and shared bit-exact with on-chain consumers:
/// `serialize(deserialize(s)) == s` for every valid `s`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchoredData {
    /// Number of DID operations batched under this anchor.
    pub num_operations: u32,
    /// CAS URI of the core index file: base58 of the multihash-prefixed
    /// digest read from the log's `anchorFileHash` field.
    pub core_index_file_uri: String,
}

/// Error parsing or constructing an anchor string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnchorStringError {
    /// No `.` separator between the operation count and the URI.
    #[error("anchor string has no '.' separator: {0:?}")]
    MissingSeparator(String),
    /// The operation count is not a decimal non-negative integer.
    #[error("invalid operation count {0:?}")]
    InvalidOperationCount(String),
    /// The URI is not valid base58.
    #[error("core index file uri is not base58: {0:?}")]
    NotBase58(String),
    /// The decoded URI is not a multihash-prefixed 32-byte SHA-256 digest.
    #[error("unsupported multihash: {0} bytes")]
    UnsupportedMultihash(usize),
}

impl AnchoredData {
    /// Build the anchored data for a raw 32-byte digest from the contract
    /// log.
    pub fn from_log_hash(anchor_file_hash: H256, num_operations: u32) -> Self {
        let mut multihash = Vec::with_capacity(2 + 32);
        multihash.extend_from_slice(&MULTIHASH_SHA256_PREFIX);
        multihash.extend_from_slice(anchor_file_hash.as_bytes());
        Self {
            num_operations,
            core_index_file_uri: bs58::encode(multihash).into_string(),
        }
    }

    /// Recover the raw digest the contract log carried.
    pub fn to_log_hash(&self) -> Result<H256, AnchorStringError> {
        let bytes = bs58::decode(&self.core_index_file_uri)
            .into_vec()
            .map_err(|_| AnchorStringError::NotBase58(self.core_index_file_uri.clone()))?;
        if bytes.len() != 34 || bytes[..2] != MULTIHASH_SHA256_PREFIX {
            return Err(AnchorStringError::UnsupportedMultihash(bytes.len()));
        }
        Ok(H256::from_slice(&bytes[2..]))
    }
}

impl Display for AnchoredData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.num_operations, self.core_index_file_uri)
    }
}

impl FromStr for AnchoredData {
    type Err = AnchorStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, uri) = s
            .split_once('.')
            .ok_or_else(|| AnchorStringError::MissingSeparator(s.to_owned()))?;
        // Reject `+3`, `03`, and other non-canonical spellings so the
        // round-trip stays byte-exact.
        if count.is_empty()
            || !count.bytes().all(|b| b.is_ascii_digit())
            || (count.len() > 1 && count.starts_with('0'))
        {
            return Err(AnchorStringError::InvalidOperationCount(count.to_owned()));
        }
        let num_operations = count
            .parse::<u32>()
            .map_err(|_| AnchorStringError::InvalidOperationCount(count.to_owned()))?;
        let parsed = Self {
            num_operations,
            core_index_file_uri: uri.to_owned(),
        };
        // Validates base58 shape and the multihash prefix.
        parsed.to_log_hash()?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn digest(byte: u8) -> H256 {
        H256::from([byte; 32])
    }

    #[test]
    fn round_trips_byte_exact() {
        let data = AnchoredData::from_log_hash(digest(0xab), 121);
        let serialized = data.to_string();
        let reparsed: AnchoredData = serialized.parse().unwrap();
        assert_eq!(reparsed, data);
        assert_eq!(reparsed.to_string(), serialized);
        assert_eq!(reparsed.to_log_hash().unwrap(), digest(0xab));
    }

    #[test]
    fn zero_operations_is_valid() {
        let data = AnchoredData::from_log_hash(digest(0x01), 0);
        let reparsed: AnchoredData = data.to_string().parse().unwrap();
        assert_eq!(reparsed.num_operations, 0);
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            "12345".parse::<AnchoredData>().unwrap_err(),
            AnchorStringError::MissingSeparator("12345".to_owned())
        );
    }

    #[test]
    fn rejects_non_canonical_counts() {
        let uri = AnchoredData::from_log_hash(digest(2), 1).core_index_file_uri;
        for bad in ["01", "+1", "-4", "", "1x"] {
            let s = format!("{bad}.{uri}");
            assert!(
                matches!(
                    s.parse::<AnchoredData>(),
                    Err(AnchorStringError::InvalidOperationCount(_))
                ),
                "{s} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_wrong_multihash_prefix() {
        let uri = bs58::encode([0xffu8; 34]).into_string();
        assert!(matches!(
            format!("3.{uri}").parse::<AnchoredData>(),
            Err(AnchorStringError::UnsupportedMultihash(34))
        ));
    }

    #[test]
    fn rejects_truncated_digest() {
        let mut bytes = vec![0x12u8, 0x20];
        bytes.extend_from_slice(&[0u8; 16]);
        let uri = bs58::encode(bytes).into_string();
        assert!(matches!(
            format!("3.{uri}").parse::<AnchoredData>(),
            Err(AnchorStringError::UnsupportedMultihash(18))
        ));
    }
}
