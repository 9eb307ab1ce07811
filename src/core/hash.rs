//! Hash, key and signature value types shared by blocks and transactions

use crate::error::{BlockchainError, Result};
use crate::utils::{key_tag, sha256_digest};
use data_encoding::HEXLOWER;
use num_bigint::{BigInt, Sign};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const HASH_SIZE: usize = 32;

/// SHA-256 digest of a block, rendered as lowercase hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash([u8; HASH_SIZE]);

impl BlockHash {
    pub fn digest(data: &[u8]) -> BlockHash {
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(&sha256_digest(data));
        BlockHash(bytes)
    }

    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> BlockHash {
        BlockHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Big-endian integer value, compared against the mining target
    pub fn to_bigint(&self) -> BigInt {
        BigInt::from_bytes_be(Sign::Plus, &self.0)
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", &self.to_hex()[..12])
    }
}

impl FromStr for BlockHash {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        let decoded = HEXLOWER
            .decode(s.to_ascii_lowercase().as_bytes())
            .map_err(|e| BlockchainError::Serialization(format!("Invalid block hash {s}: {e}")))?;
        let bytes: [u8; HASH_SIZE] = decoded.try_into().map_err(|_| {
            BlockchainError::Serialization(format!("Block hash {s} must be {HASH_SIZE} bytes"))
        })?;
        Ok(BlockHash(bytes))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Public key of an account: hex of the uncompressed P-256 point
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> PublicKey {
        PublicKey(HEXLOWER.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        HEXLOWER
            .decode(self.0.as_bytes())
            .map_err(|e| BlockchainError::Crypto(format!("Public key is not valid hex: {e}")))
    }

    /// Short tag used in diagnostic output instead of the full key
    pub fn tag(&self) -> String {
        key_tag(self.0.as_bytes())
    }
}

impl From<&str> for PublicKey {
    fn from(s: &str) -> Self {
        PublicKey(s.to_string())
    }
}

impl From<String> for PublicKey {
    fn from(s: String) -> Self {
        PublicKey(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detached signature over a transaction hash, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Signature {
        Signature(HEXLOWER.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        HEXLOWER
            .decode(self.0.as_bytes())
            .map_err(|e| BlockchainError::Crypto(format!("Signature is not valid hex: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_hex_roundtrip() {
        let hash = BlockHash::digest(b"genesis");
        let parsed: BlockHash = hash.to_hex().parse().unwrap();
        assert_eq!(hash, parsed);
        assert_eq!(hash.to_hex().len(), HASH_SIZE * 2);
    }

    #[test]
    fn test_block_hash_rejects_bad_hex() {
        assert!("zz".parse::<BlockHash>().is_err());
        assert!("abcd".parse::<BlockHash>().is_err());
    }

    #[test]
    fn test_bigint_matches_leading_bytes() {
        let mut bytes = [0u8; HASH_SIZE];
        bytes[HASH_SIZE - 1] = 7;
        assert_eq!(BlockHash::from_bytes(bytes).to_bigint(), BigInt::from(7));
    }

    #[test]
    fn test_public_key_tag_differs_from_key() {
        let key = PublicKey::from_bytes(&[4u8; 65]);
        assert_ne!(key.tag(), key.as_str());
        assert_eq!(key.to_bytes().unwrap(), vec![4u8; 65]);
    }
}
