use crate::core::{BlockHash, Transaction};
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    previous_block_hash: Option<BlockHash>,
    nonce: u64,
}

impl BlockHeader {
    pub fn new(previous_block_hash: Option<BlockHash>, nonce: u64) -> BlockHeader {
        BlockHeader {
            previous_block_hash,
            nonce,
        }
    }

    pub fn get_previous_block_hash(&self) -> Option<BlockHash> {
        self.previous_block_hash
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }
}

/// Persistence and wire form of a block: `{"header": {...}, "data": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub header: BlockHeader,
    pub data: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplayHeader {
    previous_block_hash: Option<BlockHash>,
    hash: BlockHash,
}

/// Diagnostic rendering: keys shortened to tags, nonce dropped, hash shown
#[derive(Debug, Clone, Serialize)]
pub struct DisplayRecord {
    header: DisplayHeader,
    data: Vec<Transaction>,
}

#[derive(Debug, Clone)]
pub struct Block {
    header: BlockHeader,
    data: Vec<Transaction>,
    parent: Option<BlockHash>, // Set once the parent is found in the local tree
    hash: BlockHash,
}

/// Canonical bytes hashed for a block. The data part is passed pre-encoded so the
/// proof-of-work loop only re-encodes the header for every nonce.
pub(crate) fn encode_preimage(header: &BlockHeader, data_json: &[u8]) -> Result<Vec<u8>> {
    let header_json = serde_json::to_vec(header)?;
    let mut bytes = Vec::with_capacity(header_json.len() + data_json.len() + 20);
    bytes.extend_from_slice(b"{\"header\":");
    bytes.extend_from_slice(&header_json);
    bytes.extend_from_slice(b",\"data\":");
    bytes.extend_from_slice(data_json);
    bytes.push(b'}');
    Ok(bytes)
}

impl Block {
    pub fn new(
        previous_block_hash: Option<BlockHash>,
        nonce: u64,
        data: Vec<Transaction>,
        parent: Option<BlockHash>,
    ) -> Result<Block> {
        let header = BlockHeader::new(previous_block_hash, nonce);
        let data_json = serde_json::to_vec(&data)?;
        let hash = BlockHash::digest(&encode_preimage(&header, &data_json)?);
        Ok(Block {
            header,
            data,
            parent,
            hash,
        })
    }

    /// Assemble a block whose hash was already computed over the same header and data
    pub(crate) fn from_parts(header: BlockHeader, data: Vec<Transaction>, hash: BlockHash) -> Block {
        Block {
            header,
            data,
            parent: None,
            hash,
        }
    }

    pub fn from_record(record: BlockRecord) -> Result<Block> {
        for transaction in &record.data {
            transaction.check_structure().map_err(|e| {
                BlockchainError::InvalidBlock(format!("Block carries a malformed transaction: {e}"))
            })?;
        }
        Block::new(
            record.header.previous_block_hash,
            record.header.nonce,
            record.data,
            None,
        )
    }

    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            header: self.header.clone(),
            data: self.data.clone(),
        }
    }

    pub fn to_display_record(&self) -> DisplayRecord {
        DisplayRecord {
            header: DisplayHeader {
                previous_block_hash: self.header.previous_block_hash,
                hash: self.hash,
            },
            data: self.data.iter().map(Transaction::to_display).collect(),
        }
    }

    pub fn get_hash(&self) -> BlockHash {
        self.hash
    }

    pub fn get_header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn get_previous_block_hash(&self) -> Option<BlockHash> {
        self.header.previous_block_hash
    }

    pub fn get_nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.data.as_slice()
    }

    pub fn get_parent(&self) -> Option<BlockHash> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: BlockHash) {
        self.parent = Some(parent);
    }

    pub fn contains_transaction(&self, id: &str) -> bool {
        self.data.iter().any(|tx| tx.get_id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, PublicKey};

    fn coinbase(owner: &str) -> Transaction {
        Transaction::with_id(
            format!("cb-{owner}"),
            true,
            vec![],
            crate::core::TxOutput::new(
                PublicKey::from(owner),
                PublicKey::from(owner),
                Amount::from_coins(1),
                Amount::ZERO,
            ),
            Amount::ZERO,
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = Block::new(None, 7, vec![coinbase("alice")], None).unwrap();
        let b = Block::new(None, 7, vec![coinbase("alice")], None).unwrap();
        assert_eq!(a.get_hash(), b.get_hash());
    }

    #[test]
    fn test_hash_covers_nonce_and_order() {
        let base = Block::new(None, 1, vec![coinbase("a"), coinbase("b")], None).unwrap();
        let other_nonce = Block::new(None, 2, vec![coinbase("a"), coinbase("b")], None).unwrap();
        let reordered = Block::new(None, 1, vec![coinbase("b"), coinbase("a")], None).unwrap();
        assert_ne!(base.get_hash(), other_nonce.get_hash());
        assert_ne!(base.get_hash(), reordered.get_hash());
    }

    #[test]
    fn test_preimage_matches_record_encoding() {
        let block = Block::new(None, 42, vec![coinbase("alice")], None).unwrap();
        let record_json = serde_json::to_vec(&block.to_record()).unwrap();
        assert_eq!(block.get_hash(), BlockHash::digest(&record_json));
    }

    #[test]
    fn test_record_roundtrip_keeps_hash() {
        let parent = Block::new(None, 0, vec![], None).unwrap();
        let block = Block::new(Some(parent.get_hash()), 99, vec![coinbase("bob")], None).unwrap();
        let json = serde_json::to_string(&block.to_record()).unwrap();
        let record: BlockRecord = serde_json::from_str(&json).unwrap();
        let rebuilt = Block::from_record(record).unwrap();
        assert_eq!(rebuilt.get_hash(), block.get_hash());
        assert_eq!(rebuilt.get_previous_block_hash(), Some(parent.get_hash()));
    }

    #[test]
    fn test_display_record_shape() {
        let block = Block::new(None, 5, vec![coinbase("carol")], None).unwrap();
        let value = serde_json::to_value(block.to_display_record()).unwrap();
        assert!(value["header"].get("nonce").is_none());
        assert_eq!(value["header"]["hash"], block.get_hash().to_hex());
        assert_ne!(value["data"][0]["output"]["new_owner"], "carol");
    }
}
