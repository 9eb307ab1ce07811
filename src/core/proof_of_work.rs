use crate::core::block::encode_preimage;
use crate::core::{Block, BlockHash, BlockHeader, Transaction};
use crate::error::{BlockchainError, Result};
use num_bigint::BigInt;
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicBool, Ordering};

const SHA_SIZE: u32 = 256;

/// Hash-below-target rule: `int(hash) < 2^(256 - difficulty_bits)`
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    target: BigInt,
    difficulty_bits: u32,
}

/// One bounded nonce search on top of a fixed parent and transaction list
#[derive(Debug, Clone)]
pub struct MiningJob {
    pub parent: BlockHash,
    pub data: Vec<Transaction>,
    pub start_nonce: u64,
    pub attempts: u64,
}

#[derive(Debug)]
pub enum SearchOutcome {
    Found(Block),
    /// The whole range was tried without success; retry from another start
    Exhausted { attempts: u64 },
    Cancelled,
}

impl ProofOfWork {
    pub fn new(difficulty_bits: u32) -> Result<ProofOfWork> {
        if difficulty_bits > SHA_SIZE {
            return Err(BlockchainError::Config(format!(
                "difficulty_bits must be at most {SHA_SIZE}, got {difficulty_bits}"
            )));
        }
        let mut target = BigInt::from(1);
        target.shl_assign(SHA_SIZE - difficulty_bits);
        Ok(ProofOfWork {
            target,
            difficulty_bits,
        })
    }

    pub fn target(&self) -> &BigInt {
        &self.target
    }

    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    pub fn meets_target(&self, hash: &BlockHash) -> bool {
        hash.to_bigint() < self.target
    }

    pub fn validate(&self, block: &Block) -> bool {
        self.meets_target(&block.get_hash())
    }

    /// Try nonces `start_nonce..start_nonce + attempts` (wrapping). The cancel flag is
    /// checked before every attempt.
    pub fn search(&self, job: MiningJob, cancel: &AtomicBool) -> Result<SearchOutcome> {
        let data_json = serde_json::to_vec(&job.data)?;

        for attempt in 0..job.attempts {
            if cancel.load(Ordering::Relaxed) {
                return Ok(SearchOutcome::Cancelled);
            }

            let nonce = job.start_nonce.wrapping_add(attempt);
            let header = BlockHeader::new(Some(job.parent), nonce);
            let hash = BlockHash::digest(&encode_preimage(&header, &data_json)?);

            if self.meets_target(&hash) {
                let mut block = Block::from_parts(header, job.data, hash);
                block.set_parent(job.parent);
                return Ok(SearchOutcome::Found(block));
            }
        }

        Ok(SearchOutcome::Exhausted {
            attempts: job.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, PublicKey};

    fn job(attempts: u64) -> MiningJob {
        let parent = Block::new(None, 0, vec![], None).unwrap();
        MiningJob {
            parent: parent.get_hash(),
            data: vec![Transaction::new_coinbase(
                PublicKey::from("miner"),
                Amount::from_coins(1),
            )],
            start_nonce: 0,
            attempts,
        }
    }

    #[test]
    fn test_target_shrinks_with_difficulty() {
        let easy = ProofOfWork::new(1).unwrap();
        let hard = ProofOfWork::new(8).unwrap();
        assert!(hard.target() < easy.target());
        assert_eq!(ProofOfWork::new(0).unwrap().target(), &(BigInt::from(1) << 256));
        assert!(ProofOfWork::new(257).is_err());
    }

    #[test]
    fn test_search_finds_valid_block() {
        let pow = ProofOfWork::new(4).unwrap();
        let cancel = AtomicBool::new(false);
        let job = job(1_000_000);
        let parent = job.parent;
        match pow.search(job, &cancel).unwrap() {
            SearchOutcome::Found(block) => {
                assert!(pow.validate(&block));
                assert_eq!(block.get_previous_block_hash(), Some(parent));
                assert_eq!(block.get_parent(), Some(parent));
                // Recomputing from the record gives the same hash
                let rebuilt = Block::from_record(block.to_record()).unwrap();
                assert_eq!(rebuilt.get_hash(), block.get_hash());
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn test_search_honours_cancellation() {
        let pow = ProofOfWork::new(200).unwrap();
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            pow.search(job(u64::MAX), &cancel).unwrap(),
            SearchOutcome::Cancelled
        ));
    }

    #[test]
    fn test_search_reports_exhaustion() {
        let pow = ProofOfWork::new(200).unwrap();
        let cancel = AtomicBool::new(false);
        assert!(matches!(
            pow.search(job(16), &cancel).unwrap(),
            SearchOutcome::Exhausted { attempts: 16 }
        ));
    }
}
