//! Core blockchain functionality
//!
//! Blocks, transactions, the proof-of-work rule and the block tree with its orphan pool.

pub mod block;
pub mod blockchain;
pub mod genesis;
pub mod hash;
pub mod monetary;
pub mod orphans;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, BlockHeader, BlockRecord, DisplayRecord};
pub use blockchain::{BlockStatus, Blockchain, Classification, ForkDiff, SubmitOutcome};
pub use genesis::{genesis_block, GenesisAllocation, GENESIS_NONCE};
pub use hash::{BlockHash, PublicKey, Signature, HASH_SIZE};
pub use monetary::{Amount, BLOCK_REWARD, DEFAULT_TRANSACTION_FEE, MAX_MILLIS, MILLIS_PER_COIN};
pub use orphans::{OrphanLink, OrphanPool};
pub use proof_of_work::{MiningJob, ProofOfWork, SearchOutcome};
pub use transaction::{Transaction, TxInput, TxOutput};
