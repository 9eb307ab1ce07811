//! Deterministic genesis block
//!
//! Every node of a network must derive the same genesis from the same seed set, so ids
//! and nonce are fixed and no randomness is involved.

use crate::core::{Amount, Block, PublicKey, Transaction, TxOutput};
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const GENESIS_NONCE: u64 = 0;

/// One seeded account in the genesis block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub pub_key: PublicKey,
    pub amount: Amount,
}

pub fn genesis_transactions(allocations: &[GenesisAllocation]) -> Vec<Transaction> {
    allocations
        .iter()
        .enumerate()
        .map(|(idx, allocation)| {
            let output = TxOutput::new(
                allocation.pub_key.clone(),
                allocation.pub_key.clone(),
                allocation.amount,
                Amount::ZERO,
            );
            Transaction::with_id(format!("genesis-{idx}"), true, vec![], output, Amount::ZERO)
        })
        .collect()
}

pub fn genesis_block(allocations: &[GenesisAllocation]) -> Result<Block> {
    Block::new(None, GENESIS_NONCE, genesis_transactions(allocations), None)
}
