//! Test utilities for blockchain testing

use crate::core::{Amount, Block, BlockHash, BlockRecord, Blockchain, PublicKey, Transaction, TxInput, TxOutput};
use crate::network::{BroadcastReport, Broadcaster};
use crate::wallet::{Identity, KeyPairIdentity};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Fresh key pair with an empty peer directory
pub fn test_identity() -> KeyPairIdentity {
    KeyPairIdentity::generate().expect("key generation works in tests")
}

/// Unsigned payment from `identity` spending one input of `input_amount`; whatever is not
/// sent or paid as fee comes back as change.
pub fn transfer_from(
    identity: &dyn Identity,
    previous_id: &str,
    input_amount: Amount,
    to: PublicKey,
    new_amount: Amount,
    fee: Amount,
) -> Transaction {
    let own = identity.own_public_key();
    let change = input_amount
        .checked_sub(new_amount)
        .and_then(|rest| rest.checked_sub(fee))
        .unwrap_or(Amount::ZERO);
    Transaction::new(
        false,
        vec![TxInput::new(previous_id, own.clone(), input_amount)],
        TxOutput::new(to, own, new_amount, change),
        fee,
    )
}

/// Child of `parent` carrying `txs`; valid under a zero-bit target without mining
pub fn unmined_child(parent: BlockHash, nonce: u64, txs: Vec<Transaction>) -> Block {
    Block::new(Some(parent), nonce, txs, None).expect("block hashing works in tests")
}

/// Submit a child of the current canonical head and return its hash
pub fn extend_canonical(blockchain: &Blockchain, txs: Vec<Transaction>) -> BlockHash {
    let parent = blockchain.canonical_head_hash().expect("head is readable");
    let block = unmined_child(parent, rand::random(), txs);
    blockchain.submit_block(block).expect("block is accepted").hash
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    blocks: Mutex<Vec<BlockRecord>>,
    transactions: Mutex<Vec<Transaction>>,
}

impl RecordingBroadcaster {
    pub fn block_count(&self) -> usize {
        self.blocks.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast_block(&self, record: &BlockRecord) -> BroadcastReport {
        if let Ok(mut blocks) = self.blocks.lock() {
            blocks.push(record.clone());
        }
        BroadcastReport::default()
    }

    fn broadcast_transaction(&self, transaction: &Transaction) -> BroadcastReport {
        if let Ok(mut transactions) = self.transactions.lock() {
            transactions.push(transaction.clone());
        }
        BroadcastReport::default()
    }
}
