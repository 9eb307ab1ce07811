// UTXO view of an account. Balances are never stored: they are derived by scanning a chain
// from its head down to genesis every time they are needed.

use crate::core::{Amount, Block, Blockchain, PublicKey, Transaction, TxInput, TxOutput};
use crate::error::{BlockchainError, Result};
use crate::wallet::Identity;
use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Unspent outputs of `key` on `chain`: every transaction crediting the key, minus the ids
/// the key has already consumed as inputs. Keyed by transaction id.
pub fn unspent_outputs(chain: &[Block], key: &PublicKey) -> BTreeMap<String, Amount> {
    let mut credits = BTreeMap::new();
    let mut spent = HashSet::new();

    for tx in chain.iter().flat_map(|block| block.get_transactions()) {
        let credit = tx.get_output().credited_to(key);
        if !credit.is_zero() {
            credits.insert(tx.get_id().to_string(), credit);
        }
        for input in tx.get_inputs() {
            if input.get_current_owner() == key {
                spent.insert(input.get_previous_id().to_string());
            }
        }
    }

    credits.retain(|id, _| !spent.contains(id));
    credits
}

pub fn balance_of(unspent: &BTreeMap<String, Amount>) -> Amount {
    unspent.values().copied().sum()
}

#[derive(Clone)]
pub struct Wallet {
    blockchain: Blockchain,
    identity: Arc<dyn Identity>,
}

impl Wallet {
    pub fn new(blockchain: Blockchain, identity: Arc<dyn Identity>) -> Wallet {
        Wallet {
            blockchain,
            identity,
        }
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn identity(&self) -> &Arc<dyn Identity> {
        &self.identity
    }

    pub fn own_public_key(&self) -> PublicKey {
        self.identity.own_public_key()
    }

    /// Unspent outputs of `pub_key` on the canonical chain
    pub fn get_unspent_outputs(&self, pub_key: &PublicKey) -> Result<BTreeMap<String, Amount>> {
        let chain = self.blockchain.canonical_chain()?;
        Ok(unspent_outputs(&chain, pub_key))
    }

    pub fn check_balance(&self, pub_key: &PublicKey) -> Result<Amount> {
        Ok(balance_of(&self.get_unspent_outputs(pub_key)?))
    }

    pub fn own_balance(&self) -> Result<Amount> {
        self.check_balance(&self.own_public_key())
    }

    /// Build and sign a transaction from this wallet. A regular transaction consumes every
    /// unspent output of the own key, so `output` must account for all of it.
    pub fn makeup_transaction(&self, is_coinbase: bool, output: TxOutput, fee: Amount) -> Result<Transaction> {
        let inputs = if is_coinbase {
            Vec::new()
        } else {
            let own = self.own_public_key();
            let unspent = self.get_unspent_outputs(&own)?;
            if unspent.is_empty() {
                return Err(BlockchainError::InsufficientFunds {
                    required: output.get_new_amount().to_string(),
                    available: Amount::ZERO.to_string(),
                });
            }
            unspent
                .into_iter()
                .map(|(id, amount)| TxInput::new(id, own.clone(), amount))
                .collect()
        };

        let mut tx = Transaction::new(is_coinbase, inputs, output, fee);
        if !is_coinbase && !tx.is_value_conserved() {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Transaction {} spends {} but its inputs hold {}",
                tx.get_id(),
                tx.spent_total().unwrap_or(Amount::ZERO),
                tx.input_total().unwrap_or(Amount::ZERO)
            )));
        }
        tx.sign(self.identity.as_ref())?;
        debug!("Made up transaction {}", tx.get_id());
        Ok(tx)
    }

    /// Send `amount` to `to`, returning the rest of the balance minus `fee` as change
    pub fn transfer(&self, to: PublicKey, amount: Amount, fee: Amount) -> Result<Transaction> {
        let own = self.own_public_key();
        let available = self.check_balance(&own)?;
        let required = amount
            .checked_add(fee)
            .ok_or_else(|| BlockchainError::InvalidTransaction("Amount overflows".to_string()))?;
        let change = available
            .checked_sub(required)
            .ok_or_else(|| BlockchainError::InsufficientFunds {
                required: required.to_string(),
                available: available.to_string(),
            })?;
        let output = TxOutput::new(to, own, amount, change);
        self.makeup_transaction(false, output, fee)
    }
}
