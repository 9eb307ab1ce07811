// Pool admission: decides which pending transactions may go into the next candidate block.
// Checks run in pool order and every admitted transaction reserves its inputs before the
// next one is looked at, so two transactions spending the same output cannot both get in.

use crate::core::{Amount, Block, PublicKey, Transaction};
use crate::wallet::{unspent_outputs, Identity};
use log::error;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("transaction {0} is malformed: {1}")]
    Malformed(String, String),
    #[error("transaction {0} is already confirmed")]
    AlreadyConfirmed(String),
    #[error("transaction {id} spends {previous_id}, which is not an unspent output of its sender")]
    UnknownInput { id: String, previous_id: String },
    #[error("transaction {id} misstates the owner or amount of {previous_id}")]
    InputMismatch { id: String, previous_id: String },
    #[error("transaction {id} spends {previous_id} a second time")]
    DoubleSpend { id: String, previous_id: String },
    #[error("transaction {0} does not conserve value")]
    ValueNotConserved(String),
    #[error("transaction {0} has no valid signature from its sender")]
    BadSignature(String),
}

/// Transactions admitted for one candidate, in pool order, and the rejected ones
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub admitted: Vec<Transaction>,
    pub rejected: Vec<Rejection>,
    pub fees: Amount,
}

impl PreparedBatch {
    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }

    pub fn admitted_ids(&self) -> Vec<&str> {
        self.admitted.iter().map(Transaction::get_id).collect()
    }
}

/// Check `pending` against `chain` (canonical head first, genesis last)
pub fn prepare_transactions(
    pending: &[Transaction],
    chain: &[Block],
    identity: &dyn Identity,
) -> PreparedBatch {
    let confirmed: HashSet<&str> = chain
        .iter()
        .flat_map(|block| block.get_transactions())
        .map(Transaction::get_id)
        .collect();
    let mut unspent_by_owner: HashMap<PublicKey, BTreeMap<String, Amount>> = HashMap::new();
    let mut reserved: HashSet<(PublicKey, String)> = HashSet::new();
    let mut batch = PreparedBatch::default();

    for tx in pending {
        let verdict = admit(tx, chain, &confirmed, &mut unspent_by_owner, &reserved, identity);
        match verdict {
            Ok(()) => {
                for input in tx.get_inputs() {
                    reserved.insert((
                        input.get_current_owner().clone(),
                        input.get_previous_id().to_string(),
                    ));
                }
                batch.fees = batch.fees.saturating_add(tx.get_fee());
                batch.admitted.push(tx.clone());
            }
            Err(rejection) => {
                error!("Rejected pooled transaction: {rejection}");
                batch.rejected.push(rejection);
            }
        }
    }
    batch
}

fn admit(
    tx: &Transaction,
    chain: &[Block],
    confirmed: &HashSet<&str>,
    unspent_by_owner: &mut HashMap<PublicKey, BTreeMap<String, Amount>>,
    reserved: &HashSet<(PublicKey, String)>,
    identity: &dyn Identity,
) -> Result<(), Rejection> {
    let id = tx.get_id().to_string();
    if let Err(e) = tx.check_structure() {
        return Err(Rejection::Malformed(id, e.to_string()));
    }
    if tx.is_coinbase() {
        return Err(Rejection::Malformed(id, "coinbase outside a block".to_string()));
    }

    // 1. replay
    if confirmed.contains(tx.get_id()) {
        return Err(Rejection::AlreadyConfirmed(id));
    }

    // 2. inputs must be unspent outputs of the sender, each used once
    let sender = tx.sender();
    let unspent = unspent_by_owner
        .entry(sender.clone())
        .or_insert_with(|| unspent_outputs(chain, sender));
    let mut seen_here = HashSet::new();
    for input in tx.get_inputs() {
        let previous_id = input.get_previous_id().to_string();
        let amount = match unspent.get(&previous_id) {
            Some(amount) => *amount,
            None => return Err(Rejection::UnknownInput { id, previous_id }),
        };
        if input.get_current_owner() != sender || input.get_amount() != amount {
            return Err(Rejection::InputMismatch { id, previous_id });
        }
        if reserved.contains(&(sender.clone(), previous_id.clone()))
            || !seen_here.insert(previous_id.clone())
        {
            return Err(Rejection::DoubleSpend { id, previous_id });
        }
    }

    // 3. value conservation
    if !tx.is_value_conserved() {
        return Err(Rejection::ValueNotConserved(id));
    }

    // 4. signature
    if !tx.verify_signature(identity) {
        return Err(Rejection::BadSignature(id));
    }
    Ok(())
}
