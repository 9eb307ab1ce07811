// A transaction moves value from its sender (`output.current_owner`) to a new owner.
// Inputs name earlier transactions by id; the single output splits the spent value into
// the amount for the new owner, the change returned to the sender, and the miner fee.

use crate::core::{Amount, PublicKey, Signature};
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use crate::wallet::Identity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    previous_id: String,        // Id of the transaction whose output is being spent
    current_owner: PublicKey,   // Owner of that output, i.e. the spender
    amount: Amount,             // Value of the spent output
}

impl TxInput {
    pub fn new(previous_id: impl Into<String>, current_owner: PublicKey, amount: Amount) -> TxInput {
        TxInput {
            previous_id: previous_id.into(),
            current_owner,
            amount,
        }
    }

    pub fn get_previous_id(&self) -> &str {
        &self.previous_id
    }

    pub fn get_current_owner(&self) -> &PublicKey {
        &self.current_owner
    }

    pub fn get_amount(&self) -> Amount {
        self.amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    new_owner: PublicKey,
    current_owner: PublicKey,
    new_amount: Amount,
    current_amount: Amount,
}

impl TxOutput {
    pub fn new(
        new_owner: PublicKey,
        current_owner: PublicKey,
        new_amount: Amount,
        current_amount: Amount,
    ) -> TxOutput {
        TxOutput {
            new_owner,
            current_owner,
            new_amount,
            current_amount,
        }
    }

    pub fn get_new_owner(&self) -> &PublicKey {
        &self.new_owner
    }

    pub fn get_current_owner(&self) -> &PublicKey {
        &self.current_owner
    }

    pub fn get_new_amount(&self) -> Amount {
        self.new_amount
    }

    pub fn get_current_amount(&self) -> Amount {
        self.current_amount
    }

    /// Value this output pays to `key`, summing both sides when the key owns both
    pub fn credited_to(&self, key: &PublicKey) -> Amount {
        let mut credit = Amount::ZERO;
        if &self.new_owner == key && !self.new_amount.is_zero() {
            credit = credit.saturating_add(self.new_amount);
        }
        if &self.current_owner == key && !self.current_amount.is_zero() {
            credit = credit.saturating_add(self.current_amount);
        }
        credit
    }

    fn map_keys(&self, f: &impl Fn(&PublicKey) -> PublicKey) -> TxOutput {
        TxOutput {
            new_owner: f(&self.new_owner),
            current_owner: f(&self.current_owner),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: String,
    is_coinbase: bool,
    inputs: Vec<TxInput>,
    output: TxOutput,
    fee: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<Signature>,
}

/// Everything except the signature; this is what gets hashed and signed
#[derive(Serialize)]
struct UnsignedTransaction<'a> {
    id: &'a str,
    is_coinbase: bool,
    inputs: &'a [TxInput],
    output: &'a TxOutput,
    fee: Amount,
}

impl Transaction {
    /// Build an unsigned transaction with a fresh random id
    pub fn new(is_coinbase: bool, inputs: Vec<TxInput>, output: TxOutput, fee: Amount) -> Transaction {
        Self::with_id(Uuid::new_v4().to_string(), is_coinbase, inputs, output, fee)
    }

    pub fn with_id(
        id: impl Into<String>,
        is_coinbase: bool,
        inputs: Vec<TxInput>,
        output: TxOutput,
        fee: Amount,
    ) -> Transaction {
        Transaction {
            id: id.into(),
            is_coinbase,
            inputs,
            output,
            fee,
            signature: None,
        }
    }

    /// Reward-minting transaction paying `amount` to `owner`
    pub fn new_coinbase(owner: PublicKey, amount: Amount) -> Transaction {
        let output = TxOutput::new(owner.clone(), owner, amount, Amount::ZERO);
        Transaction::new(true, vec![], output, Amount::ZERO)
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn is_coinbase(&self) -> bool {
        self.is_coinbase
    }

    pub fn get_inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn get_output(&self) -> &TxOutput {
        &self.output
    }

    pub fn get_fee(&self) -> Amount {
        self.fee
    }

    pub fn get_signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn set_signature(&mut self, signature: Signature) {
        self.signature = Some(signature);
    }

    /// The account spending the inputs and signing the transaction
    pub fn sender(&self) -> &PublicKey {
        &self.output.current_owner
    }

    /// SHA-256 over the canonical encoding with the signature left out
    pub fn hash(&self) -> Result<Vec<u8>> {
        let unsigned = UnsignedTransaction {
            id: &self.id,
            is_coinbase: self.is_coinbase,
            inputs: &self.inputs,
            output: &self.output,
            fee: self.fee,
        };
        let encoded = serde_json::to_vec(&unsigned)?;
        Ok(sha256_digest(&encoded))
    }

    pub fn sign(&mut self, identity: &dyn Identity) -> Result<()> {
        let digest = self.hash()?;
        let signature = identity.sign(&digest)?;
        self.signature = Some(signature);
        Ok(())
    }

    /// True when the attached signature verifies against the sender's key
    pub fn verify_signature(&self, identity: &dyn Identity) -> bool {
        let signature = match &self.signature {
            Some(signature) => signature,
            None => return false,
        };
        match self.hash() {
            Ok(digest) => identity.verify(self.sender(), signature, &digest),
            Err(e) => {
                log::error!("Failed to hash transaction {} for verification: {e}", self.id);
                false
            }
        }
    }

    pub fn input_total(&self) -> Option<Amount> {
        self.inputs
            .iter()
            .try_fold(Amount::ZERO, |acc, input| acc.checked_add(input.amount))
    }

    /// new_amount + current_amount + fee
    pub fn spent_total(&self) -> Option<Amount> {
        self.output
            .new_amount
            .checked_add(self.output.current_amount)?
            .checked_add(self.fee)
    }

    pub fn is_value_conserved(&self) -> bool {
        match (self.input_total(), self.spent_total()) {
            (Some(inputs), Some(spent)) => inputs == spent,
            _ => false,
        }
    }

    /// Wire/persistence record; the signature is included only when requested
    pub fn to_record(&self, with_signature: bool) -> Result<serde_json::Value> {
        if with_signature {
            Ok(serde_json::to_value(self)?)
        } else {
            let mut unsigned = self.clone();
            unsigned.signature = None;
            Ok(serde_json::to_value(&unsigned)?)
        }
    }

    pub fn from_record(record: &serde_json::Value) -> Result<Transaction> {
        let transaction: Transaction = serde_json::from_value(record.clone()).map_err(|e| {
            BlockchainError::InvalidTransaction(format!("Malformed transaction record: {e}"))
        })?;
        transaction.check_structure()?;
        Ok(transaction)
    }

    /// Shape rules that hold regardless of chain state
    pub fn check_structure(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(BlockchainError::InvalidTransaction(
                "Transaction id must not be empty".to_string(),
            ));
        }
        if self.is_coinbase && !self.inputs.is_empty() {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Coinbase transaction {} must not have inputs",
                self.id
            )));
        }
        if !self.is_coinbase && self.inputs.is_empty() {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Transaction {} spends nothing",
                self.id
            )));
        }
        Ok(())
    }

    /// Copy with every public key replaced by its short tag, for printing only
    pub fn to_display(&self) -> Transaction {
        let tag = |key: &PublicKey| PublicKey::from(key.tag());
        Transaction {
            id: self.id.clone(),
            is_coinbase: self.is_coinbase,
            inputs: self
                .inputs
                .iter()
                .map(|input| TxInput {
                    current_owner: tag(&input.current_owner),
                    ..input.clone()
                })
                .collect(),
            output: self.output.map_keys(&tag),
            fee: self.fee,
            signature: None,
        }
    }
}
