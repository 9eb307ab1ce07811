// Background transaction generator. On every tick it pays a random share of the node's
// balance to a random peer, pools the transaction locally and broadcasts it.

use crate::core::{Amount, PublicKey, Transaction};
use crate::error::{BlockchainError, Result};
use crate::miner::{prepare_transactions, Miner};
use crate::network::Broadcaster;
use crate::wallet::Wallet;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, info};
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_GENERATOR_INTERVAL: Duration = Duration::from_secs(5);

struct Running {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Generator {
    wallet: Wallet,
    miner: Arc<Miner>,
    broadcaster: Arc<dyn Broadcaster>,
    fee: Amount,
    running: Mutex<Option<Running>>,
}

/// Random amount in thousandths, strictly positive and at most `available`
fn random_amount<R: Rng + ?Sized>(available: Amount, rng: &mut R) -> Option<Amount> {
    if available.is_zero() {
        return None;
    }
    Some(Amount::from_millis(rng.gen_range(1..=available.millis())))
}

/// One generator tick. Skipped while an earlier payment from this node is pooled and still
/// admissible, since every payment spends the whole unspent set.
pub fn generate_once(wallet: &Wallet, miner: &Miner, fee: Amount) -> Result<Option<Transaction>> {
    let own = wallet.own_public_key();
    let own_pending: Vec<Transaction> = miner
        .pool()
        .get_all()
        .into_iter()
        .filter(|tx| tx.sender() == &own)
        .collect();
    if !own_pending.is_empty() {
        let chain = wallet.blockchain().canonical_chain()?;
        let batch = prepare_transactions(&own_pending, &chain, wallet.identity().as_ref());
        if !batch.is_empty() {
            debug!("Previous payment still pending, skipping this round");
            return Ok(None);
        }
    }

    let mut rng = rand::thread_rng();
    let to: PublicKey = match wallet.identity().peer_directory().random_other_key(&own, &mut rng) {
        Some(key) => key,
        None => {
            debug!("No peer to pay");
            return Ok(None);
        }
    };
    let balance = wallet.own_balance()?;
    let spendable = match balance.checked_sub(fee) {
        Some(spendable) => spendable,
        None => {
            debug!("Balance {balance} does not cover the fee");
            return Ok(None);
        }
    };
    let amount = match random_amount(spendable, &mut rng) {
        Some(amount) => amount,
        None => return Ok(None),
    };

    let transaction = wallet.transfer(to.clone(), amount, fee)?;
    miner.submit_transaction(transaction.clone())?;
    info!("Generated payment of {amount} to {}", to.tag());
    Ok(Some(transaction))
}

impl Generator {
    pub fn new(wallet: Wallet, miner: Arc<Miner>, broadcaster: Arc<dyn Broadcaster>, fee: Amount) -> Generator {
        Generator {
            wallet,
            miner,
            broadcaster,
            fee,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        match self.running.lock() {
            Ok(running) => running.is_some(),
            Err(_) => {
                error!("Failed to acquire lock on the generator");
                false
            }
        }
    }

    /// Start ticking every `interval`. Returns false if already running.
    pub fn start(&self, interval: Duration) -> Result<bool> {
        let mut running = self.running.lock()?;
        if running.is_some() {
            return Ok(false);
        }

        let (stop, stopped) = bounded::<()>(1);
        let wallet = self.wallet.clone();
        let miner = self.miner.clone();
        let broadcaster = self.broadcaster.clone();
        let fee = self.fee;
        let handle = thread::Builder::new()
            .name("tx-generator".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match generate_once(&wallet, &miner, fee) {
                        Ok(Some(transaction)) => {
                            broadcaster.broadcast_transaction(&transaction);
                        }
                        Ok(None) => {}
                        Err(e) => error!("Transaction generation failed: {e}"),
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            })
            .map_err(|e| BlockchainError::Internal(format!("Failed to spawn generator: {e}")))?;

        *running = Some(Running { stop, handle });
        info!("Transaction generator started, interval {interval:?}");
        Ok(true)
    }

    /// Returns false if it was not running
    pub fn stop(&self) -> Result<bool> {
        let running = self.running.lock()?.take();
        match running {
            Some(Running { stop, handle }) => {
                let _ = stop.send(());
                if handle.join().is_err() {
                    error!("Generator thread panicked");
                }
                info!("Transaction generator stopped");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Failed to stop the generator: {e}");
        }
    }
}
