//! Mining
//!
//! The miner owns the pending transaction pool and a controller thread that turns the pool
//! into candidate blocks. The controller blocks on its command channel and on the result
//! slot of the running proof-of-work search, so an idle miner costs nothing.
//!
//! Every block that reaches the tree, mined here or received from a peer, is followed by a
//! pool reconciliation against the fork diff between the old and the new canonical head.

pub mod admission;
pub mod generator;
pub mod worker;

pub use admission::{prepare_transactions, PreparedBatch, Rejection};
pub use generator::Generator;
pub use worker::{spawn_search, SearchHandle};

use crate::core::{
    Amount, Block, BlockHash, BlockRecord, Blockchain, MiningJob, SearchOutcome, SubmitOutcome, Transaction,
    TxOutput, BLOCK_REWARD,
};
use crate::error::{BlockchainError, Result};
use crate::network::Broadcaster;
use crate::storage::MemoryPool;
use crate::wallet::Wallet;
use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

pub const DEFAULT_NONCE_RANGE: u64 = 1 << 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    Paused,
    Running,
}

#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Nonces tried per search before restarting from a fresh random start
    pub nonce_range: u64,
    pub block_reward: Amount,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            nonce_range: DEFAULT_NONCE_RANGE,
            block_reward: BLOCK_REWARD,
        }
    }
}

#[derive(Debug)]
enum MinerCommand {
    Start,
    Stop,
    PoolChanged,
    ChainChanged,
    Shutdown,
}

/// State shared between the handle and the controller thread
struct MinerShared {
    blockchain: Blockchain,
    wallet: Wallet,
    pool: MemoryPool,
    broadcaster: Arc<dyn Broadcaster>,
    config: MinerConfig,
    running: AtomicBool,
    current_search: Mutex<Option<Arc<AtomicBool>>>,
    // Canonical head the pool was last reconciled against. Held while reconciling and while
    // admitting a transaction, so the pool follows the chain in order.
    reconciled_head: Mutex<BlockHash>,
}

impl MinerShared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn cancel_search(&self) {
        match self.current_search.lock() {
            Ok(current) => {
                if let Some(flag) = current.as_ref() {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            Err(_) => error!("Failed to acquire lock on the current search"),
        }
    }

    fn set_current_search(&self, flag: Option<Arc<AtomicBool>>) {
        match self.current_search.lock() {
            Ok(mut current) => *current = flag,
            Err(_) => error!("Failed to acquire lock on the current search"),
        }
    }

    /// Bring the pool up to the current canonical head: drop confirmed transactions and give
    /// back the ones a reorg detached
    fn reconcile(&self) -> Result<()> {
        let mut reconciled = self.reconciled_head.lock()?;
        let head = self.blockchain.canonical_head_hash()?;
        if *reconciled == head {
            return Ok(());
        }
        let diff = self.blockchain.fork_diff(*reconciled, head)?;

        let attached: HashSet<&str> = diff.attached_transactions().map(Transaction::get_id).collect();
        for id in &attached {
            self.pool.remove(id);
        }

        let restored: Vec<Transaction> = diff
            .detached_transactions()
            .filter(|tx| !tx.is_coinbase() && !attached.contains(tx.get_id()))
            .cloned()
            .collect();
        if diff.is_reorg() {
            let count = self.pool.restore(restored);
            info!(
                "Reorganized {} blocks out and {} in, {count} transactions back in the pool",
                diff.detached.len(),
                diff.attached.len()
            );
        }
        *reconciled = head;
        Ok(())
    }

    /// Admission plus coinbase for a candidate on the current canonical head. None when
    /// nothing in the pool is admissible.
    fn next_job(&self) -> Result<Option<MiningJob>> {
        let pending = self.pool.get_all();
        if pending.is_empty() {
            return Ok(None);
        }
        let parent = self.blockchain.canonical_head_hash()?;
        let chain = self.blockchain.chain_from(parent)?;
        let batch = prepare_transactions(&pending, &chain, self.wallet.identity().as_ref());
        if batch.is_empty() {
            info!(
                "None of {} pooled transactions is admissible, waiting for changes",
                pending.len()
            );
            return Ok(None);
        }

        let reward = self
            .config
            .block_reward
            .checked_add(batch.fees)
            .ok_or_else(|| BlockchainError::Mining("Block reward overflows".to_string()))?;
        let own = self.wallet.own_public_key();
        let coinbase = self.wallet.makeup_transaction(
            true,
            TxOutput::new(own.clone(), own, reward, Amount::ZERO),
            Amount::ZERO,
        )?;

        let mut data = batch.admitted;
        data.push(coinbase);
        Ok(Some(MiningJob {
            parent,
            data,
            start_nonce: rand::random(),
            attempts: self.config.nonce_range,
        }))
    }

    fn accept_mined_block(&self, block: Block) {
        let record = block.to_record();
        match self.blockchain.submit_block(block) {
            Ok(outcome) => {
                if outcome.is_accepted() {
                    info!("Mined block {}", outcome.hash);
                    let broadcaster = self.broadcaster.clone();
                    let spawned = thread::Builder::new()
                        .name("broadcast".to_string())
                        .spawn(move || {
                            let report = broadcaster.broadcast_block(&record);
                            if !report.is_complete() {
                                warn!(
                                    "Block reached {} peers, {} failed",
                                    report.delivered.len(),
                                    report.failed.len()
                                );
                            }
                        });
                    if let Err(e) = spawned {
                        error!("Failed to spawn broadcast thread: {e}");
                    }
                }
                if let Err(e) = self.reconcile() {
                    error!("Failed to reconcile the pool after mining: {e}");
                }
            }
            Err(e) => error!("Mined block was not accepted: {e}"),
        }
    }
}

struct Controller {
    shared: Arc<MinerShared>,
    commands: Receiver<MinerCommand>,
    search: Option<SearchHandle>,
}

impl Controller {
    fn run(mut self) {
        let commands = self.commands.clone();
        loop {
            let results = match &self.search {
                Some(search) => search.results().clone(),
                None => never(),
            };
            select! {
                recv(commands) -> command => match command {
                    Ok(MinerCommand::Start) | Ok(MinerCommand::PoolChanged) => {
                        if self.search.is_none() {
                            self.begin_search();
                        }
                    }
                    Ok(MinerCommand::Stop) => self.end_search(),
                    Ok(MinerCommand::ChainChanged) => {
                        self.end_search();
                        self.begin_search();
                    }
                    Ok(MinerCommand::Shutdown) | Err(_) => {
                        self.end_search();
                        debug!("Miner controller stopped");
                        return;
                    }
                },
                recv(results) -> outcome => {
                    self.search = None;
                    self.shared.set_current_search(None);
                    match outcome {
                        Ok(Ok(SearchOutcome::Found(block))) => {
                            self.shared.accept_mined_block(block);
                            self.begin_search();
                        }
                        Ok(Ok(SearchOutcome::Exhausted { attempts })) => {
                            warn!("No valid nonce in {attempts} attempts, restarting the search");
                            self.begin_search();
                        }
                        Ok(Ok(SearchOutcome::Cancelled)) => debug!("Search cancelled"),
                        Ok(Err(e)) => {
                            error!("Search failed: {e}");
                            if e.is_retryable() {
                                self.begin_search();
                            }
                        }
                        Err(_) => error!("PoW worker vanished without a result"),
                    }
                }
            }
        }
    }

    /// Start a search if the miner is running and the pool yields a candidate
    fn begin_search(&mut self) {
        if !self.shared.is_running() || self.search.is_some() {
            return;
        }
        let job = match self.shared.next_job() {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to prepare a candidate: {e}");
                return;
            }
        };
        let count = job.data.len();
        match spawn_search(self.shared.blockchain.pow().clone(), job) {
            Ok(search) => {
                info!("Mining {count} transactions on top of {}", search.parent());
                self.shared.set_current_search(Some(search.cancel_flag()));
                self.search = Some(search);
            }
            Err(e) => error!("{e}"),
        }
    }

    fn end_search(&mut self) {
        if let Some(search) = self.search.take() {
            search.cancel();
        }
        self.shared.set_current_search(None);
    }
}

/// Handle to the mining controller. Dropping it shuts the controller down.
pub struct Miner {
    shared: Arc<MinerShared>,
    commands: Sender<MinerCommand>,
    controller: Mutex<Option<JoinHandle<()>>>,
}

impl Miner {
    pub fn spawn(
        blockchain: Blockchain,
        wallet: Wallet,
        broadcaster: Arc<dyn Broadcaster>,
        config: MinerConfig,
    ) -> Result<Miner> {
        let head = blockchain.canonical_head_hash()?;
        let shared = Arc::new(MinerShared {
            blockchain,
            wallet,
            pool: MemoryPool::new(),
            broadcaster,
            config,
            running: AtomicBool::new(false),
            current_search: Mutex::new(None),
            reconciled_head: Mutex::new(head),
        });
        let (commands, receiver) = unbounded();
        let controller = Controller {
            shared: shared.clone(),
            commands: receiver,
            search: None,
        };
        let handle = thread::Builder::new()
            .name("miner".to_string())
            .spawn(move || controller.run())
            .map_err(|e| BlockchainError::Mining(format!("Failed to spawn miner thread: {e}")))?;

        Ok(Miner {
            shared,
            commands,
            controller: Mutex::new(Some(handle)),
        })
    }

    fn send(&self, command: MinerCommand) {
        if let Err(e) = self.commands.send(command) {
            error!("Miner controller is gone: {e}");
        }
    }

    pub fn start(&self) {
        if !self.shared.running.swap(true, Ordering::SeqCst) {
            info!("Mining started");
        }
        self.send(MinerCommand::Start);
    }

    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            info!("Mining stopped");
        }
        self.shared.cancel_search();
        self.send(MinerCommand::Stop);
    }

    pub fn state(&self) -> MiningState {
        if self.shared.is_running() {
            MiningState::Running
        } else {
            MiningState::Paused
        }
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.shared.pool
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.shared.blockchain
    }

    /// Queue a transaction for mining. Returns false when it is already pooled.
    pub fn submit_transaction(&self, transaction: Transaction) -> Result<bool> {
        transaction.check_structure()?;
        if transaction.is_coinbase() {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Coinbase transaction {} cannot be submitted",
                transaction.get_id()
            )));
        }
        let id = transaction.get_id().to_string();
        let _reconciled = self.shared.reconciled_head.lock()?;
        if self.shared.blockchain.is_confirmed(&id)? {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Transaction {id} is already confirmed"
            )));
        }
        if !self.shared.pool.add(transaction) {
            debug!("Transaction {id} is already pooled");
            return Ok(false);
        }
        info!("Pooled transaction {id}");
        self.send(MinerCommand::PoolChanged);
        Ok(true)
    }

    /// Handle a block from a peer: interrupt the running search, update the tree, reconcile
    /// the pool and let the controller resume on the new head.
    pub fn verify_and_save_candidate(&self, record: BlockRecord) -> Result<SubmitOutcome> {
        let block = match self.shared.blockchain.check_block(record) {
            Ok(block) => block,
            Err(e) => {
                error!("Rejected candidate block: {e}");
                return Err(e);
            }
        };

        self.shared.cancel_search();
        let outcome = self.shared.blockchain.submit_block(block);
        if outcome.is_ok() {
            self.shared.reconcile()?;
        }
        self.send(MinerCommand::ChainChanged);
        outcome
    }

    pub fn shutdown(&self) {
        let handle = match self.controller.lock() {
            Ok(mut controller) => controller.take(),
            Err(_) => {
                error!("Failed to acquire lock on the miner controller handle");
                None
            }
        };
        let handle = match handle {
            Some(handle) => handle,
            None => return,
        };
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.cancel_search();
        self.send(MinerCommand::Shutdown);
        if handle.join().is_err() {
            error!("Miner controller panicked");
        }
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
