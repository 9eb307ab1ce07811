// The node facade: wires the block tree, wallet, miner, generator and broadcaster together
// and answers every request the server accepts.

use crate::config::Config;
use crate::core::{Amount, BlockRecord, Blockchain, BlockStatus, PublicKey, SubmitOutcome, Transaction};
use crate::error::Result;
use crate::miner::{Generator, Miner, MinerConfig, MiningState};
use crate::network::{Broadcaster, Package, Response, TcpBroadcaster};
use crate::wallet::{Identity, KeyPairIdentity, Wallet};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

pub struct Node {
    blockchain: Blockchain,
    wallet: Wallet,
    miner: Arc<Miner>,
    generator: Generator,
    broadcaster: Arc<dyn Broadcaster>,
    generator_interval: Duration,
    default_fee: Amount,
}

impl Node {
    pub fn new(
        blockchain: Blockchain,
        identity: Arc<dyn Identity>,
        broadcaster: Arc<dyn Broadcaster>,
        miner_config: MinerConfig,
        generator_interval: Duration,
        default_fee: Amount,
    ) -> Result<Node> {
        let wallet = Wallet::new(blockchain.clone(), identity);
        let miner = Arc::new(Miner::spawn(
            blockchain.clone(),
            wallet.clone(),
            broadcaster.clone(),
            miner_config,
        )?);
        let generator = Generator::new(wallet.clone(), miner.clone(), broadcaster.clone(), default_fee);
        Ok(Node {
            blockchain,
            wallet,
            miner,
            generator,
            broadcaster,
            generator_interval,
            default_fee,
        })
    }

    /// Open the chain in the configured data directory, load or create the key file and
    /// broadcast to the configured peers over TCP.
    pub fn from_config(config: &Config) -> Result<Node> {
        let blockchain = Blockchain::open(
            &config.node.data_dir,
            config.mining.difficulty_bits,
            &config.genesis.allocations,
        )?;
        let identity = KeyPairIdentity::load_or_generate(&config.key_file())?
            .with_peers(config.peer_directory());
        let broadcaster = TcpBroadcaster::new(
            config.node.address.clone(),
            identity.own_public_key(),
            config.peer_directory(),
        );
        info!(
            "Node {} uses key {}",
            config.node.address,
            identity.own_public_key().tag()
        );
        Node::new(
            blockchain,
            Arc::new(identity),
            Arc::new(broadcaster),
            config.miner_config(),
            config.generator_interval(),
            config.generator.fee,
        )
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn submit_block(&self, record: BlockRecord) -> Result<SubmitOutcome> {
        self.miner.verify_and_save_candidate(record)
    }

    pub fn submit_transaction(&self, transaction: Transaction) -> Result<bool> {
        self.miner.submit_transaction(transaction)
    }

    pub fn block_count(&self) -> Result<usize> {
        self.blockchain.block_count()
    }

    /// Balance of `pub_key`, or of this node's own key
    pub fn balance(&self, pub_key: Option<&PublicKey>) -> Result<Amount> {
        match pub_key {
            Some(key) => self.wallet.check_balance(key),
            None => self.wallet.own_balance(),
        }
    }

    pub fn start_mining(&self) {
        self.miner.start();
    }

    pub fn stop_mining(&self) {
        self.miner.stop();
    }

    pub fn mining_state(&self) -> MiningState {
        self.miner.state()
    }

    pub fn start_generator(&self, interval: Option<Duration>) -> Result<bool> {
        self.generator.start(interval.unwrap_or(self.generator_interval))
    }

    pub fn stop_generator(&self) -> Result<bool> {
        self.generator.stop()
    }

    pub fn verify_blockchain(&self) -> bool {
        self.blockchain.is_valid()
    }

    /// Pay `amount` to `to` from this node's wallet, pool the payment and broadcast it
    pub fn send(&self, to: PublicKey, amount: Amount, fee: Option<Amount>) -> Result<Transaction> {
        let transaction = self
            .wallet
            .transfer(to, amount, fee.unwrap_or(self.default_fee))?;
        self.miner.submit_transaction(transaction.clone())?;
        self.broadcaster.broadcast_transaction(&transaction);
        Ok(transaction)
    }

    /// Answer one request
    pub fn handle(&self, package: Package) -> Response {
        match self.dispatch(package) {
            Ok(response) => response,
            Err(e) => {
                error!("Request failed: {e}");
                Response::rejected(e.to_string())
            }
        }
    }

    fn dispatch(&self, package: Package) -> Result<Response> {
        let response = match package {
            Package::SubmitBlock { addr_from, block } => {
                let outcome = self.submit_block(block)?;
                if outcome.status == BlockStatus::Duplicate {
                    info!("Block {} from {addr_from} was already known", outcome.hash);
                }
                Response::accepted()
            }
            Package::SubmitTransaction {
                addr_from,
                transaction,
            } => {
                if !self.submit_transaction(transaction)? {
                    info!("Transaction from {addr_from} was already pooled");
                }
                Response::accepted()
            }
            Package::GetBlockCount => Response::Count {
                count: self.block_count()?,
            },
            Package::GetBalance { pub_key } => Response::Balance {
                current_balance: self.balance(pub_key.as_ref())?,
            },
            Package::StartMining => {
                self.start_mining();
                Response::status("mining started")
            }
            Package::StopMining => {
                self.stop_mining();
                Response::status("mining stopped")
            }
            Package::StartGenerator { interval_secs } => {
                let started = self.start_generator(interval_secs.map(Duration::from_secs))?;
                Response::status(if started {
                    "generator started"
                } else {
                    "generator already running"
                })
            }
            Package::StopGenerator => {
                let stopped = self.stop_generator()?;
                Response::status(if stopped {
                    "generator stopped"
                } else {
                    "generator was not running"
                })
            }
            Package::VerifyBlockchain => Response::Verified {
                verified: self.verify_blockchain(),
            },
            Package::Send { to, amount, fee } => {
                let transaction = self.send(to, amount, fee)?;
                Response::Submitted {
                    id: transaction.get_id().to_string(),
                }
            }
        };
        Ok(response)
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.generator.stop() {
            error!("Failed to stop the generator: {e}");
        }
        self.miner.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenesisAllocation;
    use crate::testnet::test_utils::{test_identity, RecordingBroadcaster};

    fn node() -> (Node, PublicKey, Arc<RecordingBroadcaster>) {
        let identity = test_identity();
        let own = identity.own_public_key();
        let blockchain = Blockchain::in_memory(
            0,
            &[GenesisAllocation {
                pub_key: own.clone(),
                amount: Amount::from_coins(100),
            }],
        )
        .unwrap();
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let node = Node::new(
            blockchain,
            Arc::new(identity),
            broadcaster.clone(),
            MinerConfig::default(),
            Duration::from_secs(5),
            Amount::from_millis(2),
        )
        .unwrap();
        (node, own, broadcaster)
    }

    #[test]
    fn test_queries() {
        let (node, own, _) = node();
        assert_eq!(node.handle(Package::GetBlockCount), Response::Count { count: 1 });
        assert_eq!(
            node.handle(Package::GetBalance { pub_key: None }),
            Response::Balance {
                current_balance: Amount::from_coins(100)
            }
        );
        assert_eq!(
            node.handle(Package::GetBalance {
                pub_key: Some(PublicKey::from("nobody"))
            }),
            Response::Balance {
                current_balance: Amount::ZERO
            }
        );
        assert_eq!(
            node.handle(Package::VerifyBlockchain),
            Response::Verified { verified: true }
        );
        assert_eq!(node.balance(Some(&own)).unwrap(), Amount::from_coins(100));
    }

    #[test]
    fn test_send_pools_and_broadcasts() {
        let (node, _, broadcaster) = node();
        let response = node.handle(Package::Send {
            to: PublicKey::from("bob"),
            amount: Amount::from_coins(10),
            fee: None,
        });
        let id = match response {
            Response::Submitted { id } => id,
            other => panic!("unexpected response {other:?}"),
        };
        assert!(node.miner().pool().contains(&id));
        assert_eq!(broadcaster.transaction_count(), 1);

        let overspend = node.handle(Package::Send {
            to: PublicKey::from("bob"),
            amount: Amount::from_coins(1000),
            fee: None,
        });
        assert!(matches!(overspend, Response::Ack { accepted: false, .. }));
    }

    #[test]
    fn test_mining_and_generator_controls() {
        let (node, _, _) = node();
        node.handle(Package::StartMining);
        assert_eq!(node.mining_state(), MiningState::Running);
        node.handle(Package::StopMining);
        assert_eq!(node.mining_state(), MiningState::Paused);

        assert_eq!(
            node.handle(Package::StartGenerator { interval_secs: Some(60) }),
            Response::status("generator started")
        );
        assert_eq!(
            node.handle(Package::StopGenerator),
            Response::status("generator stopped")
        );
        node.shutdown();
    }
}
