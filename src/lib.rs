//! # Powchain Node
//!
//! A proof-of-work peer node. Each node keeps a block tree with every fork it has seen,
//! mines on the tallest branch, admits payments into a pool and talks to its peers over
//! plain TCP with JSON messages.
//!
//! ## How I Organized the Code
//! - `core/`: blocks, transactions, proof of work and the block tree with its orphan pool
//! - `miner/`: the mining controller, transaction admission and the payment generator
//! - `wallet/`: the node's signing identity, its peer directory and UTXO accounting
//! - `network/`: the wire format, the TCP server, broadcasting and the node facade
//! - `storage/`: the append-only chain file and the transaction pool
//! - `config/`: TOML configuration with environment overrides
//! - `utils/`: hashing and ECDSA helpers
//! - `cli/`: command-line arguments for the binary
//!
//! ## Where to Start
//! 1. `core/blockchain.rs` for how blocks are linked, orphaned and chosen as head
//! 2. `miner/mod.rs` for how mining restarts and how the pool follows reorgs
//! 3. `network/node.rs` for what every request does

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod miner;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::Config;
pub use core::{
    Amount, Block, BlockHash, BlockRecord, BlockStatus, Blockchain, ForkDiff, GenesisAllocation,
    ProofOfWork, PublicKey, Signature, SubmitOutcome, Transaction, TxInput, TxOutput,
};
pub use error::{BlockchainError, Result};
pub use miner::{Generator, Miner, MinerConfig, MiningState};
pub use network::{send_request, Broadcaster, Node, Package, Response, Server, TcpBroadcaster};
pub use storage::{ChainFile, MemoryPool};
pub use wallet::{Identity, KeyPairIdentity, PeerDirectory, PeerEntry, Wallet};
