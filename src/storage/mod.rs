//! Data storage and persistence
//!
//! The append-only chain file and the pending transaction pool.

pub mod chain_file;
pub mod memory_pool;

pub use chain_file::{ChainFile, BLOCKCHAIN_FILENAME};
pub use memory_pool::MemoryPool;
