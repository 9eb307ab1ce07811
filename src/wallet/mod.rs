//! Wallet and identity
//!
//! The signing identity with its peer directory, and the UTXO accounting built on top of
//! the block tree.

pub mod identity;
#[allow(clippy::module_inception)]
pub mod wallet;

pub use identity::{Identity, KeyPairIdentity, PeerDirectory, PeerEntry};
pub use wallet::{balance_of, unspent_outputs, Wallet};
