// The node's signing identity and the directory of peers it knows about.
//
// Everything that signs or verifies goes through the `Identity` trait so tests and
// alternative key stores can stand in for the on-disk key pair.

use crate::core::{PublicKey, Signature};
use crate::error::{BlockchainError, Result};
use crate::utils::{
    ecdsa_p256_sha256_sign, ecdsa_p256_sha256_sign_verify, key_pair_from_pkcs8, new_key_pair,
    public_key_bytes,
};
use data_encoding::HEXLOWER;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use ring::signature::EcdsaKeyPair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub trait Identity: Send + Sync {
    fn own_public_key(&self) -> PublicKey;

    fn sign(&self, message: &[u8]) -> Result<Signature>;

    /// Check `signature` over `message` against `public_key`
    fn verify(&self, public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool;

    fn peer_directory(&self) -> PeerDirectory;
}

/// A peer's listening address and account key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub ip: String,
    pub pub_key: PublicKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerDirectory {
    entries: Vec<PeerEntry>,
}

impl PeerDirectory {
    pub fn new(entries: Vec<PeerEntry>) -> PeerDirectory {
        PeerDirectory { entries }
    }

    pub fn entries(&self) -> &[PeerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Peers whose key is not `own`
    pub fn others<'a>(&'a self, own: &'a PublicKey) -> impl Iterator<Item = &'a PeerEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.pub_key != *own)
    }

    pub fn random_other_key<R: Rng + ?Sized>(&self, own: &PublicKey, rng: &mut R) -> Option<PublicKey> {
        let others: Vec<&PeerEntry> = self.others(own).collect();
        others.choose(rng).map(|entry| entry.pub_key.clone())
    }
}

/// ECDSA P-256 key pair kept as PKCS#8 hex in a key file
pub struct KeyPairIdentity {
    key_pair: EcdsaKeyPair,
    public_key: PublicKey,
    peers: PeerDirectory,
}

impl KeyPairIdentity {
    pub fn generate() -> Result<KeyPairIdentity> {
        let pkcs8 = new_key_pair()?;
        KeyPairIdentity::from_pkcs8(&pkcs8)
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<KeyPairIdentity> {
        let key_pair = key_pair_from_pkcs8(pkcs8)?;
        let public_key = PublicKey::from_bytes(&public_key_bytes(&key_pair));
        Ok(KeyPairIdentity {
            key_pair,
            public_key,
            peers: PeerDirectory::default(),
        })
    }

    /// Read the key file at `path`, creating it with a fresh key pair when absent
    pub fn load_or_generate(path: &Path) -> Result<KeyPairIdentity> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let pkcs8 = HEXLOWER.decode(contents.trim().as_bytes()).map_err(|e| {
                BlockchainError::Crypto(format!("Key file {} is not valid hex: {e}", path.display()))
            })?;
            return KeyPairIdentity::from_pkcs8(&pkcs8);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pkcs8 = new_key_pair()?;
        fs::write(path, HEXLOWER.encode(&pkcs8))?;
        let identity = KeyPairIdentity::from_pkcs8(&pkcs8)?;
        info!(
            "Generated new key pair {} in {}",
            identity.public_key.tag(),
            path.display()
        );
        Ok(identity)
    }

    pub fn with_peers(mut self, peers: PeerDirectory) -> KeyPairIdentity {
        self.peers = peers;
        self
    }
}

impl Identity for KeyPairIdentity {
    fn own_public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Signature> {
        let signature = ecdsa_p256_sha256_sign(&self.key_pair, message)?;
        Ok(Signature::from_bytes(&signature))
    }

    fn verify(&self, public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
        match (public_key.to_bytes(), signature.to_bytes()) {
            (Ok(key), Ok(sig)) => ecdsa_p256_sha256_sign_verify(&key, &sig, message),
            _ => false,
        }
    }

    fn peer_directory(&self) -> PeerDirectory {
        self.peers.clone()
    }
}
