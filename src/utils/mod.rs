//! Utility functions and helpers
//!
//! Hashing, signatures and the short key tags used when printing blocks.

pub mod crypto;

pub use crypto::{
    base58_encode, ecdsa_p256_sha256_sign, ecdsa_p256_sha256_sign_verify, key_pair_from_pkcs8,
    key_tag, new_key_pair, public_key_bytes, ripemd160_digest, sha256_digest, KEY_TAG_LEN,
};
