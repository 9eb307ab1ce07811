//! Shared fixtures for unit tests
//!
//! Key pairs, hand-built transactions, blocks built without mining and a broadcaster that
//! records instead of sending.

pub mod test_utils;

pub use test_utils::*;
