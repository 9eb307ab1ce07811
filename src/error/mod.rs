//! Error handling for the node
//!
//! Every fallible operation returns [`Result`]. Errors are grouped into three kinds so
//! callers can tell a rejected submission from a retryable condition or a real fault.

use thiserror::Error;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// How a caller should react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input was invalid; drop it, nothing changed
    Rejected,
    /// A transient condition; the same operation may succeed later
    Retryable,
    /// Something is broken locally (I/O, poisoned lock, bad config)
    Fault,
}

#[derive(Debug, Clone, Error)]
pub enum BlockchainError {
    /// Block validation errors
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    /// Transaction validation errors
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    /// Proof-of-work search errors
    #[error("Mining error: {0}")]
    Mining(String),
    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(String),
    /// Network communication errors
    #[error("Network error: {0}")]
    Network(String),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),
    /// Insufficient funds for a transfer
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },
    /// Broken internal invariants such as a poisoned lock
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlockchainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockchainError::InvalidBlock(_)
            | BlockchainError::InvalidTransaction(_)
            | BlockchainError::Serialization(_)
            | BlockchainError::InsufficientFunds { .. } => ErrorKind::Rejected,
            BlockchainError::Mining(_) | BlockchainError::Network(_) => ErrorKind::Retryable,
            BlockchainError::Crypto(_)
            | BlockchainError::Config(_)
            | BlockchainError::Io(_)
            | BlockchainError::Internal(_) => ErrorKind::Fault,
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.kind() == ErrorKind::Rejected
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for BlockchainError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        BlockchainError::Internal(format!("lock poisoned: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            BlockchainError::InvalidBlock("bad target".into()).kind(),
            ErrorKind::Rejected
        );
        assert!(BlockchainError::Mining("nonce range exhausted".into()).is_retryable());
        assert_eq!(
            BlockchainError::Io("disk full".into()).kind(),
            ErrorKind::Fault
        );
    }

    #[test]
    fn test_display_messages() {
        let err = BlockchainError::InsufficientFunds {
            required: "10.000".into(),
            available: "4.500".into(),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 10.000, available 4.500"
        );
    }
}
