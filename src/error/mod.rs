//! Error handling for the ledger engine
//!
//! Every fallible operation returns [`Result`]. Variants follow three families:
//! caller-input errors (`Validation`, `InsufficientFunds`, `UnknownAccount`),
//! integrity errors (`Linkage`, `ProofInvalid`) and round-scoped errors
//! (`ProofExhausted`, `NoPeersRegistered`, `Network`).

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Account identifier used by the ledger store
pub type AccountId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Malformed transaction or account input
    Validation(String),
    /// A block does not link to the hash of its predecessor
    Linkage { index: u64 },
    /// A block's stored nonce does not satisfy the admission predicate
    ProofInvalid { index: u64 },
    /// Nonce search ran past the ceiling without an admitted hash
    ProofExhausted { floor: u64, ceiling: u64 },
    /// Consensus round started with an empty peer registry
    NoPeersRegistered,
    /// Peer communication errors
    Network(String),
    /// Sender cannot cover the requested debit
    InsufficientFunds {
        account: AccountId,
        required: u64,
        available: u64,
    },
    /// Ledger store has no such account
    UnknownAccount(AccountId),
    /// Database-related errors
    Database(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
    /// Cryptographic operation errors
    Crypto(String),
}

impl BlockchainError {
    /// Chain integrity violations. These abort the enclosing operation and are
    /// never repaired silently.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            BlockchainError::Linkage { .. } | BlockchainError::ProofInvalid { .. }
        )
    }

    /// Errors the caller can fix by correcting input or retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BlockchainError::Validation(_)
                | BlockchainError::InsufficientFunds { .. }
                | BlockchainError::UnknownAccount(_)
                | BlockchainError::ProofExhausted { .. }
                | BlockchainError::NoPeersRegistered
                | BlockchainError::Network(_)
        )
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Validation(msg) => write!(f, "Validation error: {msg}"),
            // Integrity failures point at a bug or tampering, so keep them generic
            BlockchainError::Linkage { index } => {
                write!(f, "Chain integrity error at block {index}")
            }
            BlockchainError::ProofInvalid { index } => {
                write!(f, "Invalid proof of work at block {index}")
            }
            BlockchainError::ProofExhausted { floor, ceiling } => {
                write!(f, "No admissible nonce found in range {floor}..={ceiling}")
            }
            BlockchainError::NoPeersRegistered => write!(f, "No peers registered"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::InsufficientFunds {
                account,
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds in account {account}: required {required}, available {available}"
                )
            }
            BlockchainError::UnknownAccount(id) => write!(f, "Unknown account: {id}"),
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_errors_are_not_recoverable() {
        let linkage = BlockchainError::Linkage { index: 3 };
        let proof = BlockchainError::ProofInvalid { index: 3 };
        assert!(linkage.is_integrity() && !linkage.is_recoverable());
        assert!(proof.is_integrity() && !proof.is_recoverable());
    }

    #[test]
    fn test_funds_error_reports_detail() {
        let err = BlockchainError::InsufficientFunds {
            account: 7,
            required: 100,
            available: 40,
        };
        assert!(err.is_recoverable());
        let text = err.to_string();
        assert!(text.contains("7"));
        assert!(text.contains("100"));
        assert!(text.contains("40"));
    }
}
