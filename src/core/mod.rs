//! Core blockchain functionality
//!
//! This module contains the fundamental ledger components: transactions,
//! blocks and their content hash, the Merkle root over a block's transactions,
//! proof-of-work admission, the reward and fee schedule, and the chain itself.

pub mod block;
pub mod blockchain;
pub mod hashing;
pub mod merkle;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use blockchain::{reverse_settlement, Blockchain, ChainGuard};
pub use hashing::{content_hash, hash_block};
pub use merkle::MerkleTree;
pub use monetary::{INITIAL_BLOCK_REWARD, UNITS_PER_COIN};
pub use proof_of_work::{NoncePolicy, ProofOfWork};
pub use transaction::Transaction;
