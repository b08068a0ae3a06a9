//! # Ledger Chain - A Replicated Account Ledger
//!
//! A hash-linked chain of blocks settling transfers between numbered
//! accounts, with a small proof-of-work and longest-chain reconciliation
//! between peers.
//!
//! ## What's Here
//! - **Chain**: blocks linked by SHA-256 content hash, each admitted by a
//!   fixed hash suffix found through a bounded nonce search
//! - **Accounts**: balances live in a ledger; every transfer pays a flat 2%
//!   fee to the miner, on top of a block reward divided by 11 on every even
//!   height
//! - **Memory Pool**: pending transfers in arrival order, drained on sealing
//! - **Consensus**: the unique longest valid peer chain wins; transfers from
//!   orphaned blocks are reversed and re-staged
//! - **Multi-Node**: isolated sled databases so several nodes share a machine
//!
//! ## How the Code Is Organized
//! - `core/`: transactions, blocks, hashing, proof-of-work, the chain
//! - `storage/`: sled collections, memory pool, account ledger
//! - `network/`: peer registry, transport, TCP server, consensus resolver
//! - `engine`: one node's components wired together
//! - `config/`: settings from TOML and the environment
//! - `utils/`: hashing, signatures, serialization helpers
//! - `cli/`: command-line interface for all node operations
//!
//! ## Where to Start
//! 1. `main.rs` for the CLI commands
//! 2. `core/blockchain.rs` for sealing and validation
//! 3. `network/consensus.rs` for reconciliation with peers

pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::Settings;
pub use core::{Block, Blockchain, NoncePolicy, ProofOfWork, Transaction};
pub use engine::LedgerEngine;
pub use error::{AccountId, BlockchainError, Result};
pub use network::{
    ChainResponse, ConsensusResolver, PeerRegistry, Resolution, Server, TcpTransport, Transport,
};
pub use storage::{Collection, Ledger, MemoryPool, SledCollection, SledLedger};
pub use utils::{current_timestamp, sha256_digest, EcdsaP256, SignatureScheme};
