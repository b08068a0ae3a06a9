//! Data storage and persistence
//!
//! Sled-backed durable collections (blocks, memory pool, peers), the memory
//! pool itself and the account ledger the chain settles against.

pub mod collection;
pub mod ledger;
pub mod memory_pool;

pub use collection::{Collection, SledCollection};
pub use ledger::{Account, Ledger, SledLedger};
pub use memory_pool::MemoryPool;

use crate::error::{BlockchainError, Result};
use std::path::Path;

pub const BLOCKS_TREE: &str = "blocks";
pub const MEMPOOL_TREE: &str = "mempool";
pub const PEERS_TREE: &str = "peers";

/// Open (or create) the node's sled database
pub fn open_database(path: &Path) -> Result<sled::Db> {
    sled::open(path).map_err(|e| {
        BlockchainError::Database(format!(
            "Failed to open database at {}: {e}",
            path.display()
        ))
    })
}
