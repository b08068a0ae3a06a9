//! Test utilities for ledger testing

use crate::config::Settings;
use crate::core::{Block, Transaction};
use crate::engine::LedgerEngine;
use crate::error::{AccountId, BlockchainError, Result};
use crate::network::Transport;
use crate::storage::open_database;
use crate::utils::EcdsaP256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Peer transport driven by the test: chains are served from a map, pushed
/// transactions are recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    chains: Mutex<HashMap<String, Vec<Block>>>,
    pushed: Mutex<Vec<(String, Transaction)>>,
    fail_pushes: AtomicBool,
}

impl ScriptedTransport {
    pub fn serve_chain(&self, peer: &str, blocks: Vec<Block>) {
        self.chains.lock().unwrap().insert(peer.to_string(), blocks);
    }

    pub fn pushed(&self) -> Vec<(String, Transaction)> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn fail_pushes(&self) {
        self.fail_pushes.store(true, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    fn fetch_remote_chain(&self, peer: &str) -> Result<Vec<Block>> {
        self.chains
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .ok_or_else(|| BlockchainError::Network(format!("{peer} is unreachable")))
    }

    fn push_transaction(&self, peer: &str, tx: &Transaction) -> Result<()> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(BlockchainError::Network(format!("{peer} is unreachable")));
        }
        self.pushed
            .lock()
            .unwrap()
            .push((peer.to_string(), tx.clone()));
        Ok(())
    }
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

/// Settings rooted in a throwaway data directory
pub fn test_settings(dir: &TempDir) -> Settings {
    Settings {
        data_dir: dir.path().to_path_buf(),
        ..Settings::default()
    }
}

/// Engine on a temporary in-memory database with a scripted transport
pub fn open_engine() -> (LedgerEngine, Arc<ScriptedTransport>) {
    open_engine_with(Arc::new(ScriptedTransport::default()))
}

pub fn open_engine_with(
    transport: Arc<ScriptedTransport>,
) -> (LedgerEngine, Arc<ScriptedTransport>) {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let engine = LedgerEngine::with_components(
        Settings::default(),
        &db,
        transport.clone(),
        Box::new(EcdsaP256),
    )
    .unwrap();
    (engine, transport)
}

/// Create several engines, each with its own on-disk database
pub fn create_test_network(
    node_count: usize,
) -> Result<Vec<(LedgerEngine, Arc<ScriptedTransport>, TempDir)>> {
    let mut nodes = Vec::new();
    for i in 0..node_count {
        let temp_dir = create_temp_dir()?;
        let db = open_database(&temp_dir.path().join(format!("test_node_{i}")))?;
        let transport = Arc::new(ScriptedTransport::default());
        let engine = LedgerEngine::with_components(
            test_settings(&temp_dir),
            &db,
            transport.clone(),
            Box::new(EcdsaP256),
        )?;
        nodes.push((engine, transport, temp_dir));
    }
    Ok(nodes)
}

/// Seal `count` blocks for `miner`, returning the last one
pub fn mine_blocks(engine: &LedgerEngine, miner: AccountId, count: usize) -> Result<Block> {
    let mut last = None;
    for _ in 0..count {
        last = Some(engine.mine(miner)?);
    }
    last.ok_or_else(|| BlockchainError::Validation("No blocks requested".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_network() {
        let nodes = create_test_network(3).unwrap();
        assert_eq!(nodes.len(), 3);
        for (engine, _, _) in &nodes {
            assert_eq!(engine.chain().length().unwrap(), 0);
        }
    }

    #[test]
    fn test_mine_blocks() {
        let (engine, _) = open_engine();
        engine.open_account(7, 0, None).unwrap();
        let last = mine_blocks(&engine, 7, 3).unwrap();
        assert_eq!(last.get_index(), 2);
        assert!(mine_blocks(&engine, 7, 0).is_err());
    }

    #[test]
    fn test_scripted_transport() {
        let transport = ScriptedTransport::default();
        assert!(transport.fetch_remote_chain("a:1").is_err());
        transport.serve_chain("a:1", vec![]);
        assert_eq!(transport.fetch_remote_chain("a:1").unwrap(), vec![]);
    }
}
