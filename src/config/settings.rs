use crate::core::proof_of_work::{
    DEFAULT_ADMISSION_SUFFIX, DEFAULT_NONCE_CEILING, DEFAULT_NONCE_FLOOR,
};
use crate::core::{NoncePolicy, ProofOfWork, INITIAL_BLOCK_REWARD};
use crate::error::{BlockchainError, Result};
use crate::network::TCP_TIMEOUT;
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_MAX_PEERS: usize = 8;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_ID_KEY: &str = "NODE_ID";
const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";
const PEERS_KEY: &str = "LEDGER_PEERS";

/// Node settings: TOML file first, environment on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node_addr: String,
    pub node_id: Option<String>,
    pub data_dir: PathBuf,
    pub admission_suffix: String,
    pub nonce_floor: u64,
    pub nonce_ceiling: u64,
    pub nonce_policy: NoncePolicy,
    pub initial_reward: u64,
    pub peers: Vec<String>,
    pub max_peers: usize,
    pub peer_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            node_addr: DEFAULT_NODE_ADDR.to_string(),
            node_id: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            admission_suffix: DEFAULT_ADMISSION_SUFFIX.to_string(),
            nonce_floor: DEFAULT_NONCE_FLOOR,
            nonce_ceiling: DEFAULT_NONCE_CEILING,
            nonce_policy: NoncePolicy::Sequential,
            initial_reward: INITIAL_BLOCK_REWARD,
            peers: Vec::new(),
            max_peers: DEFAULT_MAX_PEERS,
            peer_timeout_ms: TCP_TIMEOUT,
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file if one is given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Settings> {
        let text = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let settings: Settings = toml::from_str(&text)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        if let Some(addr) = var(NODE_ADDRESS_KEY) {
            self.node_addr = addr;
        }
        if let Some(node_id) = var(NODE_ID_KEY) {
            self.node_id = Some(node_id);
        }
        if let Some(dir) = var(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(peers) = var(PEERS_KEY) {
            self.peers = peers
                .split(',')
                .map(str::trim)
                .filter(|peer| !peer.is_empty())
                .map(String::from)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_addr.trim().is_empty() {
            return Err(BlockchainError::Config(
                "Node address must not be empty".to_string(),
            ));
        }
        if self.max_peers == 0 {
            return Err(BlockchainError::Config(
                "max_peers must be at least 1".to_string(),
            ));
        }
        if self.peer_timeout_ms == 0 {
            return Err(BlockchainError::Config(
                "peer_timeout_ms must be positive".to_string(),
            ));
        }
        // Suffix and nonce range rules live with the proof-of-work itself
        self.proof_of_work().map(|_| ())
    }

    pub fn proof_of_work(&self) -> Result<ProofOfWork> {
        ProofOfWork::new(
            &self.admission_suffix,
            self.nonce_floor,
            self.nonce_ceiling,
            self.nonce_policy,
        )
    }

    /// Node ID from settings, or the port of the node address
    /// (e.g., "127.0.0.1:2001" -> "2001")
    pub fn node_id(&self) -> String {
        if let Some(node_id) = &self.node_id {
            return node_id.clone();
        }
        match self.node_addr.rsplit_once(':') {
            Some((_, port)) if !port.is_empty() => port.to_string(),
            _ => "default".to_string(),
        }
    }

    /// Per-node database directory
    pub fn node_data_path(&self) -> PathBuf {
        self.data_dir.join(format!("node_{}", self.node_id()))
    }
}
