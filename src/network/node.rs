use crate::error::{BlockchainError, Result};
use crate::storage::Collection;
use log::{info, warn};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    addr: String,
}

impl Node {
    fn new(addr: String) -> Node {
        Node { addr }
    }

    pub fn from_addr(addr: &str) -> Node {
        Node::new(addr.to_string())
    }

    pub fn get_addr(&self) -> String {
        self.addr.clone()
    }

    /// Resolve the peer address. Host names are allowed, so this may hit DNS.
    pub fn parse_socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .to_socket_addrs()
            .map_err(|e| BlockchainError::Network(format!("Invalid address {}: {e}", self.addr)))?
            .next()
            .ok_or_else(|| {
                BlockchainError::Network(format!("Address {} did not resolve", self.addr))
            })
    }
}

/// The set of peer addresses this node reconciles with.
///
/// Insertion-ordered and duplicate free. Every change is written through to
/// the peers collection so the set survives a restart.
pub struct PeerRegistry {
    inner: RwLock<Vec<Node>>,
    store: Box<dyn Collection<String>>,
    max_peers: usize,
}

impl PeerRegistry {
    pub fn open(store: Box<dyn Collection<String>>, max_peers: usize) -> Result<PeerRegistry> {
        let mut nodes: Vec<Node> = Vec::new();
        for addr in store.read_all()? {
            if !nodes.iter().any(|x| x.addr == addr) {
                nodes.push(Node::new(addr));
            }
        }
        if nodes.len() > max_peers {
            warn!(
                "Persisted peer set has {} entries, above the limit of {max_peers}",
                nodes.len()
            );
        }
        Ok(PeerRegistry {
            inner: RwLock::new(nodes),
            store,
            max_peers,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Node>>> {
        self.inner
            .read()
            .map_err(|_| BlockchainError::Network("Peer registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Node>>> {
        self.inner
            .write()
            .map_err(|_| BlockchainError::Network("Peer registry lock poisoned".to_string()))
    }

    fn persist(&self, nodes: &[Node]) -> Result<()> {
        let addrs: Vec<String> = nodes.iter().map(Node::get_addr).collect();
        self.store.write_all(&addrs)
    }

    /// Register a peer. Returns false when it was already known.
    pub fn add(&self, addr: &str) -> Result<bool> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(BlockchainError::Validation(
                "Peer address must not be empty".to_string(),
            ));
        }

        let mut inner = self.write()?;
        if inner.iter().any(|x| x.addr == addr) {
            return Ok(false);
        }
        if inner.len() >= self.max_peers {
            return Err(BlockchainError::Network(format!(
                "Peer limit of {} reached, not adding {addr}",
                self.max_peers
            )));
        }

        self.store.append_one(&addr.to_string())?;
        inner.push(Node::new(addr.to_string()));
        info!("Registered peer {addr}");
        Ok(true)
    }

    /// Forget a peer. Returns false when it was not registered.
    pub fn remove(&self, addr: &str) -> Result<bool> {
        let mut inner = self.write()?;
        let Some(idx) = inner.iter().position(|x| x.addr == addr) else {
            return Ok(false);
        };

        let mut updated = inner.clone();
        updated.remove(idx);
        self.persist(&updated)?;
        *inner = updated;
        info!("Removed peer {addr}");
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        self.persist(&[])?;
        inner.clear();
        info!("Cleared peer registry");
        Ok(())
    }

    /// Snapshot of every registered address, in insertion order
    pub fn peers(&self) -> Result<Vec<String>> {
        Ok(self.read()?.iter().map(Node::get_addr).collect())
    }

    pub fn contains(&self, addr: &str) -> Result<bool> {
        Ok(self.read()?.iter().any(|x| x.addr == addr))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }
}
