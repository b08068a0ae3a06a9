use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::server::{ChainResponse, Package};
use crate::network::Node;
use log::{debug, info, warn};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Default bound on connecting to, writing to and reading from a peer
pub const TCP_TIMEOUT: u64 = 5000;

/// How this node talks to its peers.
pub trait Transport: Send + Sync {
    /// Ask a peer for its full chain
    fn fetch_remote_chain(&self, peer: &str) -> Result<Vec<Block>>;
    /// Hand a transaction to a peer for staging
    fn push_transaction(&self, peer: &str, tx: &Transaction) -> Result<()>;
}

/// One request per connection: write a JSON package, half-close, read the
/// single reply.
pub struct TcpTransport {
    addr_from: String,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr_from: &str, timeout_ms: u64) -> TcpTransport {
        TcpTransport {
            addr_from: addr_from.to_string(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn request(&self, peer: &str, pkg: &Package) -> Result<Package> {
        let addr = Node::from_addr(peer).parse_socket_addr()?;
        debug!("Sending package to {addr}: {pkg:?}");

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| BlockchainError::Network(format!("Failed to connect to {peer}: {e}")))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

        serde_json::to_writer(&stream, pkg)
            .map_err(|e| BlockchainError::Network(format!("Failed to send to {peer}: {e}")))?;
        stream
            .flush()
            .map_err(|e| BlockchainError::Network(format!("Failed to send to {peer}: {e}")))?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|e| BlockchainError::Network(format!("Failed to close write half: {e}")))?;

        let reader = BufReader::new(&stream);
        let reply = Deserializer::from_reader(reader)
            .into_iter::<Package>()
            .next()
            .ok_or_else(|| {
                BlockchainError::Network(format!("{peer} closed the connection without a reply"))
            })?
            .map_err(|e| BlockchainError::Network(format!("Malformed reply from {peer}: {e}")))?;

        let _ = stream.shutdown(Shutdown::Both);
        Ok(reply)
    }
}

impl Transport for TcpTransport {
    fn fetch_remote_chain(&self, peer: &str) -> Result<Vec<Block>> {
        let pkg = Package::GetChain {
            addr_from: self.addr_from.clone(),
        };
        match self.request(peer, &pkg)? {
            Package::Chain { response, .. } => {
                let ChainResponse { blocks, length } = response;
                if length != blocks.len() {
                    warn!(
                        "{peer} reported length {length} but sent {} blocks",
                        blocks.len()
                    );
                    return Err(BlockchainError::Network(format!(
                        "Inconsistent chain response from {peer}"
                    )));
                }
                info!("Fetched chain of length {} from {peer}", blocks.len());
                Ok(blocks)
            }
            other => Err(BlockchainError::Network(format!(
                "Unexpected reply to chain request from {peer}: {other:?}"
            ))),
        }
    }

    fn push_transaction(&self, peer: &str, tx: &Transaction) -> Result<()> {
        let pkg = Package::Tx {
            addr_from: self.addr_from.clone(),
            transaction: tx.clone(),
        };
        match self.request(peer, &pkg)? {
            Package::Ack { .. } => Ok(()),
            Package::Rejected { reason, .. } => Err(BlockchainError::Network(format!(
                "{peer} rejected transaction: {reason}"
            ))),
            other => Err(BlockchainError::Network(format!(
                "Unexpected reply to transaction from {peer}: {other:?}"
            ))),
        }
    }
}
