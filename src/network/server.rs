use crate::core::{Block, Transaction};
use crate::engine::LedgerEngine;
use crate::error::{BlockchainError, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TCP_READ_TIMEOUT: u64 = 60_000;

/// Reply to a chain query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub blocks: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn new(blocks: Vec<Block>) -> ChainResponse {
        let length = blocks.len();
        ChainResponse { blocks, length }
    }
}

/// P2P message types
#[derive(Debug, Serialize, Deserialize)]
pub enum Package {
    GetChain {
        addr_from: String,
    },
    Chain {
        addr_from: String,
        response: ChainResponse,
    },
    Tx {
        addr_from: String,
        transaction: Transaction,
    },
    Ack {
        addr_from: String,
    },
    Rejected {
        addr_from: String,
        reason: String,
    },
}

/// TCP front of a node: serves its chain and accepts relayed transactions
pub struct Server {
    engine: Arc<LedgerEngine>,
}

impl Server {
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }

    /// Run the server
    pub fn run(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        self.serve(listener)
    }

    /// Accept connections on an already bound listener, one thread each
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        match listener.local_addr() {
            Ok(addr) => info!("Server listening on {addr}"),
            Err(e) => warn!("Server listening on an unknown address: {e}"),
        }

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };

                    let engine = Arc::clone(&self.engine);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(&engine, stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    /// Handle an individual connection
    fn handle_connection(
        engine: &LedgerEngine,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        let pkg_reader = Deserializer::from_reader(reader).into_iter::<Package>();

        for pkg in pkg_reader {
            let pkg = pkg.map_err(|e| {
                BlockchainError::Network(format!("Failed to deserialize package: {e}"))
            })?;

            debug!("Received request from {peer_addr}: {pkg:?}");

            if let Some(reply) = Self::process_message(engine, pkg) {
                Self::send_reply(&stream, &reply)?;
            }
        }

        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    /// Process an incoming message, producing the reply to send back
    fn process_message(engine: &LedgerEngine, pkg: Package) -> Option<Package> {
        let addr_from = engine.get_settings().node_addr.clone();
        match pkg {
            Package::GetChain { addr_from: from } => match engine.chain_response() {
                Ok(response) => {
                    info!("Serving chain of length {} to {from}", response.length);
                    Some(Package::Chain {
                        addr_from,
                        response,
                    })
                }
                Err(e) => {
                    error!("Failed to read chain for {from}: {e}");
                    Some(Package::Rejected {
                        addr_from,
                        reason: e.to_string(),
                    })
                }
            },
            // Relayed transactions are staged but never forwarded again
            Package::Tx {
                addr_from: from,
                transaction,
            } => match engine.receive_transaction(transaction) {
                Ok(()) => {
                    info!("Staged transaction relayed by {from}");
                    Some(Package::Ack { addr_from })
                }
                Err(e) => {
                    warn!("Rejected transaction relayed by {from}: {e}");
                    Some(Package::Rejected {
                        addr_from,
                        reason: e.to_string(),
                    })
                }
            },
            other => {
                warn!("Ignoring unsolicited package: {other:?}");
                None
            }
        }
    }

    fn send_reply(mut stream: &TcpStream, reply: &Package) -> Result<()> {
        serde_json::to_writer(stream, reply)
            .map_err(|e| BlockchainError::Network(format!("Failed to send reply: {e}")))?;
        stream
            .flush()
            .map_err(|e| BlockchainError::Network(format!("Failed to send reply: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GENESIS_PREVIOUS_HASH;

    #[test]
    fn test_package_serialization() {
        let pkg = Package::Tx {
            addr_from: "127.0.0.1:2001".to_string(),
            transaction: Transaction::new_transfer(1, 2, 300),
        };

        let serialized = serde_json::to_string(&pkg).unwrap();
        match serde_json::from_str::<Package>(&serialized).unwrap() {
            Package::Tx { transaction, .. } => {
                assert_eq!(transaction, Transaction::new_transfer(1, 2, 300))
            }
            other => panic!("unexpected package {other:?}"),
        }
    }

    #[test]
    fn test_chain_response_length() {
        let block = Block::with_timestamp(0, 1, GENESIS_PREVIOUS_HASH.to_string(), vec![]);
        let response = ChainResponse::new(vec![block.clone(), block]);
        assert_eq!(response.length, 2);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["length"], 2);
        assert_eq!(json["blocks"][0]["previousHash"], "None");
    }
}
