//! Peer-to-peer networking functionality
//!
//! This module handles communication between ledger nodes: the registry of
//! known peers, the transport used to query them, the TCP server answering
//! their queries and the longest-chain consensus resolver built on top.

pub mod consensus;
pub mod node;
pub mod server;
pub mod transport;

pub use consensus::{ConsensusResolver, Resolution};
pub use node::{Node, PeerRegistry};
pub use server::{ChainResponse, Package, Server};
pub use transport::{TcpTransport, Transport, TCP_TIMEOUT};
