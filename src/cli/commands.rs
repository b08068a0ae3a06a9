use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-chain")]
pub struct Opt {
    #[arg(long = "config", global = true, help = "Path to a TOML settings file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode,
    #[command(name = "mine", about = "Seal the pending transactions into a new block")]
    Mine {
        #[arg(help = "Account that receives the block reward and fees")]
        miner: u64,
    },
    #[command(name = "send", about = "Submit a transfer between accounts")]
    Send {
        #[arg(help = "Sender account")]
        from: u64,
        #[arg(help = "Recipient account")]
        to: u64,
        #[arg(help = "Amount to send (in units, 1 coin = 100000000 units)")]
        amount: u64,
        #[arg(long = "key", help = "Hex PKCS#8 private key to sign with")]
        key: Option<String>,
        #[arg(long = "mine", help = "Seal a block right away, paying this account")]
        mine: Option<u64>,
    },
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "validate", about = "Re-check every block of the local chain")]
    Validate,
    #[command(name = "resolve", about = "Adopt the longest valid chain among peers")]
    Resolve,
    #[command(name = "addpeer", about = "Register a peer address")]
    AddPeer {
        #[arg(help = "Peer address, e.g. 127.0.0.1:2002")]
        addr: String,
    },
    #[command(name = "removepeer", about = "Forget a peer address")]
    RemovePeer {
        #[arg(help = "Peer address")]
        addr: String,
    },
    #[command(name = "listpeers", about = "Print registered peers")]
    ListPeers,
    #[command(name = "clearpeers", about = "Forget every registered peer")]
    ClearPeers,
    #[command(name = "createaccount", about = "Open an account with a starting balance")]
    CreateAccount {
        #[arg(help = "Account id")]
        id: u64,
        #[arg(help = "Opening balance (in units)")]
        balance: u64,
        #[arg(long = "public-key", help = "Hex public key; transfers from this account must then be signed")]
        public_key: Option<String>,
    },
    #[command(name = "createkeypair", about = "Generate an ECDSA P-256 key pair")]
    CreateKeyPair,
    #[command(name = "getbalance", about = "Get the balance of an account")]
    GetBalance {
        #[arg(help = "Account id")]
        id: u64,
    },
    #[command(name = "mempool", about = "Print pending transactions")]
    Mempool,
}
