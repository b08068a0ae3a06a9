//! The ledger engine: one node's chain, memory pool, ledger and peers wired
//! together behind the operations the CLI and the server expose.

use crate::config::Settings;
use crate::core::{Block, Blockchain, Transaction};
use crate::error::{AccountId, BlockchainError, Result};
use crate::network::{
    ChainResponse, ConsensusResolver, PeerRegistry, Resolution, TcpTransport, Transport,
};
use crate::storage::{
    open_database, Ledger, MemoryPool, SledCollection, SledLedger, BLOCKS_TREE, MEMPOOL_TREE,
    PEERS_TREE,
};
use crate::utils::{EcdsaP256, SignatureScheme};
use log::{info, warn};
use std::sync::Arc;

pub struct LedgerEngine {
    settings: Settings,
    chain: Blockchain,
    mempool: Arc<MemoryPool>,
    ledger: Arc<SledLedger>,
    peers: Arc<PeerRegistry>,
    transport: Arc<dyn Transport>,
    signatures: Box<dyn SignatureScheme>,
    resolver: ConsensusResolver,
}

impl LedgerEngine {
    /// Open the node's database under its data directory and talk to peers
    /// over TCP
    pub fn open(settings: Settings) -> Result<LedgerEngine> {
        let db = open_database(&settings.node_data_path())?;
        let transport = Arc::new(TcpTransport::new(
            &settings.node_addr,
            settings.peer_timeout_ms,
        ));
        Self::with_components(settings, &db, transport, Box::new(EcdsaP256))
    }

    pub fn with_components(
        settings: Settings,
        db: &sled::Db,
        transport: Arc<dyn Transport>,
        signatures: Box<dyn SignatureScheme>,
    ) -> Result<LedgerEngine> {
        settings.validate()?;

        let blocks: SledCollection<Block> = SledCollection::open(db, BLOCKS_TREE)?;
        let chain = Blockchain::open(
            Arc::new(blocks),
            settings.proof_of_work()?,
            settings.initial_reward,
        )?;

        let pending: SledCollection<Transaction> = SledCollection::open(db, MEMPOOL_TREE)?;
        let mempool = Arc::new(MemoryPool::open(Box::new(pending))?);
        let ledger = Arc::new(SledLedger::open(db)?);

        let peer_store: SledCollection<String> = SledCollection::open(db, PEERS_TREE)?;
        let peers = Arc::new(PeerRegistry::open(Box::new(peer_store), settings.max_peers)?);
        for peer in &settings.peers {
            if let Err(e) = peers.add(peer) {
                warn!("Skipping configured peer {peer}: {e}");
            }
        }

        let resolver = ConsensusResolver::new(
            chain.clone(),
            Arc::clone(&mempool),
            Arc::clone(&ledger) as Arc<dyn Ledger>,
            Arc::clone(&peers),
            Arc::clone(&transport),
        );

        info!(
            "Ledger engine ready for {} (chain length {}, {} peers)",
            settings.node_addr,
            chain.length()?,
            peers.len()?
        );
        Ok(LedgerEngine {
            settings,
            chain,
            mempool,
            ledger,
            peers,
            transport,
            signatures,
            resolver,
        })
    }

    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn ledger(&self) -> &SledLedger {
        &self.ledger
    }

    /// Admit a caller's transaction and push it to every peer. Peers that
    /// cannot be reached are logged and skipped.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        self.receive_transaction(tx.clone())?;

        for peer in self.peers.peers()? {
            if let Err(e) = self.transport.push_transaction(&peer, &tx) {
                warn!("Failed to propagate transaction to {peer}: {e}");
            }
        }
        Ok(())
    }

    /// Admit a transaction relayed by a peer. It is not forwarded again.
    pub fn receive_transaction(&self, tx: Transaction) -> Result<()> {
        self.admit(&tx)?;
        self.mempool.stage(tx)
    }

    fn admit(&self, tx: &Transaction) -> Result<()> {
        tx.validate()?;
        let sender = tx.get_sender_id().ok_or_else(|| {
            BlockchainError::Validation("Coinbase transactions cannot be submitted".to_string())
        })?;

        // Both parties have to exist
        self.ledger.find_account_balance(tx.get_recipient_id())?;
        let available = self.ledger.find_account_balance(sender)?;
        if available < tx.get_amount() {
            return Err(BlockchainError::InsufficientFunds {
                account: sender,
                required: tx.get_amount(),
                available,
            });
        }

        if let Some(public_key) = self.ledger.find_public_key(sender)? {
            if tx.get_signature().is_none() {
                return Err(BlockchainError::Validation(format!(
                    "Transaction from account {sender} must be signed"
                )));
            }
            if !tx.verify_signature(self.signatures.as_ref(), &public_key) {
                return Err(BlockchainError::Validation(format!(
                    "Invalid signature for account {sender}"
                )));
            }
        }
        Ok(())
    }

    pub fn mine(&self, miner: AccountId) -> Result<Block> {
        self.chain
            .seal_new_block(miner, &self.mempool, self.ledger.as_ref())
    }

    pub fn resolve_conflicts(&self) -> Result<Resolution> {
        self.resolver.resolve()
    }

    pub fn chain_response(&self) -> Result<ChainResponse> {
        Ok(ChainResponse::new(self.chain.blocks()?))
    }

    pub fn validate_chain(&self) -> Result<bool> {
        Ok(self.chain.validate(&self.chain.blocks()?))
    }

    pub fn balance(&self, id: AccountId) -> Result<u64> {
        self.ledger.find_account_balance(id)
    }

    pub fn open_account(
        &self,
        id: AccountId,
        balance: u64,
        public_key: Option<Vec<u8>>,
    ) -> Result<()> {
        self.ledger.open_account(id, balance, public_key)
    }
}
