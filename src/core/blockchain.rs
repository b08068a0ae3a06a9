// This is the chain itself - an ordered, hash-linked list of sealed blocks
// Blocks live in memory behind one mutex and are mirrored into a sled-backed
// collection; the mutex is also the single-writer lock for sealing and for
// wholesale replacement by the consensus resolver

use crate::core::{
    monetary, Block, ProofOfWork, Transaction, GENESIS_PREVIOUS_HASH,
};
use crate::error::{AccountId, BlockchainError, Result};
use crate::storage::{Collection, Ledger, MemoryPool};
use crate::utils::current_timestamp;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Blockchain {
    blocks: Arc<Mutex<Vec<Block>>>,      // Index i holds the block with index i
    store: Arc<dyn Collection<Block>>,   // Durable mirror of `blocks`
    proof_of_work: ProofOfWork,          // Admission rule, fixed for this chain
    initial_reward: u64,                 // Reward for the genesis block
}

/// Exclusive access to the chain. Holding it blocks sealing, appends and
/// replacement.
pub struct ChainGuard<'a> {
    blocks: MutexGuard<'a, Vec<Block>>,
    chain: &'a Blockchain,
}

impl ChainGuard<'_> {
    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    /// Swap in a new chain. The candidate is fully re-validated first, then
    /// persisted, then made visible.
    pub fn replace(&mut self, candidate: Vec<Block>) -> Result<()> {
        self.chain.check_chain(&candidate)?;
        self.chain.store.write_all(&candidate)?;
        info!(
            "Replaced local chain of length {} with chain of length {}",
            self.blocks.len(),
            candidate.len()
        );
        *self.blocks = candidate;
        Ok(())
    }
}

impl Blockchain {
    // When I open the chain I reload every persisted block and refuse to start
    // on top of a store that does not validate
    pub fn open(
        store: Arc<dyn Collection<Block>>,
        proof_of_work: ProofOfWork,
        initial_reward: u64,
    ) -> Result<Blockchain> {
        let blocks = store.read_all()?;
        let chain = Blockchain {
            blocks: Arc::new(Mutex::new(Vec::new())),
            store,
            proof_of_work,
            initial_reward,
        };
        if let Err(e) = chain.check_chain(&blocks) {
            error!("Persisted chain failed validation: {e}");
            return Err(e);
        }
        info!("Loaded chain with {} blocks", blocks.len());
        *chain.lock()? = blocks;
        Ok(chain)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Block>>> {
        self.blocks
            .lock()
            .map_err(|_| BlockchainError::Database("Chain lock poisoned".to_string()))
    }

    pub fn lock_exclusive(&self) -> Result<ChainGuard<'_>> {
        Ok(ChainGuard {
            blocks: self.lock()?,
            chain: self,
        })
    }

    pub fn get_proof_of_work(&self) -> &ProofOfWork {
        &self.proof_of_work
    }

    pub fn length(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Hash the next block must link to; the genesis sentinel on an empty chain
    pub fn last_hash(&self) -> Result<String> {
        Ok(Self::tip_hash(&self.lock()?))
    }

    pub fn last_block(&self) -> Result<Option<Block>> {
        Ok(self.lock()?.last().cloned())
    }

    pub fn block_at(&self, index: usize) -> Result<Option<Block>> {
        Ok(self.lock()?.get(index).cloned())
    }

    /// Snapshot of the whole chain
    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self.lock()?.clone())
    }

    pub fn for_each<F: FnMut(&Block)>(&self, mut f: F) -> Result<()> {
        self.lock()?.iter().for_each(|block| f(block));
        Ok(())
    }

    fn tip_hash(blocks: &[Block]) -> String {
        blocks
            .last()
            .map(|block| block.get_hash())
            .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Append an externally sealed block after checking it links to the tip
    /// and carries an admitted nonce.
    pub fn append(&self, block: Block) -> Result<()> {
        let mut blocks = self.lock()?;
        self.check_next(&blocks, &block)?;
        self.push_locked(&mut blocks, block)
    }

    fn check_next(&self, blocks: &[Block], block: &Block) -> Result<()> {
        let index = block.get_index();
        if index != blocks.len() as u64 || block.get_previous_hash() != Self::tip_hash(blocks) {
            return Err(BlockchainError::Linkage { index });
        }
        if !self.proof_of_work.validate(block) {
            return Err(BlockchainError::ProofInvalid { index });
        }
        Ok(())
    }

    fn push_locked(&self, blocks: &mut Vec<Block>, block: Block) -> Result<()> {
        self.store.append_one(&block)?;
        info!("Appended block {}: {}", block.get_index(), block.get_hash());
        blocks.push(block);
        Ok(())
    }

    /// True iff every block links to its predecessor's recomputed hash and
    /// re-passes the admission predicate. Has no side effects.
    pub fn validate(&self, candidate: &[Block]) -> bool {
        self.check_chain(candidate).is_ok()
    }

    fn check_chain(&self, candidate: &[Block]) -> Result<()> {
        let mut previous_hash = GENESIS_PREVIOUS_HASH.to_string();
        for (position, block) in candidate.iter().enumerate() {
            let index = position as u64;
            if block.get_index() != index || block.get_previous_hash() != previous_hash {
                return Err(BlockchainError::Linkage { index });
            }
            let hash = block.get_hash();
            if !self.proof_of_work.is_admitted(&hash) {
                return Err(BlockchainError::ProofInvalid { index });
            }
            previous_hash = hash;
        }
        Ok(())
    }

    // This is where a new block gets made: drain the pool, pay the miner,
    // find the proof, settle balances and append - all under the chain lock.
    // Balances are committed before the block is stored, so a failed commit
    // leaves nothing behind.
    pub fn seal_new_block(
        &self,
        miner: AccountId,
        mempool: &MemoryPool,
        ledger: &dyn Ledger,
    ) -> Result<Block> {
        let mut blocks = self.lock()?;

        // The miner has to exist before I spend any time on the proof
        ledger.find_account_balance(miner)?;

        let staged = mempool.drain_for_seal()?;
        let settled = self
            .build_block(&blocks, miner, &staged, ledger)
            .and_then(|(block, deferred)| {
                self.check_next(&blocks, &block)?;
                ledger.commit()?;
                Ok((block, deferred))
            });

        let (block, deferred) = match settled {
            Ok(settled) => settled,
            Err(e) => {
                // Nothing was committed: drop the pending deltas and hand
                // every drained transaction back to the pool
                ledger.rollback();
                mempool.restore(staged)?;
                warn!("Sealing aborted: {e}");
                return Err(e);
            }
        };

        let index = block.get_index();
        if let Err(e) = self.push_locked(&mut blocks, block.clone()) {
            error!("Block {index} was settled but could not be stored: {e}");
            let undone = reverse_settlement(block.get_transactions(), ledger)
                .and_then(|()| ledger.commit());
            if let Err(undo) = undone {
                ledger.rollback();
                error!("Balances still include the unstored block {index}: {undo}");
            }
            mempool.restore(staged)?;
            return Err(e);
        }
        if !deferred.is_empty() {
            mempool.restore(deferred)?;
        }

        info!(
            "Sealed block {index} with {} transactions (reward + fees: {})",
            block.get_transactions().len(),
            block.coinbase().map(|tx| tx.get_amount()).unwrap_or(0)
        );
        Ok(block)
    }

    /// Base reward for the block that would be sealed next
    pub fn next_block_reward(&self) -> Result<u64> {
        Ok(self.reward_after(&self.lock()?))
    }

    fn reward_after(&self, blocks: &[Block]) -> u64 {
        match blocks.last() {
            None => self.initial_reward,
            Some(last) => {
                // The last coinbase minus that block's fees is the reward the
                // previous seal used, which survives restarts with the blocks
                let previous = last.base_reward().unwrap_or(self.initial_reward);
                monetary::next_reward(previous, blocks.len() as u64)
            }
        }
    }

    // Returns the proven block and the transfers that had to wait for funds.
    // Ledger adjustments are left pending for the caller to commit or roll back.
    fn build_block(
        &self,
        blocks: &[Block],
        miner: AccountId,
        staged: &[Transaction],
        ledger: &dyn Ledger,
    ) -> Result<(Block, Vec<Transaction>)> {
        let index = blocks.len() as u64;
        let reward = self.reward_after(blocks);

        let mut admitted = Vec::with_capacity(staged.len() + 1);
        let mut deferred = Vec::new();
        for tx in staged {
            match Self::settle_transfer(tx, ledger) {
                Ok(()) => admitted.push(tx.clone()),
                Err(e @ BlockchainError::InsufficientFunds { .. })
                | Err(e @ BlockchainError::UnknownAccount(_)) => {
                    warn!("Deferring transaction ({tx}): {e}");
                    deferred.push(tx.clone());
                }
                Err(e) => return Err(e),
            }
        }

        let fees: u64 = admitted
            .iter()
            .map(|tx| monetary::transfer_fee(tx.get_amount()))
            .sum();
        let coinbase = Transaction::new_coinbase(miner, reward + fees);
        ledger.adjust_balance(miner, coinbase.get_amount() as i128)?;
        admitted.insert(0, coinbase);

        // Timestamps only move forward along the chain
        let timestamp = match blocks.last() {
            Some(last) => current_timestamp()?.max(last.get_timestamp() + 1),
            None => current_timestamp()?,
        };
        let mut block = Block::with_timestamp(index, timestamp, Self::tip_hash(blocks), admitted);
        self.proof_of_work.run(&mut block)?;

        Ok((block, deferred))
    }

    // Sender pays the full amount, recipient gets it minus the fee
    fn settle_transfer(tx: &Transaction, ledger: &dyn Ledger) -> Result<()> {
        let sender = tx.get_sender_id().ok_or_else(|| {
            BlockchainError::Validation("Coinbase transaction found in memory pool".to_string())
        })?;
        let amount = tx.get_amount() as i128;

        ledger.adjust_balance(sender, -amount)?;
        let share = monetary::recipient_share(tx.get_amount()) as i128;
        if let Err(e) = ledger.adjust_balance(tx.get_recipient_id(), share) {
            ledger.adjust_balance(sender, amount)?;
            return Err(e);
        }
        Ok(())
    }
}

/// Undo what settling these transactions did to the ledger: a coinbase takes
/// the minted amount back from its recipient, a transfer refunds the sender
/// and takes the recipient's share back. Deltas are netted per account first
/// so ordering inside the batch cannot trip an intermediate overdraft. The
/// adjustments are left pending.
pub fn reverse_settlement<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    ledger: &dyn Ledger,
) -> Result<()> {
    let mut deltas: HashMap<AccountId, i128> = HashMap::new();
    for tx in transactions {
        let amount = tx.get_amount() as i128;
        match tx.get_sender_id() {
            None => *deltas.entry(tx.get_recipient_id()).or_insert(0) -= amount,
            Some(sender) => {
                *deltas.entry(sender).or_insert(0) += amount;
                *deltas.entry(tx.get_recipient_id()).or_insert(0) -=
                    monetary::recipient_share(tx.get_amount()) as i128;
            }
        }
    }

    let mut accounts: Vec<_> = deltas.into_iter().filter(|(_, delta)| *delta != 0).collect();
    accounts.sort_unstable();
    for (account, delta) in accounts {
        ledger.adjust_balance(account, delta)?;
    }
    Ok(())
}
