use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::storage::Collection;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Pending transactions in arrival order.
///
/// Every operation runs inside one critical section and persists before the
/// lock is released, so a stage can never slip between a drain's snapshot and
/// its clear.
pub struct MemoryPool {
    inner: Mutex<Vec<Transaction>>,
    store: Box<dyn Collection<Transaction>>,
}

impl MemoryPool {
    /// Load the pool from its durable store
    pub fn open(store: Box<dyn Collection<Transaction>>) -> Result<MemoryPool> {
        let pending = store.read_all()?;
        if !pending.is_empty() {
            info!("Loaded {} pending transactions", pending.len());
        }
        Ok(MemoryPool {
            inner: Mutex::new(pending),
            store,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Transaction>>> {
        self.inner
            .lock()
            .map_err(|_| BlockchainError::Database("Memory pool lock poisoned".to_string()))
    }

    /// Validate and append a caller-submitted transfer
    pub fn stage(&self, tx: Transaction) -> Result<()> {
        tx.validate()?;
        let mut pool = self.lock()?;
        self.store.append_one(&tx)?;
        debug!("Staged transaction: {tx}");
        pool.push(tx);
        Ok(())
    }

    /// Snapshot and clear everything currently staged
    pub fn drain_for_seal(&self) -> Result<Vec<Transaction>> {
        let mut pool = self.lock()?;
        self.store.write_all(&[])?;
        Ok(std::mem::take(&mut *pool))
    }

    /// Re-stage transactions from discarded blocks, running `apply` on exactly
    /// the ones that will be added before they become visible. Returns how
    /// many were added.
    ///
    /// Coinbase transactions are skipped, and so is every transaction already
    /// pending: each pending copy absorbs one incoming copy. Repeats inside
    /// the batch are separate sealed occurrences and are all kept. If `apply`
    /// fails the pool is left untouched.
    pub fn reinsert<F>(&self, transactions: &[Transaction], apply: F) -> Result<usize>
    where
        F: FnOnce(&[Transaction]) -> Result<()>,
    {
        let mut pool = self.lock()?;
        let mut unclaimed: HashMap<&Transaction, usize> = HashMap::new();
        for tx in pool.iter() {
            *unclaimed.entry(tx).or_insert(0) += 1;
        }

        let mut added = Vec::new();
        for tx in transactions {
            if tx.is_coinbase() {
                continue;
            }
            match unclaimed.get_mut(tx) {
                Some(count) if *count > 0 => *count -= 1,
                _ => added.push(tx.clone()),
            }
        }

        apply(&added)?;
        if !added.is_empty() {
            let mut updated = pool.clone();
            updated.extend(added.iter().cloned());
            self.store.write_all(&updated)?;
            *pool = updated;
            info!("Re-staged {} transactions into the memory pool", added.len());
        }
        Ok(added.len())
    }

    /// Put drained transactions back in front of anything staged since, used
    /// when a seal is abandoned.
    pub fn restore(&self, transactions: Vec<Transaction>) -> Result<()> {
        if transactions.is_empty() {
            return Ok(());
        }
        let mut pool = self.lock()?;
        let mut updated = transactions;
        updated.extend(pool.iter().cloned());
        self.store.write_all(&updated)?;
        *pool = updated;
        Ok(())
    }

    pub fn pending(&self) -> Result<Vec<Transaction>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
