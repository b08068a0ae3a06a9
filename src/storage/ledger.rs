use crate::error::{AccountId, BlockchainError, Result};
use crate::utils::{deserialize, encode_key, serialize};
use log::{debug, info};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const ACCOUNTS_TREE: &str = "accounts";

/// Account balance store the chain settles blocks against.
///
/// Adjustments are buffered until `commit`; reads see the buffered deltas so a
/// sealing or reconciliation pass can adjust the same account several times.
pub trait Ledger: Send + Sync {
    fn find_account_balance(&self, id: AccountId) -> Result<u64>;
    fn find_public_key(&self, id: AccountId) -> Result<Option<Vec<u8>>>;
    fn adjust_balance(&self, id: AccountId, delta: i128) -> Result<()>;
    fn commit(&self) -> Result<()>;
    /// Drop every adjustment made since the last commit
    fn rollback(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Account {
    balance: u64,
    public_key: Option<Vec<u8>>,
}

impl Account {
    pub fn get_balance(&self) -> u64 {
        self.balance
    }

    pub fn get_public_key(&self) -> Option<&[u8]> {
        self.public_key.as_deref()
    }
}

/// ( K -> big-endian account id, V -> Account )
pub struct SledLedger {
    accounts: Tree,
    pending: Mutex<HashMap<AccountId, i128>>,
}

impl SledLedger {
    pub fn open(db: &Db) -> Result<SledLedger> {
        let accounts = db
            .open_tree(ACCOUNTS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open accounts tree: {e}")))?;
        Ok(SledLedger {
            accounts,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Register a new account with an opening balance
    pub fn open_account(
        &self,
        id: AccountId,
        balance: u64,
        public_key: Option<Vec<u8>>,
    ) -> Result<()> {
        let account = Account {
            balance,
            public_key,
        };
        let previous = self.accounts.compare_and_swap(
            encode_key(id),
            None as Option<&[u8]>,
            Some(serialize(&account)?),
        )?;
        if previous.is_err() {
            return Err(BlockchainError::Validation(format!(
                "Account {id} already exists"
            )));
        }
        self.accounts.flush()?;
        info!("Opened account {id} with balance {balance}");
        Ok(())
    }

    pub fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        match self.accounts.get(encode_key(id))? {
            Some(bytes) => Ok(Some(deserialize::<Account>(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, HashMap<AccountId, i128>>> {
        self.pending
            .lock()
            .map_err(|_| BlockchainError::Database("Ledger lock poisoned".to_string()))
    }

    fn stored_balance(&self, id: AccountId) -> Result<u64> {
        self.get_account(id)?
            .map(|account| account.balance)
            .ok_or(BlockchainError::UnknownAccount(id))
    }
}

impl Ledger for SledLedger {
    fn find_account_balance(&self, id: AccountId) -> Result<u64> {
        let stored = self.stored_balance(id)?;
        let delta = self.lock_pending()?.get(&id).copied().unwrap_or(0);
        // Pending deltas are only accepted when they keep the balance in range
        Ok((stored as i128 + delta) as u64)
    }

    fn find_public_key(&self, id: AccountId) -> Result<Option<Vec<u8>>> {
        self.get_account(id)?
            .map(|account| account.public_key)
            .ok_or(BlockchainError::UnknownAccount(id))
    }

    fn adjust_balance(&self, id: AccountId, delta: i128) -> Result<()> {
        let stored = self.stored_balance(id)? as i128;
        let mut pending = self.lock_pending()?;
        let current = stored + pending.get(&id).copied().unwrap_or(0);
        let updated = current + delta;

        if updated < 0 {
            return Err(BlockchainError::InsufficientFunds {
                account: id,
                required: delta.unsigned_abs() as u64,
                available: current as u64,
            });
        }
        if updated > u64::MAX as i128 {
            return Err(BlockchainError::Validation(format!(
                "Balance of account {id} would overflow"
            )));
        }

        *pending.entry(id).or_insert(0) += delta;
        debug!("Account {id} adjusted by {delta}");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut pending = self.lock_pending()?;
        if pending.is_empty() {
            return Ok(());
        }

        let deltas = pending.clone();
        self.accounts
            .transaction(|tx_db| {
                for (id, delta) in &deltas {
                    let bytes = tx_db.get(encode_key(*id))?.ok_or(
                        ConflictableTransactionError::Abort(BlockchainError::UnknownAccount(*id)),
                    )?;
                    let mut account = deserialize::<Account>(bytes.as_ref())
                        .map_err(ConflictableTransactionError::Abort)?;
                    account.balance = (account.balance as i128 + delta) as u64;
                    let encoded =
                        serialize(&account).map_err(ConflictableTransactionError::Abort)?;
                    tx_db.insert(encode_key(*id).to_vec(), encoded)?;
                }
                Ok(())
            })
            .map_err(|e: TransactionError<BlockchainError>| match e {
                TransactionError::Abort(inner) => inner,
                TransactionError::Storage(inner) => BlockchainError::Database(format!(
                    "Failed to commit ledger adjustments: {inner}"
                )),
            })?;
        self.accounts.flush()?;

        pending.clear();
        debug!("Committed adjustments for {} accounts", deltas.len());
        Ok(())
    }

    fn rollback(&self) {
        match self.pending.lock() {
            Ok(mut pending) => pending.clear(),
            Err(_) => log::error!("Failed to acquire ledger lock for rollback"),
        }
    }
}
