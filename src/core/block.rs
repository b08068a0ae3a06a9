use crate::core::{hash_block, monetary, Transaction};
use crate::error::Result;
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "None";

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>, // Coinbase, when present, sits at position 0
    nonce: u64,
    previous_hash: String,
}

impl Block {
    /// Unsealed block stamped with the current time
    pub fn new_block(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        Ok(Self::with_timestamp(
            index,
            current_timestamp()?,
            previous_hash,
            transactions,
        ))
    }

    /// Unsealed block with a pinned timestamp, so proof search is reproducible
    pub fn with_timestamp(
        index: u64,
        timestamp: i64,
        previous_hash: String,
        transactions: Vec<Transaction>,
    ) -> Block {
        Block {
            index,
            timestamp,
            transactions,
            nonce: 0,
            previous_hash,
        }
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Only the proof search writes the nonce
    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub fn get_hash(&self) -> String {
        hash_block(self)
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| !tx.is_coinbase())
    }

    /// Fees the miner collected from this block's transfers
    pub fn collected_fees(&self) -> u64 {
        self.transfers()
            .map(|tx| monetary::transfer_fee(tx.get_amount()))
            .sum()
    }

    /// Reward portion of the coinbase, i.e. its amount without the fees
    pub fn base_reward(&self) -> Option<u64> {
        self.coinbase()
            .map(|tx| tx.get_amount().saturating_sub(self.collected_fees()))
    }
}

#[cfg(test)]
impl Block {
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monetary::{transfer_fee, UNITS_PER_COIN};

    #[test]
    fn test_hash_tracks_nonce() {
        let mut block = Block::with_timestamp(0, 5, GENESIS_PREVIOUS_HASH.to_string(), vec![]);
        let before = block.get_hash();
        block.set_nonce(1600);
        assert_ne!(before, block.get_hash());
        assert_eq!(block.get_nonce(), 1600);
    }

    #[test]
    fn test_coinbase_and_base_reward() {
        let transfer = Transaction::new_transfer(1, 2, 100 * UNITS_PER_COIN);
        let fee = transfer_fee(transfer.get_amount());
        let coinbase = Transaction::new_coinbase(9, 2005 * UNITS_PER_COIN + fee);
        let block = Block::with_timestamp(
            1,
            5,
            "prev".to_string(),
            vec![coinbase.clone(), transfer],
        );

        assert_eq!(block.coinbase(), Some(&coinbase));
        assert_eq!(block.transfers().count(), 1);
        assert_eq!(block.collected_fees(), 2 * UNITS_PER_COIN);
        assert_eq!(block.base_reward(), Some(2005 * UNITS_PER_COIN));
    }

    #[test]
    fn test_block_without_coinbase() {
        let block = Block::with_timestamp(
            0,
            5,
            GENESIS_PREVIOUS_HASH.to_string(),
            vec![Transaction::new_transfer(1, 2, 3)],
        );
        assert!(block.coinbase().is_none());
        assert!(block.base_reward().is_none());
    }

    #[test]
    fn test_json_boundary_shape() {
        let block = Block::with_timestamp(0, 5, GENESIS_PREVIOUS_HASH.to_string(), vec![]);
        let json = serde_json::to_value(&block).unwrap();
        for field in ["index", "timestamp", "transactions", "nonce", "previousHash"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
