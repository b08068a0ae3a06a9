// A transaction moves an amount from one ledger account to another
// The coinbase variant has no sender - it mints the miner's reward plus fees
// and is only ever built by the sealing routine in blockchain.rs

use crate::error::{AccountId, BlockchainError, Result};
use crate::utils::{sha256_digest, SignatureScheme};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    sender_id: Option<AccountId>, // None marks the coinbase transaction
    recipient_id: AccountId,
    amount: u64, // Fixed-point units, see monetary.rs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<Vec<u8>>,
}

impl Transaction {
    // When a client wants to move value between two accounts
    pub fn new_transfer(sender: AccountId, recipient: AccountId, amount: u64) -> Transaction {
        Transaction {
            sender_id: Some(sender),
            recipient_id: recipient,
            amount,
            signature: None,
        }
    }

    // Only the sealing routine mints coins
    pub(crate) fn new_coinbase(recipient: AccountId, amount: u64) -> Transaction {
        Transaction {
            sender_id: None,
            recipient_id: recipient,
            amount,
            signature: None,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender_id.is_none()
    }

    pub fn get_sender_id(&self) -> Option<AccountId> {
        self.sender_id
    }

    pub fn get_recipient_id(&self) -> AccountId {
        self.recipient_id
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// The bytes a sender signs: `"{sender}:{recipient}:{amount}"`
    pub fn signing_payload(&self) -> String {
        match self.sender_id {
            Some(sender) => format!("{}:{}:{}", sender, self.recipient_id, self.amount),
            None => format!("coinbase:{}:{}", self.recipient_id, self.amount),
        }
    }

    pub fn sign(&mut self, scheme: &dyn SignatureScheme, private_key: &[u8]) -> Result<()> {
        if self.is_coinbase() {
            return Err(BlockchainError::Validation(
                "Coinbase transactions are not signed".to_string(),
            ));
        }
        let signature = scheme.sign(self.signing_payload().as_bytes(), private_key)?;
        self.signature = Some(signature);
        Ok(())
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Transaction {
        self.signature = Some(signature);
        self
    }

    pub fn verify_signature(&self, scheme: &dyn SignatureScheme, public_key: &[u8]) -> bool {
        match &self.signature {
            Some(signature) => scheme.verify(
                self.signing_payload().as_bytes(),
                signature.as_slice(),
                public_key,
            ),
            None => false,
        }
    }

    /// Structural checks every staged transfer must pass
    pub fn validate(&self) -> Result<()> {
        let sender = self.sender_id.ok_or_else(|| {
            BlockchainError::Validation(
                "Coinbase transactions cannot be submitted by callers".to_string(),
            )
        })?;
        if sender == self.recipient_id {
            return Err(BlockchainError::Validation(format!(
                "Sender and recipient must differ (account {sender})"
            )));
        }
        Ok(())
    }

    /// Content digest, used as the Merkle leaf for this transaction
    pub fn digest(&self) -> Vec<u8> {
        let mut data = self.signing_payload().into_bytes();
        if let Some(signature) = &self.signature {
            data.push(b':');
            data.extend_from_slice(signature);
        }
        sha256_digest(data.as_slice())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sender_id {
            Some(sender) => write!(
                f,
                "Sender: {}, Recipient: {}, Amount: {}",
                sender, self.recipient_id, self.amount
            ),
            None => write!(
                f,
                "Coinbase, Recipient: {}, Amount: {}",
                self.recipient_id, self.amount
            ),
        }
    }
}
