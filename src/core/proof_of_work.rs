use crate::core::{content_hash, Block, MerkleTree};
use crate::error::{BlockchainError, Result};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Suffix an admitted block hash must end with
pub const DEFAULT_ADMISSION_SUFFIX: &str = "10";
/// Lowest nonce the search will try
pub const DEFAULT_NONCE_FLOOR: u64 = 1510;
/// Highest nonce the search will try before giving up
pub const DEFAULT_NONCE_CEILING: u64 = 102_024;

/// How candidate nonces are drawn. Callers only see the admitted nonce, never
/// the order in which candidates were tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoncePolicy {
    #[default]
    Sequential,
    Random,
}

/// Fixed-suffix admission rule. The target never changes for a chain
/// instance, there is no retargeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    suffix: String,
    floor: u64,
    ceiling: u64,
    policy: NoncePolicy,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork {
            suffix: DEFAULT_ADMISSION_SUFFIX.to_string(),
            floor: DEFAULT_NONCE_FLOOR,
            ceiling: DEFAULT_NONCE_CEILING,
            policy: NoncePolicy::Sequential,
        }
    }
}

impl ProofOfWork {
    pub fn new(suffix: &str, floor: u64, ceiling: u64, policy: NoncePolicy) -> Result<Self> {
        if suffix.is_empty() || !suffix.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(BlockchainError::Config(format!(
                "Admission suffix must be lowercase hex, got '{suffix}'"
            )));
        }
        if floor > ceiling {
            return Err(BlockchainError::Config(format!(
                "Nonce floor {floor} is above ceiling {ceiling}"
            )));
        }
        Ok(ProofOfWork {
            suffix: suffix.to_string(),
            floor,
            ceiling,
            policy,
        })
    }

    /// The admission predicate
    pub fn is_admitted(&self, hash: &str) -> bool {
        hash.ends_with(self.suffix.as_str())
    }

    /// Recompute the block's hash from its stored nonce and re-check it
    pub fn validate(&self, block: &Block) -> bool {
        self.is_admitted(&block.get_hash())
    }

    /// Search for an admitted nonce, store it in the block and return it with
    /// the resulting hash.
    pub fn run(&self, block: &mut Block) -> Result<(u64, String)> {
        let root = MerkleTree::transactions_root(block.get_transactions());
        let attempt = |nonce: u64| {
            content_hash(
                block.get_index(),
                block.get_timestamp(),
                nonce,
                block.get_previous_hash(),
                &root,
            )
        };

        let found = match self.policy {
            NoncePolicy::Sequential => (self.floor..=self.ceiling)
                .zip(1u64..)
                .map(|(nonce, i)| (i, nonce, attempt(nonce)))
                .find(|(_, _, hash)| self.is_admitted(hash)),
            NoncePolicy::Random => {
                let mut rng = rand::thread_rng();
                // The full u64 range holds one more nonce than u64 can count
                let budget = (self.ceiling - self.floor).saturating_add(1);
                (1..=budget)
                    .map(|i| {
                        let nonce = rng.gen_range(self.floor..=self.ceiling);
                        (i, nonce, attempt(nonce))
                    })
                    .find(|(_, _, hash)| self.is_admitted(hash))
            }
        };

        match found {
            Some((attempts, nonce, hash)) => {
                debug!("Block {} admitted after {attempts} attempts", block.get_index());
                block.set_nonce(nonce);
                info!(
                    "Proof-of-work completed for block {}: nonce {nonce}, hash {hash}",
                    block.get_index()
                );
                Ok((nonce, hash))
            }
            None => Err(BlockchainError::ProofExhausted {
                floor: self.floor,
                ceiling: self.ceiling,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transaction, GENESIS_PREVIOUS_HASH};

    fn create_test_block() -> Block {
        Block::with_timestamp(
            0,
            1_700_000_000_000,
            GENESIS_PREVIOUS_HASH.to_string(),
            vec![Transaction::new_coinbase(1, 50)],
        )
    }

    #[test]
    fn test_sequential_run_is_reproducible() {
        let pow = ProofOfWork::default();
        let mut first = create_test_block();
        let mut second = create_test_block();

        let (nonce_a, hash_a) = pow.run(&mut first).unwrap();
        let (nonce_b, hash_b) = pow.run(&mut second).unwrap();

        assert_eq!(nonce_a, nonce_b);
        assert_eq!(hash_a, hash_b);
        assert_eq!(first.get_nonce(), nonce_a);
        assert!(hash_a.ends_with("10"));
        assert!((DEFAULT_NONCE_FLOOR..=DEFAULT_NONCE_CEILING).contains(&nonce_a));
    }

    #[test]
    fn test_random_policy_admits() {
        let pow = ProofOfWork::new("10", 1510, 102_024, NoncePolicy::Random).unwrap();
        let mut block = create_test_block();
        let (nonce, hash) = pow.run(&mut block).unwrap();
        assert!(pow.validate(&block));
        assert_eq!(block.get_hash(), hash);
        assert_eq!(block.get_nonce(), nonce);
    }

    #[test]
    fn test_validate_rejects_mutated_nonce() {
        let pow = ProofOfWork::default();
        let mut block = create_test_block();
        pow.run(&mut block).unwrap();
        assert!(pow.validate(&block));

        // Find a neighbouring nonce that is not admitted
        let admitted = block.get_nonce();
        let mut other = admitted + 1;
        block.set_nonce(other);
        while pow.validate(&block) {
            other += 1;
            block.set_nonce(other);
        }
        assert!(!pow.validate(&block));
    }

    #[test]
    fn test_exhausted_search_is_reported() {
        let block = create_test_block();
        let rule = ProofOfWork::new("ffff", 0, 0, NoncePolicy::Sequential).unwrap();
        // Pin a nonce whose hash does not carry the suffix
        let rejected = (0..64u64)
            .find(|nonce| {
                let mut candidate = block.clone();
                candidate.set_nonce(*nonce);
                !rule.validate(&candidate)
            })
            .unwrap();

        let pow = ProofOfWork::new("ffff", rejected, rejected, NoncePolicy::Sequential).unwrap();
        let mut sealed = block.clone();
        assert_eq!(
            pow.run(&mut sealed),
            Err(BlockchainError::ProofExhausted {
                floor: rejected,
                ceiling: rejected
            })
        );
        assert_eq!(sealed.get_nonce(), block.get_nonce());
    }

    #[test]
    fn test_full_nonce_range_does_not_overflow() {
        let pow = ProofOfWork::new("10", 0, u64::MAX, NoncePolicy::Random).unwrap();
        let mut block = create_test_block();
        let (nonce, _) = pow.run(&mut block).unwrap();
        assert_eq!(block.get_nonce(), nonce);
        assert!(pow.validate(&block));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(ProofOfWork::new("", 1, 2, NoncePolicy::Sequential).is_err());
        assert!(ProofOfWork::new("1G", 1, 2, NoncePolicy::Sequential).is_err());
        assert!(ProofOfWork::new("10", 5, 2, NoncePolicy::Sequential).is_err());
    }
}
