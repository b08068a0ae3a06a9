use crate::core::Transaction;
use crate::utils::sha256_digest;

/// Root committed into every block hash, so a mutated transaction changes the
/// block's hash and breaks the admission predicate and the next block's link.
pub struct MerkleTree;

/// Root used for a block without transactions
pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

impl MerkleTree {
    /// Merkle root over the transactions' content digests
    pub fn transactions_root(transactions: &[Transaction]) -> Vec<u8> {
        let leaves: Vec<Vec<u8>> = transactions.iter().map(|tx| tx.digest()).collect();
        Self::calculate_merkle_root(&leaves)
    }

    /// Calculate a Merkle root from leaf hashes
    pub fn calculate_merkle_root(leaf_hashes: &[Vec<u8>]) -> Vec<u8> {
        if leaf_hashes.is_empty() {
            return EMPTY_ROOT.to_vec();
        }

        // A single leaf is paired with itself, same as any odd tail
        if leaf_hashes.len() == 1 {
            return Self::hash_pair(&leaf_hashes[0], &leaf_hashes[0]);
        }

        let mut current_level = leaf_hashes.to_vec();

        while current_level.len() > 1 {
            let next_level = current_level
                .chunks(2)
                // Odd tail: the last hash is paired with itself
                .map(|pair| Self::hash_pair(&pair[0], &pair[pair.len() - 1]))
                .collect();
            current_level = next_level;
        }

        current_level.swap_remove(0)
    }

    fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut combined = Vec::with_capacity(left.len() + right.len());
        combined.extend_from_slice(left);
        combined.extend_from_slice(right);

        // Double SHA-256
        let first_hash = sha256_digest(&combined);
        sha256_digest(&first_hash)
    }
}
