use crate::core::{Block, MerkleTree};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;

/// Content hash of a block, as lowercase hex SHA-256.
///
/// The hashed text is the decimal index, timestamp and nonce followed by the
/// previous hash and the hex transactions root, concatenated without
/// separators.
pub fn content_hash(
    index: u64,
    timestamp: i64,
    nonce: u64,
    previous_hash: &str,
    transactions_root: &[u8],
) -> String {
    let input = hashing_input(index, timestamp, nonce, previous_hash, transactions_root);
    HEXLOWER.encode(sha256_digest(input.as_bytes()).as_slice())
}

/// Recompute a block's hash from its stored fields
pub fn hash_block(block: &Block) -> String {
    let root = MerkleTree::transactions_root(block.get_transactions());
    content_hash(
        block.get_index(),
        block.get_timestamp(),
        block.get_nonce(),
        block.get_previous_hash(),
        &root,
    )
}

fn hashing_input(
    index: u64,
    timestamp: i64,
    nonce: u64,
    previous_hash: &str,
    transactions_root: &[u8],
) -> String {
    format!(
        "{index}{timestamp}{nonce}{previous_hash}{}",
        HEXLOWER.encode(transactions_root)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::merkle::EMPTY_ROOT;

    #[test]
    fn test_hash_is_deterministic_hex() {
        let a = content_hash(1, 1_700_000_000_000, 1511, "abc", &EMPTY_ROOT);
        let b = content_hash(1, 1_700_000_000_000, 1511, "abc", &EMPTY_ROOT);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_every_field_changes_the_hash() {
        let base = content_hash(1, 10, 1511, "abc", &EMPTY_ROOT);
        assert_ne!(base, content_hash(2, 10, 1511, "abc", &EMPTY_ROOT));
        assert_ne!(base, content_hash(1, 11, 1511, "abc", &EMPTY_ROOT));
        assert_ne!(base, content_hash(1, 10, 1512, "abc", &EMPTY_ROOT));
        assert_ne!(base, content_hash(1, 10, 1511, "abd", &EMPTY_ROOT));
        assert_ne!(base, content_hash(1, 10, 1511, "abc", &[1u8; 32]));
    }

    #[test]
    fn test_input_layout() {
        assert_eq!(
            hashing_input(3, 42, 1600, "prev", &[0xab, 0x01]),
            "3421600prevab01"
        );
    }
}
