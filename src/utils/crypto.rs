use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// Signing capability the ledger consumes when admitting transactions.
///
/// The engine only ever calls `verify`; `sign` exists so clients and tests can
/// produce signatures with the same scheme.
pub trait SignatureScheme: Send + Sync {
    fn sign(&self, data: &[u8], private_key: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// ECDSA P-256 with SHA-256, keys held as PKCS#8 documents
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaP256;

impl EcdsaP256 {
    /// Generate a fresh PKCS#8 key document
    pub fn generate_pkcs8() -> Result<Vec<u8>> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|e| {
                BlockchainError::Crypto(format!("Failed to generate ECDSA key pair: {e}"))
            })?
            .as_ref()
            .to_vec();
        Ok(pkcs8)
    }

    /// Public key bytes for a PKCS#8 document
    pub fn public_key(pkcs8: &[u8]) -> Result<Vec<u8>> {
        use ring::signature::KeyPair;

        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
            .map_err(|e| {
                BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
            })?;
        Ok(key_pair.public_key().as_ref().to_vec())
    }
}

impl SignatureScheme for EcdsaP256 {
    fn sign(&self, data: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, private_key, &rng)
                .map_err(|e| {
                    BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
                })?;
        let signature = key_pair
            .sign(&rng, data)
            .map_err(|e| BlockchainError::Crypto(format!("Failed to sign message: {e}")))?
            .as_ref()
            .to_vec();
        Ok(signature)
    }

    fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let peer_public_key =
            ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
        peer_public_key.verify(data, signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_digest_length() {
        assert_eq!(sha256_digest(b"ledger").len(), 32);
        assert_eq!(sha256_digest(b"ledger"), sha256_digest(b"ledger"));
    }

    #[test]
    fn test_sign_and_verify() {
        let scheme = EcdsaP256;
        let pkcs8 = EcdsaP256::generate_pkcs8().unwrap();
        let public_key = EcdsaP256::public_key(&pkcs8).unwrap();

        let signature = scheme.sign(b"1:2:100", &pkcs8).unwrap();
        assert!(scheme.verify(b"1:2:100", &signature, &public_key));
        assert!(!scheme.verify(b"1:2:101", &signature, &public_key));
    }
}
