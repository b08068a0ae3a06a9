//! Utility functions and helpers
//!
//! Hashing, timestamps, the ECDSA signature capability and the bincode
//! helpers used by the sled-backed stores.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest, EcdsaP256, SignatureScheme};

pub use serialization::{decode_key, deserialize, encode_key, serialize};
