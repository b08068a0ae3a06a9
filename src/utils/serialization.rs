// Bincode helpers for everything that goes into sled
use crate::error::{BlockchainError, Result};

/// Encode a value using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Decode a value using bincode 2.0 with standard configuration
pub fn deserialize<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T> {
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

/// Sled keys are big-endian so that tree iteration follows insertion order
pub fn encode_key(position: u64) -> [u8; 8] {
    position.to_be_bytes()
}

pub fn decode_key(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| BlockchainError::Serialization(format!("Bad key length {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}
