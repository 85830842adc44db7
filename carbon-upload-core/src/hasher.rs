use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`, used by the backend for deduplication.
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
