use sha2::{Digest, Sha256};

/// SHA-256 of the uploaded bytes, lowercase hex.
pub fn compute_content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
