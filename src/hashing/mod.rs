//! Hash utilities for cache keys.
//!
//! Uses BLAKE3. The local tier keys entries on the 32-byte digest of the
//! canonical URL rather than the URL string itself.

/// Hashes a canonical URL key to a 32-byte BLAKE3 digest.
#[inline]
pub fn hash_key(key: &str) -> [u8; 32] {
    *blake3::hash(key.as_bytes()).as_bytes()
}
