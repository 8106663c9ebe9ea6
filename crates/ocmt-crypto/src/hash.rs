//! SHA-256 hashing for identifiers/fingerprints and bloom filter input
//! hashing (§4.1).

use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive two independent 64-bit hashes from a single SHA-256 digest via
/// double hashing (Kirsch-Mitzenmacher), used by the relay's Bloom filter
/// (§4.1, §4.5): `g_i(x) = h1(x) + i * h2(x)`.
pub fn double_hash(data: &[u8]) -> (u64, u64) {
    let digest = sha256(data);
    let h1 = u64::from_le_bytes(digest[0..8].try_into().unwrap());
    let h2 = u64::from_le_bytes(digest[8..16].try_into().unwrap());
    (h1, h2)
}

/// The `i`-th bloom filter hash for `data`, per Kirsch-Mitzenmacher double
/// hashing.
pub fn bloom_hash(data: &[u8], i: u64) -> u64 {
    let (h1, h2) = double_hash(data);
    h1.wrapping_add(i.wrapping_mul(h2))
}
