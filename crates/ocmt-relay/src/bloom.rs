//! Revocation Bloom filter (§4.5): sized for `n = 100_000` expected
//! capability ids at a false-positive rate of 0.1%, backed by
//! Kirsch-Mitzenmacher double hashing of SHA-256(capability id).
//!
//! No false negatives: every id ever inserted tests positive forever.
//! Rebuilt from the revocation backing store on process start rather than
//! persisted in its own right, so a crash between "insert into store" and
//! "flush bloom to disk" can never desync the two.

use ocmt_core::CapabilityId;
use ocmt_crypto::bloom_hash;

/// Expected number of revoked capability ids the filter is sized for.
pub const EXPECTED_ELEMENTS: u64 = 100_000;
/// Target false-positive probability.
pub const FALSE_POSITIVE_RATE: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u8>,
    bit_count: u64,
    hash_count: u32,
}

impl BloomFilter {
    /// A filter sized for [`EXPECTED_ELEMENTS`] at [`FALSE_POSITIVE_RATE`].
    pub fn new_default() -> Self {
        Self::with_params(EXPECTED_ELEMENTS, FALSE_POSITIVE_RATE)
    }

    fn with_params(expected_elements: u64, false_positive_rate: f64) -> Self {
        let n = expected_elements as f64;
        let p = false_positive_rate.max(0.00001).min(0.99999);
        // m = -n * ln(p) / (ln 2)^2
        let m = (-n * p.ln() / (2.0_f64.ln().powi(2))).ceil() as u64;
        let bit_count = m.max(64);
        // k = (m/n) * ln 2
        let k = ((bit_count as f64 / n) * 2.0_f64.ln()).round() as u32;
        let hash_count = k.max(1).min(32);
        let byte_len = (bit_count + 7) / 8;
        Self {
            bits: vec![0u8; byte_len as usize],
            bit_count,
            hash_count,
        }
    }

    pub fn insert(&mut self, id: &CapabilityId) {
        let slots: Vec<u64> = self.slots(id).collect();
        for slot in slots {
            let byte = (slot / 8) as usize;
            let bit = (slot % 8) as u8;
            self.bits[byte] |= 1 << bit;
        }
    }

    /// `false` means "definitely not in the set"; `true` means "maybe", and
    /// the caller must fall back to the authoritative backing store.
    pub fn might_contain(&self, id: &CapabilityId) -> bool {
        self.slots(id).all(|slot| {
            let byte = (slot / 8) as usize;
            let bit = (slot % 8) as u8;
            self.bits[byte] & (1 << bit) != 0
        })
    }

    fn slots(&self, id: &CapabilityId) -> impl Iterator<Item = u64> + '_ {
        let bytes = *id.as_bytes();
        (0..self.hash_count as u64).map(move |i| bloom_hash(&bytes, i) % self.bit_count)
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_ids_are_never_false_negatives() {
        let mut filter = BloomFilter::new_default();
        let ids: Vec<CapabilityId> = (0..500).map(|_| CapabilityId::random()).collect();
        for id in &ids {
            filter.insert(id);
        }
        for id in &ids {
            assert!(filter.might_contain(id));
        }
    }

    #[test]
    fn absent_id_is_usually_reported_absent() {
        let mut filter = BloomFilter::new_default();
        for _ in 0..1000 {
            filter.insert(&CapabilityId::random());
        }
        let probe = CapabilityId::random();
        // Not a hard guarantee (bloom filters have false positives), but at
        // this load factor a collision on one fresh random id is exceedingly
        // unlikely and would indicate a broken hash spread if it happened
        // reliably across repeated runs.
        assert!(!filter.might_contain(&probe));
    }

    #[test]
    fn default_sizing_matches_spec_parameters() {
        let filter = BloomFilter::new_default();
        assert!(filter.bit_count >= 64);
        assert!(filter.hash_count >= 1 && filter.hash_count <= 32);
    }
}
