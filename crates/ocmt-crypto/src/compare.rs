//! Constant-time comparison (§4.1), required for password/token/tag
//! equality checks so that early-exit comparisons never leak timing
//! information about how many leading bytes matched.

use subtle::ConstantTimeEq;

/// Compare two byte slices in constant time with respect to their
/// *content* (differing lengths short-circuit, which is not secret).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
