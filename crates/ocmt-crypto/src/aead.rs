//! XChaCha20-Poly1305 AEAD (§4.1): 24-byte random nonces, 16-byte tags.

use crate::error::{CryptoError, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

/// Nonce length for XChaCha20-Poly1305.
pub const NONCE_LENGTH: usize = 24;

/// Draw a fresh random 24-byte nonce. Nonces are never reused under a
/// given key (§4.1); a fresh draw from the OS RNG is what makes that true
/// in practice given XChaCha20's extended nonce space.
pub fn random_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with a freshly drawn nonce, returning
/// `(nonce, ciphertext_with_tag)`.
pub fn seal(key: &Zeroizing<[u8; 32]>, plaintext: &[u8]) -> Result<([u8; NONCE_LENGTH], Vec<u8>)> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_ref())
        .map_err(|_| CryptoError::InvalidLength { expected: 32, actual: key.len() })?;
    let nonce_bytes = random_nonce();
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::Aead)?;
    Ok((nonce_bytes, ciphertext))
}

/// Decrypt a ciphertext produced by [`seal`] (or any XChaCha20-Poly1305
/// ciphertext with trailing 16-byte tag) under `key` and `nonce`.
pub fn open(
    key: &Zeroizing<[u8; 32]>,
    nonce: &[u8; NONCE_LENGTH],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_ref())
        .map_err(|_| CryptoError::InvalidLength { expected: 32, actual: key.len() })?;
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Aead)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Zeroizing<[u8; 32]> {
        Zeroizing::new([byte; 32])
    }

    #[test]
    fn seal_then_open_round_trips() {
        let k = key(7);
        let (nonce, ct) = seal(&k, b"integration payload").unwrap();
        let pt = open(&k, &nonce, &ct).unwrap();
        assert_eq!(&*pt, b"integration payload");
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let k1 = key(1);
        let k2 = key(2);
        let (nonce, ct) = seal(&k1, b"secret").unwrap();
        assert!(open(&k2, &nonce, &ct).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let k = key(9);
        let (nonce, mut ct) = seal(&k, b"secret data").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        assert!(open(&k, &nonce, &ct).is_err());
    }

    #[test]
    fn nonces_are_not_reused_across_calls() {
        let k = key(3);
        let (n1, _) = seal(&k, b"a").unwrap();
        let (n2, _) = seal(&k, b"a").unwrap();
        assert_ne!(n1, n2);
    }
}
