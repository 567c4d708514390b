//! Credential encryption boundary
//!
//! AES-256-GCM with an HKDF-SHA256 key derived from a passphrase and salt.
//! Sealed blobs are versioned: `version(1) || nonce(12) || ciphertext`.
//! Key material is zeroized on drop.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::SessionError;

const FORMAT_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// Per-manager cipher for sealing credential secrets.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionCipher {
    key: [u8; 32],
}

impl SessionCipher {
    /// Derive the sealing key from a passphrase and salt via HKDF-SHA256.
    pub fn derive(passphrase: &str, salt: &[u8]) -> Result<Self, SessionError> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
        let mut key = [0u8; 32];
        hkdf.expand(b"spectra-session-sealing", &mut key)
            .map_err(|_| SessionError::Crypto("key derivation failed".into()))?;
        Ok(Self { key })
    }

    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Seal a plaintext secret. Every call uses a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| SessionError::Crypto("invalid key length".into()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| SessionError::Crypto("encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        sealed.push(FORMAT_VERSION);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a sealed blob produced by `seal`.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        if sealed.len() < 1 + NONCE_LEN {
            return Err(SessionError::Crypto("sealed blob too short".into()));
        }
        if sealed[0] != FORMAT_VERSION {
            return Err(SessionError::Crypto(format!(
                "unsupported sealed format version {}",
                sealed[0]
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| SessionError::Crypto("invalid key length".into()))?;
        let nonce = Nonce::from_slice(&sealed[1..1 + NONCE_LEN]);

        cipher
            .decrypt(nonce, &sealed[1 + NONCE_LEN..])
            .map_err(|_| SessionError::Crypto("decryption failed (wrong key or tampered data)".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let cipher = SessionCipher::derive("passphrase", b"salt").unwrap();
        let sealed = cipher.seal(b"hunter2").unwrap();

        assert_ne!(&sealed[1 + NONCE_LEN..], b"hunter2".as_slice());
        assert_eq!(cipher.open(&sealed).unwrap(), b"hunter2");
    }

    #[test]
    fn nonces_are_fresh_per_seal() {
        let cipher = SessionCipher::derive("passphrase", b"salt").unwrap();
        let a = cipher.seal(b"secret").unwrap();
        let b = cipher.seal(b"secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let cipher = SessionCipher::derive("passphrase", b"salt").unwrap();
        let other = SessionCipher::derive("different", b"salt").unwrap();

        let sealed = cipher.seal(b"secret").unwrap();
        assert!(matches!(other.open(&sealed), Err(SessionError::Crypto(_))));
    }

    #[test]
    fn tampered_blob_fails_to_open() {
        let cipher = SessionCipher::derive("passphrase", b"salt").unwrap();
        let mut sealed = cipher.seal(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(matches!(cipher.open(&sealed), Err(SessionError::Crypto(_))));
    }
}
