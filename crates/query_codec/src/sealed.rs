use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{EncodeError, KeyDerivationError, QueryCipher, QuerySecret};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_SALT: &[u8] = b"hashed-query/sealed-cipher-salt";
const AEAD_KEY_INFO: &[u8] = b"hashed-query/sealed-cipher/aead/v1";
const NONCE_KEY_INFO: &[u8] = b"hashed-query/sealed-cipher/nonce/v1";

/// ChaCha20-Poly1305 over the JSON text, keyed from the configured secret.
///
/// The nonce is synthetic (derived from a second key and the plaintext), which
/// keeps encoding deterministic at the cost of revealing when two tokens carry
/// the same state. Sealed layout is `nonce || ciphertext || tag`.
pub struct SealedCipher {
    aead: ChaCha20Poly1305,
    nonce_key: [u8; KEY_LEN],
}

impl SealedCipher {
    pub fn new(secret: &QuerySecret) -> Result<Self, KeyDerivationError> {
        let hk = Hkdf::<Sha256>::new(Some(KEY_SALT), secret.as_bytes());
        let mut aead_key = [0u8; KEY_LEN];
        let mut nonce_key = [0u8; KEY_LEN];
        hk.expand(AEAD_KEY_INFO, &mut aead_key)
            .map_err(|_| KeyDerivationError)?;
        hk.expand(NONCE_KEY_INFO, &mut nonce_key)
            .map_err(|_| KeyDerivationError)?;

        let aead = ChaCha20Poly1305::new(Key::from_slice(&aead_key));
        aead_key.zeroize();
        Ok(Self { aead, nonce_key })
    }

    fn synthetic_nonce(&self, plaintext: &[u8]) -> [u8; NONCE_LEN] {
        let digest = Sha256::new()
            .chain_update(self.nonce_key)
            .chain_update(plaintext)
            .finalize();
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }
}

impl QueryCipher for SealedCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let nonce = self.synthetic_nonce(plaintext);
        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| EncodeError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.aead.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
    }
}

impl Drop for SealedCipher {
    fn drop(&mut self) {
        self.nonce_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_is_deterministic_and_opens() {
        let cipher = SealedCipher::new(&QuerySecret::new("s3cret")).expect("cipher");
        let a = cipher.seal(br#"{"page":2}"#).expect("seal");
        let b = cipher.seal(br#"{"page":2}"#).expect("seal");
        assert_eq!(a, b);
        assert_eq!(cipher.open(&a).as_deref(), Some(&br#"{"page":2}"#[..]));
    }

    #[test]
    fn different_plaintexts_get_different_nonces() {
        let cipher = SealedCipher::new(&QuerySecret::default()).expect("cipher");
        let a = cipher.seal(br#"{"page":1}"#).expect("seal");
        let b = cipher.seal(br#"{"page":2}"#).expect("seal");
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn open_rejects_short_and_flipped_input() {
        let cipher = SealedCipher::new(&QuerySecret::default()).expect("cipher");
        assert!(cipher.open(&[0u8; NONCE_LEN + TAG_LEN - 1]).is_none());

        let mut sealed = cipher.seal(b"{}").expect("seal");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(cipher.open(&sealed).is_none());
    }
}
