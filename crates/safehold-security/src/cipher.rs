// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Envelope encryption: AES-256-GCM via `ring`.
//
// Output layout: [nonce: 12 bytes][ciphertext][tag: 16 bytes].  A fresh random
// nonce is drawn for every seal.  The storage key is passed as associated data
// so a sealed envelope only opens under the key it was written to.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use safehold_core::error::{Result, SafeholdError};
use tracing::{debug, instrument};

use crate::fingerprint::DerivedKey;

/// Bytes added to every plaintext: nonce plus GCM tag.
pub const ENCRYPTION_OVERHEAD: usize = NONCE_LEN + 16;

/// Stateless AEAD wrapper around a derived key.
///
/// Built per operation from a freshly derived key and dropped right after, so
/// key material does not outlive the call.
pub struct EnvelopeCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl EnvelopeCipher {
    pub fn new(key: &DerivedKey) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, key.aead_bytes())
            .map_err(|_| SafeholdError::Encryption("invalid AES-256-GCM key length".into()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `plaintext`, binding `aad`, and return nonce || ciphertext || tag.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| SafeholdError::Encryption("nonce generation failed".into()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(aad),
                &mut in_out,
            )
            .map_err(|_| SafeholdError::Encryption("seal failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        debug!(sealed_len = sealed.len(), "encryption complete");
        Ok(sealed)
    }

    /// Decrypt the output of [`seal`](Self::seal).  Wrong key, wrong `aad`,
    /// truncation or any flipped bit all yield `Decryption`.
    #[instrument(skip_all, fields(sealed_len = sealed.len()))]
    pub fn open(&self, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < ENCRYPTION_OVERHEAD {
            return Err(SafeholdError::Decryption(format!(
                "sealed data too short: {} bytes",
                sealed.len()
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| SafeholdError::Decryption("malformed nonce".into()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| SafeholdError::Decryption("authentication failed".into()))?;

        debug!(plaintext_len = plaintext.len(), "decryption complete");
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{EnvironmentFingerprint, derive_key};

    fn cipher(lang: &str) -> EnvelopeCipher {
        let key = derive_key(&EnvironmentFingerprint::new("cipher-test").with_language(lang));
        EnvelopeCipher::new(&key).expect("cipher")
    }

    #[test]
    fn round_trip() {
        let cipher = cipher("en");
        let plaintext = b"{\"payload\":\"x\",\"tag\":\"00\"}";

        let sealed = cipher.seal(plaintext, b"sh:k").expect("seal failed");
        assert_eq!(sealed.len(), plaintext.len() + ENCRYPTION_OVERHEAD);
        assert_ne!(&sealed[NONCE_LEN..NONCE_LEN + plaintext.len()], plaintext);

        let opened = cipher.open(&sealed, b"sh:k").expect("open failed");
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn nonces_are_fresh() {
        let cipher = cipher("en");
        let a = cipher.seal(b"same", b"k").unwrap();
        let b = cipher.seal(b"same", b"k").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = cipher("en").seal(b"secret", b"k").unwrap();
        assert!(matches!(
            cipher("fr").open(&sealed, b"k"),
            Err(SafeholdError::Decryption(_))
        ));
    }

    #[test]
    fn wrong_aad_fails() {
        let cipher = cipher("en");
        let sealed = cipher.seal(b"secret", b"sh:a").unwrap();
        assert!(cipher.open(&sealed, b"sh:b").is_err());
    }

    #[test]
    fn truncated_input_fails() {
        let cipher = cipher("en");
        let sealed = cipher.seal(b"secret", b"k").unwrap();
        assert!(cipher.open(&sealed[..NONCE_LEN + 3], b"k").is_err());
        assert!(cipher.open(&[], b"k").is_err());
    }

    #[test]
    fn flipped_bit_fails() {
        let cipher = cipher("en");
        let mut sealed = cipher.seal(b"secret", b"k").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(cipher.open(&sealed, b"k").is_err());
    }

    #[test]
    fn empty_plaintext() {
        let cipher = cipher("en");
        let sealed = cipher.seal(b"", b"k").unwrap();
        assert!(cipher.open(&sealed, b"k").unwrap().is_empty());
    }
}
