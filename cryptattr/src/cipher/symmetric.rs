//! Deterministic symmetric encryption using AES-SIV.
//!
//! AES-SIV (Synthetic IV) is a misuse-resistant authenticated encryption mode
//! that produces deterministic output for the same plaintext and key, so an
//! attribute encrypted twice stores the same payload.
//!
//! # Security Properties
//!
//! - **Deterministic**: Same plaintext + key → same ciphertext
//! - **Misuse-resistant**: Safe even with nonce reuse
//! - **Authenticated**: Provides confidentiality and authenticity
//!
//! # Security Warning
//!
//! Deterministic encryption reveals equality patterns across records.

use super::{Cipher, CipherMode};
use crate::error::Error;
use crate::key_source::KeySource;
use aes_siv::{
    aead::{Aead, KeyInit, Payload},
    Aes256SivAead,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretVec};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// AES-256-SIV key size in bytes (512 bits).
pub const KEY_SIZE: usize = 64;

/// Domain separation for password-derived keys.
const PASSWORD_KDF_SALT: &[u8] = b"cryptattr-symmetric-password";
const PASSWORD_KDF_INFO: &[u8] = b"cryptattr|aes-256-siv|v1";

/// Reversible cipher using AES-256-SIV with base64 payloads.
///
/// # Example
///
/// ```
/// use cryptattr::cipher::{Cipher, SymmetricCipher};
///
/// let cipher = SymmetricCipher::from_password("key").unwrap();
/// let payload = cipher.encrypt("secret").unwrap();
/// assert_eq!(cipher.decrypt(&payload).unwrap(), "secret");
/// ```
pub struct SymmetricCipher {
    key: SecretVec<u8>,
}

impl SymmetricCipher {
    /// Creates a cipher from a raw 64-byte key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the key is not 64 bytes.
    pub fn new(key: SecretVec<u8>) -> Result<Self, Error> {
        let len = key.expose_secret().len();
        if len != KEY_SIZE {
            return Err(Error::Configuration(format!(
                "symmetric key must be {KEY_SIZE} bytes, got {len}"
            )));
        }
        Ok(Self { key })
    }

    /// Derives the key from a password with HKDF-SHA256.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the password is empty.
    pub fn from_password(password: &str) -> Result<Self, Error> {
        if password.is_empty() {
            return Err(Error::Configuration("symmetric password is empty".to_string()));
        }

        let hkdf = Hkdf::<Sha256>::new(Some(PASSWORD_KDF_SALT), password.as_bytes());
        let mut key = vec![0u8; KEY_SIZE];
        hkdf.expand(PASSWORD_KDF_INFO, &mut key)
            .map_err(|_| Error::Configuration("symmetric key derivation failed".to_string()))?;

        Self::new(SecretVec::new(key))
    }

    /// Creates a cipher from a hex-encoded 64-byte key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the key is not valid hex or has the
    /// wrong length.
    pub fn from_hex(key: &str) -> Result<Self, Error> {
        let bytes = hex::decode(key.trim())
            .map_err(|e| Error::Configuration(format!("symmetric key is not hex: {e}")))?;
        Self::new(SecretVec::new(bytes))
    }

    /// Creates a cipher from the symmetric key of a key source.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeySource` if the key is unavailable.
    pub fn from_source(source: &dyn KeySource) -> Result<Self, Error> {
        Self::new(source.symmetric_key()?)
    }

    fn cipher(&self) -> Result<Aes256SivAead, Error> {
        Aes256SivAead::new_from_slice(self.key.expose_secret())
            .map_err(|e| Error::Configuration(format!("failed to create AES-SIV cipher: {e}")))
    }
}

impl Cipher for SymmetricCipher {
    fn mode(&self) -> CipherMode {
        CipherMode::Symmetric
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let payload = Payload { msg: plaintext.as_bytes(), aad: &[] };

        // AES-SIV is deterministic - uses empty nonce
        let ciphertext = self
            .cipher()?
            .encrypt(&Default::default(), payload)
            .map_err(|e| Error::EncryptionFailed(format!("AES-SIV encryption failed: {e}")))?;

        Ok(STANDARD.encode(ciphertext))
    }

    fn decrypt(&self, payload: &str) -> Result<String, Error> {
        let ciphertext = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::DecryptionFailed(format!("payload is not base64: {e}")))?;

        let plaintext = Zeroizing::new(
            self.cipher()?
                .decrypt(&Default::default(), Payload { msg: &ciphertext, aad: &[] })
                .map_err(|_| Error::AuthenticationFailed)?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| Error::DecryptionFailed("plaintext is not UTF-8".to_string()))
    }

    fn is_reversible(&self) -> bool {
        true
    }
}

impl Clone for SymmetricCipher {
    fn clone(&self) -> Self {
        Self { key: SecretVec::new(self.key.expose_secret().clone()) }
    }
}

impl fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_cipher() -> SymmetricCipher {
        SymmetricCipher::new(SecretVec::new(vec![0x42; KEY_SIZE])).unwrap()
    }

    #[test]
    fn test_deterministic_encryption() {
        let cipher = create_test_cipher();

        let payload1 = cipher.encrypt("secret").unwrap();
        let payload2 = cipher.encrypt("secret").unwrap();

        assert_eq!(payload1, payload2, "Encryption must be deterministic");
    }

    #[test]
    fn test_decrypt_round_trip() {
        let cipher = create_test_cipher();
        let payload = cipher.encrypt("alice@example.com").unwrap();

        assert_ne!(payload, "alice@example.com");
        assert_eq!(cipher.decrypt(&payload).unwrap(), "alice@example.com");
    }

    #[test]
    fn test_matches_by_decryption() {
        let cipher = create_test_cipher();
        let payload = cipher.encrypt("secret").unwrap();

        assert!(cipher.matches(&payload, "secret").unwrap());
        assert!(!cipher.matches(&payload, "shhh").unwrap());
    }

    #[test]
    fn test_different_keys_different_payloads() {
        let cipher1 = create_test_cipher();
        let cipher2 = SymmetricCipher::from_password("key").unwrap();

        assert_ne!(cipher1.encrypt("secret").unwrap(), cipher2.encrypt("secret").unwrap());
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let cipher1 = SymmetricCipher::from_password("key").unwrap();
        let cipher2 = SymmetricCipher::from_password("other").unwrap();

        let payload = cipher1.encrypt("secret").unwrap();
        assert!(matches!(cipher2.decrypt(&payload), Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_corrupted_payload_fails() {
        let cipher = create_test_cipher();
        let payload = cipher.encrypt("secret").unwrap();

        let mut bytes = STANDARD.decode(&payload).unwrap();
        if let Some(byte) = bytes.first_mut() {
            *byte ^= 0xFF;
        }

        let result = cipher.decrypt(&STANDARD.encode(bytes));
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_non_base64_payload_fails() {
        let cipher = create_test_cipher();
        assert!(matches!(cipher.decrypt("not base64!"), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_password_derivation_is_stable() {
        let cipher1 = SymmetricCipher::from_password("key").unwrap();
        let cipher2 = SymmetricCipher::from_password("key").unwrap();

        assert_eq!(cipher1.encrypt("secret").unwrap(), cipher2.encrypt("secret").unwrap());
    }

    #[test]
    fn test_invalid_key_length() {
        let result = SymmetricCipher::new(SecretVec::new(vec![0x42; 32]));
        assert!(matches!(result, Err(Error::Configuration(_))), "Should reject short key");
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(SymmetricCipher::from_password(""), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_from_hex() {
        let cipher = SymmetricCipher::from_hex(&"42".repeat(KEY_SIZE)).unwrap();
        let reference = create_test_cipher();

        assert_eq!(cipher.encrypt("secret").unwrap(), reference.encrypt("secret").unwrap());
        assert!(matches!(SymmetricCipher::from_hex("zz"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = create_test_cipher();
        let payload = cipher.encrypt("").unwrap();
        assert_eq!(cipher.decrypt(&payload).unwrap(), "");
    }

    #[test]
    fn test_cipher_clone() {
        let cipher1 = create_test_cipher();
        let cipher2 = cipher1.clone();

        let payload = cipher1.encrypt("test").unwrap();
        assert_eq!(cipher2.decrypt(&payload).unwrap(), "test");
    }
}
