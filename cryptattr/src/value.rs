//! Encrypted values with an optional in-memory cipher context.

use crate::cipher::Cipher;
use crate::error::Error;
use std::fmt;
use std::sync::Arc;

/// A transformed payload plus the cipher able to compare it with plaintext.
///
/// The payload never changes once constructed. The cipher is not persisted:
/// it is attached on the write path by [`EncryptedValue::encrypt`], or on the
/// read path once a stored payload has been recognised as ciphertext. It can be
/// attached at most once.
///
/// # Example
///
/// ```
/// use cryptattr::cipher::{DigestAlgorithm, DigestCipher};
/// use cryptattr::value::EncryptedValue;
/// use std::sync::Arc;
///
/// let cipher = Arc::new(DigestCipher::new(DigestAlgorithm::Sha1, "salt"));
/// let value = EncryptedValue::encrypt("secret", cipher).unwrap();
///
/// assert_eq!(value.payload(), "8152bc582f58c854f580cb101d3182813dec4afe");
/// assert!(value.equals_plaintext("secret").unwrap());
/// ```
#[derive(Clone)]
pub struct EncryptedValue {
    payload: String,
    cipher: Option<Arc<dyn Cipher>>,
}

impl EncryptedValue {
    /// Wraps a stored payload without a cipher.
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self { payload: payload.into(), cipher: None }
    }

    /// Encrypts plaintext and keeps the cipher attached.
    ///
    /// # Errors
    ///
    /// Returns the cipher's error if encryption fails.
    pub fn encrypt(plaintext: &str, cipher: Arc<dyn Cipher>) -> Result<Self, Error> {
        let payload = cipher.encrypt(plaintext)?;
        Ok(Self { payload, cipher: Some(cipher) })
    }

    /// Returns the stored payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consumes the value, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// Returns the attached cipher, if any.
    #[must_use]
    pub fn cipher(&self) -> Option<&Arc<dyn Cipher>> {
        self.cipher.as_ref()
    }

    /// Returns `true` once a cipher is attached.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Attaches the cipher that produced this payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::CipherAlreadyAttached` if a cipher is already attached;
    /// the existing cipher is kept.
    pub fn attach_cipher(&mut self, cipher: Arc<dyn Cipher>) -> Result<(), Error> {
        if self.cipher.is_some() {
            return Err(Error::CipherAlreadyAttached);
        }
        self.cipher = Some(cipher);
        Ok(())
    }

    /// Compares the value with a plaintext candidate.
    ///
    /// With a cipher attached the candidate is re-encrypted (or the payload
    /// decrypted) under the same configuration. Without one the payload itself
    /// is compared, since there is nothing to re-derive from.
    ///
    /// # Errors
    ///
    /// Returns the cipher's error if the comparison needs key material that
    /// is missing or the payload is malformed.
    pub fn equals_plaintext(&self, candidate: &str) -> Result<bool, Error> {
        match &self.cipher {
            Some(cipher) => cipher.matches(&self.payload, candidate),
            None => Ok(self.payload == candidate),
        }
    }

    /// Recovers the plaintext through the attached cipher.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` without a cipher, and
    /// `Error::Irreversible` for digests.
    pub fn decrypt(&self) -> Result<String, Error> {
        let cipher = self
            .cipher
            .as_ref()
            .ok_or_else(|| Error::Configuration("no cipher attached to value".to_string()))?;
        cipher.decrypt(&self.payload)
    }
}

impl fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload)
    }
}

impl fmt::Debug for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedValue")
            .field("payload", &self.payload)
            .field("cipher", &self.cipher.as_ref().map(|c| c.mode()))
            .finish()
    }
}
