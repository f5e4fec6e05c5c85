//! Cipher capability shared by every encryption mode.
//!
//! - [`DigestCipher`]: one-way, salt-aware hex digest
//! - [`SymmetricCipher`]: deterministic AES-256-SIV
//! - [`AsymmetricCipher`]: X25519 sealed boxes

pub mod asymmetric;
pub mod digest;
pub mod symmetric;

pub use asymmetric::AsymmetricCipher;
pub use digest::{DigestAlgorithm, DigestCipher, DigestOptions};
pub use symmetric::SymmetricCipher;

use crate::error::Error;
use serde::Deserialize;
use std::fmt;

/// Encryption mode of a cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherMode {
    /// One-way digest.
    Digest,
    /// Reversible shared-key encryption.
    Symmetric,
    /// Reversible public-key encryption.
    Asymmetric,
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Digest => "digest",
            Self::Symmetric => "symmetric",
            Self::Asymmetric => "asymmetric",
        })
    }
}

/// Transforms plaintext into a storable payload.
///
/// A constructed cipher has fixed configuration. Payloads are text so they can
/// be stored in any string column.
pub trait Cipher: Send + Sync + fmt::Debug {
    /// Returns the encryption mode.
    fn mode(&self) -> CipherMode;

    /// Transforms plaintext into its stored payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::EncryptionFailed` if the underlying primitive fails.
    fn encrypt(&self, plaintext: &str) -> Result<String, Error>;

    /// Recovers plaintext from a payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::Irreversible` for one-way ciphers.
    fn decrypt(&self, _payload: &str) -> Result<String, Error> {
        Err(Error::Irreversible(self.mode()))
    }

    /// Returns `true` if [`Cipher::decrypt`] is supported.
    fn is_reversible(&self) -> bool {
        false
    }

    /// Checks whether `payload` is the transformation of `candidate`.
    ///
    /// Reversible ciphers decrypt and compare; one-way ciphers re-encrypt the
    /// candidate and compare payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if decryption or re-encryption fails.
    fn matches(&self, payload: &str, candidate: &str) -> Result<bool, Error> {
        if self.is_reversible() {
            Ok(self.decrypt(payload)? == candidate)
        } else {
            Ok(self.encrypt(candidate)? == payload)
        }
    }
}
