//! Key source abstraction for reversible cipher modes.

use crate::error::KeySourceError;
use secrecy::SecretVec;

/// Supplies key material to the symmetric and asymmetric ciphers.
///
/// Implementations must be thread-safe (`Send + Sync`) so a loaded source can
/// back attribute declarations shared across records.
///
/// # Example
///
/// ```rust,ignore
/// use cryptattr::key_source::KeySource;
///
/// struct MySource;
///
/// impl KeySource for MySource {
///     fn symmetric_key(&self) -> Result<SecretVec<u8>, KeySourceError> {
///         // Implementation
///     }
///     // ... other methods
/// }
/// ```
pub trait KeySource: Send + Sync {
    /// Returns the 64-byte AES-256-SIV key for symmetric attributes.
    ///
    /// # Errors
    ///
    /// Returns `KeySourceError::KeyNotFound` if no symmetric key is configured.
    fn symmetric_key(&self) -> Result<SecretVec<u8>, KeySourceError>;

    /// Returns the X25519 public key used to seal asymmetric attributes.
    ///
    /// # Errors
    ///
    /// Returns `KeySourceError::KeyNotFound` if no public key is configured.
    fn public_key(&self) -> Result<[u8; 32], KeySourceError>;

    /// Returns the X25519 secret key used to open asymmetric attributes.
    ///
    /// # Returns
    ///
    /// Returns `None` if the source can only encrypt.
    ///
    /// # Errors
    ///
    /// Returns `KeySourceError::InvalidKey` if the stored key is malformed.
    fn secret_key(&self) -> Result<Option<SecretVec<u8>>, KeySourceError> {
        Ok(None)
    }
}
