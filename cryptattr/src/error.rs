//! Error types for `cryptattr` operations.

use crate::cipher::CipherMode;
use std::fmt;

/// Main error type for `cryptattr` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid cipher configuration (key material, options, salt derivations)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Source and target attribute names collide
    #[error("ambiguous attribute name: {name}")]
    AmbiguousAttributeName {
        /// The attribute name that appears twice
        name: String,
    },

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption operation failed
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Authentication tag verification failed (data may be corrupted or tampered)
    #[error("authentication failed: ciphertext may be corrupted or tampered")]
    AuthenticationFailed,

    /// The cipher has no inverse
    #[error("{0} cipher cannot decrypt")]
    Irreversible(CipherMode),

    /// A cipher context is already attached to the value
    #[error("cipher already attached to this value")]
    CipherAlreadyAttached,

    /// Digest algorithm identifier is unknown
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key source operation failed
    #[error("key source error: {0}")]
    KeySource(#[from] KeySourceError),
}

/// Errors specific to key source operations.
#[derive(Debug)]
pub enum KeySourceError {
    /// Key not found
    KeyNotFound(String),

    /// Key material is malformed
    InvalidKey(String),

    /// Key generation failed
    CreationFailed(String),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for KeySourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyNotFound(id) => write!(f, "key not found: {id}"),
            Self::InvalidKey(msg) => write!(f, "invalid key: {msg}"),
            Self::CreationFailed(msg) => write!(f, "key creation failed: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for KeySourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KeySourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_name_display() {
        let err = Error::AmbiguousAttributeName { name: "password".to_string() };
        assert_eq!(err.to_string(), "ambiguous attribute name: password");
    }

    #[test]
    fn test_irreversible_display() {
        let err = Error::Irreversible(CipherMode::Digest);
        assert_eq!(err.to_string(), "digest cipher cannot decrypt");
    }

    #[test]
    fn test_key_source_error_wraps_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::from(KeySourceError::from(io));
        assert!(matches!(err, Error::KeySource(KeySourceError::Io(_))));
        assert!(err.to_string().contains("missing"));
    }
}
