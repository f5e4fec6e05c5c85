//! File-based key source for `cryptattr`.
//!
//! This source reads hex-encoded keys from a directory and is suitable for
//! development and testing environments.

#![warn(clippy::pedantic, clippy::nursery)]

use cryptattr::cipher::asymmetric::{generate_keypair, AsymmetricCipher};
use cryptattr::error::KeySourceError;
use cryptattr::key_source::KeySource;
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretVec;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Symmetric key file name.
pub const SYMMETRIC_KEY_FILE: &str = "symmetric.key";
/// Asymmetric public key file name.
pub const PUBLIC_KEY_FILE: &str = "asymmetric.pub";
/// Asymmetric secret key file name.
pub const SECRET_KEY_FILE: &str = "asymmetric.key";

const SYMMETRIC_KEY_SIZE: usize = 64;
const ASYMMETRIC_KEY_SIZE: usize = 32;

/// File-based key source for development and testing.
///
/// Keys are stored as hex text with the following structure:
/// ```text
/// keys/
/// ├── symmetric.key   (64 bytes, 0600 permissions)
/// ├── asymmetric.pub  (32 bytes)
/// └── asymmetric.key  (32 bytes, 0600 permissions, optional)
/// ```
///
/// Without `asymmetric.key` the source can seal asymmetric attributes but not
/// compare them.
#[derive(Debug, Clone)]
pub struct FileKeySource {
    key_dir: PathBuf,
}

impl FileKeySource {
    /// Creates a new `FileKeySource`.
    ///
    /// # Arguments
    ///
    /// * `key_dir` - Directory containing key files
    ///
    /// # Errors
    ///
    /// Returns error if the directory doesn't exist.
    pub fn new(key_dir: impl Into<PathBuf>) -> Result<Self, KeySourceError> {
        let key_dir = key_dir.into();
        if !key_dir.is_dir() {
            return Err(KeySourceError::CreationFailed(format!(
                "Key directory does not exist: {}",
                key_dir.display()
            )));
        }
        Ok(Self { key_dir })
    }

    /// Initializes a key directory, generating every missing key file.
    ///
    /// Existing files are never overwritten, so running `init` twice keeps the
    /// first keys. A lone `asymmetric.key` gets its `asymmetric.pub` derived
    /// from it. A lone `asymmetric.pub` is left as is: no secret key can be
    /// generated for it, so the directory stays encrypt-only for asymmetric
    /// attributes.
    ///
    /// # Errors
    ///
    /// Returns error if directory creation or a file write fails.
    pub fn init(key_dir: impl Into<PathBuf>) -> Result<Self, KeySourceError> {
        let key_dir = key_dir.into();
        fs::create_dir_all(&key_dir)?;

        let symmetric = key_dir.join(SYMMETRIC_KEY_FILE);
        if !symmetric.exists() {
            let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
            OsRng.fill_bytes(&mut *key);
            write_key(&symmetric, &*key, true)?;
            debug!(path = %symmetric.display(), "generated symmetric key");
        }

        let source = Self { key_dir };
        let public = source.key_dir.join(PUBLIC_KEY_FILE);
        let secret = source.key_dir.join(SECRET_KEY_FILE);
        match (public.exists(), secret.exists()) {
            (false, false) => {
                let pair = generate_keypair();
                write_key(&secret, &*pair.secret, true)?;
                write_key(&public, &pair.public, false)?;
                debug!(path = %public.display(), "generated asymmetric keypair");
            }
            (false, true) => {
                let key = source
                    .read_key(SECRET_KEY_FILE, ASYMMETRIC_KEY_SIZE)?
                    .ok_or_else(|| KeySourceError::KeyNotFound(SECRET_KEY_FILE.to_string()))?;
                let bytes = Zeroizing::new(
                    <[u8; ASYMMETRIC_KEY_SIZE]>::try_from(key.as_slice())
                        .map_err(|_| KeySourceError::InvalidKey(SECRET_KEY_FILE.to_string()))?,
                );
                let derived = AsymmetricCipher::with_secret(*bytes).public_key();
                write_key(&public, &derived, false)?;
                debug!(path = %public.display(), "derived public key from existing secret key");
            }
            (true, false) => {
                debug!(
                    path = %public.display(),
                    "public key without secret key, directory is encrypt-only"
                );
            }
            (true, true) => {}
        }

        Ok(source)
    }

    /// Returns the key directory.
    #[must_use]
    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    fn read_key(&self, name: &str, size: usize) -> Result<Option<Zeroizing<Vec<u8>>>, KeySourceError> {
        let path = self.key_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }

        let text = Zeroizing::new(fs::read_to_string(&path)?);
        let bytes = Zeroizing::new(
            hex::decode(text.trim())
                .map_err(|e| KeySourceError::InvalidKey(format!("{name}: {e}")))?,
        );
        if bytes.len() != size {
            return Err(KeySourceError::InvalidKey(format!(
                "{name}: expected {size} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Some(bytes))
    }
}

fn write_key(path: &Path, key: &[u8], private: bool) -> Result<(), KeySourceError> {
    let encoded = Zeroizing::new(hex::encode(key));
    fs::write(path, encoded.as_bytes())?;

    // Owner-only on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if private {
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    Ok(())
}

impl KeySource for FileKeySource {
    fn symmetric_key(&self) -> Result<SecretVec<u8>, KeySourceError> {
        self.read_key(SYMMETRIC_KEY_FILE, SYMMETRIC_KEY_SIZE)?
            .map(|key| SecretVec::new(key.to_vec()))
            .ok_or_else(|| KeySourceError::KeyNotFound(SYMMETRIC_KEY_FILE.to_string()))
    }

    fn public_key(&self) -> Result<[u8; 32], KeySourceError> {
        let key = self
            .read_key(PUBLIC_KEY_FILE, ASYMMETRIC_KEY_SIZE)?
            .ok_or_else(|| KeySourceError::KeyNotFound(PUBLIC_KEY_FILE.to_string()))?;
        key.as_slice()
            .try_into()
            .map_err(|_| KeySourceError::InvalidKey(PUBLIC_KEY_FILE.to_string()))
    }

    fn secret_key(&self) -> Result<Option<SecretVec<u8>>, KeySourceError> {
        Ok(self
            .read_key(SECRET_KEY_FILE, ASYMMETRIC_KEY_SIZE)?
            .map(|key| SecretVec::new(key.to_vec())))
    }
}
