//! Salt-aware one-way digest cipher.
//!
//! The payload is the lowercase hex digest of `plaintext || salt`. With salt
//! embedding enabled the salt is appended verbatim:
//!
//! ```text
//! [hex digest: fixed length per algorithm][salt: any length]
//! ```
//!
//! There is no delimiter. The algorithm's fixed output length is the only way
//! to split a payload back apart, so changing the algorithm of an attribute
//! with existing data is a breaking migration.

use super::{Cipher, CipherMode};
use crate::error::Error;
use crate::record::Record;
use crate::salt::{resolve, SaltContext, SaltSpec};
use md5::Md5;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Digest algorithm of a [`DigestCipher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DigestAlgorithm {
    /// MD5, 32 hex characters.
    Md5,
    /// SHA-1, 40 hex characters.
    #[default]
    Sha1,
    /// SHA-224, 56 hex characters.
    Sha224,
    /// SHA-256, 64 hex characters.
    Sha256,
    /// SHA-384, 96 hex characters.
    Sha384,
    /// SHA-512, 128 hex characters.
    Sha512,
}

impl DigestAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [Self; 6] =
        [Self::Md5, Self::Sha1, Self::Sha224, Self::Sha256, Self::Sha384, Self::Sha512];

    /// Canonical output length in hex characters.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha224 => 56,
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }

    /// Returns the lowercase identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Computes the lowercase hex digest of `input`.
    #[must_use]
    pub fn hexdigest(self, input: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(input)),
            Self::Sha1 => hex::encode(Sha1::digest(input)),
            Self::Sha224 => hex::encode(Sha224::digest(input)),
            Self::Sha256 => hex::encode(Sha256::digest(input)),
            Self::Sha384 => hex::encode(Sha384::digest(input)),
            Self::Sha512 => hex::encode(Sha512::digest(input)),
        }
    }

    /// Returns the salt appended after the digest in `payload`, if any.
    ///
    /// A payload no longer than the digest carries no salt. This never panics,
    /// whatever the payload length or encoding.
    #[must_use]
    pub fn embedded_salt(self, payload: &str) -> Option<&str> {
        payload.get(self.output_len()..).filter(|tail| !tail.is_empty())
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String =
            s.chars().filter(|c| *c != '-' && *c != '_').collect::<String>().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == normalized)
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Per-attribute digest configuration.
///
/// # Example
///
/// ```
/// use cryptattr::cipher::{DigestAlgorithm, DigestOptions};
/// use cryptattr::salt::SaltSpec;
///
/// let options = DigestOptions::new(DigestAlgorithm::Sha256)
///     .with_salt(SaltSpec::attribute("salt"))
///     .embed_salt();
/// ```
#[derive(Debug, Clone, Default)]
pub struct DigestOptions {
    /// Digest algorithm.
    pub algorithm: DigestAlgorithm,
    /// Salt specification, resolved per record.
    pub salt: SaltSpec,
    /// Append the resolved salt to the payload.
    pub embed_salt: bool,
}

impl DigestOptions {
    /// Creates options with the default salt and no embedding.
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm, ..Self::default() }
    }

    /// Sets the salt specification.
    #[must_use]
    pub fn with_salt(mut self, salt: SaltSpec) -> Self {
        self.salt = salt;
        self
    }

    /// Enables salt embedding.
    #[must_use]
    pub const fn embed_salt(mut self) -> Self {
        self.embed_salt = true;
        self
    }
}

/// One-way cipher computing `hex(digest(plaintext || salt))`.
///
/// # Example
///
/// ```
/// use cryptattr::cipher::{Cipher, DigestAlgorithm, DigestCipher};
///
/// let cipher = DigestCipher::new(DigestAlgorithm::Sha1, "admin").with_embedded_salt();
/// assert_eq!(
///     cipher.encrypt("secret").unwrap(),
///     "a55d037f385cad22efe7862e07b805938d150154admin"
/// );
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct DigestCipher {
    algorithm: DigestAlgorithm,
    salt: String,
    embed: bool,
}

impl DigestCipher {
    /// Creates a cipher with a resolved salt and no embedding.
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm, salt: impl Into<String>) -> Self {
        Self { algorithm, salt: salt.into(), embed: false }
    }

    /// Appends the salt to every payload.
    #[must_use]
    pub const fn with_embedded_salt(mut self) -> Self {
        self.embed = true;
        self
    }

    /// Builds the cipher for encrypting a value about to be persisted.
    ///
    /// The salt is resolved in the write direction, which may create and store
    /// a salt attribute on `record`. That must happen before the value is
    /// encrypted.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if salt resolution fails.
    pub fn for_write(options: &DigestOptions, record: &mut dyn Record) -> Result<Self, Error> {
        let salt = resolve(&options.salt, SaltContext::Write(record))?.unwrap_or_default();
        Ok(Self { algorithm: options.algorithm, salt, embed: options.embed_salt })
    }

    /// Rebuilds the cipher that produced a persisted `payload`.
    ///
    /// With embedding configured, a non-empty tail after the digest is the
    /// salt and takes precedence over the configured specification. Without a
    /// tail the instance does not embed and the salt is resolved in the read
    /// direction.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if salt resolution fails.
    pub fn for_read(
        options: &DigestOptions,
        record: &dyn Record,
        payload: &str,
    ) -> Result<Self, Error> {
        let embedded =
            if options.embed_salt { options.algorithm.embedded_salt(payload) } else { None };

        if let Some(salt) = embedded {
            return Ok(Self { algorithm: options.algorithm, salt: salt.to_string(), embed: true });
        }

        let salt = resolve(&options.salt, SaltContext::Read(record))?.unwrap_or_default();
        Ok(Self { algorithm: options.algorithm, salt, embed: false })
    }

    /// Returns the digest algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Returns the resolved salt.
    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Returns `true` if payloads carry the salt.
    #[must_use]
    pub const fn embeds_salt(&self) -> bool {
        self.embed
    }
}

impl Cipher for DigestCipher {
    fn mode(&self) -> CipherMode {
        CipherMode::Digest
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let mut input = Vec::with_capacity(plaintext.len() + self.salt.len());
        input.extend_from_slice(plaintext.as_bytes());
        input.extend_from_slice(self.salt.as_bytes());

        let mut payload = self.algorithm.hexdigest(&input);
        if self.embed {
            payload.push_str(&self.salt);
        }
        Ok(payload)
    }
}

impl fmt::Debug for DigestCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestCipher")
            .field("algorithm", &self.algorithm)
            .field("embed", &self.embed)
            .finish_non_exhaustive()
    }
}
