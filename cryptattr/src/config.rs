//! Declarative attribute configuration loaded from TOML.
//!
//! ```toml
//! [[attribute]]
//! source = "password"
//! target = "crypted_password"
//! on = "before_save"
//!
//! [attribute.cipher]
//! mode = "digest"
//! algorithm = "sha256"
//! salt = { attribute = "salt" }
//! embed_salt = false
//!
//! [[attribute]]
//! source = "ssn"
//!
//! [attribute.cipher]
//! mode = "symmetric"
//! key = "source"
//! ```
//!
//! Callable salts and `if`/`unless` guards cannot be written in TOML; use
//! [`EncryptedAttribute::builder`] for those.

use crate::attribute::{EncryptedAttribute, EncryptedAttributes, Hook};
use crate::cipher::{AsymmetricCipher, DigestAlgorithm, DigestOptions, SymmetricCipher};
use crate::error::Error;
use crate::key_source::KeySource;
use crate::salt::SaltSpec;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributesConfig {
    /// Declared attributes.
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeConfig>,
}

/// One encrypted attribute declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeConfig {
    /// Plaintext attribute name.
    pub source: String,
    /// Attribute holding the encrypted value; defaults to `crypted_<source>`.
    #[serde(default)]
    pub target: Option<String>,
    /// Hook the write transition runs from.
    #[serde(default)]
    pub on: Hook,
    /// Cipher options; defaults to a SHA-1 digest with the default salt.
    #[serde(default)]
    pub cipher: CipherConfig,
}

/// Mode-specific cipher options.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum CipherConfig {
    /// One-way digest.
    Digest {
        /// Digest algorithm.
        #[serde(default)]
        algorithm: DigestAlgorithm,
        /// Salt specification.
        #[serde(default)]
        salt: Option<SaltConfig>,
        /// Append the salt to the payload.
        #[serde(default)]
        embed_salt: bool,
    },
    /// AES-256-SIV.
    Symmetric {
        /// Key material.
        key: SymmetricKeyConfig,
    },
    /// X25519 sealed boxes.
    Asymmetric {
        /// Key material.
        key: AsymmetricKeyConfig,
    },
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self::Digest { algorithm: DigestAlgorithm::default(), salt: None, embed_salt: false }
    }
}

/// Salt specification as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaltConfig {
    /// `salt = "none"`: unsalted digest.
    None,
    /// `salt = { literal = "…" }`
    Literal(String),
    /// `salt = { attribute = "…" }`
    Attribute(String),
}

impl From<SaltConfig> for SaltSpec {
    fn from(config: SaltConfig) -> Self {
        match config {
            SaltConfig::None => Self::Absent,
            SaltConfig::Literal(value) => Self::Literal(value),
            SaltConfig::Attribute(name) => Self::AttributeRef(name),
        }
    }
}

/// Symmetric key material.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetricKeyConfig {
    /// Use the key source's symmetric key.
    Source,
    /// Derive the key from a password.
    Password(String),
    /// Raw 64-byte key, hex-encoded.
    Hex(String),
}

/// Asymmetric key material.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsymmetricKeyConfig {
    /// Use the key source's keypair.
    Source,
    /// Inline hex-encoded keys.
    Hex {
        /// Public key.
        public: String,
        /// Secret key; without it values can be written but not compared.
        #[serde(default)]
        secret: Option<String>,
    },
}

impl AttributesConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the document is invalid.
    pub fn from_toml_str(document: &str) -> Result<Self, Error> {
        toml::from_str(document)
            .map_err(|e| Error::Configuration(format!("invalid attribute configuration: {e}")))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&document)
    }

    /// Builds the declarations.
    ///
    /// # Arguments
    ///
    /// * `keys` - Key source for attributes configured with `key = "source"`
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for invalid key material or a missing
    /// key source, and `Error::AmbiguousAttributeName` for colliding names.
    pub fn build(&self, keys: Option<&dyn KeySource>) -> Result<EncryptedAttributes, Error> {
        let mut attributes = EncryptedAttributes::new();
        for attribute in &self.attributes {
            attributes.push(attribute.build(keys)?)?;
        }
        Ok(attributes)
    }
}

impl AttributeConfig {
    /// Builds one declaration.
    ///
    /// # Errors
    ///
    /// See [`AttributesConfig::build`].
    pub fn build(&self, keys: Option<&dyn KeySource>) -> Result<EncryptedAttribute, Error> {
        let mut builder = EncryptedAttribute::builder(&self.source).on(self.on);
        if let Some(target) = &self.target {
            builder = builder.to(target);
        }

        builder = match &self.cipher {
            CipherConfig::Digest { algorithm, salt, embed_salt } => {
                let mut options = DigestOptions::new(*algorithm);
                if let Some(salt) = salt {
                    options = options.with_salt(salt.clone().into());
                }
                if *embed_salt {
                    options = options.embed_salt();
                }
                builder.digest(options)
            }
            CipherConfig::Symmetric { key } => builder.symmetric(match key {
                SymmetricKeyConfig::Source => SymmetricCipher::from_source(require(keys)?)?,
                SymmetricKeyConfig::Password(password) => SymmetricCipher::from_password(password)?,
                SymmetricKeyConfig::Hex(key) => SymmetricCipher::from_hex(key)?,
            }),
            CipherConfig::Asymmetric { key } => builder.asymmetric(match key {
                AsymmetricKeyConfig::Source => AsymmetricCipher::from_source(require(keys)?)?,
                AsymmetricKeyConfig::Hex { public, secret } => {
                    AsymmetricCipher::from_hex(public, secret.as_deref())?
                }
            }),
        };

        builder.build()
    }
}

fn require(keys: Option<&dyn KeySource>) -> Result<&dyn KeySource, Error> {
    keys.ok_or_else(|| Error::Configuration("key = \"source\" requires a key source".to_string()))
}
