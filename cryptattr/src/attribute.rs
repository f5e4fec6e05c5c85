//! Encrypted attribute declarations.
//!
//! A record type declares which attributes are encrypted, with which cipher
//! and on which hook, through [`EncryptedAttribute::builder`] and groups the
//! results in an [`EncryptedAttributes`] table. Declarations are immutable
//! once built and may be shared between records.

use crate::cipher::{AsymmetricCipher, CipherMode, DigestOptions, SymmetricCipher};
use crate::error::Error;
use crate::record::Record;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Record predicate used by `if`/`unless` guards.
pub type Predicate = Arc<dyn Fn(&dyn Record) -> bool + Send + Sync>;

/// Hook point the write transition runs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    /// Before the record is validated (default).
    #[default]
    BeforeValidation,
    /// Before every save.
    BeforeSave,
    /// Before the first save of a new record.
    BeforeCreate,
}

/// Guard evaluated against the record before encrypting.
#[derive(Clone)]
pub enum Condition {
    /// Encrypt only when the predicate holds.
    If(Predicate),
    /// Encrypt only when the predicate does not hold.
    Unless(Predicate),
}

impl Condition {
    /// Evaluates the guard.
    #[must_use]
    pub fn holds(&self, record: &dyn Record) -> bool {
        match self {
            Self::If(predicate) => predicate(record),
            Self::Unless(predicate) => !predicate(record),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::If(_) => "If(..)",
            Self::Unless(_) => "Unless(..)",
        })
    }
}

/// Cipher configuration of a declaration.
#[derive(Debug, Clone)]
pub enum CipherSpec {
    /// Digest, rebuilt per record because its salt depends on the record.
    Digest(DigestOptions),
    /// Symmetric cipher shared by every record.
    Symmetric(Arc<SymmetricCipher>),
    /// Asymmetric cipher shared by every record.
    Asymmetric(Arc<AsymmetricCipher>),
}

impl CipherSpec {
    /// Returns the encryption mode.
    #[must_use]
    pub const fn mode(&self) -> CipherMode {
        match self {
            Self::Digest(_) => CipherMode::Digest,
            Self::Symmetric(_) => CipherMode::Symmetric,
            Self::Asymmetric(_) => CipherMode::Asymmetric,
        }
    }
}

impl Default for CipherSpec {
    fn default() -> Self {
        Self::Digest(DigestOptions::default())
    }
}

/// An attribute whose value is stored encrypted in another attribute.
#[derive(Debug, Clone)]
pub struct EncryptedAttribute {
    pub(crate) source: String,
    pub(crate) target: String,
    pub(crate) cipher: CipherSpec,
    pub(crate) hook: Hook,
    pub(crate) conditions: Vec<Condition>,
}

impl EncryptedAttribute {
    /// Starts a declaration for the plaintext attribute `source`.
    ///
    /// # Example
    ///
    /// ```
    /// use cryptattr::attribute::{EncryptedAttribute, Hook};
    /// use cryptattr::cipher::{DigestAlgorithm, DigestOptions};
    /// use cryptattr::salt::SaltSpec;
    ///
    /// let password = EncryptedAttribute::builder("password")
    ///     .digest(DigestOptions::new(DigestAlgorithm::Sha1).with_salt(SaltSpec::attribute("salt")))
    ///     .on(Hook::BeforeSave)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(password.target(), "crypted_password");
    /// ```
    #[must_use]
    pub fn builder(source: impl Into<String>) -> EncryptedAttributeBuilder {
        EncryptedAttributeBuilder::new(source)
    }

    /// Returns the plaintext attribute name.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the attribute name holding the encrypted value.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the cipher configuration.
    #[must_use]
    pub const fn cipher(&self) -> &CipherSpec {
        &self.cipher
    }

    /// Returns the hook the write transition runs from.
    #[must_use]
    pub const fn hook(&self) -> Hook {
        self.hook
    }

    /// Returns `true` if every guard passes for `record`.
    #[must_use]
    pub fn conditions_hold(&self, record: &dyn Record) -> bool {
        self.conditions.iter().all(|condition| condition.holds(record))
    }
}

/// Builder for [`EncryptedAttribute`].
#[derive(Debug)]
pub struct EncryptedAttributeBuilder {
    source: String,
    target: Option<String>,
    cipher: CipherSpec,
    hook: Hook,
    conditions: Vec<Condition>,
}

impl EncryptedAttributeBuilder {
    fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
            cipher: CipherSpec::default(),
            hook: Hook::default(),
            conditions: Vec::new(),
        }
    }

    /// Stores the encrypted value in `target` instead of `crypted_<source>`.
    #[must_use]
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Uses a digest cipher.
    #[must_use]
    pub fn digest(mut self, options: DigestOptions) -> Self {
        self.cipher = CipherSpec::Digest(options);
        self
    }

    /// Uses a symmetric cipher.
    #[must_use]
    pub fn symmetric(mut self, cipher: SymmetricCipher) -> Self {
        self.cipher = CipherSpec::Symmetric(Arc::new(cipher));
        self
    }

    /// Uses an asymmetric cipher.
    #[must_use]
    pub fn asymmetric(mut self, cipher: AsymmetricCipher) -> Self {
        self.cipher = CipherSpec::Asymmetric(Arc::new(cipher));
        self
    }

    /// Sets the cipher configuration directly.
    #[must_use]
    pub fn cipher(mut self, cipher: CipherSpec) -> Self {
        self.cipher = cipher;
        self
    }

    /// Runs the write transition from `hook`.
    #[must_use]
    pub const fn on(mut self, hook: Hook) -> Self {
        self.hook = hook;
        self
    }

    /// Encrypts only when `predicate` holds.
    #[must_use]
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(Condition::If(Arc::new(predicate)));
        self
    }

    /// Skips encryption when `predicate` holds.
    #[must_use]
    pub fn unless<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(Condition::Unless(Arc::new(predicate)));
        self
    }

    /// Finishes the declaration.
    ///
    /// # Errors
    ///
    /// Returns `Error::AmbiguousAttributeName` if the source and target names
    /// are the same, and `Error::Configuration` if either is empty.
    pub fn build(self) -> Result<EncryptedAttribute, Error> {
        if self.source.is_empty() {
            return Err(Error::Configuration("attribute name is empty".to_string()));
        }
        let target = self.target.unwrap_or_else(|| format!("crypted_{}", self.source));
        if target.is_empty() {
            return Err(Error::Configuration("target attribute name is empty".to_string()));
        }
        if target == self.source {
            return Err(Error::AmbiguousAttributeName { name: target });
        }

        Ok(EncryptedAttribute {
            source: self.source,
            target,
            cipher: self.cipher,
            hook: self.hook,
            conditions: self.conditions,
        })
    }
}

/// The encrypted attributes of one record type.
///
/// # Example
///
/// ```
/// use cryptattr::attribute::{EncryptedAttribute, EncryptedAttributes, Hook};
/// use cryptattr::record::{MemoryRecord, Record};
///
/// let attributes = EncryptedAttributes::new()
///     .with(EncryptedAttribute::builder("password").build().unwrap())
///     .unwrap();
///
/// let mut user = MemoryRecord::new();
/// user.set_attribute("password", Some("secret".into()));
/// attributes.run_hook(Hook::BeforeValidation, &mut user).unwrap();
///
/// let crypted = attributes.read("password", &user).unwrap().unwrap();
/// assert!(crypted.equals_plaintext("secret").unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EncryptedAttributes {
    attributes: Vec<EncryptedAttribute>,
}

impl EncryptedAttributes {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration.
    ///
    /// # Errors
    ///
    /// Returns `Error::AmbiguousAttributeName` if the new declaration shares a
    /// name with an existing one in a way that would make two declarations
    /// write the same attribute.
    pub fn with(mut self, attribute: EncryptedAttribute) -> Result<Self, Error> {
        self.push(attribute)?;
        Ok(self)
    }

    /// Adds a declaration in place.
    ///
    /// # Errors
    ///
    /// See [`EncryptedAttributes::with`].
    pub fn push(&mut self, attribute: EncryptedAttribute) -> Result<(), Error> {
        let mut names: HashSet<&str> = HashSet::new();
        for existing in &self.attributes {
            names.insert(&existing.source);
            names.insert(&existing.target);
        }
        for name in [&attribute.source, &attribute.target] {
            if names.contains(name.as_str()) {
                return Err(Error::AmbiguousAttributeName { name: name.clone() });
            }
        }

        self.attributes.push(attribute);
        Ok(())
    }

    /// Returns the declaration for the plaintext attribute `source`.
    #[must_use]
    pub fn get(&self, source: &str) -> Option<&EncryptedAttribute> {
        self.attributes.iter().find(|attribute| attribute.source == source)
    }

    /// Iterates over the declarations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EncryptedAttribute> {
        self.attributes.iter()
    }

    /// Returns the number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Names that only ever hold plaintext: every source attribute and its
    /// `<source>_confirmation`. Hosts must not persist them.
    #[must_use]
    pub fn transient_attributes(&self) -> Vec<String> {
        self.attributes
            .iter()
            .flat_map(|attribute| {
                [attribute.source.clone(), format!("{}_confirmation", attribute.source)]
            })
            .collect()
    }
}
