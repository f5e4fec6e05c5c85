//! Host record collaborator.
//!
//! Attribute declarations never own persistence. They talk to the record that
//! holds the attribute through the [`Record`] trait: plain get/set accessors,
//! a raw read of the persisted slot, a dirty-state query and the salt
//! derivation hook. [`MemoryRecord`] is a complete in-memory implementation.

use crate::error::Error;
use crate::value::EncryptedValue;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Value held by a record attribute.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// Text set by a caller or loaded from storage.
    Plain(String),
    /// A transformed value, with or without an attached cipher.
    Encrypted(EncryptedValue),
}

impl AttributeValue {
    /// Returns the textual form: the plaintext, or the encrypted payload.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Encrypted(value) => value.payload(),
        }
    }

    /// Returns `true` for empty or whitespace-only text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }

    /// Returns `true` if this is an `EncryptedValue` with an attached cipher.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(value) if value.is_encrypted())
    }
}

impl From<&str> for AttributeValue {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(text: String) -> Self {
        Self::Plain(text)
    }
}

impl From<EncryptedValue> for AttributeValue {
    fn from(value: EncryptedValue) -> Self {
        Self::Encrypted(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record abstraction an encrypted attribute is attached to.
///
/// Hooks are driven by the host: it calls
/// [`EncryptedAttributes::run_hook`](crate::attribute::EncryptedAttributes::run_hook)
/// before committing and
/// [`EncryptedAttributes::after_commit`](crate::attribute::EncryptedAttributes::after_commit)
/// once the commit succeeded.
pub trait Record {
    /// Returns the current in-memory value of an attribute.
    fn attribute(&self, name: &str) -> Option<AttributeValue>;

    /// Replaces the in-memory value of an attribute. `None` clears it.
    fn set_attribute(&mut self, name: &str, value: Option<AttributeValue>);

    /// Returns `true` if the record declares an attribute with this name.
    fn has_attribute(&self, name: &str) -> bool;

    /// Reads the persisted slot, bypassing any in-memory decoration.
    fn stored_attribute(&self, name: &str) -> Option<String>;

    /// Returns `true` if the attribute was reassigned since the record was loaded.
    fn attribute_changed(&self, name: &str) -> bool;

    /// Returns `true` if the record has never been persisted.
    fn is_new_record(&self) -> bool;

    /// Derives a fresh salt for the salt attribute `name`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the record has no derivation for `name`.
    fn create_salt(&self, name: &str) -> Result<String, Error>;
}

type SaltCreator = Arc<dyn Fn(&MemoryRecord) -> String + Send + Sync>;

/// In-memory [`Record`] with change tracking.
///
/// # Example
///
/// ```
/// use cryptattr::record::{MemoryRecord, Record};
///
/// let mut record = MemoryRecord::new()
///     .with_salt_creator("salt", |r| format!("{}_salt", r.text("login").unwrap_or_default()));
/// record.set_attribute("login", Some("admin".into()));
/// assert_eq!(record.create_salt("salt").unwrap(), "admin_salt");
/// ```
#[derive(Clone, Default)]
pub struct MemoryRecord {
    stored: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    changed: HashSet<String>,
    declared: HashSet<String>,
    transient: HashSet<String>,
    salt_creators: HashMap<String, SaltCreator>,
    persisted: bool,
}

impl MemoryRecord {
    /// Creates a new, never-persisted record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record as if it had just been loaded from storage.
    #[must_use]
    pub fn loaded<I, K, V>(stored: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let stored: HashMap<String, String> =
            stored.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let values =
            stored.iter().map(|(k, v)| (k.clone(), AttributeValue::Plain(v.clone()))).collect();
        let declared = stored.keys().cloned().collect();

        Self { stored, values, declared, persisted: true, ..Self::default() }
    }

    /// Declares an attribute without giving it a value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.declared.insert(name.into());
        self
    }

    /// Marks an attribute as transient: it is never written to storage.
    ///
    /// Plaintext sources of encrypted attributes belong here, see
    /// [`EncryptedAttributes::transient_attributes`](crate::attribute::EncryptedAttributes::transient_attributes).
    #[must_use]
    pub fn with_transient_attribute(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.declared.insert(name.clone());
        self.transient.insert(name);
        self
    }

    /// Marks several attributes as transient.
    #[must_use]
    pub fn with_transient_attributes<I, N>(self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        names.into_iter().fold(self, Self::with_transient_attribute)
    }

    /// Registers the derivation used by [`Record::create_salt`] for `name`.
    #[must_use]
    pub fn with_salt_creator<F>(mut self, name: impl Into<String>, creator: F) -> Self
    where
        F: Fn(&Self) -> String + Send + Sync + 'static,
    {
        self.salt_creators.insert(name.into(), Arc::new(creator));
        self
    }

    /// Returns the textual form of an attribute's current value.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|v| v.as_str().to_string())
    }

    /// Persists every current value except transient ones and resets change
    /// tracking. Transient values stay in memory until cleared.
    pub fn commit(&mut self) {
        self.stored = self
            .values
            .iter()
            .filter(|(name, _)| !self.transient.contains(*name))
            .map(|(name, value)| (name.clone(), value.as_str().to_string()))
            .collect();
        self.changed.clear();
        self.persisted = true;
    }

    /// Returns a fresh record holding only what was persisted.
    #[must_use]
    pub fn reload(&self) -> Self {
        let mut record = Self::loaded(self.stored.clone());
        record.declared.extend(self.declared.iter().cloned());
        record.transient.clone_from(&self.transient);
        record.salt_creators.clone_from(&self.salt_creators);
        record
    }
}

impl Record for MemoryRecord {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.values.get(name).cloned()
    }

    fn set_attribute(&mut self, name: &str, value: Option<AttributeValue>) {
        match value {
            Some(value) => {
                self.values.insert(name.to_string(), value);
            }
            None => {
                self.values.remove(name);
            }
        }
        self.declared.insert(name.to_string());
        self.changed.insert(name.to_string());
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    fn stored_attribute(&self, name: &str) -> Option<String> {
        self.stored.get(name).cloned()
    }

    fn attribute_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    fn is_new_record(&self) -> bool {
        !self.persisted
    }

    fn create_salt(&self, name: &str) -> Result<String, Error> {
        let creator = self.salt_creators.get(name).ok_or_else(|| {
            Error::Configuration(format!("no salt derivation registered for `{name}`"))
        })?;
        Ok(creator(self))
    }
}

impl fmt::Debug for MemoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut changed: Vec<_> = self.changed.iter().collect();
        changed.sort();
        f.debug_struct("MemoryRecord")
            .field("attributes", &self.values.len())
            .field("changed", &changed)
            .field("persisted", &self.persisted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_record_is_clean() {
        let record = MemoryRecord::loaded([("login", "admin")]);

        assert!(!record.is_new_record());
        assert!(!record.attribute_changed("login"));
        assert_eq!(record.stored_attribute("login").as_deref(), Some("admin"));
        assert_eq!(record.text("login").as_deref(), Some("admin"));
    }

    #[test]
    fn test_set_attribute_marks_changed() {
        let mut record = MemoryRecord::loaded([("login", "admin")]);
        record.set_attribute("login", Some("root".into()));

        assert!(record.attribute_changed("login"));
        // Persisted slot is untouched until commit
        assert_eq!(record.stored_attribute("login").as_deref(), Some("admin"));
    }

    #[test]
    fn test_commit_persists_and_clears_changes() {
        let mut record = MemoryRecord::new();
        record.set_attribute("login", Some("admin".into()));
        assert!(record.is_new_record());

        record.commit();

        assert!(!record.is_new_record());
        assert!(!record.attribute_changed("login"));
        assert_eq!(record.stored_attribute("login").as_deref(), Some("admin"));
    }

    #[test]
    fn test_reload_drops_unsaved_values() {
        let mut record = MemoryRecord::loaded([("login", "admin")]).with_attribute("password");
        record.set_attribute("password", Some("secret".into()));

        let reloaded = record.reload();
        assert!(reloaded.attribute("password").is_none());
        assert!(reloaded.has_attribute("password"));
        assert_eq!(reloaded.text("login").as_deref(), Some("admin"));
    }

    #[test]
    fn test_commit_skips_transient_attributes() {
        let mut record = MemoryRecord::new().with_transient_attribute("password");
        record.set_attribute("password", Some("secret".into()));
        record.set_attribute("login", Some("admin".into()));

        record.commit();

        assert!(record.stored_attribute("password").is_none());
        assert_eq!(record.stored_attribute("login").as_deref(), Some("admin"));
        // Still readable until cleared
        assert_eq!(record.text("password").as_deref(), Some("secret"));

        let reloaded = record.reload();
        assert!(reloaded.attribute("password").is_none());
        assert!(reloaded.has_attribute("password"));
    }

    #[test]
    fn test_create_salt_without_creator_fails() {
        let record = MemoryRecord::new();
        let result = record.create_salt("salt");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_blank_values() {
        assert!(AttributeValue::from("").is_blank());
        assert!(AttributeValue::from("  ").is_blank());
        assert!(!AttributeValue::from("secret").is_blank());
    }
}
