//! Write and read transitions of encrypted attributes.
//!
//! ```text
//!            write hook (non-blank, not yet encrypted)
//!   Plain ─────────────────────────────────────────────▶ Stored
//!     ▲                                                     │ read, slot unchanged
//!     │ read, slot reassigned since load                    ▼
//!     └───────────────────────────────────────────────  Decorated
//! ```
//!
//! Blank values and values that already carry a cipher leave the target
//! untouched, so running the write transition twice never double-encrypts.

use crate::attribute::{CipherSpec, EncryptedAttribute, EncryptedAttributes, Hook};
use crate::cipher::{Cipher, DigestCipher};
use crate::error::Error;
use crate::record::{AttributeValue, Record};
use crate::value::EncryptedValue;
use std::sync::Arc;
use tracing::debug;

/// Observable state of an encrypted attribute on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeState {
    /// Neither a plaintext nor an encrypted value is present.
    Blank,
    /// A plaintext is waiting to be encrypted, or the target holds a value
    /// reassigned since load.
    Plain,
    /// The target holds a persisted payload without a cipher.
    Stored,
    /// The target holds a payload with its cipher attached.
    Decorated,
}

/// Why a write transition did not encrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The hook is not the one the attribute is declared on.
    OtherHook,
    /// `BeforeCreate` on a record that was already persisted.
    NotNewRecord,
    /// An `if`/`unless` guard failed.
    ConditionFailed,
    /// The source attribute is absent or blank.
    Blank,
}

/// Result of a write transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The source was encrypted into the target.
    Encrypted,
    /// The source already carried a cipher and was copied as is.
    AlreadyEncrypted,
    /// Nothing happened.
    Skipped(SkipReason),
}

impl EncryptedAttribute {
    /// Runs the write transition if `hook` is the declared hook.
    ///
    /// # Errors
    ///
    /// Propagates cipher construction and encryption errors. Nothing is
    /// written to the record when an error is returned, except a salt
    /// attribute created before encryption failed.
    pub fn run_hook(&self, hook: Hook, record: &mut dyn Record) -> Result<WriteOutcome, Error> {
        if hook != self.hook {
            return Ok(WriteOutcome::Skipped(SkipReason::OtherHook));
        }
        if hook == Hook::BeforeCreate && !record.is_new_record() {
            return Ok(WriteOutcome::Skipped(SkipReason::NotNewRecord));
        }
        self.encrypt_source(record)
    }

    /// Encrypts the source attribute into the target attribute.
    ///
    /// # Errors
    ///
    /// Propagates cipher construction and encryption errors.
    pub fn encrypt_source(&self, record: &mut dyn Record) -> Result<WriteOutcome, Error> {
        if !self.conditions_hold(record) {
            debug!(attribute = %self.source, "condition failed, not encrypting");
            return Ok(WriteOutcome::Skipped(SkipReason::ConditionFailed));
        }

        let value = match record.attribute(&self.source) {
            Some(value) if !value.is_blank() => value,
            _ => {
                debug!(attribute = %self.source, "blank value, not encrypting");
                return Ok(WriteOutcome::Skipped(SkipReason::Blank));
            }
        };

        let (encrypted, outcome) = match value {
            AttributeValue::Encrypted(value) if value.is_encrypted() => {
                debug!(attribute = %self.source, "value already encrypted");
                (value, WriteOutcome::AlreadyEncrypted)
            }
            other => {
                let cipher = self.cipher_for_write(record)?;
                let encrypted = EncryptedValue::encrypt(other.as_str(), cipher)?;
                debug!(
                    attribute = %self.source,
                    target = %self.target,
                    mode = %self.cipher.mode(),
                    "encrypted attribute"
                );
                (encrypted, WriteOutcome::Encrypted)
            }
        };

        record.set_attribute(&self.target, Some(AttributeValue::Encrypted(encrypted)));
        Ok(outcome)
    }

    /// Reads the target attribute as an encrypted value.
    ///
    /// A persisted payload that has not been reassigned since load gets the
    /// cipher that produced it attached, so it can be compared with
    /// plaintext. A reassigned value is returned without a cipher: it is
    /// pending plaintext, not ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the read-side salt cannot be resolved.
    pub fn read(&self, record: &dyn Record) -> Result<Option<EncryptedValue>, Error> {
        let value = match record.attribute(&self.target) {
            None => return Ok(None),
            Some(AttributeValue::Encrypted(value)) if value.is_encrypted() => return Ok(Some(value)),
            Some(value) => value,
        };

        if record.attribute_changed(&self.target) {
            debug!(attribute = %self.target, "value changed since load, not attaching cipher");
            return Ok(Some(EncryptedValue::new(value.as_str())));
        }

        let payload = record.stored_attribute(&self.target).unwrap_or_else(|| value.to_string());
        let cipher = self.cipher_for_read(record, &payload)?;
        let mut decorated = EncryptedValue::new(payload);
        decorated.attach_cipher(cipher)?;

        debug!(attribute = %self.target, mode = %self.cipher.mode(), "attached cipher to stored value");
        Ok(Some(decorated))
    }

    /// Clears transient plaintext once the record has been committed.
    ///
    /// The source attribute and its `<source>_confirmation` counterpart, when
    /// the record has one, are set to absent.
    pub fn after_commit(&self, record: &mut dyn Record) {
        record.set_attribute(&self.source, None);

        let confirmation = format!("{}_confirmation", self.source);
        if record.has_attribute(&confirmation) {
            record.set_attribute(&confirmation, None);
        }
        debug!(attribute = %self.source, "cleared plaintext after commit");
    }

    /// Returns the current state of the attribute on `record`.
    #[must_use]
    pub fn state(&self, record: &dyn Record) -> AttributeState {
        if let Some(target) = record.attribute(&self.target) {
            if target.is_encrypted() {
                return AttributeState::Decorated;
            }
            if !record.attribute_changed(&self.target) {
                return AttributeState::Stored;
            }
            return AttributeState::Plain;
        }

        match record.attribute(&self.source) {
            Some(value) if !value.is_blank() => AttributeState::Plain,
            _ => AttributeState::Blank,
        }
    }

    fn cipher_for_write(&self, record: &mut dyn Record) -> Result<Arc<dyn Cipher>, Error> {
        Ok(match &self.cipher {
            CipherSpec::Digest(options) => {
                Arc::new(DigestCipher::for_write(options, record)?) as Arc<dyn Cipher>
            }
            CipherSpec::Symmetric(cipher) => Arc::clone(cipher) as Arc<dyn Cipher>,
            CipherSpec::Asymmetric(cipher) => Arc::clone(cipher) as Arc<dyn Cipher>,
        })
    }

    fn cipher_for_read(&self, record: &dyn Record, payload: &str) -> Result<Arc<dyn Cipher>, Error> {
        Ok(match &self.cipher {
            CipherSpec::Digest(options) => {
                Arc::new(DigestCipher::for_read(options, record, payload)?) as Arc<dyn Cipher>
            }
            CipherSpec::Symmetric(cipher) => Arc::clone(cipher) as Arc<dyn Cipher>,
            CipherSpec::Asymmetric(cipher) => Arc::clone(cipher) as Arc<dyn Cipher>,
        })
    }
}

impl EncryptedAttributes {
    /// Runs the write transition of every attribute declared on `hook`.
    ///
    /// Stops at the first error; attributes processed before it keep their
    /// new values and the caller is expected to abort the save.
    ///
    /// # Errors
    ///
    /// Propagates the first cipher error.
    pub fn run_hook(&self, hook: Hook, record: &mut dyn Record) -> Result<Vec<WriteOutcome>, Error> {
        let mut outcomes = Vec::with_capacity(self.len());
        for attribute in self.iter() {
            outcomes.push(attribute.run_hook(hook, record)?);
        }
        Ok(outcomes)
    }

    /// Reads the encrypted value declared for the plaintext attribute `source`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if `source` is not declared, or the
    /// error of [`EncryptedAttribute::read`].
    pub fn read(&self, source: &str, record: &dyn Record) -> Result<Option<EncryptedValue>, Error> {
        self.get(source)
            .ok_or_else(|| Error::Configuration(format!("`{source}` is not an encrypted attribute")))?
            .read(record)
    }

    /// Clears transient plaintext of every attribute after a commit.
    pub fn after_commit(&self, record: &mut dyn Record) {
        for attribute in self.iter() {
            attribute.after_commit(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{CipherMode, DigestAlgorithm, DigestOptions, SymmetricCipher};
    use crate::record::MemoryRecord;
    use crate::salt::SaltSpec;

    const SECRET: &str = "8152bc582f58c854f580cb101d3182813dec4afe";
    const SHHH: &str = "162cf5debf84cbc2af13da848544c3e2c515b4d3";
    const SECRET_ADMIN: &str = "a55d037f385cad22efe7862e07b805938d150154";

    fn password() -> EncryptedAttribute {
        EncryptedAttribute::builder("password").build().unwrap()
    }

    fn user(password: &str) -> MemoryRecord {
        let mut record = MemoryRecord::new();
        record.set_attribute("login", Some("admin".into()));
        record.set_attribute("password", Some(password.into()));
        record
    }

    fn target_payload(record: &MemoryRecord) -> Option<String> {
        record.text("crypted_password")
    }

    #[test]
    fn test_encrypts_with_default_digest() {
        let attribute = password();
        let mut record = user("secret");

        let outcome = attribute.encrypt_source(&mut record).unwrap();

        assert_eq!(outcome, WriteOutcome::Encrypted);
        assert_eq!(target_payload(&record).as_deref(), Some(SECRET));
        assert_eq!(attribute.state(&record), AttributeState::Decorated);
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let attribute = password();

        for blank in ["", "   "] {
            let mut record = user(blank);
            let outcome = attribute.encrypt_source(&mut record).unwrap();
            assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::Blank));
            assert!(record.attribute("crypted_password").is_none());
        }

        let mut record = MemoryRecord::new();
        let outcome = attribute.encrypt_source(&mut record).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::Blank));
        assert_eq!(attribute.state(&record), AttributeState::Blank);
    }

    #[test]
    fn test_blank_skip_does_not_construct_cipher() {
        // An attribute-backed salt without a derivation would fail if a cipher were built
        let attribute = EncryptedAttribute::builder("password")
            .digest(DigestOptions::default().with_salt(SaltSpec::attribute("salt")))
            .build()
            .unwrap();
        let mut record = user("");

        let outcome = attribute.encrypt_source(&mut record).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::Blank));
        assert!(record.attribute("salt").is_none());
    }

    #[test]
    fn test_write_is_idempotent() {
        let attribute = password();
        let mut record = user("secret");

        attribute.encrypt_source(&mut record).unwrap();
        let first = target_payload(&record);
        attribute.encrypt_source(&mut record).unwrap();

        assert_eq!(target_payload(&record), first);
    }

    #[test]
    fn test_already_encrypted_source_is_not_re_encrypted() {
        let attribute = password();
        let cipher = Arc::new(DigestCipher::new(DigestAlgorithm::Sha1, "salt"));
        let value = EncryptedValue::encrypt("secret", cipher).unwrap();

        let mut record = MemoryRecord::new();
        record.set_attribute("password", Some(value.into()));

        let outcome = attribute.encrypt_source(&mut record).unwrap();

        assert_eq!(outcome, WriteOutcome::AlreadyEncrypted);
        assert_eq!(target_payload(&record).as_deref(), Some(SECRET));
    }

    #[test]
    fn test_undecorated_encrypted_source_is_encrypted() {
        let attribute = password();
        let mut record = MemoryRecord::new();
        record.set_attribute("password", Some(EncryptedValue::new("secret").into()));

        let outcome = attribute.encrypt_source(&mut record).unwrap();

        assert_eq!(outcome, WriteOutcome::Encrypted);
        assert_eq!(target_payload(&record).as_deref(), Some(SECRET));
    }

    #[test]
    fn test_hook_selection() {
        let attribute =
            EncryptedAttribute::builder("password").on(Hook::BeforeCreate).build().unwrap();
        let mut record = user("secret");

        let outcome = attribute.run_hook(Hook::BeforeValidation, &mut record).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::OtherHook));
        assert!(record.attribute("crypted_password").is_none());

        let outcome = attribute.run_hook(Hook::BeforeCreate, &mut record).unwrap();
        assert_eq!(outcome, WriteOutcome::Encrypted);
    }

    #[test]
    fn test_before_create_skips_persisted_records() {
        let attribute =
            EncryptedAttribute::builder("password").on(Hook::BeforeCreate).build().unwrap();
        let mut record = MemoryRecord::loaded([("login", "admin")]);
        record.set_attribute("password", Some("secret".into()));

        let outcome = attribute.run_hook(Hook::BeforeCreate, &mut record).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::NotNewRecord));
    }

    #[test]
    fn test_failed_condition_leaves_attribute_untouched() {
        let attribute = EncryptedAttribute::builder("password").when(|_| false).build().unwrap();
        let mut record = user("secret");

        let outcome = attribute.encrypt_source(&mut record).unwrap();

        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::ConditionFailed));
        assert_eq!(record.text("password").as_deref(), Some("secret"));
        assert!(record.attribute("crypted_password").is_none());
    }

    #[test]
    fn test_read_attaches_cipher_to_stored_value() {
        let attribute = password();
        let record = MemoryRecord::loaded([("login", "admin"), ("crypted_password", SECRET)]);
        assert_eq!(attribute.state(&record), AttributeState::Stored);

        let value = attribute.read(&record).unwrap().unwrap();

        assert!(value.is_encrypted());
        assert_eq!(value.payload(), SECRET);
        assert!(value.equals_plaintext("secret").unwrap());
        assert!(!value.equals_plaintext("shhh").unwrap());
    }

    #[test]
    fn test_read_embedded_salt() {
        let attribute = EncryptedAttribute::builder("password")
            .digest(
                DigestOptions::default()
                    .with_salt(SaltSpec::derived(|r| r.attribute("login").map(|v| v.to_string())))
                    .embed_salt(),
            )
            .build()
            .unwrap();
        let payload = format!("{SECRET_ADMIN}admin");
        // Login changed since the value was written: the embedded salt still wins
        let record = MemoryRecord::loaded([("login", "root"), ("crypted_password", payload.as_str())]);

        let value = attribute.read(&record).unwrap().unwrap();
        assert!(value.equals_plaintext("secret").unwrap());
    }

    #[test]
    fn test_read_skips_reassigned_value() {
        let attribute = password();
        let mut record = MemoryRecord::loaded([("crypted_password", SECRET)]);
        record.set_attribute("crypted_password", Some("shhh".into()));

        let value = attribute.read(&record).unwrap().unwrap();

        assert!(!value.is_encrypted());
        assert_eq!(value.payload(), "shhh");
        assert!(!value.equals_plaintext("secret").unwrap());
        assert_eq!(attribute.state(&record), AttributeState::Plain);
    }

    #[test]
    fn test_read_missing_target() {
        let attribute = password();
        let record = MemoryRecord::new();
        assert!(attribute.read(&record).unwrap().is_none());
    }

    #[test]
    fn test_read_returns_written_value() {
        let attribute = password();
        let mut record = user("shhh");
        attribute.encrypt_source(&mut record).unwrap();

        let value = attribute.read(&record).unwrap().unwrap();

        assert_eq!(value.payload(), SHHH);
        assert!(value.equals_plaintext("shhh").unwrap());
    }

    #[test]
    fn test_symmetric_round_trip_through_record() {
        let attribute = EncryptedAttribute::builder("password")
            .symmetric(SymmetricCipher::from_password("key").unwrap())
            .build()
            .unwrap();
        let mut record = user("secret");
        attribute.encrypt_source(&mut record).unwrap();
        record.commit();

        let loaded = record.reload();
        let value = attribute.read(&loaded).unwrap().unwrap();

        assert_eq!(value.cipher().map(|c| c.mode()), Some(CipherMode::Symmetric));
        assert_eq!(value.decrypt().unwrap(), "secret");
    }

    #[test]
    fn test_after_commit_clears_plaintext_and_confirmation() {
        let attribute = password();
        let mut record = user("secret").with_attribute("password_confirmation");
        record.set_attribute("password_confirmation", Some("secret".into()));
        attribute.encrypt_source(&mut record).unwrap();

        attribute.after_commit(&mut record);

        assert!(record.attribute("password").is_none());
        assert!(record.attribute("password_confirmation").is_none());
        assert_eq!(target_payload(&record).as_deref(), Some(SECRET));
    }

    #[test]
    fn test_after_commit_without_confirmation() {
        let attribute = password();
        let mut record = user("secret");

        attribute.after_commit(&mut record);

        assert!(record.attribute("password").is_none());
        assert!(!record.has_attribute("password_confirmation"));
    }

    #[test]
    fn test_table_run_hook_and_read() {
        let table = EncryptedAttributes::new()
            .with(password())
            .unwrap()
            .with(EncryptedAttribute::builder("pin").on(Hook::BeforeSave).build().unwrap())
            .unwrap();
        let mut record = user("secret");
        record.set_attribute("pin", Some("1234".into()));

        let outcomes = table.run_hook(Hook::BeforeValidation, &mut record).unwrap();
        assert_eq!(
            outcomes,
            vec![WriteOutcome::Encrypted, WriteOutcome::Skipped(SkipReason::OtherHook)]
        );
        assert!(record.attribute("crypted_pin").is_none());

        table.run_hook(Hook::BeforeSave, &mut record).unwrap();
        let pin = table.read("pin", &record).unwrap().unwrap();
        assert!(pin.equals_plaintext("1234").unwrap());

        assert!(matches!(table.read("login", &record), Err(Error::Configuration(_))));
    }
}
