//! Salt specifications and their resolution against a record.
//!
//! Writing and reading resolve an attribute-backed salt differently: a write
//! derives a fresh salt and stores it on the record, a read only looks up what
//! was stored. Keeping the two apart is what stops a loaded record from
//! deriving a different salt than the one its payload was produced with.

use crate::error::Error;
use crate::record::{AttributeValue, Record};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Salt used when a declaration does not configure one.
pub const DEFAULT_SALT: &str = "salt";

/// Callable salt derivation.
pub type SaltFn = Arc<dyn Fn(&dyn Record) -> Option<String> + Send + Sync>;

/// How the salt for a digest is obtained.
#[derive(Clone)]
pub enum SaltSpec {
    /// No salt.
    Absent,
    /// A fixed salt value.
    Literal(String),
    /// A record attribute holding the salt, created through
    /// [`Record::create_salt`] on write.
    AttributeRef(String),
    /// A callable invoked with the record in both directions.
    Derived(SaltFn),
}

impl SaltSpec {
    /// Creates a literal salt.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a salt stored in the record attribute `name`.
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::AttributeRef(name.into())
    }

    /// Creates a salt computed from the record.
    #[must_use]
    pub fn derived<F>(derive: F) -> Self
    where
        F: Fn(&dyn Record) -> Option<String> + Send + Sync + 'static,
    {
        Self::Derived(Arc::new(derive))
    }
}

impl Default for SaltSpec {
    fn default() -> Self {
        Self::Literal(DEFAULT_SALT.to_string())
    }
}

impl fmt::Debug for SaltSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            // Salt values stay out of debug output
            Self::Literal(_) => f.write_str("Literal(..)"),
            Self::AttributeRef(name) => f.debug_tuple("AttributeRef").field(name).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Direction of a salt resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Encrypting a value about to be persisted.
    Write,
    /// Reconstructing a cipher for a persisted value.
    Read,
}

/// Record handle for a resolution. Only the write direction may mutate.
pub enum SaltContext<'a> {
    /// Resolve for a write; attribute-backed salts are created and stored.
    Write(&'a mut dyn Record),
    /// Resolve for a read; nothing is derived or stored.
    Read(&'a dyn Record),
}

impl SaltContext<'_> {
    /// Returns the resolution direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self {
            Self::Write(_) => Direction::Write,
            Self::Read(_) => Direction::Read,
        }
    }

    fn record(&self) -> &dyn Record {
        match self {
            Self::Write(record) => &**record,
            Self::Read(record) => *record,
        }
    }
}

/// Resolves a salt specification against a record.
///
/// # Returns
///
/// `None` when no salt is used. A derived salt that yields nothing resolves
/// to an empty string.
///
/// # Errors
///
/// Returns `Error::Configuration` if an attribute-backed salt has no
/// derivation on the record.
///
/// # Example
///
/// ```
/// use cryptattr::record::{MemoryRecord, Record};
/// use cryptattr::salt::{resolve, SaltContext, SaltSpec};
///
/// let mut record = MemoryRecord::new().with_salt_creator("salt", |_| "fresh".to_string());
/// let spec = SaltSpec::attribute("salt");
///
/// let salt = resolve(&spec, SaltContext::Write(&mut record)).unwrap();
/// assert_eq!(salt.as_deref(), Some("fresh"));
/// assert_eq!(record.text("salt").as_deref(), Some("fresh"));
/// ```
pub fn resolve(spec: &SaltSpec, context: SaltContext<'_>) -> Result<Option<String>, Error> {
    trace!(spec = ?spec, direction = ?context.direction(), "resolving salt");

    match spec {
        SaltSpec::Absent => Ok(None),
        SaltSpec::Literal(value) => Ok(Some(value.clone())),
        SaltSpec::AttributeRef(name) => match context {
            SaltContext::Write(record) => {
                let salt = record.create_salt(name)?;
                record.set_attribute(name, Some(AttributeValue::Plain(salt.clone())));
                Ok(Some(salt))
            }
            SaltContext::Read(record) => {
                Ok(record.attribute(name).map(|value| value.as_str().to_string()))
            }
        },
        SaltSpec::Derived(derive) => Ok(Some(derive(context.record()).unwrap_or_default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MemoryRecord;

    fn user() -> MemoryRecord {
        MemoryRecord::loaded([("login", "admin")]).with_salt_creator("salt", |record| {
            format!("{}_salt", record.text("login").unwrap_or_default())
        })
    }

    #[test]
    fn test_absent_resolves_to_none() {
        let mut record = user();
        assert_eq!(resolve(&SaltSpec::Absent, SaltContext::Write(&mut record)).unwrap(), None);
        assert_eq!(resolve(&SaltSpec::Absent, SaltContext::Read(&record)).unwrap(), None);
    }

    #[test]
    fn test_literal_is_unchanged_in_both_directions() {
        let mut record = user();
        let spec = SaltSpec::literal("custom_salt");

        let write = resolve(&spec, SaltContext::Write(&mut record)).unwrap();
        let read = resolve(&spec, SaltContext::Read(&record)).unwrap();

        assert_eq!(write.as_deref(), Some("custom_salt"));
        assert_eq!(read, write);
        assert!(!record.attribute_changed("salt"));
    }

    #[test]
    fn test_attribute_ref_write_creates_and_stores() {
        let mut record = user();
        let spec = SaltSpec::attribute("salt");

        let salt = resolve(&spec, SaltContext::Write(&mut record)).unwrap();

        assert_eq!(salt.as_deref(), Some("admin_salt"));
        assert_eq!(record.text("salt").as_deref(), Some("admin_salt"));
        assert!(record.attribute_changed("salt"));
    }

    #[test]
    fn test_attribute_ref_read_does_not_derive() {
        let record = MemoryRecord::loaded([("login", "root"), ("salt", "admin_salt")])
            .with_salt_creator("salt", |_| "different".to_string());
        let spec = SaltSpec::attribute("salt");

        let salt = resolve(&spec, SaltContext::Read(&record)).unwrap();

        assert_eq!(salt.as_deref(), Some("admin_salt"));
        assert!(!record.attribute_changed("salt"));
    }

    #[test]
    fn test_attribute_ref_read_missing_value() {
        let record = user();
        let salt = resolve(&SaltSpec::attribute("salt"), SaltContext::Read(&record)).unwrap();
        assert_eq!(salt, None);
    }

    #[test]
    fn test_attribute_ref_write_without_creator_fails() {
        let mut record = MemoryRecord::new();
        let result = resolve(&SaltSpec::attribute("salt"), SaltContext::Write(&mut record));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_derived_uses_record() {
        let mut record = user();
        let spec = SaltSpec::derived(|record| record.attribute("login").map(|v| v.to_string()));

        let write = resolve(&spec, SaltContext::Write(&mut record)).unwrap();
        let read = resolve(&spec, SaltContext::Read(&record)).unwrap();

        assert_eq!(write.as_deref(), Some("admin"));
        assert_eq!(read.as_deref(), Some("admin"));
    }

    #[test]
    fn test_derived_nothing_is_empty_string() {
        let mut record = user();
        let spec = SaltSpec::derived(|_| None);

        let salt = resolve(&spec, SaltContext::Write(&mut record)).unwrap();
        assert_eq!(salt.as_deref(), Some(""));
    }

    #[test]
    fn test_default_is_literal_salt() {
        assert!(matches!(SaltSpec::default(), SaltSpec::Literal(ref s) if s == DEFAULT_SALT));
    }

    #[test]
    fn test_debug_hides_literal() {
        let debug = format!("{:?}", SaltSpec::literal("secret_salt"));
        assert!(!debug.contains("secret_salt"));
    }
}
