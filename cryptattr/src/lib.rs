//! # `cryptattr`
//!
//! Encrypted attributes for record types: a plaintext attribute is encrypted
//! into a companion attribute before the record is persisted, and the stored
//! value can later be compared against a plaintext candidate.
//!
//! ## Features
//!
//! - Salted digests (MD5, SHA-1, SHA-2) with optional salt embedding
//! - Per-record salts read from, or generated into, another attribute
//! - Deterministic symmetric encryption (AES-SIV)
//! - Public-key encryption (X25519 sealed boxes)
//! - Declarations from a builder or from TOML
//!
//! ## Example
//!
//! ```
//! use cryptattr::prelude::*;
//!
//! let attributes = EncryptedAttributes::new()
//!     .with(EncryptedAttribute::builder("password").build()?)?;
//!
//! let mut record =
//!     MemoryRecord::new().with_transient_attributes(attributes.transient_attributes());
//! record.set_attribute("password", Some("secret".into()));
//! attributes.run_hook(Hook::BeforeValidation, &mut record)?;
//! record.commit();
//! attributes.after_commit(&mut record);
//!
//! let record = record.reload();
//! assert!(record.stored_attribute("password").is_none());
//! let value = attributes.read("password", &record)?.expect("stored value");
//! assert!(value.equals_plaintext("secret")?);
//! # Ok::<(), cryptattr::Error>(())
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute;
pub mod cipher;
pub mod config;
pub mod error;
pub mod key_source;
pub mod lifecycle;
pub mod record;
pub mod salt;
pub mod value;

pub use error::{Error, KeySourceError};

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::attribute::{CipherSpec, EncryptedAttribute, EncryptedAttributes, Hook};
    pub use crate::cipher::{
        AsymmetricCipher, Cipher, CipherMode, DigestAlgorithm, DigestCipher, DigestOptions,
        SymmetricCipher,
    };
    pub use crate::config::AttributesConfig;
    pub use crate::error::{Error, KeySourceError};
    pub use crate::key_source::KeySource;
    pub use crate::lifecycle::{AttributeState, WriteOutcome};
    pub use crate::record::{AttributeValue, MemoryRecord, Record};
    pub use crate::salt::SaltSpec;
    pub use crate::value::EncryptedValue;
}
