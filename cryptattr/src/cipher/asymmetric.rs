//! Public-key encryption for attributes.
//!
//! Uses X25519 key exchange + XSalsa20-Poly1305. Every value is sealed with a
//! fresh ephemeral keypair against the recipient's public key, so encryption
//! needs only the public key while reading the value back needs the secret key.
//!
//! Payload format (standard base64):
//! ```text
//! [ephemeral_public_key:32][nonce:24][ciphertext+tag:N]
//! ```

use super::{Cipher, CipherMode};
use crate::error::Error;
use crate::key_source::KeySource;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use secrecy::ExposeSecret;
use std::fmt;
use zeroize::Zeroizing;

const PUBLIC_KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;

/// Raw X25519 keypair bytes.
pub struct KeyPair {
    /// Secret key bytes.
    pub secret: Zeroizing<[u8; 32]>,
    /// Public key bytes.
    pub public: [u8; 32],
}

/// Generates a new X25519 keypair.
#[must_use]
pub fn generate_keypair() -> KeyPair {
    let secret = SecretKey::generate(&mut OsRng);
    let public = *secret.public_key().as_bytes();
    KeyPair { secret: Zeroizing::new(secret.to_bytes()), public }
}

/// Reversible cipher sealing values to an X25519 public key.
pub struct AsymmetricCipher {
    public: PublicKey,
    secret: Option<SecretKey>,
}

impl AsymmetricCipher {
    /// Creates an encrypt-only cipher.
    #[must_use]
    pub fn new(public_key: [u8; 32]) -> Self {
        Self { public: PublicKey::from(public_key), secret: None }
    }

    /// Creates a cipher able to encrypt and decrypt. The public key is derived
    /// from the secret key.
    #[must_use]
    pub fn with_secret(secret_key: [u8; 32]) -> Self {
        let secret = SecretKey::from(secret_key);
        Self { public: secret.public_key(), secret: Some(secret) }
    }

    /// Creates a cipher from hex-encoded keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a key is not 32 bytes of hex, or if
    /// the public key does not belong to the secret key.
    pub fn from_hex(public_key: &str, secret_key: Option<&str>) -> Result<Self, Error> {
        let public = parse_key(public_key, "public")?;
        match secret_key {
            Some(secret_key) => {
                let cipher = Self::with_secret(*parse_key(secret_key, "secret")?);
                if cipher.public.as_bytes() != &*public {
                    return Err(Error::Configuration(
                        "asymmetric public key does not match secret key".to_string(),
                    ));
                }
                Ok(cipher)
            }
            None => Ok(Self::new(*public)),
        }
    }

    /// Creates a cipher from a key source, with decryption when the source
    /// holds a secret key.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeySource` if the public key is unavailable, or
    /// `Error::Configuration` if the secret key is malformed.
    pub fn from_source(source: &dyn KeySource) -> Result<Self, Error> {
        let public = source.public_key()?;
        match source.secret_key()? {
            Some(secret) => {
                let bytes: [u8; 32] = secret.expose_secret().as_slice().try_into().map_err(|_| {
                    Error::Configuration("asymmetric secret key must be 32 bytes".to_string())
                })?;
                let cipher = Self::with_secret(bytes);
                if cipher.public.as_bytes() != &public {
                    return Err(Error::Configuration(
                        "asymmetric public key does not match secret key".to_string(),
                    ));
                }
                Ok(cipher)
            }
            None => Ok(Self::new(public)),
        }
    }

    /// Returns the public key bytes.
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    fn secret(&self) -> Result<&SecretKey, Error> {
        self.secret.as_ref().ok_or_else(|| {
            Error::Configuration("asymmetric cipher has no secret key configured".to_string())
        })
    }
}

fn parse_key(key: &str, kind: &str) -> Result<Zeroizing<[u8; 32]>, Error> {
    let bytes = Zeroizing::new(
        hex::decode(key.trim())
            .map_err(|e| Error::Configuration(format!("{kind} key is not hex: {e}")))?,
    );
    let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        Error::Configuration(format!("{kind} key must be 32 bytes, got {}", bytes.len()))
    })?;
    Ok(Zeroizing::new(array))
}

impl Cipher for AsymmetricCipher {
    fn mode(&self) -> CipherMode {
        CipherMode::Asymmetric
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let ephemeral = SecretKey::generate(&mut OsRng);
        let salsa_box = SalsaBox::new(&self.public, &ephemeral);
        let nonce = SalsaBox::generate_nonce(&mut OsRng);

        let ciphertext = salsa_box
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::EncryptionFailed(format!("sealed box encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(PUBLIC_KEY_SIZE + NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(ephemeral.public_key().as_bytes());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, payload: &str) -> Result<String, Error> {
        let secret = self.secret()?;
        let sealed = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::DecryptionFailed(format!("payload is not base64: {e}")))?;

        if sealed.len() < PUBLIC_KEY_SIZE + NONCE_SIZE {
            return Err(Error::DecryptionFailed("sealed payload too short".to_string()));
        }
        let (ephemeral, rest) = sealed.split_at(PUBLIC_KEY_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

        let ephemeral: [u8; PUBLIC_KEY_SIZE] = ephemeral
            .try_into()
            .map_err(|_| Error::DecryptionFailed("invalid ephemeral key".to_string()))?;
        let salsa_box = SalsaBox::new(&PublicKey::from(ephemeral), secret);

        let plaintext = Zeroizing::new(
            salsa_box
                .decrypt(crypto_box::Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| Error::AuthenticationFailed)?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| Error::DecryptionFailed("plaintext is not UTF-8".to_string()))
    }

    fn is_reversible(&self) -> bool {
        self.secret.is_some()
    }

    /// Sealing is randomized, so a candidate can only be checked by opening
    /// the payload.
    fn matches(&self, payload: &str, candidate: &str) -> Result<bool, Error> {
        Ok(self.decrypt(payload)? == candidate)
    }
}

impl fmt::Debug for AsymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsymmetricCipher")
            .field("public", &hex::encode(self.public.as_bytes()))
            .field("can_decrypt", &self.secret.is_some())
            .finish()
    }
}
