//! Password handling and derivation.
//!
//! This module provides the zeroizing [`Password`] type, random password
//! generation, and password-based key derivation using Argon2.

use crate::error::{KeystoreError, Result};
use argon2::Argon2;
use rand::RngCore;
use std::fmt;
use std::hash::{Hash, Hasher};
use zeroize::Zeroizing;

/// The length of the salt used for key derivation.
pub const SALT_LENGTH: usize = 32;

/// The length of the derived key.
pub const KEY_LENGTH: usize = 32;

/// Number of random bytes behind a generated password (160 bits).
pub const RANDOM_PASSWORD_BYTES: usize = 20;

/// A password held in memory that is wiped when dropped.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wrap a password string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Access the password text.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Access the password bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Hash for Password {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_str().hash(state);
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Generate a random salt for key derivation.
///
/// # Example
///
/// ```
/// use gatekeystore::crypto::password::{generate_salt, SALT_LENGTH};
///
/// let salt = generate_salt();
/// assert_eq!(salt.len(), SALT_LENGTH);
/// ```
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Generate a fresh random password from 160 bits of OS-seeded randomness.
///
/// The password is the hex encoding of the random bytes, so it is safe to
/// store in text configuration.
///
/// # Example
///
/// ```
/// use gatekeystore::crypto::password::generate_random_password;
///
/// let password = generate_random_password();
/// assert_eq!(password.expose().len(), 40);
/// ```
pub fn generate_random_password() -> Password {
    let mut bytes = Zeroizing::new([0u8; RANDOM_PASSWORD_BYTES]);
    rand::thread_rng().fill_bytes(&mut bytes[..]);
    Password::new(hex::encode(&bytes[..]))
}

/// Derive an encryption key from a password and salt using Argon2.
///
/// This function uses Argon2id with default parameters.
///
/// # Arguments
///
/// * `password` - The password to derive from
/// * `salt` - A random salt (must be SALT_LENGTH bytes)
pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    if salt.len() != SALT_LENGTH {
        return Err(KeystoreError::KeyDerivationError(format!(
            "Salt must be {} bytes, got {}",
            SALT_LENGTH,
            salt.len()
        )));
    }

    let mut output = Zeroizing::new([0u8; KEY_LENGTH]);
    let argon2 = Argon2::default();

    argon2
        .hash_password_into(password, salt, &mut output[..])
        .map_err(|e| KeystoreError::KeyDerivationError(format!("Argon2 error: {}", e)))?;

    Ok(output)
}
