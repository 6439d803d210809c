//! Password-based sealing using AES-GCM.
//!
//! This module seals arbitrary secrets (private keys, whole containers,
//! passwords at rest) using Argon2 for key derivation and AES-256-GCM for
//! authenticated encryption.

use crate::crypto::password::{derive_key, generate_salt, SALT_LENGTH};
use crate::error::{KeystoreError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use zeroize::Zeroizing;

/// The length of the nonce used for AES-GCM encryption.
pub const NONCE_LENGTH: usize = 12;

/// Seal a secret with a password.
///
/// The sealed output format is:
/// [salt (32 bytes)][nonce (12 bytes)][ciphertext (variable)]
///
/// # Example
///
/// ```
/// use gatekeystore::crypto::encryption::{open_with_password, seal_with_password};
///
/// let secret = b"this is a secret key";
///
/// let sealed = seal_with_password(secret, b"secure-password").unwrap();
/// let opened = open_with_password(&sealed, b"secure-password").unwrap();
///
/// assert_eq!(secret.as_slice(), opened.as_slice());
/// ```
pub fn seal_with_password(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>> {
    let salt = generate_salt();
    let derived_key = derive_key(password, &salt)?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&derived_key[..])
        .map_err(|e| KeystoreError::EncryptionError(format!("Invalid key length: {}", e)))?;
    let ciphertext = cipher
        .encrypt(&nonce_bytes.into(), plaintext)
        .map_err(|e| KeystoreError::EncryptionError(format!("Encryption failed: {}", e)))?;

    let mut output = Vec::with_capacity(SALT_LENGTH + NONCE_LENGTH + ciphertext.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);

    Ok(output)
}

/// Open a blob produced by [`seal_with_password`].
///
/// A wrong password or tampered data fails with
/// [`KeystoreError::InvalidPasswordError`]; GCM cannot tell the two apart.
pub fn open_with_password(sealed: &[u8], password: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let min_length = SALT_LENGTH + NONCE_LENGTH;
    if sealed.len() < min_length {
        return Err(KeystoreError::EncryptionError(format!(
            "Sealed data too short: expected at least {} bytes, got {}",
            min_length,
            sealed.len()
        )));
    }

    let salt = &sealed[0..SALT_LENGTH];
    let nonce_bytes = &sealed[SALT_LENGTH..SALT_LENGTH + NONCE_LENGTH];
    let ciphertext = &sealed[SALT_LENGTH + NONCE_LENGTH..];

    let derived_key = derive_key(password, salt)?;

    let cipher = Aes256Gcm::new_from_slice(&derived_key[..])
        .map_err(|e| KeystoreError::EncryptionError(format!("Invalid key length: {}", e)))?;

    let plaintext = cipher
        .decrypt(nonce_bytes.into(), ciphertext)
        .map_err(|_| KeystoreError::InvalidPasswordError)?;

    Ok(Zeroizing::new(plaintext))
}
