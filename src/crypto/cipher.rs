//! Secret ciphers protecting the keystore password at rest.
//!
//! The keystore password is stored in configuration in encrypted form. A
//! [`SecretCipher`] turns it into the usable password and back.

use crate::crypto::encryption::{open_with_password, seal_with_password};
use crate::crypto::password::Password;
use crate::error::{KeystoreError, Result};

/// Decrypts and encrypts secrets stored in configuration.
pub trait SecretCipher: Send + Sync {
    /// Turn a secret as stored at rest into its plaintext form.
    fn decrypt(&self, secret: &Password) -> Result<Password>;

    /// Turn a plaintext secret into the form stored at rest.
    fn encrypt(&self, plaintext: &Password) -> Result<Password>;
}

/// A cipher that stores secrets in clear.
///
/// Suitable when configuration storage is already protected by other means.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCipher;

impl SecretCipher for PassthroughCipher {
    fn decrypt(&self, secret: &Password) -> Result<Password> {
        Ok(secret.clone())
    }

    fn encrypt(&self, plaintext: &Password) -> Result<Password> {
        Ok(plaintext.clone())
    }
}

/// A cipher sealing secrets with AES-256-GCM under a master passphrase.
///
/// Sealed secrets are hex text so they can live in string-valued
/// configuration properties.
///
/// # Example
///
/// ```
/// use gatekeystore::crypto::cipher::{AesGcmSecretCipher, SecretCipher};
/// use gatekeystore::crypto::password::Password;
///
/// # fn example() -> gatekeystore::error::Result<()> {
/// let cipher = AesGcmSecretCipher::new(Password::from("master"));
/// let sealed = cipher.encrypt(&Password::from("changeit"))?;
/// assert_eq!(cipher.decrypt(&sealed)?.expose(), "changeit");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AesGcmSecretCipher {
    master: Password,
}

impl AesGcmSecretCipher {
    /// Create a cipher using the given master passphrase.
    pub fn new(master: Password) -> Self {
        Self { master }
    }
}

impl SecretCipher for AesGcmSecretCipher {
    fn decrypt(&self, secret: &Password) -> Result<Password> {
        let sealed = hex::decode(secret.expose()).map_err(|e| {
            KeystoreError::SecretDecryptionError(format!("Secret is not valid hex: {}", e))
        })?;

        let plaintext = open_with_password(&sealed, self.master.as_bytes())
            .map_err(|e| KeystoreError::SecretDecryptionError(e.to_string()))?;

        let text = std::str::from_utf8(&plaintext).map_err(|_| {
            KeystoreError::SecretDecryptionError("Decrypted secret is not UTF-8".to_string())
        })?;

        Ok(Password::from(text))
    }

    fn encrypt(&self, plaintext: &Password) -> Result<Password> {
        let sealed = seal_with_password(plaintext.as_bytes(), self.master.as_bytes())
            .map_err(|e| KeystoreError::SecretEncryptionError(e.to_string()))?;

        Ok(Password::new(hex::encode(sealed)))
    }
}
