//! Keystore options resolved from configuration properties.

use crate::config::value::{ConfigValue, Properties};
use crate::crypto::password::Password;
use crate::error::{KeystoreError, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub const KEY_SERVICE_PID: &str = "kura.service.pid";
pub const KEY_KEYSTORE_PATH: &str = "keystore.path";
pub const KEY_KEYSTORE_PASSWORD: &str = "keystore.password";
pub const KEY_RANDOMIZE_PASSWORD: &str = "randomize.password";

pub const DEFAULT_KEYSTORE_PATH: &str = "/tmp";
pub const DEFAULT_KEYSTORE_PASSWORD: &str = "changeit";
pub const DEFAULT_RANDOMIZE_PASSWORD: bool = false;

/// Validated, immutable keystore options.
///
/// Equality and hashing cover the service id, path, password and the
/// randomize flag, so comparing two options tells whether the service must
/// be reloaded. The raw properties are kept for writing back a regenerated
/// password and take no part in equality.
#[derive(Clone)]
pub struct KeystoreOptions {
    properties: Properties,
    service_id: Option<String>,
    storage_path: PathBuf,
    store_password: Password,
    randomize_password: bool,
}

impl KeystoreOptions {
    /// Resolve options from a possibly absent property map.
    ///
    /// # Example
    ///
    /// ```
    /// use gatekeystore::config::options::KeystoreOptions;
    /// use gatekeystore::config::value::Properties;
    ///
    /// assert!(KeystoreOptions::resolve(None).is_err());
    ///
    /// let options = KeystoreOptions::resolve(Some(&Properties::new())).unwrap();
    /// assert_eq!(options.storage_path().to_str(), Some("/tmp"));
    /// ```
    pub fn resolve(properties: Option<&Properties>) -> Result<Self> {
        let properties = properties.ok_or_else(|| {
            KeystoreError::InvalidConfiguration("Input parameters cannot be null!".to_string())
        })?;
        Self::new(properties)
    }

    /// Resolve options from a property map, applying defaults.
    pub fn new(properties: &Properties) -> Result<Self> {
        let service_id = properties
            .get(KEY_SERVICE_PID)
            .map(|value| value.as_str(KEY_SERVICE_PID).map(str::to_string))
            .transpose()?;

        let storage_path = match properties.get(KEY_KEYSTORE_PATH) {
            Some(value) => value.as_str(KEY_KEYSTORE_PATH)?,
            None => DEFAULT_KEYSTORE_PATH,
        };
        if storage_path.trim().is_empty() {
            return Err(KeystoreError::InvalidConfiguration(format!(
                "Property '{}' cannot be empty",
                KEY_KEYSTORE_PATH
            )));
        }

        let store_password = match properties.get(KEY_KEYSTORE_PASSWORD) {
            Some(value) => Password::from(value.as_str(KEY_KEYSTORE_PASSWORD)?),
            None => Password::from(DEFAULT_KEYSTORE_PASSWORD),
        };

        let randomize_password = match properties.get(KEY_RANDOMIZE_PASSWORD) {
            Some(value) => value.as_bool(KEY_RANDOMIZE_PASSWORD)?,
            None => DEFAULT_RANDOMIZE_PASSWORD,
        };

        // The password lives only in `store_password`, which is wiped on drop.
        let mut properties = properties.clone();
        properties.remove(KEY_KEYSTORE_PASSWORD);

        Ok(Self {
            properties,
            service_id,
            storage_path: PathBuf::from(storage_path),
            store_password,
            randomize_password,
        })
    }

    /// The configured properties, without the keystore password.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// The keystore password as stored in configuration (still encrypted).
    pub fn store_password(&self) -> &Password {
        &self.store_password
    }

    pub fn needs_random_password(&self) -> bool {
        self.randomize_password
    }

    /// Properties to write back after the password was regenerated.
    ///
    /// The new sealed password replaces the configured one and randomization
    /// is switched off so the next activation keeps it.
    pub fn with_regenerated_password(&self, sealed_password: &Password) -> Properties {
        let mut properties = self.properties.clone();
        properties.insert(
            KEY_KEYSTORE_PASSWORD.to_string(),
            ConfigValue::from(sealed_password.expose()),
        );
        properties.insert(
            KEY_RANDOMIZE_PASSWORD.to_string(),
            ConfigValue::Bool(false),
        );
        properties
    }
}

impl fmt::Debug for KeystoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreOptions")
            .field("service_id", &self.service_id)
            .field("storage_path", &self.storage_path)
            .field("store_password", &self.store_password)
            .field("randomize_password", &self.randomize_password)
            .finish_non_exhaustive()
    }
}

impl PartialEq for KeystoreOptions {
    fn eq(&self, other: &Self) -> bool {
        self.service_id == other.service_id
            && self.storage_path == other.storage_path
            && self.store_password == other.store_password
            && self.randomize_password == other.randomize_password
    }
}

impl Eq for KeystoreOptions {}

impl Hash for KeystoreOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service_id.hash(state);
        self.storage_path.hash(state);
        self.store_password.hash(state);
        self.randomize_password.hash(state);
    }
}
