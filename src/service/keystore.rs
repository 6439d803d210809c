//! The keystore entry service.
//!
//! [`KeystoreService`] owns one keystore container, keeps it in sync with the
//! file it was loaded from, and hands out entries and TLS key managers.

use crate::cert::generate::{generate_csr, generate_key_pair, KeyAlgorithm};
use crate::config::options::KeystoreOptions;
use crate::config::store::ConfigurationStore;
use crate::config::value::Properties;
use crate::crypto::cipher::SecretCipher;
use crate::crypto::password::{generate_random_password, Password};
use crate::error::{KeystoreError, Result};
use crate::storage::backend::KeyStoreBackend;
use crate::storage::container::{Container, StoredEntry};
use crate::storage::entry::{Entry, PrivateKeyEntry};
use crate::tls::key_manager::{create_key_managers, KeyManager};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

const NULL_ALIAS: &str = "Key Pair alias cannot be null!";
const NULL_ENTRY: &str = "Input entry cannot be null!";
const NULL_ALGORITHM: &str = "Algorithm cannot be null!";

enum ServiceState {
    Uninitialized,
    Loaded(LoadedStore),
    Closed,
}

struct LoadedStore {
    options: KeystoreOptions,
    container: Container,
}

/// Manages the entries of one persistent keystore.
///
/// The service starts uninitialized, becomes usable after [`activate`], and
/// stops serving requests after [`close`]. All methods take `&self`; the
/// service can be shared between threads behind an `Arc`.
///
/// Mutations are written through to the backend before they return. If the
/// write fails the in-memory change is undone and
/// [`KeystoreError::StorePersistError`] is returned.
///
/// [`activate`]: KeystoreService::activate
/// [`close`]: KeystoreService::close
///
/// # Example
///
/// ```rust,no_run
/// use gatekeystore::config::options::{KEY_KEYSTORE_PASSWORD, KEY_KEYSTORE_PATH};
/// use gatekeystore::config::store::MemoryConfigurationStore;
/// use gatekeystore::config::value::{ConfigValue, Properties};
/// use gatekeystore::crypto::cipher::PassthroughCipher;
/// use gatekeystore::storage::backend::FileBackend;
/// use gatekeystore::KeystoreService;
/// use std::sync::Arc;
///
/// # fn example() -> gatekeystore::Result<()> {
/// let service = KeystoreService::new(
///     Arc::new(FileBackend::new()),
///     Arc::new(PassthroughCipher),
///     Arc::new(MemoryConfigurationStore::new()),
/// );
///
/// let mut properties = Properties::new();
/// properties.insert(KEY_KEYSTORE_PATH.to_string(), ConfigValue::from("/var/lib/gateway/keystore.ks"));
/// properties.insert(KEY_KEYSTORE_PASSWORD.to_string(), ConfigValue::from("changeit"));
///
/// service.activate(&properties)?;
/// println!("aliases: {:?}", service.get_aliases()?);
/// # Ok(())
/// # }
/// ```
pub struct KeystoreService {
    backend: Arc<dyn KeyStoreBackend>,
    cipher: Arc<dyn SecretCipher>,
    config_store: Arc<dyn ConfigurationStore>,
    state: RwLock<ServiceState>,
}

impl KeystoreService {
    /// Create an uninitialized service.
    pub fn new(
        backend: Arc<dyn KeyStoreBackend>,
        cipher: Arc<dyn SecretCipher>,
        config_store: Arc<dyn ConfigurationStore>,
    ) -> Self {
        Self {
            backend,
            cipher,
            config_store,
            state: RwLock::new(ServiceState::Uninitialized),
        }
    }

    /// Whether the service is activated and not yet closed.
    pub fn is_active(&self) -> bool {
        matches!(*self.read_state(), ServiceState::Loaded(_))
    }

    /// Load the keystore described by `properties` and start serving it.
    ///
    /// A missing container file is created empty. When `randomize.password`
    /// is set, the container is re-protected under a freshly generated
    /// password whose encrypted form is written back to configuration.
    ///
    /// On an already active service this behaves as [`reconfigure`]. On a
    /// closed service it fails with [`KeystoreError::NotInitialized`]. On
    /// failure the service remains uninitialized.
    ///
    /// [`reconfigure`]: KeystoreService::reconfigure
    pub fn activate<'a>(&self, properties: impl Into<Option<&'a Properties>>) -> Result<()> {
        let options = KeystoreOptions::resolve(properties.into())?;
        let mut state = self.write_state();

        if matches!(*state, ServiceState::Closed) {
            return Err(KeystoreError::NotInitialized);
        }
        if matches!(*state, ServiceState::Loaded(_)) {
            return self.reconfigure_locked(&mut *state, options);
        }

        let loaded = self.load_store(options)?;
        *state = ServiceState::Loaded(loaded);
        Ok(())
    }

    /// Apply new configuration to an active service.
    ///
    /// Unchanged options are a no-op. A new path opens (or creates) the
    /// container there; a new password re-protects the current container.
    /// Any failure leaves the previous state in place.
    pub fn reconfigure<'a>(&self, properties: impl Into<Option<&'a Properties>>) -> Result<()> {
        let options = KeystoreOptions::resolve(properties.into())?;
        let mut state = self.write_state();
        self.reconfigure_locked(&mut *state, options)
    }

    /// Stop serving the keystore and drop everything held in memory.
    pub fn close(&self) {
        let mut state = self.write_state();
        if matches!(*state, ServiceState::Loaded(_)) {
            info!("keystore service closed");
        }
        *state = ServiceState::Closed;
    }

    /// A snapshot of the container.
    pub fn get_store(&self) -> Result<Container> {
        let state = self.read_state();
        Ok(loaded(&state)?.container.clone())
    }

    /// The entry stored under `alias`.
    ///
    /// `None` is rejected; an empty or unknown alias yields `Ok(None)`.
    pub fn get_entry<'a>(&self, alias: impl Into<Option<&'a str>>) -> Result<Option<Entry>> {
        let alias = require(alias.into(), NULL_ALIAS)?;
        let state = self.read_state();
        let store = loaded(&state)?;

        if alias.is_empty() {
            return Ok(None);
        }

        let password = self.unseal_password(&store.options)?;
        store.container.get_entry(alias, &password)
    }

    /// All entries keyed by alias.
    pub fn get_entries(&self) -> Result<BTreeMap<String, Entry>> {
        let state = self.read_state();
        let store = loaded(&state)?;
        let password = self.unseal_password(&store.options)?;

        let mut entries = BTreeMap::new();
        for alias in store.container.aliases() {
            if let Some(entry) = store.container.get_entry(&alias, &password)? {
                entries.insert(alias, entry);
            }
        }
        Ok(entries)
    }

    /// Store `entry` under `alias`, replacing any existing entry.
    pub fn set_entry<'a>(
        &self,
        alias: impl Into<Option<&'a str>>,
        entry: impl Into<Option<Entry>>,
    ) -> Result<()> {
        let alias = require(alias.into(), NULL_ALIAS)?;
        if alias.is_empty() {
            return Err(KeystoreError::InvalidArgument(
                "Key Pair alias cannot be empty!".to_string(),
            ));
        }
        let entry = entry
            .into()
            .ok_or_else(|| KeystoreError::InvalidArgument(NULL_ENTRY.to_string()))?;

        let mut state = self.write_state();
        let store = loaded_mut(&mut state)?;
        self.store_entry(store, alias, &entry)
    }

    /// Remove the entry under `alias`.
    ///
    /// Deleting an empty or unknown alias succeeds without touching storage.
    pub fn delete_entry<'a>(&self, alias: impl Into<Option<&'a str>>) -> Result<()> {
        let alias = require(alias.into(), NULL_ALIAS)?;
        let mut state = self.write_state();
        let store = loaded_mut(&mut state)?;

        if !store.container.contains_alias(alias) {
            debug!(alias = %alias, "no entry to delete");
            return Ok(());
        }

        let password = self.unseal_password(&store.options)?;
        let previous = store.container.delete_entry(alias);
        self.persist(store, &password, alias, previous)?;

        info!(alias = %alias, "entry deleted");
        Ok(())
    }

    /// All aliases, in container order.
    pub fn get_aliases(&self) -> Result<Vec<String>> {
        let state = self.read_state();
        Ok(loaded(&state)?.container.aliases())
    }

    /// Key managers over the private key entries.
    ///
    /// An empty algorithm selects the default (`PKIX`).
    pub fn get_key_managers<'a>(
        &self,
        algorithm: impl Into<Option<&'a str>>,
    ) -> Result<Vec<Arc<KeyManager>>> {
        let algorithm = require(algorithm.into(), NULL_ALGORITHM)?;
        let state = self.read_state();
        let store = loaded(&state)?;
        let password = self.unseal_password(&store.options)?;

        create_key_managers(&store.container, &password, algorithm)
    }

    /// Generate a key pair with a self-signed certificate and store it.
    ///
    /// Returns the generated entry. Persistence follows [`set_entry`].
    ///
    /// [`set_entry`]: KeystoreService::set_entry
    pub fn create_key_pair(
        &self,
        alias: &str,
        algorithm: KeyAlgorithm,
        subject: &str,
        validity_days: u32,
    ) -> Result<PrivateKeyEntry> {
        if alias.is_empty() {
            return Err(KeystoreError::InvalidArgument(
                "Key Pair alias cannot be empty!".to_string(),
            ));
        }

        let mut state = self.write_state();
        let store = loaded_mut(&mut state)?;

        let generated = generate_key_pair(algorithm, subject, validity_days)?;
        self.store_entry(store, alias, &Entry::from(generated.clone()))?;

        Ok(generated)
    }

    /// A PEM signing request for the private key stored under `alias`.
    pub fn get_csr(&self, alias: &str, subject: &str) -> Result<String> {
        match self.get_entry(alias)? {
            Some(Entry::PrivateKey(key_entry)) => generate_csr(&key_entry, subject),
            Some(Entry::TrustedCertificate(_)) => Err(KeystoreError::InvalidArgument(format!(
                "Entry '{}' is not a private key entry",
                alias
            ))),
            None => Err(KeystoreError::InvalidArgument(format!(
                "No entry under alias '{}'",
                alias
            ))),
        }
    }

    fn load_store(&self, options: KeystoreOptions) -> Result<LoadedStore> {
        let password = self.unseal_password(&options)?;
        let container = self.open_container(&options, &password)?;
        let loaded = self.finish_load(options, container, password)?;

        info!(
            path = %loaded.options.storage_path().display(),
            entries = loaded.container.len(),
            "keystore service activated"
        );
        Ok(loaded)
    }

    fn reconfigure_locked(&self, state: &mut ServiceState, options: KeystoreOptions) -> Result<()> {
        let current = loaded(state)?;
        if current.options == options {
            debug!("keystore configuration unchanged");
            return Ok(());
        }

        let password = self.unseal_password(&options)?;
        // Set once the current file has been rewritten under `password`.
        let mut reprotected_from = None;

        let container = if current.options.storage_path() != options.storage_path() {
            info!(
                from = %current.options.storage_path().display(),
                to = %options.storage_path().display(),
                "keystore path changed"
            );
            self.open_container(&options, &password)?
        } else if current.options.store_password() != options.store_password() {
            let old_password = self.unseal_password(&current.options)?;
            if old_password == password {
                current.container.clone()
            } else {
                info!("keystore password changed; re-protecting entries");
                let reprotected =
                    self.reprotect(&current.container, &options, &old_password, &password)?;
                reprotected_from = Some(old_password);
                reprotected
            }
        } else {
            current.container.clone()
        };

        match self.finish_load(options, container, password) {
            Ok(loaded) => {
                *state = ServiceState::Loaded(loaded);
                Ok(())
            }
            Err(e) => match reprotected_from {
                Some(old_password) => Err(self.restore_container(
                    &current.container,
                    current.options.storage_path(),
                    &old_password,
                    e,
                )),
                None => Err(e),
            },
        }
    }

    /// Apply password randomization if configured.
    fn finish_load(
        &self,
        options: KeystoreOptions,
        container: Container,
        password: Password,
    ) -> Result<LoadedStore> {
        if !options.needs_random_password() {
            return Ok(LoadedStore { options, container });
        }

        let new_password = generate_random_password();
        let sealed = self
            .cipher
            .encrypt(&new_password)
            .map_err(|e| classify(e, KeystoreError::SecretEncryptionError))?;

        let reprotected = self.reprotect(&container, &options, &password, &new_password)?;

        let properties = options.with_regenerated_password(&sealed);
        if let Err(e) = self
            .config_store
            .update_configuration(options.service_id(), &properties)
        {
            warn!(error = %e, "failed to save regenerated password; restoring keystore");
            return Err(self.restore_container(
                &container,
                options.storage_path(),
                &password,
                classify(e, KeystoreError::ConfigurationStoreError),
            ));
        }

        info!(
            path = %options.storage_path().display(),
            "keystore password randomized"
        );
        Ok(LoadedStore {
            options: KeystoreOptions::new(&properties)?,
            container: reprotected,
        })
    }

    /// Write `container` back under `password` after `cause` aborted a change.
    ///
    /// Returns `cause`, or a [`KeystoreError::StorePersistError`] carrying
    /// both failures if the file could not be restored.
    fn restore_container(
        &self,
        container: &Container,
        path: &Path,
        password: &Password,
        cause: KeystoreError,
    ) -> KeystoreError {
        match self.backend.store(container, path, password) {
            Ok(()) => cause,
            Err(restore) => {
                warn!(error = %restore, "failed to restore keystore under previous password");
                KeystoreError::StorePersistError(format!(
                    "{}; restoring the keystore under its previous password failed: {}",
                    cause, restore
                ))
            }
        }
    }

    /// Re-protect a copy of `container` and write it under `new`.
    fn reprotect(
        &self,
        container: &Container,
        options: &KeystoreOptions,
        old: &Password,
        new: &Password,
    ) -> Result<Container> {
        let mut reprotected = container.clone();
        reprotected
            .reprotect(old, new)
            .map_err(|e| classify(e, KeystoreError::StorePersistError))?;
        self.backend
            .store(&reprotected, options.storage_path(), new)
            .map_err(|e| classify(e, KeystoreError::StorePersistError))?;
        Ok(reprotected)
    }

    /// Load the configured container, creating an empty one if it is missing.
    fn open_container(&self, options: &KeystoreOptions, password: &Password) -> Result<Container> {
        let path = options.storage_path();

        if self.backend.exists(path) {
            return self
                .backend
                .load(path, password)
                .map_err(|e| classify(e, KeystoreError::StoreLoadError));
        }

        info!(path = %path.display(), "creating empty keystore");
        let container = Container::new();
        self.backend
            .store(&container, path, password)
            .map_err(|e| classify(e, KeystoreError::StoreLoadError))?;
        Ok(container)
    }

    fn store_entry(&self, store: &mut LoadedStore, alias: &str, entry: &Entry) -> Result<()> {
        let password = self.unseal_password(&store.options)?;
        let previous = store.container.set_entry(alias, entry, &password)?;
        self.persist(store, &password, alias, previous)?;

        info!(alias = %alias, private_key = entry.is_private_key(), "entry stored");
        Ok(())
    }

    /// Write the container, undoing the change to `alias` if that fails.
    fn persist(
        &self,
        store: &mut LoadedStore,
        password: &Password,
        alias: &str,
        previous: Option<StoredEntry>,
    ) -> Result<()> {
        if let Err(e) = self
            .backend
            .store(&store.container, store.options.storage_path(), password)
        {
            warn!(alias = %alias, error = %e, "failed to persist keystore; change rolled back");
            store.container.restore(alias, previous);
            return Err(classify(e, KeystoreError::StorePersistError));
        }
        Ok(())
    }

    fn unseal_password(&self, options: &KeystoreOptions) -> Result<Password> {
        self.cipher
            .decrypt(options.store_password())
            .map_err(|e| classify(e, KeystoreError::SecretDecryptionError))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ServiceState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for KeystoreService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.read_state() {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Loaded(_) => "loaded",
            ServiceState::Closed => "closed",
        };
        f.debug_struct("KeystoreService")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

fn loaded(state: &ServiceState) -> Result<&LoadedStore> {
    match state {
        ServiceState::Loaded(store) => Ok(store),
        _ => Err(KeystoreError::NotInitialized),
    }
}

fn loaded_mut(state: &mut ServiceState) -> Result<&mut LoadedStore> {
    match state {
        ServiceState::Loaded(store) => Ok(store),
        _ => Err(KeystoreError::NotInitialized),
    }
}

fn require<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str> {
    value.ok_or_else(|| KeystoreError::InvalidArgument(message.to_string()))
}

/// Wrap `error` in the service-level variant built by `wrap`.
///
/// Errors that already are that variant pass through unchanged.
fn classify(error: KeystoreError, wrap: fn(String) -> KeystoreError) -> KeystoreError {
    let wrapped = wrap(String::new());
    if std::mem::discriminant(&error) == std::mem::discriminant(&wrapped) {
        error
    } else {
        wrap(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options::{
        KEY_KEYSTORE_PASSWORD, KEY_KEYSTORE_PATH, KEY_RANDOMIZE_PASSWORD, KEY_SERVICE_PID,
    };
    use crate::config::store::MemoryConfigurationStore;
    use crate::config::value::ConfigValue;
    use crate::crypto::cipher::{AesGcmSecretCipher, PassthroughCipher};
    use crate::storage::backend::FileBackend;
    use crate::storage::entry::TrustedCertificateEntry;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// File backend whose writes and reads can be made to fail.
    #[derive(Default)]
    struct FlakyBackend {
        inner: FileBackend,
        fail_store: AtomicBool,
        fail_load: AtomicBool,
        /// Fail every store from this (1-based) call on; 0 disables.
        fail_from_store: AtomicUsize,
        stores: AtomicUsize,
    }

    impl KeyStoreBackend for FlakyBackend {
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        fn load(&self, path: &Path, password: &Password) -> Result<Container> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(KeystoreError::StorageError(std::io::Error::other("disk gone")));
            }
            self.inner.load(path, password)
        }

        fn store(&self, container: &Container, path: &Path, password: &Password) -> Result<()> {
            let call = self.stores.fetch_add(1, Ordering::SeqCst) + 1;
            let fail_from = self.fail_from_store.load(Ordering::SeqCst);
            if self.fail_store.load(Ordering::SeqCst) || (fail_from != 0 && call >= fail_from) {
                return Err(KeystoreError::StorageError(std::io::Error::other("disk full")));
            }
            self.inner.store(container, path, password)
        }
    }

    struct BrokenCipher {
        decrypt: bool,
        encrypt: bool,
    }

    impl SecretCipher for BrokenCipher {
        fn decrypt(&self, secret: &Password) -> Result<Password> {
            if self.decrypt {
                Err(KeystoreError::SecretDecryptionError("no master key".to_string()))
            } else {
                Ok(secret.clone())
            }
        }

        fn encrypt(&self, plaintext: &Password) -> Result<Password> {
            if self.encrypt {
                Err(KeystoreError::SecretEncryptionError("no master key".to_string()))
            } else {
                Ok(plaintext.clone())
            }
        }
    }

    struct RejectingConfigStore;

    impl ConfigurationStore for RejectingConfigStore {
        fn update_configuration(&self, _: Option<&str>, _: &Properties) -> Result<()> {
            Err(KeystoreError::ConfigurationStoreError("read-only".to_string()))
        }
    }

    fn properties(path: &Path, password: &str) -> Properties {
        let mut properties = Properties::new();
        properties.insert(
            KEY_SERVICE_PID.to_string(),
            ConfigValue::from("gateway.keystore.default"),
        );
        properties.insert(
            KEY_KEYSTORE_PATH.to_string(),
            ConfigValue::from(path.to_string_lossy().into_owned()),
        );
        properties.insert(KEY_KEYSTORE_PASSWORD.to_string(), ConfigValue::from(password));
        properties
    }

    fn service_with(backend: Arc<dyn KeyStoreBackend>) -> KeystoreService {
        KeystoreService::new(
            backend,
            Arc::new(PassthroughCipher),
            Arc::new(MemoryConfigurationStore::new()),
        )
    }

    fn key_entry(subject: &str) -> Entry {
        Entry::from(generate_key_pair(KeyAlgorithm::EcdsaP256, subject, 365).unwrap())
    }

    fn cert_entry() -> Entry {
        let generated = generate_key_pair(KeyAlgorithm::Ed25519, "CN=Root", 365).unwrap();
        Entry::from(TrustedCertificateEntry::new(generated.leaf_certificate().to_vec()).unwrap())
    }

    #[test]
    fn test_operations_require_activation() {
        let service = service_with(Arc::new(FileBackend::new()));

        assert!(!service.is_active());
        assert!(matches!(service.get_aliases(), Err(KeystoreError::NotInitialized)));
        assert!(matches!(service.get_store(), Err(KeystoreError::NotInitialized)));
        assert!(matches!(service.get_entry("a"), Err(KeystoreError::NotInitialized)));
        assert!(matches!(service.delete_entry("a"), Err(KeystoreError::NotInitialized)));
        assert!(matches!(
            service.get_key_managers(""),
            Err(KeystoreError::NotInitialized)
        ));
    }

    #[test]
    fn test_activate_creates_missing_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let service = service_with(Arc::new(FileBackend::new()));

        service.activate(&properties(&path, "pass")).unwrap();

        assert!(service.is_active());
        assert!(path.is_file());
        assert!(service.get_aliases().unwrap().is_empty());
    }

    #[test]
    fn test_activate_null_properties() {
        let service = service_with(Arc::new(FileBackend::new()));

        let result = service.activate(None);

        assert!(matches!(result, Err(KeystoreError::InvalidConfiguration(_))));
        assert!(!service.is_active());
    }

    #[test]
    fn test_activate_decryption_failure() {
        let temp_dir = TempDir::new().unwrap();
        let service = KeystoreService::new(
            Arc::new(FileBackend::new()),
            Arc::new(BrokenCipher {
                decrypt: true,
                encrypt: false,
            }),
            Arc::new(MemoryConfigurationStore::new()),
        );

        let result = service.activate(&properties(&temp_dir.path().join("k"), "pass"));

        assert!(matches!(result, Err(KeystoreError::SecretDecryptionError(_))));
        assert!(!service.is_active());
    }

    #[test]
    fn test_activate_wrong_password() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        FileBackend
            .store(&Container::new(), &path, &Password::from("pass"))
            .unwrap();

        let service = service_with(Arc::new(FileBackend::new()));
        let result = service.activate(&properties(&path, "other"));

        assert!(matches!(result, Err(KeystoreError::StoreLoadError(_))));
        assert!(!service.is_active());
    }

    #[test]
    fn test_activate_load_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        FileBackend
            .store(&Container::new(), &path, &Password::from("pass"))
            .unwrap();

        let backend = Arc::new(FlakyBackend::default());
        backend.fail_load.store(true, Ordering::SeqCst);
        let service = service_with(backend);

        let result = service.activate(&properties(&path, "pass"));
        assert!(matches!(result, Err(KeystoreError::StoreLoadError(_))));
    }

    #[test]
    fn test_set_get_and_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let service = service_with(Arc::new(FileBackend::new()));
        service.activate(&properties(&path, "pass")).unwrap();

        let first = key_entry("CN=first");
        let second = key_entry("CN=second");
        service.set_entry("alias1", first.clone()).unwrap();
        assert_eq!(service.get_entry("alias1").unwrap(), Some(first));

        service.set_entry("alias1", second.clone()).unwrap();
        assert_eq!(service.get_entry("alias1").unwrap(), Some(second.clone()));
        assert_eq!(service.get_aliases().unwrap(), vec!["alias1".to_string()]);

        let reloaded = FileBackend.load(&path, &Password::from("pass")).unwrap();
        assert_eq!(
            reloaded.get_entry("alias1", &Password::from("pass")).unwrap(),
            Some(second)
        );
    }

    #[test]
    fn test_null_and_empty_arguments() {
        let temp_dir = TempDir::new().unwrap();
        let service = service_with(Arc::new(FileBackend::new()));
        service
            .activate(&properties(&temp_dir.path().join("k"), "pass"))
            .unwrap();

        assert!(matches!(service.get_entry(None), Err(KeystoreError::InvalidArgument(_))));
        assert!(matches!(service.delete_entry(None), Err(KeystoreError::InvalidArgument(_))));
        assert!(matches!(
            service.set_entry(None, cert_entry()),
            Err(KeystoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.set_entry("", cert_entry()),
            Err(KeystoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.set_entry("a", None),
            Err(KeystoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.get_key_managers(None),
            Err(KeystoreError::InvalidArgument(_))
        ));

        assert_eq!(service.get_entry("").unwrap(), None);
        assert_eq!(service.get_entry("missing").unwrap(), None);
        service.delete_entry("").unwrap();
        assert!(service.get_aliases().unwrap().is_empty());
    }

    #[test]
    fn test_persist_failure_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(FlakyBackend::default());
        let service = service_with(backend.clone());
        service
            .activate(&properties(&temp_dir.path().join("k"), "pass"))
            .unwrap();

        let kept = cert_entry();
        service.set_entry("kept", kept.clone()).unwrap();
        let snapshot = service.get_store().unwrap();

        backend.fail_store.store(true, Ordering::SeqCst);

        assert!(matches!(
            service.set_entry("new", key_entry("CN=new")),
            Err(KeystoreError::StorePersistError(_))
        ));
        assert!(matches!(
            service.set_entry("kept", key_entry("CN=replacement")),
            Err(KeystoreError::StorePersistError(_))
        ));
        assert!(matches!(
            service.delete_entry("kept"),
            Err(KeystoreError::StorePersistError(_))
        ));

        assert_eq!(service.get_store().unwrap(), snapshot);
        assert_eq!(service.get_entry("kept").unwrap(), Some(kept));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let service = service_with(Arc::new(FileBackend::new()));
        service
            .activate(&properties(&temp_dir.path().join("k"), "pass"))
            .unwrap();
        service.set_entry("alias1", cert_entry()).unwrap();

        service.delete_entry("alias1").unwrap();
        service.delete_entry("alias1").unwrap();

        assert_eq!(service.get_entry("alias1").unwrap(), None);
        assert!(service.get_aliases().unwrap().is_empty());
    }

    #[test]
    fn test_randomize_password() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let config_store = Arc::new(MemoryConfigurationStore::new());
        let cipher = Arc::new(AesGcmSecretCipher::new(Password::from("master")));

        let sealed = cipher.encrypt(&Password::from("pass")).unwrap();
        let mut props = properties(&path, sealed.expose());
        props.insert(KEY_RANDOMIZE_PASSWORD.to_string(), ConfigValue::Bool(true));

        let service = KeystoreService::new(
            Arc::new(FileBackend::new()),
            cipher.clone(),
            config_store.clone(),
        );
        service.activate(&props).unwrap();
        service.set_entry("alias1", key_entry("CN=alias1")).unwrap();

        let written = config_store.get(Some("gateway.keystore.default")).unwrap();
        assert_eq!(written.get(KEY_RANDOMIZE_PASSWORD), Some(&ConfigValue::Bool(false)));

        let stored = written
            .get(KEY_KEYSTORE_PASSWORD)
            .and_then(|value| value.as_str(KEY_KEYSTORE_PASSWORD).ok())
            .unwrap();
        let generated = cipher.decrypt(&Password::from(stored)).unwrap();
        assert_eq!(generated.expose().len(), 40);

        let container = FileBackend.load(&path, &generated).unwrap();
        assert_eq!(container.aliases(), vec!["alias1".to_string()]);
        assert!(FileBackend.load(&path, &Password::from("pass")).is_err());

        // The written-back configuration is what the service now runs with.
        service.reconfigure(&written).unwrap();
        assert!(service.get_entry("alias1").unwrap().is_some());
    }

    #[test]
    fn test_randomize_config_failure_restores_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let mut props = properties(&path, "pass");
        props.insert(KEY_RANDOMIZE_PASSWORD.to_string(), ConfigValue::Bool(true));

        let service = KeystoreService::new(
            Arc::new(FileBackend::new()),
            Arc::new(PassthroughCipher),
            Arc::new(RejectingConfigStore),
        );

        let result = service.activate(&props);

        assert!(matches!(result, Err(KeystoreError::ConfigurationStoreError(_))));
        assert!(!service.is_active());
        assert!(FileBackend.load(&path, &Password::from("pass")).is_ok());
    }

    #[test]
    fn test_randomize_encryption_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let mut props = properties(&path, "pass");
        props.insert(KEY_RANDOMIZE_PASSWORD.to_string(), ConfigValue::Bool(true));

        let service = KeystoreService::new(
            Arc::new(FileBackend::new()),
            Arc::new(BrokenCipher {
                decrypt: false,
                encrypt: true,
            }),
            Arc::new(MemoryConfigurationStore::new()),
        );

        let result = service.activate(&props);

        assert!(matches!(result, Err(KeystoreError::SecretEncryptionError(_))));
        assert!(FileBackend.load(&path, &Password::from("pass")).is_ok());
    }

    #[test]
    fn test_reconfigure_password() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let service = service_with(Arc::new(FileBackend::new()));
        service.activate(&properties(&path, "pass")).unwrap();
        let entry = key_entry("CN=device");
        service.set_entry("device", entry.clone()).unwrap();

        service.reconfigure(&properties(&path, "pass")).unwrap();
        service.reconfigure(&properties(&path, "new-pass")).unwrap();

        assert_eq!(service.get_entry("device").unwrap(), Some(entry));
        let container = FileBackend.load(&path, &Password::from("new-pass")).unwrap();
        assert!(container.contains_alias("device"));
    }

    #[test]
    fn test_reconfigure_path() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.store");
        let second = temp_dir.path().join("second.store");
        let service = service_with(Arc::new(FileBackend::new()));
        service.activate(&properties(&first, "pass")).unwrap();
        service.set_entry("a", cert_entry()).unwrap();

        // Activating again while loaded applies the new configuration.
        service.activate(&properties(&second, "pass")).unwrap();

        assert!(second.is_file());
        assert!(service.get_aliases().unwrap().is_empty());
    }

    #[test]
    fn test_reconfigure_failure_keeps_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let backend = Arc::new(FlakyBackend::default());
        let service = service_with(backend.clone());
        service.activate(&properties(&path, "pass")).unwrap();
        service.set_entry("a", key_entry("CN=a")).unwrap();

        backend.fail_store.store(true, Ordering::SeqCst);
        let result = service.reconfigure(&properties(&path, "new-pass"));
        backend.fail_store.store(false, Ordering::SeqCst);

        assert!(matches!(result, Err(KeystoreError::StorePersistError(_))));
        assert!(service.get_entry("a").unwrap().is_some());
        assert!(FileBackend.load(&path, &Password::from("pass")).is_ok());
    }

    fn randomizing(path: &Path, password: &str) -> Properties {
        let mut props = properties(path, password);
        props.insert(KEY_RANDOMIZE_PASSWORD.to_string(), ConfigValue::Bool(true));
        props
    }

    #[test]
    fn test_reconfigure_randomize_encryption_failure_keeps_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let service = KeystoreService::new(
            Arc::new(FileBackend::new()),
            Arc::new(BrokenCipher {
                decrypt: false,
                encrypt: true,
            }),
            Arc::new(MemoryConfigurationStore::new()),
        );
        service.activate(&properties(&path, "pass")).unwrap();
        service.set_entry("a", key_entry("CN=a")).unwrap();

        let result = service.reconfigure(&randomizing(&path, "new-pass"));

        assert!(matches!(result, Err(KeystoreError::SecretEncryptionError(_))));
        assert!(FileBackend.load(&path, &Password::from("pass")).is_ok());
        assert!(FileBackend.load(&path, &Password::from("new-pass")).is_err());

        service.set_entry("b", cert_entry()).unwrap();
        let container = FileBackend.load(&path, &Password::from("pass")).unwrap();
        assert_eq!(container.aliases(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_reconfigure_randomize_config_failure_keeps_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let service = KeystoreService::new(
            Arc::new(FileBackend::new()),
            Arc::new(PassthroughCipher),
            Arc::new(RejectingConfigStore),
        );
        service.activate(&properties(&path, "pass")).unwrap();
        service.set_entry("a", key_entry("CN=a")).unwrap();

        let result = service.reconfigure(&randomizing(&path, "new-pass"));

        assert!(matches!(result, Err(KeystoreError::ConfigurationStoreError(_))));
        assert!(FileBackend.load(&path, &Password::from("pass")).is_ok());
        assert!(service.get_entry("a").unwrap().is_some());
    }

    #[test]
    fn test_failed_restore_reports_persist_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        let backend = Arc::new(FlakyBackend::default());
        // Store calls: create empty, re-protect under the random password, restore.
        backend.fail_from_store.store(3, Ordering::SeqCst);
        let service = KeystoreService::new(
            backend,
            Arc::new(PassthroughCipher),
            Arc::new(RejectingConfigStore),
        );

        match service.activate(&randomizing(&path, "pass")) {
            Err(KeystoreError::StorePersistError(msg)) => {
                assert!(msg.contains("read-only"));
                assert!(msg.contains("disk full"));
            }
            other => panic!("Expected StorePersistError, got {:?}", other),
        }
        assert!(!service.is_active());
    }

    #[test]
    fn test_close() {
        let temp_dir = TempDir::new().unwrap();
        let props = properties(&temp_dir.path().join("k"), "pass");
        let service = service_with(Arc::new(FileBackend::new()));
        service.activate(&props).unwrap();

        service.close();

        assert!(matches!(service.get_aliases(), Err(KeystoreError::NotInitialized)));
        assert!(matches!(service.activate(&props), Err(KeystoreError::NotInitialized)));
    }

    #[test]
    fn test_create_key_pair_and_csr() {
        let temp_dir = TempDir::new().unwrap();
        let service = service_with(Arc::new(FileBackend::new()));
        service
            .activate(&properties(&temp_dir.path().join("k"), "pass"))
            .unwrap();

        let generated = service
            .create_key_pair("device", KeyAlgorithm::EcdsaP256, "CN=device", 30)
            .unwrap();
        assert_eq!(
            service.get_entry("device").unwrap(),
            Some(Entry::from(generated))
        );

        let csr = service.get_csr("device", "CN=device,O=Edge").unwrap();
        assert!(csr.contains("BEGIN CERTIFICATE REQUEST"));

        service.set_entry("root", cert_entry()).unwrap();
        assert!(matches!(
            service.get_csr("root", "CN=root"),
            Err(KeystoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.get_csr("missing", "CN=x"),
            Err(KeystoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_get_key_managers() {
        let temp_dir = TempDir::new().unwrap();
        let service = service_with(Arc::new(FileBackend::new()));
        service
            .activate(&properties(&temp_dir.path().join("k"), "pass"))
            .unwrap();
        service.set_entry("device", key_entry("CN=device")).unwrap();

        let managers = service.get_key_managers("").unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].aliases(), vec!["device"]);

        assert!(matches!(
            service.get_key_managers("X509"),
            Err(KeystoreError::KeyManagerInitError(_))
        ));
    }

    #[test]
    fn test_get_entries() {
        let temp_dir = TempDir::new().unwrap();
        let service = service_with(Arc::new(FileBackend::new()));
        service
            .activate(&properties(&temp_dir.path().join("k"), "pass"))
            .unwrap();
        let key = key_entry("CN=device");
        let cert = cert_entry();
        service.set_entry("device", key.clone()).unwrap();
        service.set_entry("root", cert.clone()).unwrap();

        let entries = service.get_entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries.get("device"), Some(&key));
        assert_eq!(entries.get("root"), Some(&cert));
    }

    #[test]
    fn test_debug_hides_state_contents() {
        let service = service_with(Arc::new(FileBackend::new()));
        assert!(format!("{:?}", service).contains("uninitialized"));
    }
}
