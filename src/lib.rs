//! gatekeystore: keystore entry management for IoT gateways
//!
//! This library owns the persistent keystore of a gateway. It enables
//! callers to:
//!
//! - Load or create a password-protected keystore file from configuration
//! - Read, store, and delete private key and trusted certificate entries
//! - Regenerate the keystore password and write it back to configuration
//! - Build rustls key managers and configurations from stored keys
//!
//! # Architecture
//!
//! [`KeystoreService`] is the entry point. It depends on three seams that
//! callers provide: a [`KeyStoreBackend`] that persists the container, a
//! [`SecretCipher`] that protects the password held in configuration, and a
//! [`ConfigurationStore`] that receives configuration updates. All
//! operations return [`Result`] with a [`KeystoreError`] describing the
//! failure; no operation panics.
//!
//! [`KeyStoreBackend`]: storage::backend::KeyStoreBackend
//! [`SecretCipher`]: crypto::cipher::SecretCipher
//! [`ConfigurationStore`]: config::store::ConfigurationStore
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekeystore::config::load_properties;
//! use gatekeystore::config::store::JsonFileConfigurationStore;
//! use gatekeystore::crypto::cipher::PassthroughCipher;
//! use gatekeystore::storage::backend::FileBackend;
//! use gatekeystore::{KeystoreService, Result};
//! use std::sync::Arc;
//!
//! fn example() -> Result<()> {
//!     let properties = load_properties("/etc/gateway/keystore.json")?;
//!     let service = KeystoreService::new(
//!         Arc::new(FileBackend::new()),
//!         Arc::new(PassthroughCipher),
//!         Arc::new(JsonFileConfigurationStore::new("/etc/gateway/keystore.json")),
//!     );
//!
//!     service.activate(&properties)?;
//!     for alias in service.get_aliases()? {
//!         println!("{}", alias);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod service;
pub mod storage;
pub mod tls;

// Re-export commonly used types
pub use config::value::{ConfigValue, Properties};
pub use error::{KeystoreError, Result};
pub use service::KeystoreService;
pub use storage::entry::{Entry, PrivateKeyEntry, TrustedCertificateEntry};
pub use tls::key_manager::KeyManager;
