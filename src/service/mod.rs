//! Keystore service module.
//!
//! This module ties the configuration, storage, and TLS layers together
//! into the long-lived service that owns a keystore.

pub mod keystore;

pub use keystore::KeystoreService;
