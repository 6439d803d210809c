//! Error types for the gatekeystore library.
//!
//! This module defines all error types used throughout the library.
//! All errors implement `std::error::Error` and are designed to provide
//! clear, actionable error messages without ever carrying secret material.

use thiserror::Error;

/// The main error type for keystore operations.
///
/// The first group of variants is the service-level taxonomy surfaced to
/// callers; the second group covers the lower-level crypto, certificate and
/// I/O failures the service maps into it.
#[derive(Error, Debug)]
pub enum KeystoreError {
    /// Missing or malformed configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A caller supplied an unusable argument; nothing was changed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation invoked before activation or after close
    #[error("Keystore service is not initialized")]
    NotInitialized,

    /// The secret cipher could not decrypt a secret
    #[error("Secret decryption error: {0}")]
    SecretDecryptionError(String),

    /// The secret cipher could not encrypt a secret
    #[error("Secret encryption error: {0}")]
    SecretEncryptionError(String),

    /// The container could not be loaded at activation time
    #[error("Keystore load error: {0}")]
    StoreLoadError(String),

    /// A mutation could not be written back; the in-memory change was rolled back
    #[error("Keystore persist error: {0}")]
    StorePersistError(String),

    /// TLS key manager material could not be derived
    #[error("Key manager initialization error: {0}")]
    KeyManagerInitError(String),

    /// Updated configuration could not be written to configuration storage
    #[error("Configuration store error: {0}")]
    ConfigurationStoreError(String),

    /// Key derivation failed
    #[error("Key derivation error: {0}")]
    KeyDerivationError(String),

    /// Encryption or decryption failed
    #[error("Encryption/decryption error: {0}")]
    EncryptionError(String),

    /// Invalid password
    #[error("Invalid password")]
    InvalidPasswordError,

    /// Certificate generation or validation error
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    PemError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for keystore operations.
pub type Result<T> = std::result::Result<T, KeystoreError>;
