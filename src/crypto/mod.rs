//! Cryptographic operations module.
//!
//! This module provides the secret handling used by the keystore:
//!
//! - Zeroizing passwords and random password generation
//! - Password-based sealing using Argon2 and AES-GCM
//! - Secret ciphers for passwords stored at rest in configuration
//!
//! # Example
//!
//! ```rust
//! use gatekeystore::crypto::encryption::{open_with_password, seal_with_password};
//! use gatekeystore::crypto::password::generate_random_password;
//!
//! # fn example() -> gatekeystore::error::Result<()> {
//! let password = generate_random_password();
//!
//! let sealed = seal_with_password(b"private key bytes", password.as_bytes())?;
//! let opened = open_with_password(&sealed, password.as_bytes())?;
//! assert_eq!(b"private key bytes", opened.as_slice());
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod encryption;
pub mod password;
