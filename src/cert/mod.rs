//! Certificate handling module.
//!
//! This module converts PEM material into keystore entries and generates
//! device keys with self-signed certificates and signing requests.

pub mod builder;
pub mod generate;
pub mod loader;
