//! Configuration module.
//!
//! Keystore configuration is an untyped property map. This module resolves it
//! into [`KeystoreOptions`](options::KeystoreOptions), reads property files,
//! and defines where updated properties are written back.

pub mod options;
pub mod store;
pub mod value;

use crate::error::{KeystoreError, Result};
use std::fs;
use std::path::Path;
use value::Properties;

/// Load a property map from a JSON file.
///
/// # Example
///
/// ```rust,no_run
/// use gatekeystore::config::load_properties;
///
/// # fn example() -> gatekeystore::error::Result<()> {
/// let properties = load_properties("keystore.json")?;
/// println!("{} properties", properties.len());
/// # Ok(())
/// # }
/// ```
pub fn load_properties(path: impl AsRef<Path>) -> Result<Properties> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        KeystoreError::InvalidConfiguration(format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        KeystoreError::InvalidConfiguration(format!("Failed to parse {}: {}", path.display(), e))
    })
}
