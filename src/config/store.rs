//! Configuration storage receiving updated keystore properties.
//!
//! When the service regenerates the keystore password it must hand the new
//! (encrypted) password back to whoever owns the configuration, so the next
//! activation can open the container.

use crate::config::options::KEY_KEYSTORE_PASSWORD;
use crate::config::value::Properties;
use crate::error::{KeystoreError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Key used for configurations without a service id.
const ANONYMOUS_SERVICE: &str = "";

/// Accepts configuration updates issued by the keystore service.
pub trait ConfigurationStore: Send + Sync {
    /// Replace the stored configuration of `service_id` with `properties`.
    fn update_configuration(&self, service_id: Option<&str>, properties: &Properties)
        -> Result<()>;
}

/// Keeps the last written properties per service id in memory.
#[derive(Default)]
pub struct MemoryConfigurationStore {
    configurations: RwLock<HashMap<String, Properties>>,
}

impl MemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last properties written for `service_id`, if any.
    pub fn get(&self, service_id: Option<&str>) -> Option<Properties> {
        self.configurations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(service_id.unwrap_or(ANONYMOUS_SERVICE))
            .cloned()
    }
}

impl fmt::Debug for MemoryConfigurationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let configurations = self
            .configurations
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let redacted: BTreeMap<&str, BTreeMap<&str, String>> = configurations
            .iter()
            .map(|(service, properties)| {
                let values = properties
                    .iter()
                    .map(|(key, value)| {
                        let shown = if key == KEY_KEYSTORE_PASSWORD {
                            "***".to_string()
                        } else {
                            value.to_string()
                        };
                        (key.as_str(), shown)
                    })
                    .collect();
                (service.as_str(), values)
            })
            .collect();

        f.debug_struct("MemoryConfigurationStore")
            .field("configurations", &redacted)
            .finish()
    }
}

impl ConfigurationStore for MemoryConfigurationStore {
    fn update_configuration(
        &self,
        service_id: Option<&str>,
        properties: &Properties,
    ) -> Result<()> {
        self.configurations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                service_id.unwrap_or(ANONYMOUS_SERVICE).to_string(),
                properties.clone(),
            );
        Ok(())
    }
}

/// Writes properties as a pretty-printed JSON object to a single file.
///
/// The file can be read back with [`load_properties`](super::load_properties).
#[derive(Debug, Clone)]
pub struct JsonFileConfigurationStore {
    path: PathBuf,
}

impl JsonFileConfigurationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigurationStore for JsonFileConfigurationStore {
    fn update_configuration(
        &self,
        service_id: Option<&str>,
        properties: &Properties,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(properties)?;

        fs::write(&self.path, json).map_err(|e| {
            KeystoreError::ConfigurationStoreError(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            path = %self.path.display(),
            service = service_id.unwrap_or(ANONYMOUS_SERVICE),
            "configuration updated"
        );
        Ok(())
    }
}
