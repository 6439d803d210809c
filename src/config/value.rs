//! Typed configuration values.
//!
//! Configuration arrives as a property map whose values may be of several
//! kinds. [`ConfigValue`] is the closed set of kinds the keystore understands.

use crate::error::{KeystoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An untyped configuration mapping.
pub type Properties = BTreeMap<String, ConfigValue>;

/// A single configuration value.
///
/// Serialized untagged, so a property file is a plain JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    String(String),
}

impl ConfigValue {
    /// Name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::String(_) => "string",
        }
    }

    /// Read the value as a string.
    pub fn as_str(&self, key: &str) -> Result<&str> {
        match self {
            ConfigValue::String(value) => Ok(value),
            other => Err(unsupported_kind(key, "string", other)),
        }
    }

    /// Read the value as a boolean.
    ///
    /// The strings `"true"` and `"false"` are accepted as well, since
    /// property files written by hand often quote them.
    pub fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            ConfigValue::Bool(value) => Ok(*value),
            ConfigValue::String(value) => match value.trim() {
                v if v.eq_ignore_ascii_case("true") => Ok(true),
                v if v.eq_ignore_ascii_case("false") => Ok(false),
                _ => Err(unsupported_kind(key, "boolean", self)),
            },
            other => Err(unsupported_kind(key, "boolean", other)),
        }
    }

    /// Read the value as an integer.
    pub fn as_integer(&self, key: &str) -> Result<i64> {
        match self {
            ConfigValue::Integer(value) => Ok(*value),
            other => Err(unsupported_kind(key, "integer", other)),
        }
    }
}

fn unsupported_kind(key: &str, expected: &str, found: &ConfigValue) -> KeystoreError {
    KeystoreError::InvalidConfiguration(format!(
        "Property '{}' must be a {}, found {}",
        key,
        expected,
        found.kind()
    ))
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(value) => write!(f, "{}", value),
            ConfigValue::Integer(value) => write!(f, "{}", value),
            ConfigValue::String(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}
