//! In-memory keystore container.
//!
//! The container maps aliases to stored entries. Private keys stay sealed
//! with the container password while in memory; they are only opened when
//! an entry is read. Certificates are public and stored as plain DER.

use crate::crypto::encryption::{open_with_password, seal_with_password};
use crate::crypto::password::Password;
use crate::error::{KeystoreError, Result};
use crate::storage::entry::{Entry, PrivateKeyEntry, TrustedCertificateEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// An entry as held by the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredEntry {
    PrivateKey {
        /// The PKCS#8 key sealed with the container password.
        encrypted_key: Vec<u8>,
        certificate_chain: Vec<Vec<u8>>,
        created_at: u64,
    },
    TrustedCertificate {
        certificate: Vec<u8>,
        created_at: u64,
    },
}

impl StoredEntry {
    /// Seal an entry for storage.
    fn seal(entry: &Entry, password: &Password) -> Result<Self> {
        let created_at = now_secs();
        match entry {
            Entry::PrivateKey(key_entry) => Ok(StoredEntry::PrivateKey {
                encrypted_key: seal_with_password(key_entry.private_key(), password.as_bytes())?,
                certificate_chain: key_entry.certificate_chain().to_vec(),
                created_at,
            }),
            Entry::TrustedCertificate(cert_entry) => Ok(StoredEntry::TrustedCertificate {
                certificate: cert_entry.certificate().to_vec(),
                created_at,
            }),
        }
    }

    /// Open a stored entry.
    fn open(&self, password: &Password) -> Result<Entry> {
        match self {
            StoredEntry::PrivateKey {
                encrypted_key,
                certificate_chain,
                ..
            } => {
                let private_key = open_with_password(encrypted_key, password.as_bytes())?;
                let entry = PrivateKeyEntry::new(private_key.to_vec(), certificate_chain.clone())?;
                Ok(Entry::PrivateKey(entry))
            }
            StoredEntry::TrustedCertificate { certificate, .. } => Ok(Entry::TrustedCertificate(
                TrustedCertificateEntry::new(certificate.clone())?,
            )),
        }
    }

    pub fn is_private_key(&self) -> bool {
        matches!(self, StoredEntry::PrivateKey { .. })
    }

    /// Unix timestamp when the entry was stored.
    pub fn created_at(&self) -> u64 {
        match self {
            StoredEntry::PrivateKey { created_at, .. }
            | StoredEntry::TrustedCertificate { created_at, .. } => *created_at,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The alias-addressed collection of entries of one keystore.
///
/// Aliases enumerate in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    entries: BTreeMap<String, StoredEntry>,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// All aliases, in enumeration order.
    pub fn aliases(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// The stored (still sealed) form of an entry.
    pub fn stored_entry(&self, alias: &str) -> Option<&StoredEntry> {
        self.entries.get(alias)
    }

    /// Open the entry stored under `alias`.
    ///
    /// Returns `Ok(None)` if the alias is unknown.
    pub fn get_entry(&self, alias: &str, password: &Password) -> Result<Option<Entry>> {
        self.entries
            .get(alias)
            .map(|stored| stored.open(password))
            .transpose()
    }

    /// Store `entry` under `alias`, returning whatever it replaced.
    pub fn set_entry(
        &mut self,
        alias: &str,
        entry: &Entry,
        password: &Password,
    ) -> Result<Option<StoredEntry>> {
        let stored = StoredEntry::seal(entry, password)?;
        Ok(self.entries.insert(alias.to_string(), stored))
    }

    /// Remove the entry under `alias`, returning it if present.
    pub fn delete_entry(&mut self, alias: &str) -> Option<StoredEntry> {
        self.entries.remove(alias)
    }

    /// Put back the state of `alias` captured before a mutation.
    pub fn restore(&mut self, alias: &str, previous: Option<StoredEntry>) {
        match previous {
            Some(stored) => {
                self.entries.insert(alias.to_string(), stored);
            }
            None => {
                self.entries.remove(alias);
            }
        }
    }

    /// Re-seal every private key from `old` to `new`.
    ///
    /// Either all keys are re-sealed or, on error, the container is unchanged.
    pub fn reprotect(&mut self, old: &Password, new: &Password) -> Result<()> {
        let mut resealed = self.entries.clone();

        for stored in resealed.values_mut() {
            if let StoredEntry::PrivateKey { encrypted_key, .. } = stored {
                let private_key = open_with_password(encrypted_key, old.as_bytes())?;
                *encrypted_key = seal_with_password(&private_key, new.as_bytes())?;
            }
        }

        self.entries = resealed;
        Ok(())
    }

    pub(crate) fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(KeystoreError::JsonError)
    }

    pub(crate) fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(KeystoreError::JsonError)
    }
}
