//! TLS key managers derived from a keystore container.
//!
//! A [`KeyManager`] holds one rustls [`CertifiedKey`] per private key entry
//! and answers certificate requests from rustls clients and servers.

use crate::crypto::password::Password;
use crate::error::{KeystoreError, Result};
use crate::storage::container::Container;
use crate::storage::entry::Entry;
use rustls::client::ResolvesClientCert;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::SignatureScheme;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Name of the algorithm used when none is requested.
pub const DEFAULT_KEY_MANAGER_ALGORITHM: &str = "PKIX";

/// Key manager algorithms the keystore can build.
///
/// Both select the first key, in alias order, that supports a signature
/// scheme offered by the peer. `SunX509` is accepted so existing
/// configurations naming it keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyManagerAlgorithm {
    Pkix,
    SunX509,
}

impl FromStr for KeyManagerAlgorithm {
    type Err = KeystoreError;

    /// Parse an algorithm name; the empty string selects the default.
    fn from_str(s: &str) -> Result<Self> {
        let name = if s.is_empty() {
            DEFAULT_KEY_MANAGER_ALGORITHM
        } else {
            s
        };

        if name.eq_ignore_ascii_case("PKIX") || name.eq_ignore_ascii_case("NewSunX509") {
            Ok(KeyManagerAlgorithm::Pkix)
        } else if name.eq_ignore_ascii_case("SunX509") {
            Ok(KeyManagerAlgorithm::SunX509)
        } else {
            Err(KeystoreError::KeyManagerInitError(format!(
                "Unsupported key manager algorithm: {}",
                name
            )))
        }
    }
}

/// Serves certificates and keys held by a keystore to rustls.
pub struct KeyManager {
    algorithm: KeyManagerAlgorithm,
    keys: Vec<(String, Arc<CertifiedKey>)>,
}

impl KeyManager {
    pub fn algorithm(&self) -> KeyManagerAlgorithm {
        self.algorithm
    }

    /// Aliases of the keys this manager can present.
    pub fn aliases(&self) -> Vec<&str> {
        self.keys.iter().map(|(alias, _)| alias.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The certified key stored under `alias`.
    pub fn certified_key(&self, alias: &str) -> Option<Arc<CertifiedKey>> {
        self.keys
            .iter()
            .find(|(candidate, _)| candidate == alias)
            .map(|(_, key)| Arc::clone(key))
    }

    /// The first key able to sign with one of `schemes`.
    pub fn choose_key(&self, schemes: &[SignatureScheme]) -> Option<Arc<CertifiedKey>> {
        self.keys
            .iter()
            .find(|(_, key)| key.key.choose_scheme(schemes).is_some())
            .map(|(alias, key)| {
                debug!(alias = %alias, "key manager selected key");
                Arc::clone(key)
            })
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("algorithm", &self.algorithm)
            .field("aliases", &self.aliases())
            .finish()
    }
}

impl ResolvesServerCert for KeyManager {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.choose_key(client_hello.signature_schemes())
    }
}

impl ResolvesClientCert for KeyManager {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.choose_key(sigschemes)
    }

    fn has_certs(&self) -> bool {
        !self.keys.is_empty()
    }
}

/// Build the key managers for a container.
///
/// Every private key entry is opened with `password` and turned into a
/// rustls signing key. Returns exactly one manager, which may hold no keys if
/// the container has no private key entries.
pub fn create_key_managers(
    container: &Container,
    password: &Password,
    algorithm: &str,
) -> Result<Vec<Arc<KeyManager>>> {
    let algorithm = algorithm.parse::<KeyManagerAlgorithm>()?;
    let mut keys = Vec::new();

    for alias in container.aliases() {
        let entry = container.get_entry(&alias, password).map_err(|e| {
            KeystoreError::KeyManagerInitError(format!("Cannot open entry '{}': {}", alias, e))
        })?;

        if let Some(Entry::PrivateKey(key_entry)) = entry {
            let signing_key = rustls::crypto::ring::sign::any_supported_type(
                &key_entry.private_key_der(),
            )
            .map_err(|e| {
                KeystoreError::KeyManagerInitError(format!(
                    "Unsupported private key under '{}': {}",
                    alias, e
                ))
            })?;

            let certified = CertifiedKey::new(key_entry.certificate_chain_der(), signing_key);
            keys.push((alias, Arc::new(certified)));
        }
    }

    debug!(?algorithm, keys = keys.len(), "key managers initialized");
    Ok(vec![Arc::new(KeyManager { algorithm, keys })])
}
