//! rustls configurations backed by keystore key managers.
//!
//! Trusted certificate entries become the root store; private key entries
//! are presented through a [`KeyManager`].

use crate::error::{KeystoreError, Result};
use crate::storage::entry::TrustedCertificateEntry;
use crate::tls::key_manager::KeyManager;
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::sync::Arc;

/// Build a root store from trusted certificate entries.
pub fn build_root_store(trusted: &[TrustedCertificateEntry]) -> Result<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    for entry in trusted {
        root_store.add(entry.certificate_der()).map_err(|e| {
            KeystoreError::CertificateError(format!("Failed to add trusted cert: {:?}", e))
        })?;
    }
    Ok(root_store)
}

/// Build a client configuration that authenticates with the key manager.
///
/// # Example
///
/// ```rust,no_run
/// use gatekeystore::tls::config::build_client_config;
/// use gatekeystore::KeystoreService;
///
/// # fn example(service: &KeystoreService) -> gatekeystore::Result<()> {
/// let managers = service.get_key_managers("")?;
/// let config = build_client_config(managers[0].clone(), &[])?;
/// # Ok(())
/// # }
/// ```
pub fn build_client_config(
    key_manager: Arc<KeyManager>,
    trusted: &[TrustedCertificateEntry],
) -> Result<Arc<ClientConfig>> {
    let root_store = build_root_store(trusted)?;

    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_client_cert_resolver(key_manager);

    Ok(Arc::new(config))
}

/// Build a server configuration that presents keys from the key manager.
///
/// Client certificates are required and checked against `client_roots`
/// when it is non-empty; otherwise clients are not authenticated.
pub fn build_server_config(
    key_manager: Arc<KeyManager>,
    client_roots: &[TrustedCertificateEntry],
) -> Result<Arc<ServerConfig>> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let builder = if client_roots.is_empty() {
        ServerConfig::builder().with_no_client_auth()
    } else {
        let roots = Arc::new(build_root_store(client_roots)?);
        let verifier = WebPkiClientVerifier::builder(roots).build().map_err(|e| {
            KeystoreError::KeyManagerInitError(format!("Failed to build client verifier: {}", e))
        })?;
        ServerConfig::builder().with_client_cert_verifier(verifier)
    };

    Ok(Arc::new(builder.with_cert_resolver(key_manager)))
}
