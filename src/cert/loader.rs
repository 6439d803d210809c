//! Entry loading from PEM files.
//!
//! This module turns PEM encoded keys and certificates into keystore entries
//! by extracting their DER contents.

use crate::error::{KeystoreError, Result};
use crate::storage::entry::{PrivateKeyEntry, TrustedCertificateEntry};
use rustls_pemfile::Item;
use std::io::Cursor;
use zeroize::Zeroizing;

/// Load a single DER certificate from a PEM string.
///
/// # Example
///
/// ```rust,no_run
/// use gatekeystore::cert::loader::load_certificate_from_pem;
///
/// # fn example() -> gatekeystore::error::Result<()> {
/// let pem = std::fs::read_to_string("cert.pem")?;
/// let der = load_certificate_from_pem(&pem)?;
/// # Ok(())
/// # }
/// ```
pub fn load_certificate_from_pem(pem_str: &str) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(pem_str.as_bytes());

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| KeystoreError::PemError(format!("Failed to read PEM: {}", e)))?
        {
            Some(Item::X509Certificate(cert_der)) => return Ok(cert_der.to_vec()),
            Some(_) => continue,
            None => {
                return Err(KeystoreError::PemError(
                    "PEM does not contain a certificate".to_string(),
                ))
            }
        }
    }
}

/// Load every certificate from a PEM string, in order.
///
/// Non-certificate sections are skipped.
pub fn load_certificates_from_pem(pem_str: &str) -> Result<Vec<Vec<u8>>> {
    let mut cursor = Cursor::new(pem_str.as_bytes());
    let mut certificates = Vec::new();

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| KeystoreError::PemError(format!("Failed to read PEM: {}", e)))?
        {
            Some(Item::X509Certificate(cert_der)) => {
                certificates.push(cert_der.to_vec());
            }
            Some(_) => continue,
            None => break,
        }
    }

    if certificates.is_empty() {
        return Err(KeystoreError::PemError(
            "No certificates found in PEM".to_string(),
        ));
    }

    Ok(certificates)
}

/// Load a PKCS#8 private key from a PEM string.
///
/// PKCS#1 and SEC1 keys are rejected; convert them to PKCS#8 first.
pub fn load_private_key_from_pem(pem_str: &str) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(pem_str.as_bytes());

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| KeystoreError::PemError(format!("Failed to read PEM: {}", e)))?
        {
            Some(Item::Pkcs8Key(key)) => return Ok(key.secret_pkcs8_der().to_vec()),
            Some(Item::Pkcs1Key(_)) | Some(Item::Sec1Key(_)) => {
                return Err(KeystoreError::PemError(
                    "Only PKCS#8 private keys are supported".to_string(),
                ))
            }
            Some(_) => continue,
            None => {
                return Err(KeystoreError::PemError(
                    "PEM does not contain a private key".to_string(),
                ))
            }
        }
    }
}

/// Build a private key entry from a PEM key and a PEM chain (leaf first).
///
/// # Example
///
/// ```rust,no_run
/// use gatekeystore::cert::loader::private_key_entry_from_pem;
///
/// # fn example() -> gatekeystore::error::Result<()> {
/// let key = std::fs::read_to_string("device.key")?;
/// let chain = std::fs::read_to_string("device-chain.pem")?;
/// let entry = private_key_entry_from_pem(&key, &chain)?;
/// # Ok(())
/// # }
/// ```
pub fn private_key_entry_from_pem(key_pem: &str, chain_pem: &str) -> Result<PrivateKeyEntry> {
    let private_key = load_private_key_from_pem(key_pem)?;
    let chain = load_certificates_from_pem(chain_pem)?;
    PrivateKeyEntry::new(private_key, chain)
}

/// Build a trusted certificate entry from the first certificate in a PEM string.
pub fn trusted_certificate_from_pem(pem_str: &str) -> Result<TrustedCertificateEntry> {
    TrustedCertificateEntry::new(load_certificate_from_pem(pem_str)?)
}

/// Encode a DER certificate as PEM.
pub fn certificate_to_pem(der: &[u8]) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der.to_vec()))
}

/// Encode the private key of an entry as a PKCS#8 PEM.
pub fn private_key_to_pem(entry: &PrivateKeyEntry) -> Zeroizing<String> {
    Zeroizing::new(pem::encode(&pem::Pem::new(
        "PRIVATE KEY",
        entry.private_key().to_vec(),
    )))
}

/// Encode the certificate chain of an entry as concatenated PEM blocks.
pub fn certificate_chain_to_pem(entry: &PrivateKeyEntry) -> String {
    entry
        .certificate_chain()
        .iter()
        .map(|certificate| certificate_to_pem(certificate))
        .collect()
}
