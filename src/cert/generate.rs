//! Key pair and signing request generation.
//!
//! Gateways often need a fresh device key before any CA is involved. This
//! module creates a key with a self-signed certificate, ready to be stored as
//! a [`PrivateKeyEntry`], and builds PKCS#10 requests for stored keys so a CA
//! can issue the real certificate later.

use crate::cert::builder::{parse_subject, set_validity};
use crate::error::{KeystoreError, Result};
use crate::storage::entry::PrivateKeyEntry;
use rcgen::{Certificate, CertificateParams, IsCa, KeyPair, SignatureAlgorithm};
use std::fmt;
use std::str::FromStr;

/// Key algorithms available for generated key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

impl KeyAlgorithm {
    fn signature_algorithm(self) -> &'static SignatureAlgorithm {
        match self {
            KeyAlgorithm::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            KeyAlgorithm::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            KeyAlgorithm::Ed25519 => &rcgen::PKCS_ED25519,
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KeystoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EC" | "ECDSA" | "P256" | "EC-P256" | "SECP256R1" => Ok(KeyAlgorithm::EcdsaP256),
            "P384" | "EC-P384" | "SECP384R1" => Ok(KeyAlgorithm::EcdsaP384),
            "ED25519" => Ok(KeyAlgorithm::Ed25519),
            _ => Err(KeystoreError::InvalidArgument(format!(
                "Unsupported key algorithm: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyAlgorithm::EcdsaP256 => "EC-P256",
            KeyAlgorithm::EcdsaP384 => "EC-P384",
            KeyAlgorithm::Ed25519 => "Ed25519",
        };
        f.write_str(name)
    }
}

/// Generate a new private key and a self-signed certificate for it.
///
/// # Example
///
/// ```
/// use gatekeystore::cert::generate::{generate_key_pair, KeyAlgorithm};
///
/// # fn example() -> gatekeystore::error::Result<()> {
/// let entry = generate_key_pair(KeyAlgorithm::EcdsaP256, "CN=gateway-01,O=Edge", 365)?;
/// assert_eq!(entry.certificate_chain().len(), 1);
/// # Ok(())
/// # }
/// ```
pub fn generate_key_pair(
    algorithm: KeyAlgorithm,
    subject: &str,
    validity_days: u32,
) -> Result<PrivateKeyEntry> {
    let distinguished_name = parse_subject(subject)?;

    let key_pair = KeyPair::generate(algorithm.signature_algorithm()).map_err(|e| {
        KeystoreError::CertificateError(format!("Failed to generate {} key: {}", algorithm, e))
    })?;
    let private_key = key_pair.serialize_der();

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name;
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        rcgen::KeyUsagePurpose::DigitalSignature,
        rcgen::KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![
        rcgen::ExtendedKeyUsagePurpose::ServerAuth,
        rcgen::ExtendedKeyUsagePurpose::ClientAuth,
    ];
    params.alg = algorithm.signature_algorithm();
    set_validity(&mut params, validity_days);
    params.key_pair = Some(key_pair);

    let certificate = Certificate::from_params(params).map_err(|e| {
        KeystoreError::CertificateError(format!("Failed to create certificate: {}", e))
    })?;
    let certificate_der = certificate.serialize_der().map_err(|e| {
        KeystoreError::CertificateError(format!("Failed to serialize certificate: {}", e))
    })?;

    PrivateKeyEntry::new(private_key, vec![certificate_der])
}

/// Build a PEM encoded PKCS#10 signing request for a stored private key.
///
/// # Example
///
/// ```
/// use gatekeystore::cert::generate::{generate_csr, generate_key_pair, KeyAlgorithm};
///
/// # fn example() -> gatekeystore::error::Result<()> {
/// let entry = generate_key_pair(KeyAlgorithm::EcdsaP256, "CN=gateway-01", 365)?;
/// let csr = generate_csr(&entry, "CN=gateway-01,O=Edge")?;
/// assert!(csr.contains("BEGIN CERTIFICATE REQUEST"));
/// # Ok(())
/// # }
/// ```
pub fn generate_csr(entry: &PrivateKeyEntry, subject: &str) -> Result<String> {
    let distinguished_name = parse_subject(subject)?;

    let key_pair = KeyPair::from_der(entry.private_key()).map_err(|e| {
        KeystoreError::CertificateError(format!("Unsupported private key: {}", e))
    })?;
    let alg = key_pair.compatible_algs().next().ok_or_else(|| {
        KeystoreError::CertificateError("No signature algorithm fits the private key".to_string())
    })?;

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name;
    params.alg = alg;
    params.key_pair = Some(key_pair);

    let request = Certificate::from_params(params).map_err(|e| {
        KeystoreError::CertificateError(format!("Failed to prepare signing request: {}", e))
    })?;

    request.serialize_request_pem().map_err(|e| {
        KeystoreError::CertificateError(format!("Failed to serialize signing request: {}", e))
    })
}
