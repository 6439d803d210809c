//! Keystore entries.
//!
//! An entry is either a private key with its certificate chain or a single
//! trusted certificate. All key and certificate material is DER encoded.

use crate::error::{KeystoreError, Result};
use der::Decode;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::fmt;
use x509_cert::Certificate;
use zeroize::Zeroizing;

/// A private key and the certificate chain that goes with it.
///
/// The first certificate in the chain is the one issued for the key; the
/// rest lead up to the root. The key bytes are wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyEntry {
    private_key: Zeroizing<Vec<u8>>,
    certificate_chain: Vec<Vec<u8>>,
}

impl PrivateKeyEntry {
    /// Create an entry from a PKCS#8 DER private key and a DER chain.
    ///
    /// Fails if the key is empty, the chain is empty, or any certificate is
    /// not a valid X.509 certificate.
    pub fn new(private_key: Vec<u8>, certificate_chain: Vec<Vec<u8>>) -> Result<Self> {
        let private_key = Zeroizing::new(private_key);
        if private_key.is_empty() {
            return Err(KeystoreError::InvalidArgument(
                "Private key cannot be empty".to_string(),
            ));
        }
        if certificate_chain.is_empty() {
            return Err(KeystoreError::InvalidArgument(
                "Certificate chain cannot be empty".to_string(),
            ));
        }
        for certificate in &certificate_chain {
            validate_certificate(certificate)?;
        }

        Ok(Self {
            private_key,
            certificate_chain,
        })
    }

    /// The PKCS#8 DER private key.
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.certificate_chain
    }

    /// The certificate issued for this key.
    pub fn leaf_certificate(&self) -> &[u8] {
        // The constructor guarantees a non-empty chain.
        self.certificate_chain
            .first()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The private key as a rustls key.
    pub fn private_key_der(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.private_key.to_vec()))
    }

    /// The certificate chain as rustls certificates.
    pub fn certificate_chain_der(&self) -> Vec<CertificateDer<'static>> {
        self.certificate_chain
            .iter()
            .map(|certificate| CertificateDer::from(certificate.clone()))
            .collect()
    }
}

impl fmt::Debug for PrivateKeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyEntry")
            .field("chain_length", &self.certificate_chain.len())
            .finish_non_exhaustive()
    }
}

/// A certificate trusted on its own, without a private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificateEntry {
    certificate: Vec<u8>,
}

impl TrustedCertificateEntry {
    /// Create an entry from a DER certificate.
    pub fn new(certificate: Vec<u8>) -> Result<Self> {
        validate_certificate(&certificate)?;
        Ok(Self { certificate })
    }

    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    pub fn certificate_der(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.certificate.clone())
    }
}

/// A keystore entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    PrivateKey(PrivateKeyEntry),
    TrustedCertificate(TrustedCertificateEntry),
}

impl Entry {
    pub fn is_private_key(&self) -> bool {
        matches!(self, Entry::PrivateKey(_))
    }

    pub fn as_private_key(&self) -> Option<&PrivateKeyEntry> {
        match self {
            Entry::PrivateKey(entry) => Some(entry),
            Entry::TrustedCertificate(_) => None,
        }
    }

    pub fn as_trusted_certificate(&self) -> Option<&TrustedCertificateEntry> {
        match self {
            Entry::TrustedCertificate(entry) => Some(entry),
            Entry::PrivateKey(_) => None,
        }
    }
}

impl From<PrivateKeyEntry> for Entry {
    fn from(entry: PrivateKeyEntry) -> Self {
        Entry::PrivateKey(entry)
    }
}

impl From<TrustedCertificateEntry> for Entry {
    fn from(entry: TrustedCertificateEntry) -> Self {
        Entry::TrustedCertificate(entry)
    }
}

/// Parse a DER certificate, failing if it is not X.509.
pub(crate) fn validate_certificate(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der)
        .map_err(|e| KeystoreError::CertificateError(format!("Invalid X.509 certificate: {}", e)))
}

/// The subject distinguished name of a DER certificate, e.g. `CN=gateway`.
pub fn certificate_subject(der: &[u8]) -> Result<String> {
    let certificate = validate_certificate(der)?;
    Ok(certificate.tbs_certificate.subject.to_string())
}
