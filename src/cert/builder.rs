//! Shared pieces of certificate and signing-request construction.

use crate::error::{KeystoreError, Result};
use rcgen::{CertificateParams, DistinguishedName, DnType};
use time::{Duration, OffsetDateTime};

/// OID of the X.520 serialNumber attribute, used for device serials.
const OID_SERIAL_NUMBER: &[u64] = &[2, 5, 4, 5];
/// OID of domainComponent.
const OID_DOMAIN_COMPONENT: &[u64] = &[0, 9, 2342, 19200300, 100, 1, 25];

fn attribute_type(name: &str) -> Option<DnType> {
    let dn_type = match name.to_ascii_uppercase().as_str() {
        "CN" => DnType::CommonName,
        "C" => DnType::CountryName,
        "O" => DnType::OrganizationName,
        "OU" => DnType::OrganizationalUnitName,
        "ST" | "S" => DnType::StateOrProvinceName,
        "L" => DnType::LocalityName,
        "SERIALNUMBER" => DnType::CustomDnType(OID_SERIAL_NUMBER.to_vec()),
        "DC" => DnType::CustomDnType(OID_DOMAIN_COMPONENT.to_vec()),
        _ => return None,
    };
    Some(dn_type)
}

/// Parse a subject such as `"CN=gateway-01,O=Edge,SERIALNUMBER=42"`.
///
/// Attributes keep the order they are written in.
///
/// ```
/// use gatekeystore::cert::builder::parse_subject;
///
/// let dn = parse_subject("CN=gateway-01, O=Edge").unwrap();
/// assert_eq!(dn.iter().count(), 2);
/// ```
pub fn parse_subject(subject: &str) -> Result<DistinguishedName> {
    if subject.trim().is_empty() {
        return Err(KeystoreError::InvalidArgument(
            "Subject cannot be empty".to_string(),
        ));
    }

    let mut dn = DistinguishedName::new();
    for attribute in subject.split(',').map(str::trim) {
        let (name, value) = attribute.split_once('=').ok_or_else(|| {
            KeystoreError::InvalidArgument(format!("Invalid subject attribute: {}", attribute))
        })?;
        let (name, value) = (name.trim(), value.trim());

        let dn_type = attribute_type(name).ok_or_else(|| {
            KeystoreError::InvalidArgument(format!("Unknown DN type: {}", name))
        })?;
        if value.is_empty() {
            return Err(KeystoreError::InvalidArgument(format!(
                "Subject attribute {} has no value",
                name
            )));
        }

        dn.push(dn_type, value);
    }

    Ok(dn)
}

/// Make `params` valid for `days` days from now.
pub fn set_validity(params: &mut CertificateParams, days: u32) {
    let not_before = OffsetDateTime::now_utc();
    params.not_before = not_before;
    params.not_after = not_before + Duration::days(i64::from(days));
}
