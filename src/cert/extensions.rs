//! DER codecs for the extensions carried by a self-signed peer certificate.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::AssociatedOid;
use const_oid::db::rfc5912::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use der::asn1::{Ia5String, OctetString};
use der::oid::ObjectIdentifier;
use der::{Decode, Encode};
use sha1::{Digest, Sha1};
use x509_cert::ext::pkix;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{PeerCertError, Result};

pub use der::flagset::FlagSet;
pub use x509_cert::ext::pkix::KeyUsages;

/// An extension whose `extnValue` contents can be encoded and decoded.
///
/// ```
/// use peercert::cert::extensions::{AltName, ExtensionValue, SubjectAltName};
/// let san = SubjectAltName(vec![AltName::Dns("example.com".to_string())]);
/// let der = san.encode_value().unwrap();
/// assert_eq!(SubjectAltName::decode_value(&der).unwrap(), san);
/// ```
pub trait ExtensionValue: Sized {
    const OID: ObjectIdentifier;

    /// Name used in error messages.
    const NAME: &'static str;

    /// DER bytes that go inside the extension's OCTET STRING.
    fn encode_value(&self) -> Result<Vec<u8>>;

    fn decode_value(der_bytes: &[u8]) -> Result<Self>;
}

fn encode<E: ExtensionValue, T: Encode>(value: &T) -> Result<Vec<u8>> {
    value
        .to_der()
        .map_err(|e| PeerCertError::extension(E::NAME, e))
}

/// Key identifier per RFC 5280 §4.2.1.2 method (1): SHA-1 over the
/// subjectPublicKey BIT STRING contents.
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

/// One entry of a Subject Alternative Name list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltName {
    Uri(String),
    Dns(String),
    Ip(IpAddr),
}

impl AltName {
    fn to_general_name(&self) -> Result<GeneralName> {
        let not_ia5 = |kind: &str, value: &str, e: der::Error| {
            PeerCertError::extension(
                SubjectAltName::NAME,
                format!("{kind} `{value}` is not an IA5String: {e}"),
            )
        };
        match self {
            AltName::Uri(uri) => Ia5String::new(uri)
                .map(GeneralName::UniformResourceIdentifier)
                .map_err(|e| not_ia5("URI", uri, e)),
            AltName::Dns(dns) => Ia5String::new(dns)
                .map(GeneralName::DnsName)
                .map_err(|e| not_ia5("DNS name", dns, e)),
            AltName::Ip(ip) => {
                let octets = match ip {
                    IpAddr::V4(v4) => v4.octets().to_vec(),
                    IpAddr::V6(v6) => v6.octets().to_vec(),
                };
                OctetString::new(octets)
                    .map(GeneralName::IpAddress)
                    .map_err(|e| PeerCertError::extension(SubjectAltName::NAME, e))
            }
        }
    }

    fn from_general_name(name: &GeneralName) -> Result<Self> {
        match name {
            GeneralName::UniformResourceIdentifier(uri) => Ok(AltName::Uri(uri.to_string())),
            GeneralName::DnsName(dns) => Ok(AltName::Dns(dns.to_string())),
            GeneralName::IpAddress(octets) => {
                let octets = octets.as_bytes();
                if let Ok(v4) = <[u8; 4]>::try_from(octets) {
                    Ok(AltName::Ip(Ipv4Addr::from(v4).into()))
                } else if let Ok(v6) = <[u8; 16]>::try_from(octets) {
                    Ok(AltName::Ip(Ipv6Addr::from(v6).into()))
                } else {
                    Err(PeerCertError::DecodingError(format!(
                        "IP address with {} octets",
                        octets.len()
                    )))
                }
            }
            _ => Err(PeerCertError::DecodingError(
                "only URI, DNS and IP alternative names are supported".to_string(),
            )),
        }
    }
}

/// Subject Alternative Name, entries kept in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName(pub Vec<AltName>);

impl ExtensionValue for SubjectAltName {
    const OID: ObjectIdentifier = pkix::SubjectAltName::OID;
    const NAME: &'static str = "subjectAltName";

    fn encode_value(&self) -> Result<Vec<u8>> {
        let names = self
            .0
            .iter()
            .map(AltName::to_general_name)
            .collect::<Result<Vec<_>>>()?;
        encode::<Self, _>(&pkix::SubjectAltName(names))
    }

    fn decode_value(der_bytes: &[u8]) -> Result<Self> {
        let san = pkix::SubjectAltName::from_der(der_bytes)?;
        san.0
            .iter()
            .map(AltName::from_general_name)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// Basic Constraints. `path_len` of `None` leaves the chain length open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub ca: bool,
    pub path_len: Option<u8>,
}

impl ExtensionValue for BasicConstraints {
    const OID: ObjectIdentifier = pkix::BasicConstraints::OID;
    const NAME: &'static str = "basicConstraints";

    fn encode_value(&self) -> Result<Vec<u8>> {
        encode::<Self, _>(&pkix::BasicConstraints {
            ca: self.ca,
            path_len_constraint: self.path_len,
        })
    }

    fn decode_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            ca: bc.ca,
            path_len: bc.path_len_constraint,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ExtensionValue for KeyUsage {
    const OID: ObjectIdentifier = <pkix::KeyUsage as AssociatedOid>::OID;
    const NAME: &'static str = "keyUsage";

    fn encode_value(&self) -> Result<Vec<u8>> {
        encode::<Self, _>(&pkix::KeyUsage(self.0))
    }

    fn decode_value(der_bytes: &[u8]) -> Result<Self> {
        Ok(Self(pkix::KeyUsage::from_der(der_bytes)?.0))
    }
}

/// A key purpose from an Extended Key Usage list.
///
/// Purposes without a dedicated variant decode as [`KeyPurpose::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    ServerAuth,
    ClientAuth,
    Other(ObjectIdentifier),
}

impl KeyPurpose {
    const NAMED: [KeyPurpose; 2] = [KeyPurpose::ServerAuth, KeyPurpose::ClientAuth];

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            KeyPurpose::ServerAuth => ID_KP_SERVER_AUTH,
            KeyPurpose::ClientAuth => ID_KP_CLIENT_AUTH,
            KeyPurpose::Other(oid) => oid,
        }
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Self {
        Self::NAMED
            .into_iter()
            .find(|purpose| purpose.oid() == oid)
            .unwrap_or(KeyPurpose::Other(oid))
    }
}

/// Extended Key Usage, purposes kept in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage(pub Vec<KeyPurpose>);

impl ExtensionValue for ExtendedKeyUsage {
    const OID: ObjectIdentifier = pkix::ExtendedKeyUsage::OID;
    const NAME: &'static str = "extendedKeyUsage";

    fn encode_value(&self) -> Result<Vec<u8>> {
        let oids = self.0.iter().map(|purpose| purpose.oid()).collect();
        encode::<Self, _>(&pkix::ExtendedKeyUsage(oids))
    }

    fn decode_value(der_bytes: &[u8]) -> Result<Self> {
        let eku = pkix::ExtendedKeyUsage::from_der(der_bytes)?;
        Ok(Self(eku.0.into_iter().map(KeyPurpose::from_oid).collect()))
    }
}

/// Authority Key Identifier carrying only `keyIdentifier`.
///
/// The issuer name and serial alternatives are never emitted, and are
/// ignored when decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier(pub Vec<u8>);

impl ExtensionValue for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = pkix::AuthorityKeyIdentifier::OID;
    const NAME: &'static str = "authorityKeyIdentifier";

    fn encode_value(&self) -> Result<Vec<u8>> {
        let key_identifier = OctetString::new(self.0.as_slice())
            .map_err(|e| PeerCertError::extension(Self::NAME, e))?;
        encode::<Self, _>(&pkix::AuthorityKeyIdentifier {
            key_identifier: Some(key_identifier),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        })
    }

    fn decode_value(der_bytes: &[u8]) -> Result<Self> {
        let aki = pkix::AuthorityKeyIdentifier::from_der(der_bytes)?;
        let key_id = aki.key_identifier.ok_or_else(|| {
            PeerCertError::DecodingError("authorityKeyIdentifier has no keyIdentifier".to_string())
        })?;
        Ok(Self(key_id.into_bytes()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ExtensionValue for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = pkix::SubjectKeyIdentifier::OID;
    const NAME: &'static str = "subjectKeyIdentifier";

    fn encode_value(&self) -> Result<Vec<u8>> {
        let key_identifier = OctetString::new(self.0.as_slice())
            .map_err(|e| PeerCertError::extension(Self::NAME, e))?;
        encode::<Self, _>(&pkix::SubjectKeyIdentifier(key_identifier))
    }

    fn decode_value(der_bytes: &[u8]) -> Result<Self> {
        let ski = pkix::SubjectKeyIdentifier::from_der(der_bytes)?;
        Ok(Self(ski.0.into_bytes()))
    }
}
