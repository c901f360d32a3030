pub mod extensions;
pub mod params;

use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::ExtensionValue;
use params::{DistinguishedName, ExtensionParam, Validity};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{PeerCertError, Result};
use crate::key::{KeyAlgorithm, PublicKey};

/// Certificate signature schemes. RSA schemes use PKCS#1 v1.5 padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Sha256WithRSA,
    Sha384WithRSA,
    Sha512WithRSA,
    Sha256WithECDSA,
    Sha384WithECDSA,
    Sha512WithECDSA,
}

impl SignatureAlgorithm {
    /// The key family this scheme signs with.
    pub fn key_algorithm(self) -> KeyAlgorithm {
        match self {
            SignatureAlgorithm::Sha256WithRSA
            | SignatureAlgorithm::Sha384WithRSA
            | SignatureAlgorithm::Sha512WithRSA => KeyAlgorithm::Rsa,
            SignatureAlgorithm::Sha256WithECDSA
            | SignatureAlgorithm::Sha384WithECDSA
            | SignatureAlgorithm::Sha512WithECDSA => KeyAlgorithm::Ec,
        }
    }

    pub fn oid(self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sha512WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_512,
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// RSA schemes carry an explicit NULL parameter (RFC 4055); ECDSA schemes
    /// omit the parameters (RFC 5758).
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value.key_algorithm() {
            KeyAlgorithm::Rsa => Some(der::asn1::AnyRef::NULL.into()),
            KeyAlgorithm::Ec => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = PeerCertError;

    fn try_from(value: &AlgorithmIdentifierOwned) -> Result<Self> {
        [
            SignatureAlgorithm::Sha256WithRSA,
            SignatureAlgorithm::Sha384WithRSA,
            SignatureAlgorithm::Sha512WithRSA,
            SignatureAlgorithm::Sha256WithECDSA,
            SignatureAlgorithm::Sha384WithECDSA,
            SignatureAlgorithm::Sha512WithECDSA,
        ]
        .into_iter()
        .find(|alg| alg.oid() == value.oid)
        .ok_or_else(|| {
            PeerCertError::DecodingError(format!("Unsupported signature algorithm {}", value.oid))
        })
    }
}

/// A generated or parsed X.509 certificate.
///
/// Instances are immutable once produced by the generator; the accessors
/// below only read the encoded structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PeerCertError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| PeerCertError::EncodingError(e.to_string()))
    }

    /// Parses a DER-encoded certificate.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der_bytes)?,
        })
    }

    /// Parses a PEM-encoded certificate.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_pem(pem)?,
        })
    }

    /// Big-endian serial number bytes as encoded.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    /// Decodes the subject into its six attributes.
    pub fn subject_dn(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(self.subject())
    }

    /// True when issuer and subject are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.issuer() == self.subject()
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: time_to_offset(&validity.not_before),
            not_after: time_to_offset(&validity.not_after),
        }
    }

    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(self.subject_public_key_info())
    }

    /// The outer signature algorithm.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    pub fn signature(&self) -> &[u8] {
        self.inner.signature.raw_bytes()
    }

    /// Extensions in encoded order.
    pub fn extension_params(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Checks the signature against the certificate's own public key.
    pub fn verify_self_signed(&self) -> Result<()> {
        let tbs = self
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| PeerCertError::EncodingError(e.to_string()))?;
        crate::signer::verify(
            &self.public_key()?,
            self.signature_algorithm()?,
            &tbs,
            self.signature(),
        )
    }

    /// Decodes the first extension of type `E`, if present.
    pub fn extension<E: ExtensionValue>(&self) -> Result<Option<E>> {
        self.extension_params()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension::<E>())
            .transpose()
    }
}

fn time_to_offset(time: &x509_cert::time::Time) -> OffsetDateTime {
    match time {
        x509_cert::time::Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
        x509_cert::time::Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
    }
}
