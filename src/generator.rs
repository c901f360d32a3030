//! Turns a key pair and a [`SelfSignedRequest`] into a signed [`Certificate`].
//!
//! The pipeline runs in a fixed order: normalize the request, allocate a
//! serial, assemble extensions, pick and check the signature scheme, encode
//! the to-be-signed structure, sign it and wrap the result. Any failure ends
//! the call; no partially built certificate escapes.

use bon::Builder;
use der::asn1::BitString;
use der::Encode;
use log::{debug, trace};
use x509_cert::certificate::CertificateInner;

use crate::assembler::{ExtensionAssembler, ExtensionOverrides};
use crate::cert::Certificate;
use crate::cert::params::{CanonicalRequest, DistinguishedName, SelfSignedRequest, ValidityPeriod};
use crate::error::{PeerCertError, Result};
use crate::key::KeyPair;
use crate::signer::{SignaturePolicy, Signer};
use crate::tbs_certificate::{TbsCertificate, time_based_serial};

/// Pluggable parts of certificate generation.
#[derive(Debug, Clone, Default, Builder)]
pub struct GeneratorPolicy {
    #[builder(default)]
    pub signature: SignaturePolicy,
    #[builder(default)]
    pub overrides: ExtensionOverrides,
}

/// Generates self-signed certificates under one [`GeneratorPolicy`].
///
/// Holds no per-call state; one instance can serve any number of calls from
/// any number of threads.
#[derive(Debug, Clone, Default)]
pub struct SelfSignedCertificateGenerator {
    policy: GeneratorPolicy,
}

impl SelfSignedCertificateGenerator {
    pub fn new(policy: GeneratorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GeneratorPolicy {
        &self.policy
    }

    /// Generates a certificate whose validity starts at local midnight today.
    pub fn generate_self_signed(
        &self,
        key_pair: &KeyPair,
        request: &SelfSignedRequest,
    ) -> Result<Certificate> {
        let canonical = request.normalize()?;
        self.generate_canonical(key_pair, &canonical)
    }

    /// Generates a certificate from an already normalized request.
    pub fn generate_canonical(
        &self,
        key_pair: &KeyPair,
        request: &CanonicalRequest,
    ) -> Result<Certificate> {
        let serial_number = time_based_serial();
        let subject_public_key_info = key_pair.as_spki()?;

        let extensions = ExtensionAssembler::new(&self.policy.overrides)
            .assemble(request, &subject_public_key_info)?;

        let algorithm = self.policy.signature.select(key_pair);
        let signer = Signer::new(key_pair, algorithm)?;

        let tbs_cert = TbsCertificate {
            serial_number,
            signature_algorithm: algorithm,
            issuer: request.subject.clone(),
            validity: request.validity.clone(),
            subject: request.subject.clone(),
            subject_public_key_info,
            extensions,
        };
        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner.to_der().map_err(encoding)?;
        trace!("to-be-signed certificate is {} bytes", tbs_der.len());

        let signature = signer.sign(&tbs_der)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: algorithm.into(),
            signature: BitString::from_bytes(&signature).map_err(encoding)?,
        };
        let certificate = Certificate { inner: cert_inner };

        let der = certificate.to_der()?;
        debug!(
            "generated self-signed certificate for CN={} serial={:02x?} ({} bytes)",
            request.subject.common_name,
            certificate.serial_number(),
            der.len()
        );
        Ok(certificate)
    }
}

fn encoding(err: der::Error) -> PeerCertError {
    PeerCertError::EncodingError(err.to_string())
}

/// Generates a self-signed certificate with the default policy.
///
/// SHA256withRSA is always used, so `key_pair` must be an RSA key. The crypto
/// provider must have been installed with
/// [`provider::install_default`](crate::provider::install_default).
///
/// ```rust,no_run
/// use peercert::cert::params::{DistinguishedName, ValidityPeriod};
/// use peercert::key::KeyPair;
///
/// # fn main() -> Result<(), peercert::error::PeerCertError> {
/// peercert::provider::install_default()?;
/// let key_pair = KeyPair::generate_rsa(2048)?;
/// let subject = DistinguishedName::builder()
///     .common_name("test")
///     .organization("Example")
///     .organizational_unit("Dev")
///     .locality("Portland")
///     .state("OR")
///     .country_code("US")
///     .build();
/// let certificate = peercert::generate_self_signed(
///     &key_pair,
///     ValidityPeriod::of_years(1),
///     subject,
///     "urn:test:app",
///     vec!["localhost".into()],
///     vec!["127.0.0.1".into()],
/// )?;
/// println!("{}", certificate.to_pem()?);
/// # Ok(())
/// # }
/// ```
pub fn generate_self_signed(
    key_pair: &KeyPair,
    validity_period: ValidityPeriod,
    subject: DistinguishedName,
    application_uri: impl Into<String>,
    dns_names: Vec<String>,
    ip_addresses: Vec<String>,
) -> Result<Certificate> {
    let request = SelfSignedRequest::builder()
        .validity_period(validity_period)
        .subject(subject)
        .application_uri(application_uri)
        .dns_names(dns_names)
        .ip_addresses(ip_addresses)
        .build();
    SelfSignedCertificateGenerator::default().generate_self_signed(key_pair, &request)
}
