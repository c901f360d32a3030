//! # PeerCert - Self-Signed Certificate Generation for Network Peers
//!
//! PeerCert produces self-signed X.509v3 certificates for peers that bootstrap
//! their own transport identity without a certificate authority. It is built
//! entirely on RustCrypto libraries.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 1024 to 8192 bits
//! - **ECDSA**: P-256, P-384 and P-521 curves
//!
//! ## What a Generated Certificate Contains
//!
//! - Subject and issuer set to the same distinguished name (CN, O, OU, L, ST, C)
//! - Validity from local midnight today to local midnight at the end of the period
//! - A serial number derived from the current time in milliseconds
//! - Extensions, all non-critical, in this order: Authority Key Identifier,
//!   Basic Constraints (CA), Key Usage, Extended Key Usage (client and server
//!   auth), Subject Alternative Name (URI, DNS names, IP addresses) and
//!   Subject Key Identifier
//! - A SHA256withRSA signature unless a different [`signer::SignaturePolicy`] is chosen
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peercert::{
//!     cert::params::{DistinguishedName, SelfSignedRequest, ValidityPeriod},
//!     generator::SelfSignedCertificateGenerator,
//!     key::{KeyAlgorithm, KeyPair},
//! };
//!
//! # fn main() -> Result<(), peercert::error::PeerCertError> {
//! peercert::provider::install_default()?;
//!
//! let key_pair = KeyPair::generate(KeyAlgorithm::Rsa, 2048)?;
//!
//! let subject = DistinguishedName::builder()
//!     .common_name("peer-01")
//!     .organization("Example Corp")
//!     .organizational_unit("Devices")
//!     .locality("Portland")
//!     .state("OR")
//!     .country_code("US")
//!     .build();
//!
//! let request = SelfSignedRequest::builder()
//!     .validity_period(ValidityPeriod::of_years(1))
//!     .subject(subject)
//!     .application_uri("urn:example:peer-01")
//!     .dns_names(vec!["localhost".to_string()])
//!     .ip_addresses(vec!["127.0.0.1".to_string()])
//!     .build();
//!
//! let certificate = SelfSignedCertificateGenerator::default()
//!     .generate_self_signed(&key_pair, &request)?;
//! println!("{}", certificate.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Signing with EC Keys
//!
//! The default policy always signs with SHA256withRSA and rejects EC keys.
//! Choose [`signer::SignaturePolicy::MatchKey`] to sign with the scheme that
//! fits the key:
//!
//! ```rust,no_run
//! use peercert::generator::{GeneratorPolicy, SelfSignedCertificateGenerator};
//! use peercert::signer::SignaturePolicy;
//!
//! let generator = SelfSignedCertificateGenerator::new(
//!     GeneratorPolicy::builder()
//!         .signature(SignaturePolicy::MatchKey)
//!         .build(),
//! );
//! ```
//!
//! ## Replacing Extensions
//!
//! Each extension slot can be swapped out through
//! [`assembler::ExtensionOverrides`]:
//!
//! ```rust
//! use peercert::assembler::{ExtensionOverrides, ExtensionSlot};
//! use peercert::cert::extensions::BasicConstraints;
//! use peercert::cert::params::ExtensionParam;
//! use peercert::generator::GeneratorPolicy;
//!
//! let overrides = ExtensionOverrides::new().with(ExtensionSlot::BasicConstraints, |_| {
//!     Ok(vec![ExtensionParam::from_extension(&BasicConstraints::default(), true)?])
//! });
//! let policy = GeneratorPolicy::builder().overrides(overrides).build();
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: Key generation and PKCS#8 import
//! - [`cert`]: Certificate structure, parameters and extension codecs
//! - [`assembler`]: Ordered extension assembly with per-slot overrides
//! - [`signer`]: Signature scheme selection and signing
//! - [`generator`]: The end-to-end generation pipeline
//! - [`provider`]: Process-wide crypto provider installation
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level to-be-signed structure and serial numbers

pub mod assembler;
pub mod cert;
pub mod error;
pub mod generator;
pub mod key;
pub mod provider;
pub mod signer;
pub mod tbs_certificate;

pub use generator::generate_self_signed;
