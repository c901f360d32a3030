//! Builds the ordered extension set of a self-signed certificate.
//!
//! The default set, all non-critical, is:
//!
//! 1. Authority Key Identifier
//! 2. Basic Constraints (CA, no path length)
//! 3. Key Usage
//! 4. Extended Key Usage (client and server auth)
//! 5. Subject Alternative Name, followed by Subject Key Identifier
//!
//! Each of the five slots can be replaced through [`ExtensionOverrides`]
//! without touching the others or the surrounding pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, trace};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::extensions::{
    AltName, AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtensionValue,
    KeyPurpose, KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier, key_identifier,
};
use crate::cert::params::{CanonicalRequest, ExtensionParam};
use crate::error::{PeerCertError, Result};

/// Position of an extension builder in the fixed assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtensionSlot {
    AuthorityKeyIdentifier,
    BasicConstraints,
    KeyUsage,
    ExtendedKeyUsage,
    /// Subject Alternative Name plus Subject Key Identifier.
    SubjectAltName,
}

impl ExtensionSlot {
    pub const ORDER: [ExtensionSlot; 5] = [
        ExtensionSlot::AuthorityKeyIdentifier,
        ExtensionSlot::BasicConstraints,
        ExtensionSlot::KeyUsage,
        ExtensionSlot::ExtendedKeyUsage,
        ExtensionSlot::SubjectAltName,
    ];
}

/// Inputs available to every extension builder.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionContext<'a> {
    pub request: &'a CanonicalRequest,
    pub subject_public_key_info: &'a SubjectPublicKeyInfoOwned,
    /// SHA-1 key identifier of the subject (and, self-signed, the issuer) key.
    pub key_identifier: &'a [u8],
}

/// Replacement builder for one slot. It may return any number of extensions,
/// including none to drop the slot.
pub type ExtensionHook =
    Arc<dyn Fn(&ExtensionContext<'_>) -> Result<Vec<ExtensionParam>> + Send + Sync>;

/// Per-slot replacements for the default builders.
#[derive(Clone, Default)]
pub struct ExtensionOverrides {
    hooks: BTreeMap<ExtensionSlot, ExtensionHook>,
}

impl ExtensionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the builder for `slot`.
    pub fn with<F>(mut self, slot: ExtensionSlot, hook: F) -> Self
    where
        F: Fn(&ExtensionContext<'_>) -> Result<Vec<ExtensionParam>> + Send + Sync + 'static,
    {
        self.hooks.insert(slot, Arc::new(hook));
        self
    }

    pub fn get(&self, slot: ExtensionSlot) -> Option<&ExtensionHook> {
        self.hooks.get(&slot)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for ExtensionOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

/// Assembles extensions in slot order, consulting overrides first.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionAssembler<'a> {
    overrides: &'a ExtensionOverrides,
}

impl<'a> ExtensionAssembler<'a> {
    pub fn new(overrides: &'a ExtensionOverrides) -> Self {
        Self { overrides }
    }

    /// Builds the full extension list. Any failing slot aborts the whole set.
    pub fn assemble(
        &self,
        request: &CanonicalRequest,
        subject_public_key_info: &SubjectPublicKeyInfoOwned,
    ) -> Result<Vec<ExtensionParam>> {
        let key_id = key_identifier(subject_public_key_info);
        trace!("subject key identifier {key_id:02x?}");
        let ctx = ExtensionContext {
            request,
            subject_public_key_info,
            key_identifier: &key_id,
        };

        let mut extensions = Vec::new();
        for slot in ExtensionSlot::ORDER {
            let built = match self.overrides.get(slot) {
                Some(hook) => {
                    debug!("building {slot:?} with an override");
                    hook(&ctx)?
                }
                None => default_extensions(slot, &ctx)?,
            };
            extensions.extend(built);
        }
        debug!("assembled {} extensions", extensions.len());
        Ok(extensions)
    }
}

/// The built-in builder for `slot`.
pub fn default_extensions(slot: ExtensionSlot, ctx: &ExtensionContext<'_>) -> Result<Vec<ExtensionParam>> {
    match slot {
        ExtensionSlot::AuthorityKeyIdentifier => Ok(vec![authority_key_identifier(ctx)?]),
        ExtensionSlot::BasicConstraints => Ok(vec![basic_constraints()?]),
        ExtensionSlot::KeyUsage => Ok(vec![key_usage()?]),
        ExtensionSlot::ExtendedKeyUsage => Ok(vec![extended_key_usage()?]),
        ExtensionSlot::SubjectAltName => Ok(vec![
            subject_alt_name(ctx.request)?,
            subject_key_identifier(ctx)?,
        ]),
    }
}

/// Same key identifier as the subject: the certificate signs itself.
pub fn authority_key_identifier(ctx: &ExtensionContext<'_>) -> Result<ExtensionParam> {
    let aki = AuthorityKeyIdentifier(ctx.key_identifier.to_vec());
    ExtensionParam::from_extension(&aki, false)
}

/// Marks the certificate as a CA even though it serves as an end-entity
/// identity. Peers that validate these certificates expect the flag.
pub fn basic_constraints() -> Result<ExtensionParam> {
    let basic_constraints = BasicConstraints {
        ca: true,
        path_len: None,
    };
    ExtensionParam::from_extension(&basic_constraints, false)
}

pub fn key_usage() -> Result<ExtensionParam> {
    let flags = KeyUsages::DigitalSignature
        | KeyUsages::NonRepudiation
        | KeyUsages::KeyEncipherment
        | KeyUsages::DataEncipherment
        | KeyUsages::KeyAgreement
        | KeyUsages::KeyCertSign;
    ExtensionParam::from_extension(&KeyUsage(flags), false)
}

pub fn extended_key_usage() -> Result<ExtensionParam> {
    let eku = ExtendedKeyUsage(vec![KeyPurpose::ClientAuth, KeyPurpose::ServerAuth]);
    ExtensionParam::from_extension(&eku, false)
}

/// Application URI first, then DNS names, then IP addresses.
pub fn subject_alt_name(request: &CanonicalRequest) -> Result<ExtensionParam> {
    let not_ia5 = |field: String, value: &str| {
        PeerCertError::extension(
            SubjectAltName::NAME,
            format!("{field} `{value}` is not an IA5String"),
        )
    };

    let mut names = Vec::with_capacity(1 + request.dns_names.len() + request.ip_addresses.len());
    if !request.application_uri.is_ascii() {
        return Err(not_ia5("application_uri".into(), &request.application_uri));
    }
    names.push(AltName::Uri(request.application_uri.clone()));
    for (index, dns) in request.dns_names.iter().enumerate() {
        if !dns.is_ascii() {
            return Err(not_ia5(format!("dns_names[{index}]"), dns));
        }
        names.push(AltName::Dns(dns.clone()));
    }
    for (index, ip) in request.ip_addresses.iter().enumerate() {
        let addr: IpAddr = ip.parse().map_err(|e| {
            PeerCertError::extension(
                SubjectAltName::NAME,
                format!("ip_addresses[{index}] `{ip}` is not an IP address: {e}"),
            )
        })?;
        names.push(AltName::Ip(addr));
    }
    ExtensionParam::from_extension(&SubjectAltName(names), false)
}

pub fn subject_key_identifier(ctx: &ExtensionContext<'_>) -> Result<ExtensionParam> {
    ExtensionParam::from_extension(&SubjectKeyIdentifier(ctx.key_identifier.to_vec()), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::{DistinguishedName, ValidityPeriod};
    use crate::key::KeyPair;
    use const_oid::db::rfc5280::{
        ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_EXT_KEY_USAGE,
        ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER,
    };
    use time::UtcOffset;
    use time::macros::date;

    fn canonical(ip_addresses: Vec<String>) -> CanonicalRequest {
        CanonicalRequest {
            subject: DistinguishedName::builder()
                .common_name("test")
                .organization("o")
                .organizational_unit("ou")
                .locality("l")
                .state("st")
                .country_code("US")
                .build(),
            validity: ValidityPeriod::of_years(1)
                .resolve_at(date!(2025 - 01 - 01), UtcOffset::UTC)
                .unwrap(),
            application_uri: "urn:test:app".into(),
            dns_names: vec!["localhost".into()],
            ip_addresses,
        }
    }

    #[test]
    fn test_default_order_and_criticality() {
        let key = KeyPair::generate_ecdsa_p256();
        let spki = key.as_spki().unwrap();
        let overrides = ExtensionOverrides::new();
        let extensions = ExtensionAssembler::new(&overrides)
            .assemble(&canonical(vec!["127.0.0.1".into()]), &spki)
            .unwrap();
        let oids: Vec<_> = extensions.iter().map(|e| e.oid).collect();
        assert_eq!(
            oids,
            vec![
                ID_CE_AUTHORITY_KEY_IDENTIFIER,
                ID_CE_BASIC_CONSTRAINTS,
                ID_CE_KEY_USAGE,
                ID_CE_EXT_KEY_USAGE,
                ID_CE_SUBJECT_ALT_NAME,
                ID_CE_SUBJECT_KEY_IDENTIFIER,
            ]
        );
        assert!(extensions.iter().all(|e| !e.critical));
    }

    #[test]
    fn test_authority_and_subject_key_ids_match() {
        let key = KeyPair::generate_ecdsa_p256();
        let spki = key.as_spki().unwrap();
        let overrides = ExtensionOverrides::new();
        let extensions = ExtensionAssembler::new(&overrides)
            .assemble(&canonical(vec![]), &spki)
            .unwrap();
        let aki: AuthorityKeyIdentifier = extensions[0].to_extension().unwrap();
        let ski: SubjectKeyIdentifier = extensions[5].to_extension().unwrap();
        assert_eq!(aki.0, ski.0);
        assert_eq!(ski.0, key_identifier(&spki));
        assert_eq!(ski.0.len(), 20);
    }

    #[test]
    fn test_malformed_ip_fails_without_partial_output() {
        let key = KeyPair::generate_ecdsa_p256();
        let spki = key.as_spki().unwrap();
        let overrides = ExtensionOverrides::new();
        let err = ExtensionAssembler::new(&overrides)
            .assemble(&canonical(vec!["10.0.0.1".into(), "300.1.1.1".into()]), &spki)
            .unwrap_err();
        match err {
            PeerCertError::ExtensionEncodingError { extension, reason } => {
                assert_eq!(extension, "subjectAltName");
                assert!(reason.contains("ip_addresses[1]"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_ip_with_surrounding_whitespace_is_rejected() {
        let err = subject_alt_name(&canonical(vec![" 127.0.0.1".into()])).unwrap_err();
        match err {
            PeerCertError::ExtensionEncodingError { extension, reason } => {
                assert_eq!(extension, "subjectAltName");
                assert!(reason.contains("ip_addresses[0]"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_non_ascii_dns_name_is_named_by_index() {
        let mut request = canonical(vec![]);
        request.dns_names.push("bücher.example".into());
        let err = subject_alt_name(&request).unwrap_err();
        assert!(matches!(
            err,
            PeerCertError::ExtensionEncodingError { extension: "subjectAltName", ref reason }
                if reason.contains("dns_names[1]")
        ));
    }

    #[test]
    fn test_override_replaces_single_slot() {
        let key = KeyPair::generate_ecdsa_p256();
        let spki = key.as_spki().unwrap();
        let overrides = ExtensionOverrides::new()
            .with(ExtensionSlot::BasicConstraints, |_| {
                let end_entity = BasicConstraints::default();
                Ok(vec![ExtensionParam::from_extension(&end_entity, true)?])
            })
            .with(ExtensionSlot::ExtendedKeyUsage, |_| Ok(vec![]));
        let extensions = ExtensionAssembler::new(&overrides)
            .assemble(&canonical(vec![]), &spki)
            .unwrap();

        assert_eq!(extensions.len(), 5);
        assert_eq!(extensions[1].oid, ID_CE_BASIC_CONSTRAINTS);
        assert!(extensions[1].critical);
        let bc: BasicConstraints = extensions[1].to_extension().unwrap();
        assert!(!bc.ca);
        assert!(extensions.iter().all(|e| e.oid != ID_CE_EXT_KEY_USAGE));
    }

    #[test]
    fn test_override_error_aborts_assembly() {
        let key = KeyPair::generate_ecdsa_p256();
        let spki = key.as_spki().unwrap();
        let overrides = ExtensionOverrides::new().with(ExtensionSlot::KeyUsage, |_| {
            Err(PeerCertError::extension("keyUsage", "rejected by policy"))
        });
        let result = ExtensionAssembler::new(&overrides).assemble(&canonical(vec![]), &spki);
        assert!(matches!(
            result,
            Err(PeerCertError::ExtensionEncodingError { extension: "keyUsage", .. })
        ));
    }
}
