//! Signature production over the DER-encoded to-be-signed certificate.
//!
//! The scheme is chosen by a [`SignaturePolicy`]. The default policy always
//! picks SHA256withRSA and does not adapt to the key: an EC key under the
//! default policy is rejected with [`PeerCertError::SigningError`] before any
//! signing happens. Use [`SignaturePolicy::MatchKey`] to pick a compatible
//! scheme automatically.

use const_oid::AssociatedOid;
use log::{debug, trace};
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::cert::SignatureAlgorithm;
use crate::error::{PeerCertError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::provider;

/// How the signature scheme is picked for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Always use this scheme; incompatible keys are an error.
    Fixed(SignatureAlgorithm),
    /// Use the conventional scheme for the key's algorithm and curve.
    MatchKey,
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        SignaturePolicy::Fixed(SignatureAlgorithm::Sha256WithRSA)
    }
}

impl SignaturePolicy {
    pub fn select(&self, key: &KeyPair) -> SignatureAlgorithm {
        match self {
            SignaturePolicy::Fixed(algorithm) => *algorithm,
            SignaturePolicy::MatchKey => match key {
                KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
                KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
                KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
                KeyPair::EcdsaP521 { .. } => SignatureAlgorithm::Sha512WithECDSA,
            },
        }
    }
}

/// Whether `key` can produce signatures under `algorithm`.
///
/// ECDSA schemes are tied to the curve whose field size matches the digest.
pub fn is_compatible(key: &KeyPair, algorithm: SignatureAlgorithm) -> bool {
    matches!(
        (key, algorithm),
        (
            KeyPair::Rsa { .. },
            SignatureAlgorithm::Sha256WithRSA
                | SignatureAlgorithm::Sha384WithRSA
                | SignatureAlgorithm::Sha512WithRSA
        ) | (KeyPair::EcdsaP256 { .. }, SignatureAlgorithm::Sha256WithECDSA)
            | (KeyPair::EcdsaP384 { .. }, SignatureAlgorithm::Sha384WithECDSA)
            | (KeyPair::EcdsaP521 { .. }, SignatureAlgorithm::Sha512WithECDSA)
    )
}

fn key_label(key: &KeyPair) -> &'static str {
    match key {
        KeyPair::Rsa { .. } => "RSA",
        KeyPair::EcdsaP256 { .. } => "EC P-256",
        KeyPair::EcdsaP384 { .. } => "EC P-384",
        KeyPair::EcdsaP521 { .. } => "EC P-521",
    }
}

/// Signs to-be-signed bytes with one key under one scheme.
#[derive(Debug)]
pub struct Signer<'a> {
    key: &'a KeyPair,
    algorithm: SignatureAlgorithm,
}

impl<'a> Signer<'a> {
    /// Checks that a provider is installed, that it offers `algorithm`, and
    /// that `key` matches it.
    pub fn new(key: &'a KeyPair, algorithm: SignatureAlgorithm) -> Result<Self> {
        let provider = provider::get_default().ok_or_else(|| {
            PeerCertError::SigningError(
                "no crypto provider installed; call provider::install_default() first".into(),
            )
        })?;
        if !provider.supports(algorithm) {
            return Err(PeerCertError::SigningError(format!(
                "{algorithm:?} is not offered by the {} provider",
                provider.name
            )));
        }
        if !is_compatible(key, algorithm) {
            return Err(PeerCertError::SigningError(format!(
                "{algorithm:?} cannot sign with an {} key",
                key_label(key)
            )));
        }
        debug!("signing with {algorithm:?} using an {} key", key_label(key));
        Ok(Self { key, algorithm })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs `data`, returning the signature as it goes into the certificate
    /// BIT STRING (PKCS#1 v1.5 bytes for RSA, DER `Ecdsa-Sig-Value` for ECDSA).
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = match (self.key, self.algorithm) {
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha256WithRSA) => {
                sign_rsa::<Sha256>(private, data)?
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha384WithRSA) => {
                sign_rsa::<Sha384>(private, data)?
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha512WithRSA) => {
                sign_rsa::<Sha512>(private, data)?
            }
            (KeyPair::EcdsaP256 { signing_key, .. }, SignatureAlgorithm::Sha256WithECDSA) => {
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing)?;
                signature.to_der().as_bytes().to_vec()
            }
            (KeyPair::EcdsaP384 { signing_key, .. }, SignatureAlgorithm::Sha384WithECDSA) => {
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing)?;
                signature.to_der().as_bytes().to_vec()
            }
            (KeyPair::EcdsaP521 { signing_key, .. }, SignatureAlgorithm::Sha512WithECDSA) => {
                let signature: p521::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing)?;
                signature.to_der().as_bytes().to_vec()
            }
            (key, algorithm) => {
                return Err(PeerCertError::SigningError(format!(
                    "{algorithm:?} cannot sign with an {} key",
                    key_label(key)
                )));
            }
        };
        trace!("produced {}-byte signature over {} bytes", signature.len(), data.len());
        Ok(signature)
    }
}

fn sign_rsa<D>(private: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
{
    let signing_key = rsa::pkcs1v15::SigningKey::<D>::new(private.clone());
    let signature = signing_key.try_sign(data).map_err(signing)?;
    Ok(signature.to_vec())
}

fn signing(err: rsa::signature::Error) -> PeerCertError {
    PeerCertError::SigningError(err.to_string())
}

/// Verifies `signature` over `data` with `public` under `algorithm`.
pub fn verify(
    public: &PublicKey,
    algorithm: SignatureAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    match (public, algorithm) {
        (PublicKey::Rsa(key), SignatureAlgorithm::Sha256WithRSA) => {
            verify_rsa::<Sha256>(key, data, signature)
        }
        (PublicKey::Rsa(key), SignatureAlgorithm::Sha384WithRSA) => {
            verify_rsa::<Sha384>(key, data, signature)
        }
        (PublicKey::Rsa(key), SignatureAlgorithm::Sha512WithRSA) => {
            verify_rsa::<Sha512>(key, data, signature)
        }
        (PublicKey::EcdsaP256(key), SignatureAlgorithm::Sha256WithECDSA) => {
            let signature = p256::ecdsa::Signature::from_der(signature).map_err(signing)?;
            key.verify(data, &signature).map_err(signing)
        }
        (PublicKey::EcdsaP384(key), SignatureAlgorithm::Sha384WithECDSA) => {
            let signature = p384::ecdsa::Signature::from_der(signature).map_err(signing)?;
            key.verify(data, &signature).map_err(signing)
        }
        (PublicKey::EcdsaP521(key), SignatureAlgorithm::Sha512WithECDSA) => {
            let signature = p521::ecdsa::Signature::from_der(signature).map_err(signing)?;
            key.verify(data, &signature).map_err(signing)
        }
        (_, algorithm) => Err(PeerCertError::SigningError(format!(
            "{algorithm:?} does not match the public key algorithm"
        ))),
    }
}

fn verify_rsa<D>(public: &RsaPublicKey, data: &[u8], signature: &[u8]) -> Result<()>
where
    D: Digest + AssociatedOid,
{
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(public.clone());
    let signature = rsa::pkcs1v15::Signature::try_from(signature).map_err(signing)?;
    verifying_key.verify(data, &signature).map_err(signing)
}
