use std::fmt;

use const_oid::db::rfc5912::{
    ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1, SECP_521_R_1,
};
use const_oid::ObjectIdentifier;
use der::Encode;
use log::debug;
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use p521::ecdsa::{SigningKey as P521SigningKey, VerifyingKey as P521VerifyingKey};
use pkcs8::{DecodePrivateKey, DecodePublicKey, PrivateKeyInfo, SecretDocument};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{PeerCertError, Result};

/// Smallest RSA modulus accepted for generation.
pub const MIN_RSA_BITS: usize = 1024;
/// Largest RSA modulus accepted for generation.
pub const MAX_RSA_BITS: usize = 8192;

/// Asymmetric algorithm family of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
}

/// Supported key types for certificate operations.
///
/// The public half is always derived from the private half, so both sides of
/// a variant belong to the same algorithm.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    EcdsaP521 {
        signing_key: P521SigningKey,
        verifying_key: P521VerifyingKey,
    },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a key pair of the given algorithm family and bit length.
    ///
    /// RSA accepts multiples of 8 between [`MIN_RSA_BITS`] and [`MAX_RSA_BITS`];
    /// EC accepts 256 (P-256), 384 (P-384) and 521 (P-521).
    pub fn generate(algorithm: KeyAlgorithm, bits: usize) -> Result<Self> {
        match (algorithm, bits) {
            (KeyAlgorithm::Rsa, bits)
                if (MIN_RSA_BITS..=MAX_RSA_BITS).contains(&bits) && bits % 8 == 0 =>
            {
                Self::generate_rsa(bits)
            }
            (KeyAlgorithm::Ec, 256) => Ok(Self::generate_ecdsa_p256()),
            (KeyAlgorithm::Ec, 384) => Ok(Self::generate_ecdsa_p384()),
            (KeyAlgorithm::Ec, 521) => Ok(Self::generate_ecdsa_p521()),
            (algorithm, bits) => Err(PeerCertError::UnsupportedAlgorithm(format!(
                "{algorithm:?} with a {bits}-bit key"
            ))),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        debug!("generating RSA-{bits} key pair");
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| PeerCertError::KeyGenerationError(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        debug!("generating ECDSA P-256 key pair");
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        debug!("generating ECDSA P-384 key pair");
        let mut rng = rand_core::OsRng;
        let signing_key = P384SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-521 key pair.
    pub fn generate_ecdsa_p521() -> Self {
        debug!("generating ECDSA P-521 key pair");
        let mut rng = rand_core::OsRng;
        let signing_key = P521SigningKey::random(&mut rng);
        let verifying_key = P521VerifyingKey::from(&signing_key);
        KeyPair::EcdsaP521 {
            signing_key,
            verifying_key,
        }
    }

    /// Load a caller-owned private key from PKCS#8 DER.
    pub fn from_pkcs8_der(der_bytes: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der_bytes)?;
        match info.algorithm.oid {
            RSA_ENCRYPTION => {
                let private = RsaPrivateKey::from_pkcs8_der(der_bytes)?;
                let public = RsaPublicKey::from(&private);
                Ok(KeyPair::Rsa {
                    private: Box::new(private),
                    public,
                })
            }
            ID_EC_PUBLIC_KEY => match info.algorithm.parameters_oid()? {
                SECP_256_R_1 => {
                    let signing_key = P256SigningKey::from_pkcs8_der(der_bytes)?;
                    let verifying_key = signing_key.verifying_key().to_owned();
                    Ok(KeyPair::EcdsaP256 {
                        signing_key,
                        verifying_key,
                    })
                }
                SECP_384_R_1 => {
                    let signing_key = P384SigningKey::from_pkcs8_der(der_bytes)?;
                    let verifying_key = signing_key.verifying_key().to_owned();
                    Ok(KeyPair::EcdsaP384 {
                        signing_key,
                        verifying_key,
                    })
                }
                SECP_521_R_1 => {
                    let secret = p521::SecretKey::from_pkcs8_der(der_bytes)?;
                    let signing_key = P521SigningKey::from_bytes(&secret.to_bytes())
                        .map_err(|e| PeerCertError::DecodingError(e.to_string()))?;
                    let verifying_key = P521VerifyingKey::from(&signing_key);
                    Ok(KeyPair::EcdsaP521 {
                        signing_key,
                        verifying_key,
                    })
                }
                curve => Err(PeerCertError::UnsupportedAlgorithm(format!(
                    "EC curve {curve}"
                ))),
            },
            oid => Err(PeerCertError::UnsupportedAlgorithm(format!(
                "private key algorithm {oid}"
            ))),
        }
    }

    /// Load a caller-owned private key from a PKCS#8 `PRIVATE KEY` PEM block.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let (label, document) = SecretDocument::from_pem(pem)?;
        if label != "PRIVATE KEY" {
            return Err(PeerCertError::DecodingError(format!(
                "expected a PRIVATE KEY PEM block, found {label}"
            )));
        }
        Self::from_pkcs8_der(document.as_bytes())
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa { .. } => KeyAlgorithm::Rsa,
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } | KeyPair::EcdsaP521 { .. } => {
                KeyAlgorithm::Ec
            }
        }
    }

    /// Key size in bits (modulus size for RSA, field size for EC).
    pub fn bits(&self) -> usize {
        match self {
            KeyPair::Rsa { public, .. } => public.size() * 8,
            KeyPair::EcdsaP256 { .. } => 256,
            KeyPair::EcdsaP384 { .. } => 384,
            KeyPair::EcdsaP521 { .. } => 521,
        }
    }

    /// Returns the SubjectPublicKeyInfo of the public half.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        PublicKey::from_key_pair(self).to_spki()
    }
}

/// The public half of a [`KeyPair`], as found in a certificate.
#[derive(Clone)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    EcdsaP521(P521VerifyingKey),
}

// Written by hand because p521's VerifyingKey implements neither Debug nor PartialEq.
impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKey::Rsa(key) => f.debug_tuple("Rsa").field(key).finish(),
            PublicKey::EcdsaP256(key) => f.debug_tuple("EcdsaP256").field(key).finish(),
            PublicKey::EcdsaP384(key) => f.debug_tuple("EcdsaP384").field(key).finish(),
            PublicKey::EcdsaP521(key) => f
                .debug_tuple("EcdsaP521")
                .field(&key.to_encoded_point(false))
                .finish(),
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PublicKey::Rsa(a), PublicKey::Rsa(b)) => a == b,
            (PublicKey::EcdsaP256(a), PublicKey::EcdsaP256(b)) => a == b,
            (PublicKey::EcdsaP384(a), PublicKey::EcdsaP384(b)) => a == b,
            (PublicKey::EcdsaP521(a), PublicKey::EcdsaP521(b)) => a.as_affine() == b.as_affine(),
            _ => false,
        }
    }
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(verifying_key.clone()),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(verifying_key.clone()),
            KeyPair::EcdsaP521 { verifying_key, .. } => PublicKey::EcdsaP521(verifying_key.clone()),
        }
    }

    /// Rebuilds a public key from a certificate's SubjectPublicKeyInfo.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der_bytes = spki.to_der()?;
        match spki.algorithm.oid {
            RSA_ENCRYPTION => Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(
                &der_bytes,
            )?)),
            ID_EC_PUBLIC_KEY => match curve_oid(spki.algorithm.parameters.as_ref())? {
                SECP_256_R_1 => Ok(PublicKey::EcdsaP256(
                    P256VerifyingKey::from_public_key_der(&der_bytes)?,
                )),
                SECP_384_R_1 => Ok(PublicKey::EcdsaP384(
                    P384VerifyingKey::from_public_key_der(&der_bytes)?,
                )),
                SECP_521_R_1 => {
                    let point = spki.subject_public_key.as_bytes().ok_or_else(|| {
                        PeerCertError::DecodingError("EC public key has unused bits".into())
                    })?;
                    P521VerifyingKey::from_sec1_bytes(point)
                        .map(PublicKey::EcdsaP521)
                        .map_err(|e| PeerCertError::DecodingError(e.to_string()))
                }
                curve => Err(PeerCertError::UnsupportedAlgorithm(format!(
                    "EC curve {curve}"
                ))),
            },
            oid => Err(PeerCertError::UnsupportedAlgorithm(format!(
                "public key algorithm {oid}"
            ))),
        }
    }

    /// Encodes the key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(verifying_key.clone())
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(verifying_key.clone())
            }
            PublicKey::EcdsaP521(verifying_key) => {
                // p521's VerifyingKey wrapper lacks EncodePublicKey; encode via PublicKey.
                p521::PublicKey::from_affine(*verifying_key.as_affine())
                    .map_err(|_| x509_cert::spki::Error::KeyMalformed)
                    .and_then(SubjectPublicKeyInfoOwned::from_key)
            }
        };
        spki.map_err(|e| PeerCertError::EncodingError(e.to_string()))
    }
}

fn curve_oid(parameters: Option<&der::Any>) -> Result<ObjectIdentifier> {
    let parameters = parameters
        .ok_or_else(|| PeerCertError::DecodingError("EC key without curve parameters".into()))?;
    Ok(parameters.decode_as::<ObjectIdentifier>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::EncodePrivateKey;

    #[test]
    fn test_generate_rejects_unsupported_combinations() {
        for (algorithm, bits) in [
            (KeyAlgorithm::Ec, 512),
            (KeyAlgorithm::Ec, 2048),
            (KeyAlgorithm::Rsa, 512),
            (KeyAlgorithm::Rsa, 2049),
            (KeyAlgorithm::Rsa, 16384),
        ] {
            let err = KeyPair::generate(algorithm, bits).unwrap_err();
            assert!(
                matches!(err, PeerCertError::UnsupportedAlgorithm(_)),
                "{algorithm:?}/{bits} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_generate_ec_selects_curve_by_bits() {
        let p256 = KeyPair::generate(KeyAlgorithm::Ec, 256).unwrap();
        assert!(matches!(p256, KeyPair::EcdsaP256 { .. }));
        assert_eq!(p256.bits(), 256);

        let p384 = KeyPair::generate(KeyAlgorithm::Ec, 384).unwrap();
        assert!(matches!(p384, KeyPair::EcdsaP384 { .. }));
        assert_eq!(p384.algorithm(), KeyAlgorithm::Ec);

        let p521 = KeyPair::generate(KeyAlgorithm::Ec, 521).unwrap();
        assert!(matches!(p521, KeyPair::EcdsaP521 { .. }));
        assert_eq!(p521.bits(), 521);
    }

    #[test]
    fn test_p521_public_key_spki_roundtrip() {
        let key_pair = KeyPair::generate_ecdsa_p521();
        let spki = key_pair.as_spki().unwrap();
        assert_eq!(der::referenced::OwnedToRef::owned_to_ref(&spki.algorithm).parameters_oid().unwrap(), SECP_521_R_1);
        let public = PublicKey::from_x509spki(&spki).unwrap();
        assert_eq!(public, PublicKey::from_key_pair(&key_pair));
    }

    #[test]
    fn test_import_pkcs8_p521_key() {
        let key_pair = KeyPair::generate_ecdsa_p521();
        let KeyPair::EcdsaP521 { signing_key, .. } = &key_pair else {
            unreachable!()
        };
        let secret = p521::SecretKey::from_bytes(&signing_key.to_bytes()).unwrap();
        let document = secret.to_pkcs8_der().unwrap();
        let imported = KeyPair::from_pkcs8_der(document.as_bytes()).unwrap();
        assert!(matches!(imported, KeyPair::EcdsaP521 { .. }));
        assert_eq!(
            PublicKey::from_key_pair(&imported),
            PublicKey::from_key_pair(&key_pair)
        );
    }

    #[test]
    fn test_public_key_spki_roundtrip() {
        let key_pair = KeyPair::generate_ecdsa_p384();
        let spki = key_pair.as_spki().unwrap();
        let public = PublicKey::from_x509spki(&spki).unwrap();
        assert_eq!(public, PublicKey::from_key_pair(&key_pair));
    }

    #[test]
    fn test_import_pkcs8_ec_key() {
        let key_pair = KeyPair::generate_ecdsa_p256();
        let KeyPair::EcdsaP256 { signing_key, .. } = &key_pair else {
            unreachable!()
        };
        let document = signing_key.to_pkcs8_der().unwrap();
        let imported = KeyPair::from_pkcs8_der(document.as_bytes()).unwrap();
        assert_eq!(
            PublicKey::from_key_pair(&imported),
            PublicKey::from_key_pair(&key_pair)
        );
    }

    #[test]
    fn test_import_rejects_wrong_pem_label() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        assert!(KeyPair::from_pkcs8_pem(pem).is_err());
    }
}
