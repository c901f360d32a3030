//! Process-wide cryptographic provider.
//!
//! Signing refuses to run until a provider has been installed with
//! [`install_default`]. Installation probes the operating system's random
//! source once and then records which key algorithms and signature schemes
//! the RustCrypto backends in this crate can serve.

use log::info;
use once_cell::sync::OnceCell;
use rand_core::RngCore;

use crate::cert::SignatureAlgorithm;
use crate::error::{PeerCertError, Result};
use crate::key::KeyAlgorithm;

static DEFAULT_PROVIDER: OnceCell<CryptoProvider> = OnceCell::new();

/// Describes what the installed cryptographic backend can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoProvider {
    pub name: &'static str,
    pub key_algorithms: &'static [KeyAlgorithm],
    pub signature_algorithms: &'static [SignatureAlgorithm],
}

impl CryptoProvider {
    /// The RustCrypto-backed provider shipped with this crate.
    pub const RUST_CRYPTO: CryptoProvider = CryptoProvider {
        name: "rustcrypto",
        key_algorithms: &[KeyAlgorithm::Rsa, KeyAlgorithm::Ec],
        signature_algorithms: &[
            SignatureAlgorithm::Sha256WithRSA,
            SignatureAlgorithm::Sha384WithRSA,
            SignatureAlgorithm::Sha512WithRSA,
            SignatureAlgorithm::Sha256WithECDSA,
            SignatureAlgorithm::Sha384WithECDSA,
            SignatureAlgorithm::Sha512WithECDSA,
        ],
    };

    pub fn supports(&self, algorithm: SignatureAlgorithm) -> bool {
        self.signature_algorithms.contains(&algorithm)
    }
}

/// Installs the default provider for this process.
///
/// Safe to call any number of times from any thread; the first successful
/// call wins and later calls return the same instance.
pub fn install_default() -> Result<&'static CryptoProvider> {
    DEFAULT_PROVIDER.get_or_try_init(|| {
        let mut probe = [0u8; 32];
        rand_core::OsRng
            .try_fill_bytes(&mut probe)
            .map_err(random_source_unavailable)?;
        let provider = CryptoProvider::RUST_CRYPTO;
        info!("installed {} crypto provider", provider.name);
        Ok(provider)
    })
}

fn random_source_unavailable(err: rand_core::Error) -> PeerCertError {
    PeerCertError::KeyGenerationError(format!(
        "provider install: secure random source unavailable: {err}"
    ))
}

/// Returns the installed provider, if any.
pub fn get_default() -> Option<&'static CryptoProvider> {
    DEFAULT_PROVIDER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        let first = install_default().unwrap();
        let second = install_default().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(get_default(), Some(first));
    }

    #[test]
    fn test_default_provider_lists_every_scheme() {
        for algorithm in [
            SignatureAlgorithm::Sha256WithRSA,
            SignatureAlgorithm::Sha384WithRSA,
            SignatureAlgorithm::Sha512WithRSA,
            SignatureAlgorithm::Sha256WithECDSA,
            SignatureAlgorithm::Sha384WithECDSA,
            SignatureAlgorithm::Sha512WithECDSA,
        ] {
            assert!(CryptoProvider::RUST_CRYPTO.supports(algorithm), "{algorithm:?}");
        }
    }

    #[test]
    fn test_random_source_failure_is_key_generation_error() {
        let code = std::num::NonZeroU32::new(rand_core::Error::CUSTOM_START).unwrap();
        let err = random_source_unavailable(rand_core::Error::from(code));
        assert!(
            matches!(err, PeerCertError::KeyGenerationError(ref msg) if msg.starts_with("provider install")),
            "{err:?}"
        );
    }
}
