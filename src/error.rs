//! use peercert::error::PeerCertError;

use thiserror::Error;

/// Represents errors that can occur while generating a self-signed certificate.
///
/// Each variant corresponds to the pipeline stage that failed, and carries the
/// offending field or extension where one applies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerCertError {
    /// A caller-supplied field failed validation.
    #[error("Invalid input for `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    /// No provider path can generate or load the requested key.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// An extension value could not be serialized.
    #[error("Failed to encode {extension} extension: {reason}")]
    ExtensionEncodingError {
        extension: &'static str,
        reason: String,
    },

    /// Error while producing the certificate signature.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),
}

impl PeerCertError {
    pub(crate) fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PeerCertError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn extension(extension: &'static str, reason: impl ToString) -> Self {
        PeerCertError::ExtensionEncodingError {
            extension,
            reason: reason.to_string(),
        }
    }
}

impl From<der::Error> for PeerCertError {
    /// Converts a `der::Error` into a `PeerCertError`.
    fn from(err: der::Error) -> Self {
        PeerCertError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for PeerCertError {
    fn from(err: pkcs8::Error) -> Self {
        PeerCertError::DecodingError(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for PeerCertError {
    fn from(err: x509_cert::spki::Error) -> Self {
        PeerCertError::DecodingError(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PeerCertError>;
