use std::sync::atomic::{AtomicU64, Ordering};

use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use der::{DateTime, Encode};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::{PeerCertError, Result};

static LAST_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Returns a serial number derived from the current Unix time in milliseconds.
///
/// Calls landing in the same millisecond get consecutive values, so serials
/// are unique for the lifetime of the process.
pub fn time_based_serial() -> Vec<u8> {
    let now = u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
        .unwrap_or(1)
        .max(1);
    let previous = LAST_SERIAL
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(0);
    positive_integer_bytes(now.max(previous + 1))
}

/// Minimal big-endian encoding of a positive INTEGER.
pub fn positive_integer_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut out = Vec::with_capacity(9);
    if bytes[first] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[first..]);
    out
}

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian positive serial number.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The validity window.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions in encoding order.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: DistinguishedName,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| -> Result<x509_cert::ext::Extension> {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone()).map_err(encoding)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice()).map_err(encoding)?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.as_x509_name()?,
            validity,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.to_tbs_certificate_inner()?.to_der().map_err(encoding)
    }
}

fn encoding(err: der::Error) -> PeerCertError {
    PeerCertError::EncodingError(err.to_string())
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280 §4.1.2.5).
fn to_x509_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let seconds = u64::try_from(instant.unix_timestamp()).map_err(|_| {
        PeerCertError::EncodingError(format!("{instant} precedes the Unix epoch"))
    })?;
    let date_time =
        DateTime::from_unix_duration(std::time::Duration::from_secs(seconds)).map_err(encoding)?;
    if date_time.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(
            UtcTime::from_date_time(date_time).map_err(encoding)?,
        ))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_date_time(date_time),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_positive_integer_bytes_is_minimal() {
        assert_eq!(positive_integer_bytes(1), vec![0x01]);
        assert_eq!(positive_integer_bytes(0x7f), vec![0x7f]);
        assert_eq!(positive_integer_bytes(0x80), vec![0x00, 0x80]);
        assert_eq!(positive_integer_bytes(0x0102), vec![0x01, 0x02]);
    }

    #[test]
    fn test_time_based_serials_are_strictly_increasing() {
        let serials: Vec<u64> = (0..64)
            .map(|_| {
                time_based_serial()
                    .iter()
                    .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
            })
            .collect();
        assert!(serials.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_time_encoding_switches_at_2050() {
        let before = to_x509_time(datetime!(2049-12-31 0:00 UTC)).unwrap();
        assert!(matches!(before, x509_cert::time::Time::UtcTime(_)));
        let after = to_x509_time(datetime!(2050-01-01 0:00 UTC)).unwrap();
        assert!(matches!(after, x509_cert::time::Time::GeneralTime(_)));
    }
}
