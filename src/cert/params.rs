use std::collections::HashSet;

use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519::{C, CN, L, O, OU, ST};
use der::{Tag, Tagged};
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use log::{debug, warn};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ExtensionValue;
use crate::error::{PeerCertError, Result};

/// Distinguished name used as both subject and issuer of a self-signed
/// certificate.
///
/// All six attributes are always encoded, in the order CN, O, OU, L, ST, C.
/// Empty values are accepted but logged.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
#[builder(on(String, into))]
pub struct DistinguishedName {
    pub common_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub locality: String,
    pub state: String,
    pub country_code: String,
}

impl DistinguishedName {
    fn attributes(&self) -> [(&'static str, ObjectIdentifier, &str); 6] {
        [
            ("common_name", CN, &self.common_name),
            ("organization", O, &self.organization),
            ("organizational_unit", OU, &self.organizational_unit),
            ("locality", L, &self.locality),
            ("state", ST, &self.state),
            ("country_code", C, &self.country_code),
        ]
    }

    /// Checks that every attribute can be encoded.
    pub fn validate(&self) -> Result<()> {
        for (field, _, value) in self.attributes() {
            if value.is_empty() {
                warn!("distinguished name attribute `{field}` is empty");
            }
        }
        PrintableStringRef::new(&self.country_code).map_err(|e| {
            PeerCertError::invalid_input(
                "subject.country_code",
                format!("`{}` is not a PrintableString: {e}", self.country_code),
            )
        })?;
        Ok(())
    }

    /// Converts the distinguished name to an X.509 name.
    ///
    /// The country is a PrintableString; all other attributes are UTF8String.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let rdns = self
            .attributes()
            .into_iter()
            .map(|(field, oid, value)| -> Result<RelativeDistinguishedName> {
                let tag = if oid == C {
                    Tag::PrintableString
                } else {
                    Tag::Utf8String
                };
                let invalid = |e: der::Error| {
                    PeerCertError::invalid_input(format!("subject.{field}"), e.to_string())
                };
                if tag == Tag::PrintableString {
                    PrintableStringRef::new(value).map_err(invalid)?;
                }
                let atv = AttributeTypeAndValue {
                    oid,
                    value: Any::new(tag, value.as_bytes()).map_err(invalid)?,
                };
                let set = SetOfVec::try_from(vec![atv]).map_err(invalid)?;
                Ok(RelativeDistinguishedName(set))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// Attributes other than the six known ones are ignored; missing ones
    /// decode as empty strings.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let slot = match attr.oid {
                    CN => &mut dn.common_name,
                    O => &mut dn.organization,
                    OU => &mut dn.organizational_unit,
                    L => &mut dn.locality,
                    ST => &mut dn.state,
                    C => &mut dn.country_code,
                    _ => continue,
                };
                *slot = attribute_string(&attr.value)?;
            }
        }
        Ok(dn)
    }
}

fn attribute_string(value: &Any) -> Result<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
            std::str::from_utf8(value.value())
                .map(str::to_string)
                .map_err(|e| PeerCertError::DecodingError(e.to_string()))
        }
        tag => Err(PeerCertError::DecodingError(format!(
            "Unsupported name attribute encoding {tag}"
        ))),
    }
}

/// A relative validity duration in calendar units.
///
/// Components may be negative, but the resolved window must be non-empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidityPeriod {
    pub years: i32,
    pub months: i32,
    pub days: i32,
}

impl ValidityPeriod {
    pub fn new(years: i32, months: i32, days: i32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    pub fn of_years(years: i32) -> Self {
        Self::new(years, 0, 0)
    }

    pub fn of_months(months: i32) -> Self {
        Self::new(0, months, 0)
    }

    pub fn of_days(days: i32) -> Self {
        Self::new(0, 0, days)
    }

    /// Adds the period to `date`: years and months as one month count with
    /// the day clamped to the end of the target month, then days.
    pub fn add_to(&self, date: Date) -> Result<Date> {
        let out_of_range =
            || PeerCertError::invalid_input("validity_period", "expiration date is out of range");

        let total_months = i64::from(self.years) * 12 + i64::from(self.months);
        let month_index = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1
            + total_months;
        let year = i32::try_from(month_index.div_euclid(12)).map_err(|_| out_of_range())?;
        let month = Month::try_from(month_index.rem_euclid(12) as u8 + 1)
            .map_err(|_| out_of_range())?;
        let day = date.day().min(time::util::days_in_year_month(year, month));
        let shifted = Date::from_calendar_date(year, month, day).map_err(|_| out_of_range())?;

        shifted
            .checked_add(Duration::days(i64::from(self.days)))
            .ok_or_else(out_of_range)
    }

    /// Resolves the period against local midnight of the current day.
    ///
    /// Falls back to UTC when the local offset cannot be determined.
    pub fn resolve(&self) -> Result<Validity> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
            warn!("local UTC offset is indeterminate, anchoring validity at UTC midnight");
            OffsetDateTime::now_utc()
        });
        let today = now.date();
        let expiration = self.add_to(today)?;
        let end_offset = UtcOffset::local_offset_at(expiration.midnight().assume_utc())
            .unwrap_or(now.offset());
        self.window(today, now.offset(), expiration, end_offset)
    }

    /// Resolves the period against midnight of `today` at a fixed offset.
    pub fn resolve_at(&self, today: Date, offset: UtcOffset) -> Result<Validity> {
        let expiration = self.add_to(today)?;
        self.window(today, offset, expiration, offset)
    }

    fn window(
        &self,
        start: Date,
        start_offset: UtcOffset,
        expiration: Date,
        end_offset: UtcOffset,
    ) -> Result<Validity> {
        let validity = Validity {
            not_before: start.midnight().assume_offset(start_offset),
            not_after: expiration.midnight().assume_offset(end_offset),
        };
        if validity.not_after <= validity.not_before {
            return Err(PeerCertError::invalid_input(
                "validity_period",
                format!("{self:?} does not resolve to a positive duration"),
            ));
        }
        Ok(validity)
    }
}

/// Certificate validity window: `not_before` inclusive, `not_after` exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

/// Caller-facing description of the certificate to generate.
#[derive(Clone, Debug, Builder)]
pub struct SelfSignedRequest {
    pub validity_period: ValidityPeriod,
    pub subject: DistinguishedName,
    #[builder(into)]
    pub application_uri: String,
    #[builder(default)]
    pub dns_names: Vec<String>,
    #[builder(default)]
    pub ip_addresses: Vec<String>,
}

/// A validated request with its validity window resolved and SAN lists
/// de-duplicated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalRequest {
    pub subject: DistinguishedName,
    pub validity: Validity,
    pub application_uri: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<String>,
}

impl SelfSignedRequest {
    /// Validates the request against the current local date.
    pub fn normalize(&self) -> Result<CanonicalRequest> {
        let validity = self.validity_period.resolve()?;
        self.normalize_with(validity)
    }

    /// Validates the request against a fixed date and offset.
    pub fn normalize_at(&self, today: Date, offset: UtcOffset) -> Result<CanonicalRequest> {
        let validity = self.validity_period.resolve_at(today, offset)?;
        self.normalize_with(validity)
    }

    fn normalize_with(&self, validity: Validity) -> Result<CanonicalRequest> {
        self.subject.validate()?;
        if self.application_uri.is_empty() {
            warn!("application_uri is empty");
        }
        for (index, name) in self.dns_names.iter().enumerate() {
            if name.is_empty() {
                warn!("dns_names[{index}] is empty");
            }
        }
        reject_empty_entries("ip_addresses", &self.ip_addresses)?;

        let request = CanonicalRequest {
            subject: self.subject.clone(),
            validity,
            application_uri: self.application_uri.clone(),
            dns_names: dedup_preserving_order(&self.dns_names),
            ip_addresses: dedup_preserving_order(&self.ip_addresses),
        };
        debug!(
            "normalized request for CN={} with {} DNS and {} IP names",
            request.subject.common_name,
            request.dns_names.len(),
            request.ip_addresses.len()
        );
        Ok(request)
    }
}

fn reject_empty_entries(field: &str, values: &[String]) -> Result<()> {
    match values.iter().position(|v| v.trim().is_empty()) {
        Some(index) => Err(PeerCertError::invalid_input(
            format!("{field}[{index}]"),
            "must not be empty",
        )),
        None => Ok(()),
    }
}

fn dedup_preserving_order(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

/// An encoded extension ready to be placed in the certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// Contents of `extnValue`.
    pub value: Vec<u8>,
}

impl ExtensionParam {
    pub fn from_extension<E: ExtensionValue>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.encode_value()?,
        })
    }

    pub fn to_extension<E: ExtensionValue>(&self) -> Result<E> {
        E::decode_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, offset};

    fn subject() -> DistinguishedName {
        DistinguishedName::builder()
            .common_name("test")
            .organization("Example")
            .organizational_unit("Dev")
            .locality("Portland")
            .state("OR")
            .country_code("US")
            .build()
    }

    fn request(period: ValidityPeriod) -> SelfSignedRequest {
        SelfSignedRequest::builder()
            .validity_period(period)
            .subject(subject())
            .application_uri("urn:test:app")
            .dns_names(vec!["a".into(), "a".into(), "b".into()])
            .ip_addresses(vec!["10.0.0.1".into(), "::1".into(), "10.0.0.1".into()])
            .build()
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        let period = ValidityPeriod::of_months(1);
        assert_eq!(period.add_to(date!(2023 - 01 - 31)).unwrap(), date!(2023 - 02 - 28));
        assert_eq!(period.add_to(date!(2024 - 01 - 31)).unwrap(), date!(2024 - 02 - 29));
    }

    #[test]
    fn test_add_year_from_leap_day() {
        let period = ValidityPeriod::of_years(1);
        assert_eq!(period.add_to(date!(2024 - 02 - 29)).unwrap(), date!(2025 - 02 - 28));
    }

    #[test]
    fn test_add_applies_months_before_days() {
        let period = ValidityPeriod::new(0, 1, 1);
        assert_eq!(period.add_to(date!(2023 - 01 - 31)).unwrap(), date!(2023 - 03 - 01));
    }

    #[test]
    fn test_resolve_at_anchors_to_midnight() {
        let validity = ValidityPeriod::of_years(1)
            .resolve_at(date!(2025 - 03 - 10), offset!(+2))
            .unwrap();
        assert_eq!(validity.not_before.date(), date!(2025 - 03 - 10));
        assert_eq!(validity.not_before.time(), time::Time::MIDNIGHT);
        assert_eq!(validity.not_before.offset(), offset!(+2));
        assert_eq!(validity.not_after.date(), date!(2026 - 03 - 10));
        assert_eq!((validity.not_after - validity.not_before).whole_days(), 365);
    }

    #[test]
    fn test_resolve_rejects_empty_and_negative_periods() {
        for period in [
            ValidityPeriod::default(),
            ValidityPeriod::of_days(-1),
            ValidityPeriod::new(1, -12, 0),
        ] {
            let err = period.resolve_at(date!(2025 - 01 - 01), UtcOffset::UTC).unwrap_err();
            assert!(matches!(
                err,
                PeerCertError::InvalidInput { ref field, .. } if field == "validity_period"
            ));
        }
    }

    #[test]
    fn test_normalize_dedups_san_lists_in_order() {
        let canonical = request(ValidityPeriod::of_years(1))
            .normalize_at(date!(2025 - 01 - 01), UtcOffset::UTC)
            .unwrap();
        assert_eq!(canonical.dns_names, vec!["a", "b"]);
        assert_eq!(canonical.ip_addresses, vec!["10.0.0.1", "::1"]);
    }

    #[test]
    fn test_normalize_names_offending_field() {
        let mut req = request(ValidityPeriod::of_years(1));
        req.ip_addresses.push(String::new());
        let err = req
            .normalize_at(date!(2025 - 01 - 01), UtcOffset::UTC)
            .unwrap_err();
        assert_eq!(
            err,
            PeerCertError::InvalidInput {
                field: "ip_addresses[3]".into(),
                reason: "must not be empty".into(),
            }
        );
    }

    #[test]
    fn test_normalize_keeps_empty_uri_and_dns_name() {
        let mut req = request(ValidityPeriod::of_years(1));
        req.application_uri.clear();
        req.dns_names = vec![String::new(), "a".into(), String::new()];
        let canonical = req
            .normalize_at(date!(2025 - 01 - 01), UtcOffset::UTC)
            .unwrap();
        assert_eq!(canonical.application_uri, "");
        assert_eq!(canonical.dns_names, vec!["", "a"]);
    }

    #[test]
    fn test_country_code_must_be_printable() {
        let mut dn = subject();
        dn.country_code = "Ü@".into();
        let err = dn.validate().unwrap_err();
        assert!(matches!(err, PeerCertError::InvalidInput { ref field, .. } if field == "subject.country_code"));
    }

    #[test]
    fn test_x509_name_roundtrip_keeps_attribute_order() {
        let dn = subject();
        let name = dn.as_x509_name().unwrap();
        let oids: Vec<_> = name.0.iter().map(|rdn| rdn.0.iter().next().unwrap().oid).collect();
        assert_eq!(oids, vec![CN, O, OU, L, ST, C]);
        assert_eq!(DistinguishedName::from_x509_name(&name).unwrap(), dn);
    }

    #[test]
    fn test_empty_attributes_are_encoded() {
        let dn = DistinguishedName::builder()
            .common_name("only-cn")
            .organization("")
            .organizational_unit("")
            .locality("")
            .state("")
            .country_code("")
            .build();
        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 6);
        assert_eq!(DistinguishedName::from_x509_name(&name).unwrap(), dn);
    }
}
