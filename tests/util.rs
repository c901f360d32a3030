#![allow(dead_code)]

use once_cell::sync::Lazy;
use peercert::cert::params::{DistinguishedName, SelfSignedRequest, ValidityPeriod};
use peercert::key::KeyPair;

/// One RSA-2048 key per test binary; RSA generation is slow in debug builds.
pub static RSA_KEY: Lazy<KeyPair> =
    Lazy::new(|| KeyPair::generate_rsa(2048).expect("RSA-2048 key generation failed"));

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    peercert::provider::install_default().expect("failed to install crypto provider");
}

pub fn subject(common_name: &str) -> DistinguishedName {
    DistinguishedName::builder()
        .common_name(common_name)
        .organization("Example Corp")
        .organizational_unit("Devices")
        .locality("Portland")
        .state("OR")
        .country_code("US")
        .build()
}

pub fn sample_request() -> SelfSignedRequest {
    SelfSignedRequest::builder()
        .validity_period(ValidityPeriod::of_years(1))
        .subject(subject("test"))
        .application_uri("urn:test:app")
        .dns_names(vec!["localhost".to_string(), "localhost".to_string()])
        .ip_addresses(vec!["127.0.0.1".to_string()])
        .build()
}
