//! Generates a self-signed peer certificate and prints it as PEM.
//!
//! Usage: `cargo run --example generate -- [common-name] [rsa|ec]`

use peercert::cert::params::{DistinguishedName, SelfSignedRequest, ValidityPeriod};
use peercert::error::PeerCertError;
use peercert::generator::{GeneratorPolicy, SelfSignedCertificateGenerator};
use peercert::key::{KeyAlgorithm, KeyPair};
use peercert::signer::SignaturePolicy;

fn main() -> Result<(), PeerCertError> {
    env_logger::init();
    peercert::provider::install_default()?;

    let mut args = std::env::args().skip(1);
    let common_name = args.next().unwrap_or_else(|| "peer.local".to_string());
    let key_pair = match args.next().as_deref() {
        Some("ec") => KeyPair::generate(KeyAlgorithm::Ec, 256)?,
        _ => KeyPair::generate(KeyAlgorithm::Rsa, 2048)?,
    };

    let subject = DistinguishedName::builder()
        .common_name(common_name.clone())
        .organization("Example Corp")
        .organizational_unit("Devices")
        .locality("Portland")
        .state("OR")
        .country_code("US")
        .build();

    let request = SelfSignedRequest::builder()
        .validity_period(ValidityPeriod::of_years(1))
        .subject(subject)
        .application_uri(format!("urn:example:{common_name}"))
        .dns_names(vec![common_name, "localhost".to_string()])
        .ip_addresses(vec!["127.0.0.1".to_string(), "::1".to_string()])
        .build();

    let generator = SelfSignedCertificateGenerator::new(
        GeneratorPolicy::builder()
            .signature(SignaturePolicy::MatchKey)
            .build(),
    );
    let certificate = generator.generate_self_signed(&key_pair, &request)?;
    certificate.verify_self_signed()?;

    let validity = certificate.validity();
    eprintln!(
        "{:?} certificate valid from {} until {}",
        certificate.signature_algorithm()?,
        validity.not_before,
        validity.not_after
    );
    print!("{}", certificate.to_pem()?);
    Ok(())
}
