mod util;

use openssl::nid::Nid;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509, X509StoreContext, X509VerifyResult};
use peercert::generator::{GeneratorPolicy, SelfSignedCertificateGenerator};
use peercert::key::KeyPair;
use peercert::signer::SignaturePolicy;

fn rsa_cert() -> X509 {
    util::init();
    let cert = SelfSignedCertificateGenerator::default()
        .generate_self_signed(&util::RSA_KEY, &util::sample_request())
        .unwrap();
    X509::from_der(&cert.to_der().unwrap()).expect("OpenSSL rejected the certificate")
}

#[test]
fn test_openssl_parses_and_verifies_signature() {
    let x509 = rsa_cert();
    let public_key = x509.public_key().unwrap();
    assert!(x509.verify(&public_key).unwrap());
    assert_eq!(x509.version(), 2);
    assert_eq!(
        x509.signature_algorithm().object().nid(),
        Nid::SHA256WITHRSAENCRYPTION
    );
}

#[test]
fn test_openssl_reads_subject_in_order() {
    let x509 = rsa_cert();
    let entries: Vec<(Nid, String)> = x509
        .subject_name()
        .entries()
        .map(|e| {
            (
                e.object().nid(),
                e.data().as_utf8().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        entries,
        vec![
            (Nid::COMMONNAME, "test".to_string()),
            (Nid::ORGANIZATIONNAME, "Example Corp".to_string()),
            (Nid::ORGANIZATIONALUNITNAME, "Devices".to_string()),
            (Nid::LOCALITYNAME, "Portland".to_string()),
            (Nid::STATEORPROVINCENAME, "OR".to_string()),
            (Nid::COUNTRYNAME, "US".to_string()),
        ]
    );
    assert_eq!(x509.issued(&x509), X509VerifyResult::OK);
}

#[test]
fn test_openssl_reads_extensions() {
    let x509 = rsa_cert();

    let san = x509.subject_alt_names().expect("missing subjectAltName");
    assert_eq!(san.len(), 3);
    assert_eq!(san.get(0).unwrap().uri(), Some("urn:test:app"));
    assert_eq!(san.get(1).unwrap().dnsname(), Some("localhost"));
    assert_eq!(san.get(2).unwrap().ipaddress(), Some(&[127, 0, 0, 1][..]));

    let ski = x509.subject_key_id().expect("missing subjectKeyIdentifier");
    let aki = x509.authority_key_id().expect("missing authorityKeyIdentifier");
    assert_eq!(ski.as_slice(), aki.as_slice());
    assert_eq!(ski.as_slice().len(), 20);
}

#[test]
fn test_openssl_trusts_cert_as_its_own_anchor() {
    let x509 = rsa_cert();
    let mut store = X509StoreBuilder::new().unwrap();
    store.add_cert(x509.clone()).unwrap();
    let store = store.build();

    let chain = Stack::new().unwrap();
    let mut context = X509StoreContext::new().unwrap();
    let verified = context
        .init(&store, &x509, &chain, |c| {
            let ok = c.verify_cert()?;
            if !ok {
                eprintln!("verification failed: {}", c.error());
            }
            Ok(ok)
        })
        .unwrap();
    assert!(verified);
}

#[test]
fn test_openssl_verifies_ecdsa_signatures() {
    util::init();
    let generator = SelfSignedCertificateGenerator::new(
        GeneratorPolicy::builder()
            .signature(SignaturePolicy::MatchKey)
            .build(),
    );
    for (key, nid) in [
        (KeyPair::generate_ecdsa_p256(), Nid::ECDSA_WITH_SHA256),
        (KeyPair::generate_ecdsa_p384(), Nid::ECDSA_WITH_SHA384),
        (KeyPair::generate_ecdsa_p521(), Nid::ECDSA_WITH_SHA512),
    ] {
        let cert = generator
            .generate_self_signed(&key, &util::sample_request())
            .unwrap();
        let x509 = X509::from_pem(cert.to_pem().unwrap().as_bytes()).unwrap();
        assert_eq!(x509.signature_algorithm().object().nid(), nid);
        assert!(x509.verify(&x509.public_key().unwrap()).unwrap());
    }
}
