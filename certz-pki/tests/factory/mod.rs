//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::IpAddr;

use certz_pki::error::{InputError, SigningError, VerifyError};
use certz_pki::{
    CertificateAuthority, CertificateFactory, Error, ErrorKind, KeyAlgorithm,
    KeyMaterialStore, KeyPair, KeyType,
};

use super::{ca, leaf};

//
// Tests.
//

#[test]
fn test_sign_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyMaterialStore::new(dir.path());
    let ca = store.generate("certz-root", KeyAlgorithm::EcdsaP256, 1).unwrap();

    let ip: IpAddr = "10.0.0.5".parse().unwrap();
    let template =
        CertificateFactory::build_template("svc-a", &[], &[ip], "", 365)
            .unwrap();
    let signed = CertificateFactory::new(&ca)
        .sign(&template, KeyAlgorithm::EcdsaP256)
        .unwrap();

    let info = signed.certificate.info().unwrap();
    assert_eq!(info.common_name, "svc-a");
    assert_eq!(info.ip_addresses, vec![ip]);
    assert!(info.dns_names.is_empty());
    assert!(!info.is_ca);
    assert!(info.digital_signature);
    assert!(info.client_auth);
    assert!(info.server_auth);
    assert_eq!(info.issuer, ca.certificate.info().unwrap().subject);

    signed
        .certificate
        .verify(std::slice::from_ref(&ca.certificate))
        .unwrap();
}

#[test]
fn test_build_template_no_subject_alt_names() {
    let error =
        CertificateFactory::build_template("svc-a", &[], &[], "", 365)
            .unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidInput(InputError::MissingSubjectAltName)
    ));
    assert_eq!(error.kind(), ErrorKind::Input);
}

#[test]
fn test_build_template_empty_common_name() {
    let dns = vec!["svc-a.example.net".to_owned()];
    let error = CertificateFactory::build_template("", &dns, &[], "", 365)
        .unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidInput(InputError::EmptyCommonName)
    ));

    let error =
        CertificateFactory::build_template("svc-a", &dns, &[], "", 0)
            .unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidInput(InputError::InvalidValidity(0))
    ));
}

#[test]
fn test_build_template_spiffe_id() {
    let spiffe = "spiffe://example.net/ns/default/sa/svc-a";
    let dns = vec!["svc-a.example.net".to_owned()];
    let template =
        CertificateFactory::build_template("svc-a", &dns, &[], spiffe, 30)
            .unwrap();

    // The SPIFFE ID replaces the DNS names.
    assert_eq!(template.dns_names, vec![spiffe.to_owned()]);
    assert_eq!(template.spiffe_uri.as_deref(), Some(spiffe));

    let ca = ca("certz-root");
    let signed = CertificateFactory::new(&ca)
        .sign(&template, KeyAlgorithm::EcdsaP256)
        .unwrap();
    let info = signed.certificate.info().unwrap();
    assert_eq!(info.uris, vec![spiffe.to_owned()]);
    assert_eq!(info.dns_names, vec![spiffe.to_owned()]);

    let error = CertificateFactory::build_template(
        "svc-a",
        &[],
        &[],
        "https://example.net",
        30,
    )
    .unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidInput(InputError::InvalidSpiffeUri(..))
    ));
}

#[test]
fn test_verify_unknown_issuer() {
    let ca1 = ca("certz-root-1");
    let ca2 = ca("certz-root-2");
    let signed = leaf(&ca1, "svc-a", "10.0.0.5", KeyAlgorithm::EcdsaP256);

    let error = signed
        .certificate
        .verify(std::slice::from_ref(&ca2.certificate))
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Verification(VerifyError::UnknownIssuer)
    ));

    // A CA sharing the issuer's name but not its key.
    let impostor = ca("certz-root-1");
    let error = signed
        .certificate
        .verify(std::slice::from_ref(&impostor.certificate))
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Verification(VerifyError::BadSignature)
    ));

    // Leaves can't act as issuers.
    let other = leaf(&ca1, "svc-b", "10.0.0.6", KeyAlgorithm::EcdsaP256);
    let error = signed
        .certificate
        .verify(std::slice::from_ref(&other.certificate))
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Verification(VerifyError::UnknownIssuer)
    ));
}

#[test]
fn test_sign_with_mismatched_ca_key() {
    // CA certificate paired with another CA's key.
    let ca1 = ca("certz-root-1");
    let ca2 = ca("certz-root-2");
    let broken = CertificateAuthority {
        certificate: ca1.certificate,
        key: ca2.key,
    };

    let template = CertificateFactory::build_template(
        "svc-a",
        &[],
        &["10.0.0.5".parse::<IpAddr>().unwrap()],
        "",
        30,
    )
    .unwrap();
    let error = CertificateFactory::new(&broken)
        .sign(&template, KeyAlgorithm::EcdsaP256)
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Crypto);
    let Error::Signing(SigningError::Verify(error)) = error else {
        panic!("unexpected error: {error}");
    };
    assert!(matches!(
        *error,
        Error::Verification(VerifyError::BadSignature)
    ));
}

#[test]
fn test_sign_mixed_key_types() {
    let ca = ca("certz-root");
    let signed = leaf(&ca, "svc-a", "10.0.0.5", KeyAlgorithm::Rsa2048);

    assert_eq!(signed.key.key_type(), KeyType::Rsa);
    assert_eq!(signed.certificate.info().unwrap().key_type, KeyType::Rsa);
    signed
        .certificate
        .verify(std::slice::from_ref(&ca.certificate))
        .unwrap();
}

#[test]
fn test_write_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let ca = ca("certz-root");
    let signed = leaf(&ca, "svc-a", "10.0.0.5", KeyAlgorithm::EcdsaP256);

    let path = dir.path().join("tls_bundle.pem");
    CertificateFactory::write_bundle(
        &signed.certificate,
        &signed.key,
        &ca.certificate,
        &path,
    )
    .unwrap();

    let data = std::fs::read(&path).unwrap();
    let blocks = pem::parse_many(&data).unwrap();
    let tags = blocks.iter().map(|block| block.tag()).collect::<Vec<_>>();
    assert_eq!(tags, ["CERTIFICATE", "PRIVATE KEY", "CERTIFICATE"]);
    assert_eq!(blocks[0].contents(), signed.certificate.der());
    assert_eq!(blocks[1].contents(), signed.key.to_pkcs8_der());
    assert_eq!(blocks[2].contents(), ca.certificate.der());

    let key = KeyPair::from_pem(pem::encode(&blocks[1]).as_bytes()).unwrap();
    assert_eq!(key.public_key_der(), signed.key.public_key_der());
}

#[test]
fn test_sign_concurrently() {
    let ca = ca("certz-root");

    let serials = std::thread::scope(|scope| {
        let handles = (0..8)
            .map(|i| {
                let ca = &ca;
                scope.spawn(move || {
                    let name = format!("svc-{i}");
                    let ip = format!("10.0.0.{}", i + 1);
                    let signed = leaf(ca, &name, &ip, KeyAlgorithm::EcdsaP256);
                    signed
                        .certificate
                        .verify(std::slice::from_ref(&ca.certificate))
                        .unwrap();
                    signed.certificate.info().unwrap().serial
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<BTreeSet<_>>()
    });

    assert_eq!(serials.len(), 8);
}
