//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use certz_pki::error::{DecodeError, InputError, ParseError};
use certz_pki::{Certificate, Error, ErrorKind, TrustBundleCodec};
use yasna::models::ObjectIdentifier;

use super::ca;

//
// Helper functions.
//

fn anchors(count: usize) -> Vec<Certificate> {
    (0..count)
        .map(|i| ca(&format!("certz-anchor-{i:04}")).certificate)
        .collect()
}

fn serials(certificates: &[Certificate]) -> Vec<Vec<u8>> {
    certificates
        .iter()
        .map(|cert| cert.info().unwrap().serial)
        .collect()
}

// Builds a SignedData structure without a certificates field.
fn pkcs7_without_certificates() -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_oid(&ObjectIdentifier::from_slice(&[
                1, 2, 840, 113549, 1, 7, 2,
            ]));
            writer.next().write_tagged(yasna::Tag::context(0), |writer| {
                writer.write_sequence(|writer| {
                    writer.next().write_u8(1);
                    writer.next().write_set_of(|_| {});
                    writer.next().write_sequence(|writer| {
                        writer.next().write_oid(
                            &ObjectIdentifier::from_slice(&[
                                1, 2, 840, 113549, 1, 7, 1,
                            ]),
                        );
                    });
                    writer.next().write_set_of(|_| {});
                });
            });
        });
    })
}

//
// Tests.
//

#[test]
fn test_decode_three_certificates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trust_bundle.p7b");

    // Names chosen so that the input order isn't the DER sort order.
    let certificates = vec![
        ca("certz-zulu").certificate,
        ca("certz-alpha").certificate,
        ca("certz-mike").certificate,
    ];
    TrustBundleCodec::write(&path, &certificates).unwrap();

    let bundle = TrustBundleCodec::decode(&path).unwrap();
    assert_eq!(bundle.len(), 3);
    assert_eq!(bundle.certificates, certificates);
    assert_eq!(bundle.raw, std::fs::read(&path).unwrap());
    assert!(bundle.pkcs7_pem().starts_with("-----BEGIN PKCS7-----"));
    assert_eq!(
        pem::parse_many(bundle.anchors_pem()).unwrap().len(),
        certificates.len()
    );
}

#[test]
fn test_decode_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trust_bundle.p7b");
    TrustBundleCodec::write(&path, &anchors(4)).unwrap();

    let first = TrustBundleCodec::decode(&path).unwrap();
    let second = TrustBundleCodec::decode(&path).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(
        serials(&first.certificates),
        serials(&second.certificates)
    );
}

#[test]
fn test_decode_large_bundle() {
    let certificates = anchors(1000);
    let pem = TrustBundleCodec::encode(&certificates).unwrap();

    let bundle = TrustBundleCodec::decode_bytes(pem.into_bytes()).unwrap();
    assert_eq!(bundle.len(), 1000);
    assert_eq!(serials(&bundle.certificates), serials(&certificates));
}

#[test]
fn test_decode_corrupted_der() {
    let pem = certz_pki::encoding::encode("PKCS7", &[0x30, 0x82, 0xff, 0x00]);

    let error = TrustBundleCodec::decode_bytes(pem.into_bytes()).unwrap_err();
    assert!(matches!(error, Error::Parse(ParseError::Pkcs7(..))));
    assert_eq!(error.kind(), ErrorKind::Crypto);
}

#[test]
fn test_decode_truncated_structure() {
    let pem = TrustBundleCodec::encode(&anchors(2)).unwrap();
    let block = pem::parse(&pem).unwrap();

    let mut der = block.contents().to_vec();
    der.truncate(der.len() - 40);
    let truncated = certz_pki::encoding::encode("PKCS7", &der);

    let error =
        TrustBundleCodec::decode_bytes(truncated.into_bytes()).unwrap_err();
    assert!(matches!(error, Error::Parse(ParseError::Pkcs7(..))));
}

#[test]
fn test_decode_empty_bundle() {
    let pem = certz_pki::encoding::encode("PKCS7", &pkcs7_without_certificates());

    let error = TrustBundleCodec::decode_bytes(pem.into_bytes()).unwrap_err();
    assert!(matches!(error, Error::Parse(ParseError::EmptyTrustBundle)));

    let error = TrustBundleCodec::encode(&[]).unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidInput(InputError::EmptyTrustBundle)
    ));
}

#[test]
fn test_decode_invalid_pem() {
    let error =
        TrustBundleCodec::decode_bytes(b"garbage".to_vec()).unwrap_err();
    assert!(matches!(error, Error::Decode(DecodeError::NoPemBlock)));

    let certificate = ca("certz-root").certificate;
    let error = TrustBundleCodec::decode_bytes(certificate.to_pem().into_bytes())
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Decode(DecodeError::UnexpectedLabel(ref label)) if label == "CERTIFICATE"
    ));

    let dir = tempfile::tempdir().unwrap();
    let error =
        TrustBundleCodec::decode(&dir.path().join("missing.p7b")).unwrap_err();
    assert!(matches!(error, Error::NotFound(..)));
}
