//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use certz_pki::KeyAlgorithm;
use certz_rotation::gate::{Expectation, ProbeOutcome};
use certz_rotation::{
    ServiceValidationGate, Surface, SurfaceTarget, TlsCredentials,
    ValidationRequest, Validator,
};
use tokio::net::TcpListener;
use tonic::Code;

use super::device::{INTRUDER, TestDevice, UploadReply};
use super::{SERVER_NAME, ca, credentials, leaf};

fn gate() -> ServiceValidationGate {
    ServiceValidationGate::new(Duration::from_secs(5))
}

#[tokio::test]
async fn test_all_surfaces_reachable() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let creds = credentials(&device.ca, "operator", &device.ca);

    let request = ValidationRequest::all_surfaces(creds, &device.address, false);
    let report = gate().validate(&request).await;

    assert!(report.passed(), "{report:?}");
    assert_eq!(report.surfaces.len(), 5);
    for surface in Surface::all() {
        let surface = report.get(surface).unwrap();
        assert_eq!(surface.outcome, ProbeOutcome::Ok);
        assert_eq!(surface.expected, Expectation::Success);
        assert_eq!(surface.address, device.address);
    }
}

#[tokio::test]
async fn test_untrusted_server_fails_every_surface() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let other = ca("other-ca");
    let creds = credentials(&device.ca, "operator", &other);

    let request = ValidationRequest::all_surfaces(creds, &device.address, false);
    let report = gate().validate(&request).await;

    assert!(!report.passed());
    assert_eq!(report.failures().count(), 5);
}

#[tokio::test]
async fn test_unknown_client_issuer_fails() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let rogue = ca("rogue-ca");
    let creds = credentials(&rogue, "operator", &device.ca);

    let request = ValidationRequest::all_surfaces(creds, &device.address, false);
    let report = gate().validate(&request).await;

    assert!(!report.passed());
    assert!(
        report
            .surfaces
            .iter()
            .all(|surface| surface.outcome != ProbeOutcome::Ok)
    );
}

#[tokio::test]
async fn test_rejected_identity_fails_without_mismatch() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let creds = credentials(&device.ca, INTRUDER, &device.ca);

    let request = ValidationRequest::all_surfaces(creds, &device.address, false);
    let report = gate().validate(&request).await;

    assert!(!report.passed());
    for surface in &report.surfaces {
        assert!(matches!(
            surface.outcome,
            ProbeOutcome::Status(Code::PermissionDenied, _)
        ));
    }
}

#[tokio::test]
async fn test_rejected_identity_passes_with_mismatch_expected() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let creds = credentials(&device.ca, INTRUDER, &device.ca);

    let request = ValidationRequest::all_surfaces(creds, &device.address, true);
    let report = gate().validate(&request).await;

    assert!(report.passed(), "{report:?}");
    assert!(
        report
            .surfaces
            .iter()
            .all(|surface| surface.expected == Expectation::Rejection)
    );
}

#[tokio::test]
async fn test_accepted_identity_fails_with_mismatch_expected() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let creds = credentials(&device.ca, "operator", &device.ca);

    let request = ValidationRequest::all_surfaces(creds, &device.address, true);
    let report = gate().validate(&request).await;

    assert!(!report.passed());
    assert_eq!(report.failures().count(), 5);
}

#[tokio::test]
async fn test_key_type_mismatch_fails() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let rsa = leaf(&device.ca, "operator", KeyAlgorithm::Rsa2048);
    let ecdsa = leaf(&device.ca, "operator", KeyAlgorithm::EcdsaP256);
    let creds = TlsCredentials {
        certificate_pem: rsa.certificate.to_pem(),
        key_pem: ecdsa.key.to_pkcs8_pem(),
        anchors_pem: device.ca.certificate.to_pem(),
        server_name: SERVER_NAME.to_owned(),
    };

    let request = ValidationRequest::all_surfaces(creds, &device.address, false);
    let report = gate().validate(&request).await;

    assert!(!report.passed());
}

#[tokio::test]
async fn test_rsa_client_under_ecdsa_ca() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let client = leaf(&device.ca, "operator", KeyAlgorithm::Rsa2048);
    let creds = TlsCredentials::new(
        &client,
        device.ca.certificate.to_pem(),
        SERVER_NAME,
    );

    let request = ValidationRequest::all_surfaces(creds, &device.address, false);
    let report = gate().validate(&request).await;

    assert!(report.passed(), "{report:?}");
}

#[tokio::test]
async fn test_no_targets_never_passes() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let creds = credentials(&device.ca, "operator", &device.ca);

    let request = ValidationRequest {
        credentials: creds,
        targets: vec![],
        mismatch_expected: false,
    };
    let report = gate().validate(&request).await;

    assert!(!report.passed());
}

#[tokio::test]
async fn test_surfaces_on_distinct_addresses() {
    let device = TestDevice::start(UploadReply::Ack).await;
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let creds = credentials(&device.ca, "operator", &device.ca);

    let request = ValidationRequest {
        credentials: creds,
        targets: vec![
            SurfaceTarget::new(Surface::Gnmi, &device.address),
            SurfaceTarget::new(Surface::Gribi, closed.clone()),
        ],
        mismatch_expected: false,
    };
    let report = gate().validate(&request).await;

    assert!(!report.passed());
    assert_eq!(report.get(Surface::Gnmi).unwrap().outcome, ProbeOutcome::Ok);
    let gribi = report.get(Surface::Gribi).unwrap();
    assert_eq!(gribi.address, closed);
    assert!(matches!(gribi.outcome, ProbeOutcome::Unreachable(..)));
    assert_eq!(report.failures().count(), 1);
}

#[tokio::test]
async fn test_silent_server_hits_deadline() {
    // Accepts TCP connections but never answers the TLS handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let ca = ca("device-ca");
    let creds = credentials(&ca, "operator", &ca);
    let timeout = Duration::from_millis(300);

    let request = ValidationRequest {
        credentials: creds,
        targets: vec![SurfaceTarget::new(Surface::Gnoi, &address)],
        mismatch_expected: false,
    };
    let report = ServiceValidationGate::new(timeout).validate(&request).await;

    assert!(!report.passed());
    let gnoi = report.get(Surface::Gnoi).unwrap();
    // The connect timeout and the probe deadline share the same budget.
    assert!(matches!(
        gnoi.outcome,
        ProbeOutcome::DeadlineExceeded(..) | ProbeOutcome::Unreachable(..)
    ));
    assert!(gnoi.latency < timeout * 10);
    drop(listener);
}

#[test]
fn test_strict_rejection_codes() {
    let rejection = Expectation::Rejection;
    assert!(rejection.is_met(&ProbeOutcome::Status(
        Code::PermissionDenied,
        String::new()
    )));
    assert!(rejection.is_met(&ProbeOutcome::Status(
        Code::FailedPrecondition,
        String::new()
    )));
    assert!(
        !rejection
            .is_met(&ProbeOutcome::Status(Code::Unavailable, String::new()))
    );
    assert!(!rejection.is_met(&ProbeOutcome::Unreachable(String::new())));
    assert!(!rejection.is_met(&ProbeOutcome::Ok));
    assert!(Expectation::Success.is_met(&ProbeOutcome::Ok));
}
