//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

mod device;
mod gate;

use std::net::IpAddr;

use certz_pki::{
    CertificateAuthority, CertificateFactory, KeyAlgorithm, SignedCertificate,
};
use certz_rotation::TlsCredentials;

pub const SERVER_NAME: &str = "device.certz.test";

//
// Helper functions.
//

pub fn ca(name: &str) -> CertificateAuthority {
    CertificateAuthority::generate(name, KeyAlgorithm::EcdsaP256, 1).unwrap()
}

pub fn leaf(
    ca: &CertificateAuthority,
    common_name: &str,
    algorithm: KeyAlgorithm,
) -> SignedCertificate {
    let ip: IpAddr = "127.0.0.1".parse().unwrap();
    let template = CertificateFactory::build_template(
        common_name,
        &[SERVER_NAME.to_owned()],
        &[ip],
        "",
        30,
    )
    .unwrap();
    CertificateFactory::new(ca).sign(&template, algorithm).unwrap()
}

// Client credentials issued by `ca`, trusting `anchor`.
pub fn credentials(
    ca: &CertificateAuthority,
    common_name: &str,
    anchor: &CertificateAuthority,
) -> TlsCredentials {
    let client = leaf(ca, common_name, KeyAlgorithm::EcdsaP256);
    TlsCredentials::new(&client, anchor.certificate.to_pem(), SERVER_NAME)
}
