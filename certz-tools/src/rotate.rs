//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use certz_pki::error::IoError;
use certz_pki::{
    CertificateAuthority, CertificateFactory, KeyMaterialStore,
    SignedCertificate, TrustBundle, TrustBundleCodec, encoding,
};
use certz_rotation::{
    GnmiControlPlane, GrpcDevice, Result, RotationEntityBuilder,
    RotationOrchestrator, RotationOutcome, RotationPlan, RotationSession,
    ServiceValidationGate, TlsCredentials, ValidationRequest, renderer, tls,
};
use tracing::info;

use crate::certgen::{BUNDLE_FILE, CERTIFICATE_FILE, KEY_FILE};
use crate::config::Config;

// Trust bundle file saved next to the rotated client identity.
pub const TRUST_BUNDLE_FILE: &str = "trust_bundle.p7b";

/// Material issued for a rotation: the device's new server identity, the
/// client identity that goes with it and the trust bundle naming their CA.
#[derive(Debug)]
pub struct RotationMaterial {
    pub server: SignedCertificate,
    pub client: SignedCertificate,
    pub bundle: TrustBundle,
}

// ===== global functions =====

/// Issues new device and client credentials from the configured CA.
pub fn issue(
    config: &Config,
    ca: &CertificateAuthority,
) -> Result<RotationMaterial> {
    let creds = &config.credentials;
    let factory = CertificateFactory::new(ca);

    let server_name = &config.device.server_name;
    let template = CertificateFactory::build_template(
        server_name,
        std::slice::from_ref(server_name),
        &creds.server_ips,
        "",
        creds.cert_days,
    )?;
    let server = factory.sign(&template, creds.algorithm)?;

    let template = CertificateFactory::build_template(
        &creds.client_name,
        std::slice::from_ref(&creds.client_name),
        &[],
        "",
        creds.cert_days,
    )?;
    let client = factory.sign(&template, creds.algorithm)?;

    let pem =
        TrustBundleCodec::encode(std::slice::from_ref(&ca.certificate))?;
    let bundle = TrustBundleCodec::decode_bytes(pem.into_bytes())?;

    Ok(RotationMaterial {
        server,
        client,
        bundle,
    })
}

/// Builds the session uploading the given material to the configured
/// profile.
pub fn session(
    config: &Config,
    ca: &CertificateAuthority,
    material: &RotationMaterial,
) -> Result<RotationSession> {
    let builder = RotationEntityBuilder::new(&config.rotation.entity_version)?;
    let entities = vec![
        builder.certificate_chain(
            &material.server.certificate,
            &material.server.key,
            std::slice::from_ref(&ca.certificate),
        ),
        builder.trust_bundle(&material.bundle),
    ];

    let session = RotationSession::new(&config.device.profile_id, entities)?
        .with_force_overwrite(config.rotation.force_overwrite);
    Ok(session)
}

/// Rotates the device credentials as described by the configuration.
///
/// The rotated client identity is saved once the device has committed it.
pub async fn run(config: &Config) -> Result<RotationOutcome> {
    let creds = &config.credentials;
    let rpc_timeout = Duration::from_secs(config.rotation.rpc_timeout);
    let renderer = renderer::for_family(&config.device.vendor)?;

    // Identity currently accepted by the device.
    let anchors = TrustBundleCodec::decode(Path::new(&creds.trust_bundle))?;
    let current = TlsCredentials::from_files(
        Path::new(&creds.client_certificate),
        Path::new(&creds.client_key),
        &anchors,
        &config.device.server_name,
    )?;

    let ca = KeyMaterialStore::load(
        Path::new(&creds.ca_key),
        Path::new(&creds.ca_certificate),
    )?;
    let material = issue(config, &ca)?;
    let mut session = session(config, &ca, &material)?;

    let validation = ValidationRequest {
        credentials: TlsCredentials::new(
            &material.client,
            material.bundle.anchors_pem(),
            &config.device.server_name,
        ),
        targets: config.validation_targets(),
        mismatch_expected: config.rotation.mismatch_expected,
    };
    let plan = RotationPlan::new(config.rotation.new_credentials, validation);

    let channel =
        tls::connect(&config.device.address, &current, rpc_timeout).await?;
    let orchestrator = RotationOrchestrator::new(
        Arc::new(GrpcDevice::new(channel.clone())),
        Arc::new(GnmiControlPlane::new(channel)),
        renderer,
        Arc::new(ServiceValidationGate::new(rpc_timeout)),
        config.rotation_config(),
    );

    let outcome = orchestrator.run(&mut session, &plan).await?;
    save(Path::new(&creds.rotated_dir), &ca, &material)?;
    info!(
        profile = %config.device.profile_id,
        surfaces = %outcome.report.surfaces.len(),
        elapsed = ?outcome.report.elapsed,
        "rotation finalized"
    );

    Ok(outcome)
}

/// Writes the rotated client identity into `dir`.
pub fn save(
    dir: &Path,
    ca: &CertificateAuthority,
    material: &RotationMaterial,
) -> Result<()> {
    encoding::ensure_dir(dir)
        .map_err(|error| IoError::CreateDir(dir.to_path_buf(), error))
        .map_err(certz_pki::Error::from)?;

    let client = &material.client;
    write(
        &dir.join(CERTIFICATE_FILE),
        client.certificate.to_pem().as_bytes(),
        false,
    )?;
    write(&dir.join(KEY_FILE), client.key.to_pkcs8_pem().as_bytes(), true)?;
    write(&dir.join(TRUST_BUNDLE_FILE), &material.bundle.raw, false)?;
    CertificateFactory::write_bundle(
        &client.certificate,
        &client.key,
        &ca.certificate,
        &dir.join(BUNDLE_FILE),
    )?;

    Ok(())
}

fn write(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    encoding::write_file(path, contents, private)
        .map_err(|error| IoError::Write(path.to_path_buf(), error))
        .map_err(certz_pki::Error::from)?;

    Ok(())
}
