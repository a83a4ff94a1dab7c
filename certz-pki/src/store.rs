//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    IsCa, KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};

use crate::certificate::Certificate;
use crate::debug::Debug;
use crate::encoding;
use crate::error::{GenerationError, InputError, Result};
use crate::keys::{self, KeyAlgorithm, KeyPair};

// Allowance for clock skew between the generating host and the device.
const NOT_BEFORE_SKEW: Duration = Duration::minutes(5);

/// A self-signed certificate authority and its private key.
///
/// The CA is read-only once created; it is only ever replaced by generating
/// a new one. Signing borrows it immutably, so it may be shared by concurrent
/// signers without locking.
#[derive(Debug)]
pub struct CertificateAuthority {
    pub certificate: Certificate,
    pub key: KeyPair,
}

/// Explicit handle used to generate or load CA key material.
///
/// Generated artifacts are written as PEM files into the store's directory.
#[derive(Clone, Debug)]
pub struct KeyMaterialStore {
    dir: PathBuf,
    cert_file: String,
    key_file: String,
}

// ===== impl CertificateAuthority =====

impl CertificateAuthority {
    /// Builds a self-signed CA in memory, without persisting it.
    pub fn generate(
        subject_name: &str,
        algorithm: KeyAlgorithm,
        validity_years: i64,
    ) -> Result<CertificateAuthority> {
        if subject_name.is_empty() {
            return Err(InputError::EmptySubjectName.into());
        }
        if validity_years <= 0 {
            return Err(InputError::InvalidValidity(validity_years).into());
        }

        let key = KeyPair::generate(algorithm)?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(subject_name.to_owned()),
        );
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.serial_number = Some(keys::random_serial()?);
        let now = OffsetDateTime::now_utc();
        params.not_before = now - NOT_BEFORE_SKEW;
        params.not_after = now + Duration::days(validity_years * 365);

        let cert = params
            .self_signed(key.as_rcgen())
            .map_err(GenerationError::SelfSign)?;
        let certificate = Certificate::from_der(cert.der().to_vec())?;

        Ok(CertificateAuthority { certificate, key })
    }
}

// ===== impl KeyMaterialStore =====

impl KeyMaterialStore {
    pub const DFLT_CERT_FILE: &'static str = "ca.pem";
    pub const DFLT_KEY_FILE: &'static str = "ca.key";

    pub fn new(dir: impl Into<PathBuf>) -> KeyMaterialStore {
        KeyMaterialStore {
            dir: dir.into(),
            cert_file: Self::DFLT_CERT_FILE.to_owned(),
            key_file: Self::DFLT_KEY_FILE.to_owned(),
        }
    }

    /// Overrides the names of the certificate and key files.
    pub fn with_file_names(
        mut self,
        cert_file: impl Into<String>,
        key_file: impl Into<String>,
    ) -> KeyMaterialStore {
        self.cert_file = cert_file.into();
        self.key_file = key_file.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cert_path(&self) -> PathBuf {
        self.dir.join(&self.cert_file)
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.join(&self.key_file)
    }

    /// Generates a fresh self-signed CA and writes its key and certificate
    /// into the store's directory.
    pub fn generate(
        &self,
        subject_name: &str,
        algorithm: KeyAlgorithm,
        validity_years: i64,
    ) -> Result<CertificateAuthority> {
        let ca = CertificateAuthority::generate(
            subject_name,
            algorithm,
            validity_years,
        )?;
        let CertificateAuthority { certificate, key } = &ca;

        // Persist the key material.
        let output = |path: PathBuf, error| GenerationError::Output(path, error);
        encoding::ensure_dir(&self.dir)
            .map_err(|error| output(self.dir.clone(), error))?;
        let key_path = self.key_path();
        encoding::write_file(&key_path, key.to_pkcs8_pem().as_bytes(), true)
            .map_err(|error| output(key_path.clone(), error))?;
        let cert_path = self.cert_path();
        encoding::write_file(
            &cert_path,
            certificate.to_pem().as_bytes(),
            false,
        )
        .map_err(|error| output(cert_path.clone(), error))?;

        Debug::CaGenerated(subject_name, algorithm, &self.dir).log();

        Ok(ca)
    }

    /// Loads a CA from a PEM-encoded key file and certificate file.
    pub fn load(key_path: &Path, cert_path: &Path) -> Result<CertificateAuthority> {
        let key = KeyPair::from_pem(&encoding::read_file(key_path)?)?;
        let certificate =
            Certificate::from_pem(&encoding::read_file(cert_path)?)?;

        Debug::CaLoaded(cert_path).log();

        Ok(CertificateAuthority { certificate, key })
    }

    /// Loads the CA previously generated into this store's directory.
    pub fn load_existing(&self) -> Result<CertificateAuthority> {
        KeyMaterialStore::load(&self.key_path(), &self.cert_path())
    }
}
