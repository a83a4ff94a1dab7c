//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{AddrParseError, IpAddr};
use std::path::{Path, PathBuf};

use certz_pki::{
    CertificateFactory, CertificateTemplate, KeyAlgorithm, KeyMaterialStore,
    encoding,
};
use tracing::info;

pub const CERTIFICATE_FILE: &str = "certificate.pem";
pub const KEY_FILE: &str = "key.pem";
pub const CA_CERT_FILE: &str = "CABundle.pem";
pub const CA_KEY_FILE: &str = "ca.key";
pub const BUNDLE_FILE: &str = "tls_bundle.pem";

pub const DFLT_CERT_DAYS: u32 = 365;
pub const DFLT_CA_YEARS: i64 = 1;
pub const DFLT_CA_NAME: &str = "certz-ca";

/// Parameters of a certificate generation run.
#[derive(Clone, Debug)]
pub struct CertgenArgs {
    pub username: String,
    pub ips: Vec<IpAddr>,
    pub out: PathBuf,
    pub cert_days: u32,
    pub ca_years: i64,
    pub ca_name: String,
    pub algorithm: KeyAlgorithm,
}

/// Files produced by a successful run.
#[derive(Clone, Debug)]
pub struct Artifacts {
    pub certificate: PathBuf,
    pub key: PathBuf,
    pub ca_certificate: PathBuf,
    pub ca_key: PathBuf,
    pub bundle: PathBuf,
}

#[derive(Debug)]
pub enum Error {
    NoIpAddress,
    InvalidIpAddress(String, AddrParseError),
    Pki(certz_pki::Error),
}

// ===== impl CertgenArgs =====

impl CertgenArgs {
    pub fn new(
        username: impl Into<String>,
        ips: Vec<IpAddr>,
        out: impl Into<PathBuf>,
    ) -> CertgenArgs {
        CertgenArgs {
            username: username.into(),
            ips,
            out: out.into(),
            cert_days: DFLT_CERT_DAYS,
            ca_years: DFLT_CA_YEARS,
            ca_name: DFLT_CA_NAME.to_owned(),
            algorithm: KeyAlgorithm::default(),
        }
    }

    // Non-positive CA lifetimes fall back to one year.
    fn effective_ca_years(&self) -> i64 {
        if self.ca_years <= 0 { 1 } else { self.ca_years }
    }
}

// ===== impl Artifacts =====

impl Artifacts {
    fn new(out: &Path) -> Artifacts {
        Artifacts {
            certificate: out.join(CERTIFICATE_FILE),
            key: out.join(KEY_FILE),
            ca_certificate: out.join(CA_CERT_FILE),
            ca_key: out.join(CA_KEY_FILE),
            bundle: out.join(BUNDLE_FILE),
        }
    }

    fn paths(&self) -> [&Path; 5] {
        [
            &self.certificate,
            &self.key,
            &self.ca_certificate,
            &self.ca_key,
            &self.bundle,
        ]
    }

    // Removes whatever was written by a failed run.
    fn remove(&self) {
        for path in self.paths() {
            let _ = std::fs::remove_file(path);
        }
    }
}

// ===== impl Error =====

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoIpAddress => write!(f, "at least one IP address is required"),
            Error::InvalidIpAddress(ip, ..) => {
                write!(f, "invalid IP address: {ip}")
            }
            Error::Pki(error) => std::fmt::Display::fmt(error, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidIpAddress(_, error) => Some(error),
            Error::Pki(error) => Some(error),
            Error::NoIpAddress => None,
        }
    }
}

impl From<certz_pki::Error> for Error {
    fn from(error: certz_pki::Error) -> Error {
        Error::Pki(error)
    }
}

// ===== global functions =====

/// Parses a comma-separated list of IP literals.
///
/// Every element must be an IP literal on its own: empty elements and
/// surrounding whitespace are rejected.
pub fn parse_ips(ips: &str) -> Result<Vec<IpAddr>, Error> {
    if ips.is_empty() {
        return Err(Error::NoIpAddress);
    }

    ips.split(',')
        .map(|ip| {
            ip.parse::<IpAddr>()
                .map_err(|error| Error::InvalidIpAddress(ip.to_owned(), error))
        })
        .collect()
}

/// Generates a CA and a leaf certificate for `username`, and writes every
/// artifact into the output directory.
///
/// Either all artifacts are written or none is left behind.
pub fn generate(args: &CertgenArgs) -> Result<Artifacts, Error> {
    if args.ips.is_empty() {
        return Err(Error::NoIpAddress);
    }

    let template = CertificateFactory::build_template(
        &args.username,
        &[],
        &args.ips,
        "",
        args.cert_days,
    )?;

    let artifacts = Artifacts::new(&args.out);
    match write_artifacts(args, &template, &artifacts) {
        Ok(()) => {
            info!(dir = %args.out.display(), "certificates generated");
            Ok(artifacts)
        }
        Err(error) => {
            artifacts.remove();
            Err(error)
        }
    }
}

fn write_artifacts(
    args: &CertgenArgs,
    template: &CertificateTemplate,
    artifacts: &Artifacts,
) -> Result<(), Error> {
    let store = KeyMaterialStore::new(&args.out)
        .with_file_names(CA_CERT_FILE, CA_KEY_FILE);
    let ca = store.generate(
        &args.ca_name,
        args.algorithm,
        args.effective_ca_years(),
    )?;
    let signed = CertificateFactory::new(&ca).sign(template, args.algorithm)?;

    write(&artifacts.certificate, &signed.certificate.to_pem(), false)?;
    write(&artifacts.key, &signed.key.to_pkcs8_pem(), true)?;
    CertificateFactory::write_bundle(
        &signed.certificate,
        &signed.key,
        &ca.certificate,
        &artifacts.bundle,
    )?;

    Ok(())
}

fn write(path: &Path, contents: &str, private: bool) -> Result<(), Error> {
    encoding::write_file(path, contents.as_bytes(), private).map_err(|error| {
        certz_pki::Error::from(certz_pki::error::IoError::Write(
            path.to_path_buf(),
            error,
        ))
    })?;

    Ok(())
}
