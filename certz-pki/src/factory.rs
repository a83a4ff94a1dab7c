//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::path::Path;

use rcgen::string::Ia5String;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyUsagePurpose, SanType,
};
use time::{Duration, OffsetDateTime};

use crate::certificate::Certificate;
use crate::debug::Debug;
use crate::encoding;
use crate::error::{InputError, IoError, Result, SigningError};
use crate::keys::{self, KeyAlgorithm, KeyPair};
use crate::store::CertificateAuthority;

const SPIFFE_SCHEME: &str = "spiffe://";

/// Leaf certificate template with its subject alternative names.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateTemplate {
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub spiffe_uri: Option<String>,
    pub validity_days: u32,
}

/// A freshly signed leaf certificate and the key it was issued for.
#[derive(Debug)]
pub struct SignedCertificate {
    pub certificate: Certificate,
    pub key: KeyPair,
}

/// Issues leaf certificates signed by a borrowed certificate authority.
#[derive(Debug)]
pub struct CertificateFactory<'a> {
    ca: &'a CertificateAuthority,
}

// ===== impl CertificateTemplate =====

impl CertificateTemplate {
    // Subject alternative names in the order they are emitted.
    fn subject_alt_names(&self) -> Result<Vec<SanType>> {
        let mut sans = vec![];
        for name in &self.dns_names {
            let name = Ia5String::try_from(name.as_str())
                .map_err(|_| InputError::InvalidDnsName(name.clone()))?;
            sans.push(SanType::DnsName(name));
        }
        for addr in &self.ip_addresses {
            sans.push(SanType::IpAddress(*addr));
        }
        if let Some(uri) = &self.spiffe_uri {
            let uri = Ia5String::try_from(uri.as_str())
                .map_err(|_| InputError::InvalidSpiffeUri(uri.clone()))?;
            sans.push(SanType::URI(uri));
        }
        Ok(sans)
    }
}

// ===== impl CertificateFactory =====

impl<'a> CertificateFactory<'a> {
    pub fn new(ca: &'a CertificateAuthority) -> CertificateFactory<'a> {
        CertificateFactory { ca }
    }

    /// Builds a leaf certificate template.
    ///
    /// A non-empty `spiffe_uri` is added as a URI SAN and also becomes the
    /// only DNS name of the certificate, replacing `dns_names`: the SPIFFE ID
    /// doubles as the DNS-form name of the workload identity.
    pub fn build_template(
        common_name: &str,
        dns_names: &[String],
        ip_addresses: &[IpAddr],
        spiffe_uri: &str,
        validity_days: u32,
    ) -> Result<CertificateTemplate> {
        if common_name.is_empty() {
            return Err(InputError::EmptyCommonName.into());
        }
        if dns_names.is_empty() && ip_addresses.is_empty() && spiffe_uri.is_empty()
        {
            return Err(InputError::MissingSubjectAltName.into());
        }
        if validity_days == 0 {
            return Err(InputError::InvalidValidity(0).into());
        }

        let (dns_names, spiffe_uri) = if spiffe_uri.is_empty() {
            (dns_names.to_vec(), None)
        } else {
            if !spiffe_uri.starts_with(SPIFFE_SCHEME) {
                return Err(
                    InputError::InvalidSpiffeUri(spiffe_uri.to_owned()).into()
                );
            }
            (vec![spiffe_uri.to_owned()], Some(spiffe_uri.to_owned()))
        };

        Ok(CertificateTemplate {
            common_name: common_name.to_owned(),
            dns_names,
            ip_addresses: ip_addresses.to_vec(),
            spiffe_uri,
            validity_days,
        })
    }

    /// Generates a key pair and signs a leaf certificate for it.
    ///
    /// The issued certificate is re-parsed and verified against the CA before
    /// being returned, so a certificate that would not round-trip is never
    /// handed out.
    pub fn sign(
        &self,
        template: &CertificateTemplate,
        algorithm: KeyAlgorithm,
    ) -> Result<SignedCertificate> {
        let key = KeyPair::generate(algorithm)?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(template.common_name.clone()),
        );
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ];
        params.subject_alt_names = template.subject_alt_names()?;
        params.serial_number = Some(keys::random_serial()?);
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::minutes(5);
        params.not_after = now + Duration::days(template.validity_days.into());

        let issuer = Issuer::from_ca_cert_pem(
            &self.ca.certificate.to_pem(),
            self.ca.key.as_rcgen(),
        )
        .map_err(SigningError::Issuer)?;
        let cert = params
            .signed_by(key.as_rcgen(), &issuer)
            .map_err(SigningError::Sign)?;

        // Re-parse the emitted DER and check it chains to the CA.
        let certificate = Certificate::from_der(cert.der().to_vec())
            .map_err(|error| SigningError::Reparse(Box::new(error)))?;
        certificate
            .verify(std::slice::from_ref(&self.ca.certificate))
            .map_err(|error| SigningError::Verify(Box::new(error)))?;

        Debug::CertificateSigned(&template.common_name, algorithm).log();

        Ok(SignedCertificate { certificate, key })
    }

    /// Writes a combined PEM bundle: leaf certificate, PKCS#8 private key and
    /// CA certificate, in that order and with no other separators.
    pub fn write_bundle(
        certificate: &Certificate,
        private_key: &KeyPair,
        ca_certificate: &Certificate,
        path: &Path,
    ) -> Result<()> {
        let contents = Self::bundle_pem(certificate, private_key, ca_certificate);
        encoding::write_file(path, contents.as_bytes(), true)
            .map_err(|error| IoError::Write(path.to_path_buf(), error))?;

        Debug::BundleWritten(path).log();

        Ok(())
    }

    pub fn bundle_pem(
        certificate: &Certificate,
        private_key: &KeyPair,
        ca_certificate: &Certificate,
    ) -> String {
        let mut contents = certificate.to_pem();
        contents.push_str(&private_key.to_pkcs8_pem());
        contents.push_str(&ca_certificate.to_pem());
        contents
    }
}
