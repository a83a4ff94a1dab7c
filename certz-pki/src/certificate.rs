//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;

use crate::encoding;
use crate::error::{ParseError, Result, VerifyError};
use crate::keys::KeyType;

/// A DER-encoded X.509 certificate.
///
/// The DER payload is validated on construction, so every `Certificate`
/// value is known to parse.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Certificate {
    der: Vec<u8>,
}

/// Parsed view of the fields of a certificate relevant to rotation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub common_name: String,
    pub serial: Vec<u8>,
    pub not_before: i64,
    pub not_after: i64,
    pub is_ca: bool,
    pub key_cert_sign: bool,
    pub digital_signature: bool,
    pub client_auth: bool,
    pub server_auth: bool,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<String>,
    pub key_type: KeyType,
}

// ===== impl Certificate =====

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Result<Certificate> {
        parse(&der)?;
        Ok(Certificate { der })
    }

    /// Parses a PEM document holding exactly one `CERTIFICATE` block.
    pub fn from_pem(data: &[u8]) -> Result<Certificate> {
        let block =
            encoding::decode_single(data, &[encoding::LABEL_CERTIFICATE])?;
        Certificate::from_der(block.into_contents())
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        encoding::encode(encoding::LABEL_CERTIFICATE, &self.der)
    }

    pub fn info(&self) -> Result<CertificateInfo> {
        let cert = parse(&self.der)?;
        let ext_error =
            |error: x509_parser::error::X509Error| -> crate::error::Error {
                ParseError::Certificate(error.to_string()).into()
            };

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_owned();

        let (key_cert_sign, digital_signature) = cert
            .key_usage()
            .map_err(ext_error)?
            .map(|ext| (ext.value.key_cert_sign(), ext.value.digital_signature()))
            .unwrap_or_default();

        let (client_auth, server_auth) = cert
            .extended_key_usage()
            .map_err(ext_error)?
            .map(|ext| (ext.value.client_auth, ext.value.server_auth))
            .unwrap_or_default();

        let mut dns_names = vec![];
        let mut ip_addresses = vec![];
        let mut uris = vec![];
        if let Some(san) = cert.subject_alternative_name().map_err(ext_error)? {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(name) => {
                        dns_names.push((*name).to_owned())
                    }
                    GeneralName::URI(uri) => uris.push((*uri).to_owned()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(addr) = ip_from_bytes(bytes) {
                            ip_addresses.push(addr);
                        }
                    }
                    _ => (),
                }
            }
        }

        let key_type = match cert.public_key().parsed() {
            Ok(PublicKey::RSA(_)) => KeyType::Rsa,
            Ok(PublicKey::EC(_)) => KeyType::Ecdsa,
            _ => KeyType::Other,
        };

        Ok(CertificateInfo {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            common_name,
            serial: cert.raw_serial().to_vec(),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            is_ca: cert.is_ca(),
            key_cert_sign,
            digital_signature,
            client_auth,
            server_auth,
            dns_names,
            ip_addresses,
            uris,
            key_type,
        })
    }

    /// Returns whether the certificate is self-issued (issuer == subject).
    pub fn is_self_issued(&self) -> Result<bool> {
        let cert = parse(&self.der)?;
        Ok(cert.subject().as_raw() == cert.issuer().as_raw())
    }

    /// Verifies this certificate against a pool of trust anchors.
    ///
    /// The certificate must be within its validity window and signed by a
    /// pool member whose subject matches its issuer, which must itself be a
    /// currently valid CA allowed to sign certificates.
    pub fn verify(&self, trust_pool: &[Certificate]) -> Result<()> {
        let cert = parse(&self.der)?;
        if !cert.validity().is_valid() {
            return Err(VerifyError::Expired.into());
        }

        let mut last_error = VerifyError::UnknownIssuer;
        for anchor in trust_pool {
            let anchor = parse(&anchor.der)?;
            if anchor.subject().as_raw() != cert.issuer().as_raw() {
                continue;
            }

            if cert.verify_signature(Some(anchor.public_key())).is_err() {
                last_error = VerifyError::BadSignature;
                continue;
            }
            if !anchor.is_ca() {
                last_error = VerifyError::IssuerNotCa;
                continue;
            }
            let can_sign = anchor
                .key_usage()
                .ok()
                .flatten()
                .is_some_and(|ext| ext.value.key_cert_sign());
            if !can_sign {
                last_error = VerifyError::IssuerCannotSign;
                continue;
            }
            if !anchor.validity().is_valid() {
                last_error = VerifyError::Expired;
                continue;
            }

            return Ok(());
        }

        Err(last_error.into())
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match parse(&self.der) {
            Ok(cert) => f
                .debug_struct("Certificate")
                .field("subject", &cert.subject().to_string())
                .field("serial", &cert.raw_serial_as_string())
                .finish(),
            Err(_) => f.debug_struct("Certificate").finish_non_exhaustive(),
        }
    }
}

// ===== global functions =====

fn parse(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (rest, cert) = X509Certificate::from_der(der)
        .map_err(|error| ParseError::Certificate(error.to_string()))?;
    if !rest.is_empty() {
        return Err(ParseError::Certificate(format!(
            "{} trailing bytes after certificate",
            rest.len()
        ))
        .into());
    }
    Ok(cert)
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}
