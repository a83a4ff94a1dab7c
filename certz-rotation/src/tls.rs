//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::Path;
use std::time::Duration;

use certz_pki::{SignedCertificate, TrustBundle, encoding};
use tonic::transport::{
    Certificate, Channel, ClientTlsConfig, Endpoint, Identity,
};

use crate::error::{ConnectError, Result};

/// TLS material used to dial a device: a client identity, the trust anchors
/// used to authenticate the device and the name it must present.
#[derive(Clone, Debug)]
pub struct TlsCredentials {
    // Client certificate chain, leaf first.
    pub certificate_pem: String,
    pub key_pem: String,
    // Concatenated trust anchors.
    pub anchors_pem: String,
    pub server_name: String,
}

// ===== impl TlsCredentials =====

impl TlsCredentials {
    pub fn new(
        signed: &SignedCertificate,
        anchors_pem: impl Into<String>,
        server_name: impl Into<String>,
    ) -> TlsCredentials {
        TlsCredentials {
            certificate_pem: signed.certificate.to_pem(),
            key_pem: signed.key.to_pkcs8_pem(),
            anchors_pem: anchors_pem.into(),
            server_name: server_name.into(),
        }
    }

    /// Loads the client identity from PEM files, trusting the anchors of the
    /// given bundle.
    pub fn from_files(
        certificate: &Path,
        key: &Path,
        anchors: &TrustBundle,
        server_name: impl Into<String>,
    ) -> Result<TlsCredentials> {
        let certificate_pem = encoding::read_file(certificate)?;
        let key_pem = encoding::read_file(key)?;

        Ok(TlsCredentials {
            certificate_pem: String::from_utf8_lossy(&certificate_pem)
                .into_owned(),
            key_pem: String::from_utf8_lossy(&key_pem).into_owned(),
            anchors_pem: anchors.anchors_pem(),
            server_name: server_name.into(),
        })
    }

    fn client_config(&self) -> ClientTlsConfig {
        let identity =
            Identity::from_pem(&self.certificate_pem, &self.key_pem);
        ClientTlsConfig::new()
            .identity(identity)
            .ca_certificate(Certificate::from_pem(&self.anchors_pem))
            .domain_name(self.server_name.clone())
    }
}

// ===== global functions =====

// Builds a TLS endpoint for the given address.
pub(crate) fn endpoint(
    address: &str,
    credentials: &TlsCredentials,
    timeout: Duration,
) -> Result<Endpoint> {
    let endpoint = Endpoint::from_shared(format!("https://{address}"))
        .map_err(|_| ConnectError::InvalidAddress(address.to_owned()))?
        .connect_timeout(timeout)
        .tls_config(credentials.client_config())
        .map_err(ConnectError::Tls)?;

    Ok(endpoint)
}

/// Opens a TLS channel to the given address.
///
/// Each call dials a new connection, which is closed once the last handle to
/// the returned channel is dropped.
pub async fn connect(
    address: &str,
    credentials: &TlsCredentials,
    timeout: Duration,
) -> Result<Channel> {
    let channel = endpoint(address, credentials, timeout)?
        .connect()
        .await
        .map_err(|error| ConnectError::Transport(address.to_owned(), error))?;

    Ok(channel)
}
