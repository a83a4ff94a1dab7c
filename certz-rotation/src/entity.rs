//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use certz_pki::{Certificate, KeyPair, TrustBundle};
use chrono::Utc;

use crate::error::{PreconditionError, Result};
use crate::proto::certz as proto;

/// A versioned, timestamped envelope carrying one rotation payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RotationEntity {
    pub version: String,
    // Seconds since the epoch.
    pub created_on: u64,
    pub payload: EntityPayload,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntityPayload {
    CertificateChain(CertificateChain),
    TrustBundle(String),
    RevocationLists(Vec<RevocationList>),
    AuthenticationPolicy(Vec<u8>),
}

/// A certificate chain, ordered from the leaf up to the last parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateChain {
    pub links: Vec<ChainLink>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChainLink {
    pub certificate: Certificate,
    // PKCS#8 PEM, only present on the leaf.
    pub private_key: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevocationList {
    pub id: String,
    pub pem: Vec<u8>,
}

/// Wraps signed certificates and trust bundles into rotation entities.
#[derive(Clone, Debug)]
pub struct RotationEntityBuilder {
    version: String,
    created_on: u64,
}

// ===== impl RotationEntity =====

impl RotationEntity {
    pub fn kind(&self) -> &'static str {
        match self.payload {
            EntityPayload::CertificateChain(..) => "certificate-chain",
            EntityPayload::TrustBundle(..) => "trust-bundle",
            EntityPayload::RevocationLists(..) => "revocation-list",
            EntityPayload::AuthenticationPolicy(..) => "authentication-policy",
        }
    }

    pub fn to_proto(&self) -> proto::Entity {
        use proto::entity::Entity;

        let entity = match &self.payload {
            EntityPayload::CertificateChain(chain) => {
                Entity::CertificateChain(chain.to_proto())
            }
            EntityPayload::TrustBundle(pkcs7) => {
                Entity::TrustBundlePkcs7(proto::TrustBundle {
                    pkcs7_block: pkcs7.clone(),
                })
            }
            EntityPayload::RevocationLists(crls) => {
                let certificate_revocation_lists = crls
                    .iter()
                    .map(|crl| proto::CertificateRevocationList {
                        r#type: proto::CertificateType::CertX509 as i32,
                        encoding: proto::CertificateEncoding::CertEncodingPem
                            as i32,
                        certificate_revocation_list: crl.pem.clone(),
                        id: crl.id.clone(),
                    })
                    .collect();
                Entity::CertificateRevocationListBundle(
                    proto::CertificateRevocationListBundle {
                        certificate_revocation_lists,
                    },
                )
            }
            EntityPayload::AuthenticationPolicy(serialized) => {
                Entity::AuthenticationPolicy(proto::AuthenticationPolicy {
                    serialized: serialized.clone(),
                })
            }
        };

        proto::Entity {
            version: self.version.clone(),
            created_on: self.created_on,
            entity: Some(entity),
        }
    }
}

// ===== impl CertificateChain =====

impl CertificateChain {
    // Nests the chain links so that each certificate points to its parent.
    fn to_proto(&self) -> proto::CertificateChain {
        let mut parent = None;
        for link in self.links.iter().rev() {
            let certificate = proto::Certificate {
                r#type: proto::CertificateType::CertX509 as i32,
                encoding: proto::CertificateEncoding::CertEncodingPem as i32,
                certificate: link.certificate.to_pem().into_bytes(),
                private_key: link
                    .private_key
                    .clone()
                    .map(String::into_bytes)
                    .unwrap_or_default(),
            };
            parent = Some(Box::new(proto::CertificateChain {
                certificate: Some(certificate),
                parent,
            }));
        }

        parent.map(|chain| *chain).unwrap_or_default()
    }
}

// ===== impl RotationEntityBuilder =====

impl RotationEntityBuilder {
    pub fn new(version: impl Into<String>) -> Result<RotationEntityBuilder> {
        let version = version.into();
        if version.is_empty() {
            return Err(PreconditionError::EmptyVersion.into());
        }

        let created_on = Utc::now().timestamp().max(0) as u64;
        Ok(RotationEntityBuilder {
            version,
            created_on,
        })
    }

    /// Overrides the creation timestamp, in seconds since the epoch.
    pub fn created_on(mut self, created_on: u64) -> Self {
        self.created_on = created_on;
        self
    }

    /// Leaf certificate with its private key, followed by its issuers.
    pub fn certificate_chain(
        &self,
        leaf: &Certificate,
        key: &KeyPair,
        issuers: &[Certificate],
    ) -> RotationEntity {
        let links = std::iter::once(ChainLink {
            certificate: leaf.clone(),
            private_key: Some(key.to_pkcs8_pem()),
        })
        .chain(issuers.iter().map(|certificate| ChainLink {
            certificate: certificate.clone(),
            private_key: None,
        }))
        .collect();

        self.entity(EntityPayload::CertificateChain(CertificateChain { links }))
    }

    pub fn trust_bundle(&self, bundle: &TrustBundle) -> RotationEntity {
        self.entity(EntityPayload::TrustBundle(bundle.pkcs7_pem()))
    }

    pub fn revocation_lists(&self, crls: Vec<RevocationList>) -> RotationEntity {
        self.entity(EntityPayload::RevocationLists(crls))
    }

    /// Authentication policy, as an opaque serialized payload.
    pub fn authentication_policy(&self, serialized: Vec<u8>) -> RotationEntity {
        self.entity(EntityPayload::AuthenticationPolicy(serialized))
    }

    fn entity(&self, payload: EntityPayload) -> RotationEntity {
        RotationEntity {
            version: self.version.clone(),
            created_on: self.created_on,
            payload,
        }
    }
}
