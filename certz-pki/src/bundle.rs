//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::Path;

use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1Result, BERReader, Tag, TagClass};

use crate::certificate::Certificate;
use crate::debug::Debug;
use crate::encoding;
use crate::error::{InputError, IoError, ParseError, Result};

// PKCS#7 content types.
const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_SIGNED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 2];

// Version of a degenerate, certificates-only SignedData structure.
const SIGNED_DATA_VERSION: u8 = 1;

// SignedData field tags.
const TAG_CONTENT: Tag = Tag {
    tag_class: TagClass::ContextSpecific,
    tag_number: 0,
};
const TAG_CERTIFICATES: Tag = Tag {
    tag_class: TagClass::ContextSpecific,
    tag_number: 0,
};
const TAG_CRLS: Tag = Tag {
    tag_class: TagClass::ContextSpecific,
    tag_number: 1,
};

/// An ordered set of trust anchors extracted from a PKCS#7 container.
///
/// The certificates keep the order in which they appear in the container,
/// since some devices use bundle position to break ties when building paths.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrustBundle {
    pub certificates: Vec<Certificate>,
    // Bytes of the PEM document, as transmitted to devices.
    pub raw: Vec<u8>,
}

#[derive(Debug)]
pub struct TrustBundleCodec;

// ===== impl TrustBundle =====

impl TrustBundle {
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Returns the trust anchors as concatenated `CERTIFICATE` PEM blocks.
    pub fn anchors_pem(&self) -> String {
        self.certificates.iter().map(Certificate::to_pem).collect()
    }

    /// Returns the raw PEM document as text.
    pub fn pkcs7_pem(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

// ===== impl TrustBundleCodec =====

impl TrustBundleCodec {
    /// Reads and decodes a PEM-wrapped PKCS#7 trust bundle.
    pub fn decode(path: &Path) -> Result<TrustBundle> {
        let data = encoding::read_file(path)?;
        TrustBundleCodec::decode_bytes(data)
    }

    /// Decodes a PEM-wrapped PKCS#7 trust bundle held in memory.
    ///
    /// Fails closed: a malformed container and a container without any
    /// certificate are both rejected.
    pub fn decode_bytes(data: Vec<u8>) -> Result<TrustBundle> {
        let block = encoding::decode_single(&data, &[encoding::LABEL_PKCS7])?;
        let ders = yasna::parse_ber(block.contents(), parse_content_info)
            .map_err(|error| ParseError::Pkcs7(error.to_string()))?;
        if ders.is_empty() {
            return Err(ParseError::EmptyTrustBundle.into());
        }

        let certificates = ders
            .into_iter()
            .map(Certificate::from_der)
            .collect::<Result<Vec<_>>>()?;

        Debug::TrustBundleDecoded(certificates.len()).log();

        Ok(TrustBundle {
            certificates,
            raw: data,
        })
    }

    /// Encodes certificates as a degenerate (certificates-only) PKCS#7
    /// SignedData structure wrapped in a `PKCS7` PEM block.
    ///
    /// The input order is preserved in the output.
    pub fn encode(certificates: &[Certificate]) -> Result<String> {
        if certificates.is_empty() {
            return Err(InputError::EmptyTrustBundle.into());
        }

        let der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(OID_SIGNED_DATA));
                writer.next().write_tagged(TAG_CONTENT, |writer| {
                    writer.write_sequence(|writer| {
                        writer.next().write_u8(SIGNED_DATA_VERSION);
                        // digestAlgorithms
                        writer.next().write_set_of(|_| {});
                        // encapContentInfo
                        writer.next().write_sequence(|writer| {
                            writer
                                .next()
                                .write_oid(&ObjectIdentifier::from_slice(OID_DATA));
                        });
                        writer.next().write_tagged_implicit(
                            TAG_CERTIFICATES,
                            |writer| {
                                writer.write_sequence_of(|writer| {
                                    for cert in certificates {
                                        writer.next().write_der(cert.der());
                                    }
                                });
                            },
                        );
                        // signerInfos
                        writer.next().write_set_of(|_| {});
                    });
                });
            });
        });

        Debug::TrustBundleEncoded(certificates.len()).log();

        Ok(encoding::encode(encoding::LABEL_PKCS7, &der))
    }

    /// Encodes certificates into a trust bundle file and returns the bundle.
    pub fn write(path: &Path, certificates: &[Certificate]) -> Result<TrustBundle> {
        let pem = TrustBundleCodec::encode(certificates)?;
        encoding::write_file(path, pem.as_bytes(), false)
            .map_err(|error| IoError::Write(path.to_path_buf(), error))?;

        Ok(TrustBundle {
            certificates: certificates.to_vec(),
            raw: pem.into_bytes(),
        })
    }
}

// ===== helper functions =====

// ContentInfo ::= SEQUENCE { contentType, [0] EXPLICIT content }
fn parse_content_info(reader: BERReader<'_, '_>) -> ASN1Result<Vec<Vec<u8>>> {
    reader.read_sequence(|seq| {
        let oid = seq.next().read_oid()?;
        if oid != ObjectIdentifier::from_slice(OID_SIGNED_DATA) {
            return Err(ASN1Error::new(yasna::ASN1ErrorKind::Invalid));
        }
        seq.next().read_tagged(TAG_CONTENT, parse_signed_data)
    })
}

// SignedData ::= SEQUENCE {
//   version, digestAlgorithms, encapContentInfo,
//   certificates [0] IMPLICIT OPTIONAL, crls [1] IMPLICIT OPTIONAL,
//   signerInfos }
fn parse_signed_data(reader: BERReader<'_, '_>) -> ASN1Result<Vec<Vec<u8>>> {
    reader.read_sequence(|seq| {
        seq.next().read_u64()?;
        seq.next().read_der()?;
        seq.next().read_der()?;

        let mut certificates = vec![];
        let mut reader = seq.next();
        if reader.lookahead_tag()? == TAG_CERTIFICATES {
            reader.read_tagged_implicit(TAG_CERTIFICATES, |reader| {
                reader.read_sequence_of(|reader| {
                    certificates.push(reader.read_der()?);
                    Ok(())
                })
            })?;
            reader = seq.next();
        }
        if reader.lookahead_tag()? == TAG_CRLS {
            reader.read_der()?;
            reader = seq.next();
        }
        reader.read_der()?;

        Ok(certificates)
    })
}
