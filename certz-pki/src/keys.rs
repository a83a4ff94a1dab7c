//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use pem::Pem;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rcgen::{
    PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384, PKCS_RSA_SHA256,
    PublicKeyData, RsaKeySize, SerialNumber, SignatureAlgorithm,
};
use serde::{Deserialize, Serialize};
use yasna::models::ObjectIdentifier;

use crate::encoding;
use crate::error::{
    DecodeError, Error, GenerationError, InputError, ParseError, Result,
};

// rsaEncryption, the algorithm identifier of PKCS#1 keys.
const OID_RSA_ENCRYPTION: &[u64] = &[1, 2, 840, 113549, 1, 1, 1];

// Length of randomly generated certificate serial numbers, in bytes.
const SERIAL_NUMBER_LEN: usize = 16;

// Key algorithms supported for CA and leaf key material.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyAlgorithm {
    Rsa2048,
    Rsa4096,
    #[default]
    EcdsaP256,
    EcdsaP384,
}

// Family of a public key, used to detect key-type mismatches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyType {
    Rsa,
    Ecdsa,
    Other,
}

/// An asymmetric private key together with its public half.
///
/// A `KeyPair` is exclusively owned by the certificate it backs and is never
/// persisted other than through the PEM artifacts it is written into.
#[derive(Debug)]
pub struct KeyPair {
    inner: rcgen::KeyPair,
}

// ===== impl KeyAlgorithm =====

impl KeyAlgorithm {
    pub fn signature_algorithm(&self) -> &'static SignatureAlgorithm {
        match self {
            KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => &PKCS_RSA_SHA256,
            KeyAlgorithm::EcdsaP256 => &PKCS_ECDSA_P256_SHA256,
            KeyAlgorithm::EcdsaP384 => &PKCS_ECDSA_P384_SHA384,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => KeyType::Rsa,
            KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdsaP384 => {
                KeyType::Ecdsa
            }
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<KeyAlgorithm> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" | "rsa-2048" | "rsa2048" => Ok(KeyAlgorithm::Rsa2048),
            "rsa-4096" | "rsa4096" => Ok(KeyAlgorithm::Rsa4096),
            "ecdsa" | "ecdsa-p256" | "p256" => Ok(KeyAlgorithm::EcdsaP256),
            "ecdsa-p384" | "p384" => Ok(KeyAlgorithm::EcdsaP384),
            _ => Err(InputError::UnknownAlgorithm(s.to_owned()).into()),
        }
    }
}

impl TryFrom<String> for KeyAlgorithm {
    type Error = Error;

    fn try_from(s: String) -> Result<KeyAlgorithm> {
        s.parse()
    }
}

impl From<KeyAlgorithm> for String {
    fn from(algorithm: KeyAlgorithm) -> String {
        algorithm.to_string()
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAlgorithm::Rsa2048 => write!(f, "rsa-2048"),
            KeyAlgorithm::Rsa4096 => write!(f, "rsa-4096"),
            KeyAlgorithm::EcdsaP256 => write!(f, "ecdsa-p256"),
            KeyAlgorithm::EcdsaP384 => write!(f, "ecdsa-p384"),
        }
    }
}

// ===== impl KeyPair =====

impl KeyPair {
    /// Generates a fresh key pair for the given algorithm.
    pub fn generate(algorithm: KeyAlgorithm) -> Result<KeyPair> {
        let alg = algorithm.signature_algorithm();
        let inner = match algorithm {
            KeyAlgorithm::Rsa2048 => {
                rcgen::KeyPair::generate_rsa_for(alg, RsaKeySize::_2048)
            }
            KeyAlgorithm::Rsa4096 => {
                rcgen::KeyPair::generate_rsa_for(alg, RsaKeySize::_4096)
            }
            KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdsaP384 => {
                rcgen::KeyPair::generate_for(alg)
            }
        }
        .map_err(GenerationError::KeyPair)?;

        Ok(KeyPair { inner })
    }

    /// Parses a private key PEM document.
    ///
    /// Both PKCS#8 (`PRIVATE KEY`) and PKCS#1 (`RSA PRIVATE KEY`) encodings
    /// are accepted. The document must hold exactly one PEM block.
    pub fn from_pem(data: &[u8]) -> Result<KeyPair> {
        let block = encoding::decode_single(
            data,
            &[encoding::LABEL_PRIVATE_KEY, encoding::LABEL_RSA_PRIVATE_KEY],
        )?;
        KeyPair::from_pem_block(&block)
    }

    pub(crate) fn from_pem_block(block: &Pem) -> Result<KeyPair> {
        let pkcs8 = match block.tag() {
            encoding::LABEL_PRIVATE_KEY => block.contents().to_vec(),
            encoding::LABEL_RSA_PRIVATE_KEY => pkcs1_to_pkcs8(block.contents()),
            label => {
                return Err(
                    DecodeError::UnexpectedLabel(label.to_owned()).into()
                );
            }
        };
        let inner = rcgen::KeyPair::try_from(pkcs8.as_slice())
            .map_err(ParseError::PrivateKey)?;

        Ok(KeyPair { inner })
    }

    /// Returns the PKCS#8 PEM encoding of the private key.
    pub fn to_pkcs8_pem(&self) -> String {
        encoding::encode(encoding::LABEL_PRIVATE_KEY, &self.to_pkcs8_der())
    }

    pub fn to_pkcs8_der(&self) -> Vec<u8> {
        self.inner.serialize_der()
    }

    pub fn public_key_der(&self) -> Vec<u8> {
        self.inner.der_bytes().to_vec()
    }

    pub fn key_type(&self) -> KeyType {
        let alg = self.inner.algorithm();
        if alg == &PKCS_RSA_SHA256 {
            KeyType::Rsa
        } else if alg == &PKCS_ECDSA_P256_SHA256 || alg == &PKCS_ECDSA_P384_SHA384
        {
            KeyType::Ecdsa
        } else {
            KeyType::Other
        }
    }

    pub(crate) fn as_rcgen(&self) -> &rcgen::KeyPair {
        &self.inner
    }
}

// ===== global functions =====

// Draws a positive, non-zero serial number from the operating system's
// cryptographically secure random source.
pub(crate) fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_NUMBER_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|error| GenerationError::RandomSource(error.to_string()))?;

    // Clear the sign bit and keep the leading octet non-zero so the DER
    // INTEGER stays positive and of fixed length.
    bytes[0] &= 0x7f;
    bytes[0] |= 0x01;

    Ok(SerialNumber::from(bytes.to_vec()))
}

// Wraps a PKCS#1 RSAPrivateKey into a PKCS#8 PrivateKeyInfo, so that keys
// are always held (and written back) in PKCS#8 form.
fn pkcs1_to_pkcs8(pkcs1: &[u8]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_u8(0);
            writer.next().write_sequence(|writer| {
                writer.next().write_oid(&ObjectIdentifier::from_slice(
                    OID_RSA_ENCRYPTION,
                ));
                writer.next().write_null();
            });
            writer.next().write_bytes(pkcs1);
        });
    })
}
