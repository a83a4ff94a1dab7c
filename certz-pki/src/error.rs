//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use tracing::{error, warn};

//
// Type aliases.
//
pub type Result<T> = std::result::Result<T, Error>;

// PKI errors.
#[derive(Debug)]
pub enum Error {
    // Invalid API or CLI arguments
    InvalidInput(InputError),
    // File-system errors
    NotFound(PathBuf),
    Io(IoError),
    // Cryptographic errors
    Generation(GenerationError),
    Signing(SigningError),
    Decode(DecodeError),
    Parse(ParseError),
    Verification(VerifyError),
}

// Coarse error classes, used by callers to decide how a failure propagates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Input,
    Io,
    Crypto,
}

#[derive(Debug)]
pub enum InputError {
    EmptyCommonName,
    EmptySubjectName,
    MissingSubjectAltName,
    InvalidDnsName(String),
    InvalidSpiffeUri(String),
    InvalidValidity(i64),
    UnknownAlgorithm(String),
    EmptyTrustBundle,
}

#[derive(Debug)]
pub enum IoError {
    Read(PathBuf, std::io::Error),
    Write(PathBuf, std::io::Error),
    CreateDir(PathBuf, std::io::Error),
}

#[derive(Debug)]
pub enum GenerationError {
    RandomSource(String),
    KeyPair(rcgen::Error),
    SelfSign(rcgen::Error),
    Output(PathBuf, std::io::Error),
}

// Failures issuing a leaf certificate, including the post-issuance check of
// the emitted certificate.
#[derive(Debug)]
pub enum SigningError {
    Issuer(rcgen::Error),
    Sign(rcgen::Error),
    Reparse(Box<Error>),
    Verify(Box<Error>),
}

#[derive(Debug)]
pub enum DecodeError {
    NoPemBlock,
    TooManyPemBlocks(usize),
    UnexpectedLabel(String),
    Malformed(pem::PemError),
}

#[derive(Debug)]
pub enum ParseError {
    Certificate(String),
    PrivateKey(rcgen::Error),
    Pkcs7(String),
    EmptyTrustBundle,
}

#[derive(Debug, Eq, PartialEq)]
pub enum VerifyError {
    UnknownIssuer,
    BadSignature,
    IssuerNotCa,
    IssuerCannotSign,
    Expired,
}

// ===== impl Error =====

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(..) => ErrorKind::Input,
            Error::NotFound(..) | Error::Io(..) => ErrorKind::Io,
            Error::Generation(GenerationError::Output(..)) => ErrorKind::Io,
            Error::Generation(..)
            | Error::Signing(..)
            | Error::Decode(..)
            | Error::Parse(..)
            | Error::Verification(..) => ErrorKind::Crypto,
        }
    }

    pub fn log(&self) {
        match self {
            Error::InvalidInput(error) => {
                warn!(%error, "{}", self);
            }
            Error::NotFound(path) => {
                warn!(path = %path.display(), "{}", self);
            }
            Error::Io(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            Error::Generation(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            Error::Signing(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            Error::Decode(error) => {
                warn!(%error, "{}", self);
            }
            Error::Parse(error) => {
                warn!(%error, "{}", self);
            }
            Error::Verification(error) => {
                warn!(%error, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(..) => write!(f, "invalid input"),
            Error::NotFound(path) => {
                write!(f, "file not found: {}", path.display())
            }
            Error::Io(error) => std::fmt::Display::fmt(error, f),
            Error::Generation(..) => {
                write!(f, "failed to generate key material")
            }
            Error::Signing(..) => write!(f, "failed to sign certificate"),
            Error::Decode(..) => write!(f, "failed to decode PEM data"),
            Error::Parse(..) => write!(f, "failed to parse DER data"),
            Error::Verification(..) => {
                write!(f, "failed to verify certificate")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidInput(error) => Some(error),
            Error::Io(error) => Some(error),
            Error::Generation(error) => Some(error),
            Error::Signing(error) => Some(error),
            Error::Decode(error) => Some(error),
            Error::Parse(error) => Some(error),
            Error::Verification(error) => Some(error),
            Error::NotFound(..) => None,
        }
    }
}

impl From<InputError> for Error {
    fn from(error: InputError) -> Error {
        Error::InvalidInput(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::Io(error)
    }
}

impl From<GenerationError> for Error {
    fn from(error: GenerationError) -> Error {
        Error::Generation(error)
    }
}

impl From<SigningError> for Error {
    fn from(error: SigningError) -> Error {
        Error::Signing(error)
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Error {
        Error::Decode(error)
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Error {
        Error::Parse(error)
    }
}

impl From<VerifyError> for Error {
    fn from(error: VerifyError) -> Error {
        Error::Verification(error)
    }
}

// ===== impl InputError =====

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::EmptyCommonName => {
                write!(f, "common name must not be empty")
            }
            InputError::EmptySubjectName => {
                write!(f, "subject name must not be empty")
            }
            InputError::MissingSubjectAltName => {
                write!(
                    f,
                    "at least one IP address, DNS name or SPIFFE ID is required"
                )
            }
            InputError::InvalidDnsName(name) => {
                write!(f, "invalid DNS name: {name}")
            }
            InputError::InvalidSpiffeUri(uri) => {
                write!(f, "invalid SPIFFE ID: {uri}")
            }
            InputError::InvalidValidity(value) => {
                write!(f, "invalid validity period: {value}")
            }
            InputError::UnknownAlgorithm(name) => {
                write!(f, "unknown key algorithm: {name}")
            }
            InputError::EmptyTrustBundle => {
                write!(f, "trust bundle must contain at least one certificate")
            }
        }
    }
}

impl std::error::Error for InputError {}

// ===== impl IoError =====

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::Read(path, ..) => {
                write!(f, "failed to read file: {}", path.display())
            }
            IoError::Write(path, ..) => {
                write!(f, "failed to write file: {}", path.display())
            }
            IoError::CreateDir(path, ..) => {
                write!(f, "failed to create directory: {}", path.display())
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::Read(_, error)
            | IoError::Write(_, error)
            | IoError::CreateDir(_, error) => Some(error),
        }
    }
}

// ===== impl GenerationError =====

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::RandomSource(error) => {
                write!(f, "random source failure: {error}")
            }
            GenerationError::KeyPair(..) => {
                write!(f, "failed to generate key pair")
            }
            GenerationError::SelfSign(..) => {
                write!(f, "failed to self-sign CA certificate")
            }
            GenerationError::Output(path, ..) => {
                write!(f, "output location not writable: {}", path.display())
            }
        }
    }
}

impl std::error::Error for GenerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerationError::KeyPair(error)
            | GenerationError::SelfSign(error) => Some(error),
            GenerationError::Output(_, error) => Some(error),
            GenerationError::RandomSource(..) => None,
        }
    }
}

// ===== impl SigningError =====

impl std::fmt::Display for SigningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningError::Issuer(..) => {
                write!(f, "failed to load CA as issuer")
            }
            SigningError::Sign(..) => {
                write!(f, "failed to sign leaf certificate")
            }
            SigningError::Reparse(..) => {
                write!(f, "issued certificate does not parse")
            }
            SigningError::Verify(..) => {
                write!(f, "issued certificate does not chain to the CA")
            }
        }
    }
}

impl std::error::Error for SigningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SigningError::Issuer(error) | SigningError::Sign(error) => {
                Some(error)
            }
            SigningError::Reparse(error) | SigningError::Verify(error) => {
                Some(error.as_ref())
            }
        }
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::NoPemBlock => write!(f, "no PEM block found"),
            DecodeError::TooManyPemBlocks(count) => {
                write!(f, "expected exactly one PEM block, found {count}")
            }
            DecodeError::UnexpectedLabel(label) => {
                write!(f, "unexpected PEM label: {label}")
            }
            DecodeError::Malformed(..) => write!(f, "malformed PEM data"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Malformed(error) => Some(error),
            _ => None,
        }
    }
}

// ===== impl ParseError =====

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Certificate(error) => {
                write!(f, "invalid X.509 certificate: {error}")
            }
            ParseError::PrivateKey(error) => {
                write!(f, "invalid private key: {error}")
            }
            ParseError::Pkcs7(error) => {
                write!(f, "invalid PKCS#7 structure: {error}")
            }
            ParseError::EmptyTrustBundle => {
                write!(f, "PKCS#7 structure contains no certificates")
            }
        }
    }
}

impl std::error::Error for ParseError {}

// ===== impl VerifyError =====

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::UnknownIssuer => {
                write!(f, "issuer not found in trust pool")
            }
            VerifyError::BadSignature => {
                write!(f, "signature verification failed")
            }
            VerifyError::IssuerNotCa => {
                write!(f, "issuer is not a certificate authority")
            }
            VerifyError::IssuerCannotSign => {
                write!(f, "issuer key usage does not allow certificate signing")
            }
            VerifyError::Expired => {
                write!(f, "certificate is outside its validity period")
            }
        }
    }
}

impl std::error::Error for VerifyError {}

// ===== global functions =====

pub fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
