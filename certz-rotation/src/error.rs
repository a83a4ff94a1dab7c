//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use itertools::Itertools;
use tracing::{error, warn};

use crate::gate::ValidationReport;
use crate::session::RotationState;

//
// Type aliases.
//
pub type Result<T> = std::result::Result<T, Error>;

// Rotation errors.
#[derive(Debug)]
pub enum Error {
    // Programming errors
    Precondition(PreconditionError),
    UnsupportedDevice(String),
    // Key material errors
    Pki(certz_pki::Error),
    // Device errors
    Connect(ConnectError),
    Protocol(ProtocolError),
    ControlPlane(tonic::Status),
    // Post-rotation connectivity check errors
    ValidationFailed(ValidationReport),
}

#[derive(Debug)]
pub enum PreconditionError {
    NoEntities,
    EmptyProfileId,
    EmptyVersion,
    SessionNotIdle(RotationState),
    ProfileBusy(String),
}

#[derive(Debug)]
pub enum ConnectError {
    InvalidAddress(String),
    Tls(tonic::transport::Error),
    Transport(String, tonic::transport::Error),
}

#[derive(Debug)]
pub enum ProtocolError {
    UploadSend,
    RotationAckTimeout(AckFailure),
    UnexpectedResponse(String),
    FinalizeSend,
    AddProfile(tonic::Status),
    DeleteProfile(tonic::Status),
    GetProfileList(tonic::Status),
}

// Reasons why the device acknowledgement wasn't received.
#[derive(Debug)]
pub enum AckFailure {
    Expired(u32, Duration),
    Stream(tonic::Status),
    Closed,
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Precondition(error) => {
                error!(%error, "{}", self);
            }
            Error::UnsupportedDevice(family) => {
                warn!(%family, "{}", self);
            }
            Error::Pki(error) => {
                error.log();
            }
            Error::Connect(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::Protocol(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::ControlPlane(status) => {
                warn!(code = ?status.code(), message = %status.message(), "{}", self);
            }
            Error::ValidationFailed(report) => {
                for surface in report.failures() {
                    warn!(
                        surface = %surface.surface,
                        address = %surface.address,
                        expected = ?surface.expected,
                        outcome = %surface.outcome,
                        "{}", self
                    );
                }
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Precondition(..) => write!(f, "precondition violated"),
            Error::UnsupportedDevice(family) => {
                write!(f, "unsupported device family: {family}")
            }
            Error::Pki(error) => std::fmt::Display::fmt(error, f),
            Error::Connect(..) => write!(f, "failed to connect to device"),
            Error::Protocol(error) => std::fmt::Display::fmt(error, f),
            Error::ControlPlane(..) => {
                write!(f, "failed to update device configuration")
            }
            Error::ValidationFailed(report) => {
                write!(
                    f,
                    "post-rotation validation failed on {} of {} surfaces ({})",
                    report.failures().count(),
                    report.surfaces.len(),
                    report.failures().map(|surface| surface.surface).join(", ")
                )
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Precondition(error) => Some(error),
            Error::Pki(error) => Some(error),
            Error::Connect(error) => Some(error),
            Error::Protocol(error) => error.source(),
            Error::ControlPlane(status) => Some(status),
            _ => None,
        }
    }
}

impl From<PreconditionError> for Error {
    fn from(error: PreconditionError) -> Error {
        Error::Precondition(error)
    }
}

impl From<certz_pki::Error> for Error {
    fn from(error: certz_pki::Error) -> Error {
        Error::Pki(error)
    }
}

impl From<ConnectError> for Error {
    fn from(error: ConnectError) -> Error {
        Error::Connect(error)
    }
}

impl From<ProtocolError> for Error {
    fn from(error: ProtocolError) -> Error {
        Error::Protocol(error)
    }
}

// ===== impl PreconditionError =====

impl std::fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreconditionError::NoEntities => {
                write!(f, "rotation requires at least one entity")
            }
            PreconditionError::EmptyProfileId => {
                write!(f, "SSL profile identifier must not be empty")
            }
            PreconditionError::EmptyVersion => {
                write!(f, "entity version must not be empty")
            }
            PreconditionError::SessionNotIdle(state) => {
                write!(f, "rotation session already used (state: {state})")
            }
            PreconditionError::ProfileBusy(profile_id) => {
                write!(f, "profile {profile_id} already has a rotation in progress")
            }
        }
    }
}

impl std::error::Error for PreconditionError {}

// ===== impl ConnectError =====

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::InvalidAddress(address) => {
                write!(f, "invalid address: {address}")
            }
            ConnectError::Tls(..) => {
                write!(f, "invalid TLS configuration")
            }
            ConnectError::Transport(address, ..) => {
                write!(f, "failed to connect to {address}")
            }
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectError::Tls(error) | ConnectError::Transport(_, error) => {
                Some(error)
            }
            ConnectError::InvalidAddress(..) => None,
        }
    }
}

// ===== impl ProtocolError =====

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UploadSend => {
                write!(f, "failed to send upload request")
            }
            ProtocolError::RotationAckTimeout(failure) => {
                write!(f, "rotation not acknowledged: {failure}")
            }
            ProtocolError::UnexpectedResponse(response) => {
                write!(f, "unexpected rotation response: {response}")
            }
            ProtocolError::FinalizeSend => {
                write!(f, "failed to send finalize request")
            }
            ProtocolError::AddProfile(..) => {
                write!(f, "failed to add SSL profile")
            }
            ProtocolError::DeleteProfile(..) => {
                write!(f, "failed to delete SSL profile")
            }
            ProtocolError::GetProfileList(..) => {
                write!(f, "failed to list SSL profiles")
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::AddProfile(status)
            | ProtocolError::DeleteProfile(status)
            | ProtocolError::GetProfileList(status) => Some(status),
            ProtocolError::RotationAckTimeout(AckFailure::Stream(status)) => {
                Some(status)
            }
            _ => None,
        }
    }
}

// ===== impl AckFailure =====

impl std::fmt::Display for AckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckFailure::Expired(attempts, budget) => {
                write!(f, "no response after {attempts} attempts ({budget:?})")
            }
            AckFailure::Stream(status) => {
                write!(f, "stream error ({:?})", status.code())
            }
            AckFailure::Closed => write!(f, "stream closed by device"),
        }
    }
}

// ===== global functions =====

pub(crate) fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
