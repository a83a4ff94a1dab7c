//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::Serialize;

use crate::debug::Debug;
use crate::entity::RotationEntity;
use crate::error::{PreconditionError, Result};
use crate::proto::certz as proto;

// States of the rotation protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationState {
    Idle,
    Uploading,
    AwaitingDeviceAck,
    Validating,
    Finalizing,
    Finalized,
    Aborted,
}

// Externally visible status of a rotation session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Pending,
    Validated,
    Finalized,
    Aborted,
}

/// One rotation attempt of an SSL profile.
///
/// A session is single-use: once it leaves [`RotationState::Idle`] it can
/// only end up finalized or aborted.
#[derive(Debug)]
pub struct RotationSession {
    profile_id: String,
    entities: Vec<RotationEntity>,
    force_overwrite: bool,
    state: RotationState,
    // State in which the session was aborted.
    aborted_in: Option<RotationState>,
    responses: Vec<proto::RotateCertificateResponse>,
}

// ===== impl RotationState =====

impl RotationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RotationState::Finalized | RotationState::Aborted)
    }

    // Whether the protocol allows moving from this state to `next`.
    fn can_transition(&self, next: RotationState) -> bool {
        use RotationState::*;

        matches!(
            (self, next),
            (Idle, Uploading)
                | (Uploading, AwaitingDeviceAck)
                | (AwaitingDeviceAck, Validating)
                | (Validating, Finalizing)
                | (Finalizing, Finalized)
        ) || (!self.is_terminal() && next == Aborted)
    }
}

impl std::fmt::Display for RotationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationState::Idle => write!(f, "idle"),
            RotationState::Uploading => write!(f, "uploading"),
            RotationState::AwaitingDeviceAck => write!(f, "awaiting-device-ack"),
            RotationState::Validating => write!(f, "validating"),
            RotationState::Finalizing => write!(f, "finalizing"),
            RotationState::Finalized => write!(f, "finalized"),
            RotationState::Aborted => write!(f, "aborted"),
        }
    }
}

// ===== impl RotationSession =====

impl RotationSession {
    pub fn new(
        profile_id: impl Into<String>,
        entities: Vec<RotationEntity>,
    ) -> Result<RotationSession> {
        let profile_id = profile_id.into();
        if profile_id.is_empty() {
            return Err(PreconditionError::EmptyProfileId.into());
        }
        if entities.is_empty() {
            return Err(PreconditionError::NoEntities.into());
        }

        Ok(RotationSession {
            profile_id,
            entities,
            force_overwrite: false,
            state: RotationState::Idle,
            aborted_in: None,
            responses: vec![],
        })
    }

    /// Lets the device replace an existing entity with the same version.
    pub fn with_force_overwrite(mut self, force_overwrite: bool) -> Self {
        self.force_overwrite = force_overwrite;
        self
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn entities(&self) -> &[RotationEntity] {
        &self.entities
    }

    pub fn force_overwrite(&self) -> bool {
        self.force_overwrite
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn aborted_in(&self) -> Option<RotationState> {
        self.aborted_in
    }

    pub fn responses(&self) -> &[proto::RotateCertificateResponse] {
        &self.responses
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            RotationState::Idle
            | RotationState::Uploading
            | RotationState::AwaitingDeviceAck
            | RotationState::Validating => SessionStatus::Pending,
            RotationState::Finalizing => SessionStatus::Validated,
            RotationState::Finalized => SessionStatus::Finalized,
            RotationState::Aborted => SessionStatus::Aborted,
        }
    }

    // Builds the single upload request of the session.
    pub(crate) fn upload_request(&self) -> proto::RotateCertificateRequest {
        let entities = self.entities.iter().map(RotationEntity::to_proto).collect();
        proto::RotateCertificateRequest {
            force_overwrite: self.force_overwrite,
            ssl_profile_id: self.profile_id.clone(),
            rotate_request: Some(
                proto::rotate_certificate_request::RotateRequest::Certificates(
                    proto::UploadRequest { entities },
                ),
            ),
        }
    }

    pub(crate) fn finalize_request(&self) -> proto::RotateCertificateRequest {
        proto::RotateCertificateRequest {
            force_overwrite: false,
            ssl_profile_id: self.profile_id.clone(),
            rotate_request: Some(
                proto::rotate_certificate_request::RotateRequest::FinalizeRotation(
                    proto::FinalizeRequest {},
                ),
            ),
        }
    }

    pub(crate) fn record_response(
        &mut self,
        response: proto::RotateCertificateResponse,
    ) {
        self.responses.push(response);
    }

    pub(crate) fn transition(&mut self, next: RotationState) {
        if !self.state.can_transition(next) {
            // Unreachable through the orchestrator.
            Debug::InvalidTransition(&self.profile_id, self.state, next).log();
            return;
        }

        Debug::StateTransition(&self.profile_id, self.state, next).log();
        self.state = next;
    }

    pub(crate) fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.aborted_in = Some(self.state);
        self.transition(RotationState::Aborted);
    }
}

// ===== unit tests =====
