//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use derive_new::new;
use futures::StreamExt;
use tokio::time::timeout;

use crate::ack::AckWatcher;
use crate::control::ControlPlane;
use crate::debug::Debug;
use crate::error::{Error, PreconditionError, ProtocolError, Result};
use crate::gate::{ValidationReport, ValidationRequest, Validator};
use crate::proto::certz as proto;
use crate::renderer::ConfigRenderer;
use crate::session::{RotationSession, RotationState};
use crate::transport::{RotationStream, RotationTransport};

pub const DFLT_ACK_RETRIES: u32 = 12;
pub const DFLT_ACK_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DFLT_GRPC_SERVER: &str = "DEFAULT";

#[derive(Clone, Debug, new)]
pub struct RotationConfig {
    // Number of times the device acknowledgement is polled.
    pub ack_retries: u32,
    pub ack_poll_interval: Duration,
    // Name of the device gRPC server the profile gets bound to.
    pub grpc_server: String,
}

/// Parameters of a single rotation run.
#[derive(Clone, Debug, new)]
pub struct RotationPlan {
    // Whether the profile is already bound to the gRPC server, in which case
    // the device configuration is left untouched.
    pub new_credentials: bool,
    pub validation: ValidationRequest,
}

#[derive(Debug)]
pub struct RotationOutcome {
    pub state: RotationState,
    pub report: ValidationReport,
    pub responses: Vec<proto::RotateCertificateResponse>,
}

/// Drives rotation sessions against one device.
///
/// An upload is only finalized once the gate has validated connectivity with
/// the new credentials. Any failure leaves the rotation unfinalized, which
/// makes the device roll back when the stream is closed.
pub struct RotationOrchestrator {
    transport: Arc<dyn RotationTransport>,
    control: Arc<dyn ControlPlane>,
    renderer: Box<dyn ConfigRenderer>,
    validator: Arc<dyn Validator>,
    config: RotationConfig,
    // Profiles with a rotation in progress.
    active: Arc<Mutex<HashSet<String>>>,
}

// Marks a profile as busy for the lifetime of the guard.
#[derive(Debug)]
struct ProfileGuard {
    profile_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

// ===== impl RotationConfig =====

impl Default for RotationConfig {
    fn default() -> RotationConfig {
        RotationConfig {
            ack_retries: DFLT_ACK_RETRIES,
            ack_poll_interval: DFLT_ACK_POLL_INTERVAL,
            grpc_server: DFLT_GRPC_SERVER.to_owned(),
        }
    }
}

// ===== impl RotationOrchestrator =====

impl RotationOrchestrator {
    pub fn new(
        transport: Arc<dyn RotationTransport>,
        control: Arc<dyn ControlPlane>,
        renderer: Box<dyn ConfigRenderer>,
        validator: Arc<dyn Validator>,
        config: RotationConfig,
    ) -> RotationOrchestrator {
        RotationOrchestrator {
            transport,
            control,
            renderer,
            validator,
            config,
            active: Default::default(),
        }
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Runs a rotation session to completion.
    ///
    /// On error the session is left in [`RotationState::Aborted`] and
    /// [`RotationSession::aborted_in`] tells the phase that failed.
    pub async fn run(
        &self,
        session: &mut RotationSession,
        plan: &RotationPlan,
    ) -> Result<RotationOutcome> {
        if session.state() != RotationState::Idle {
            return Err(
                PreconditionError::SessionNotIdle(session.state()).into()
            );
        }
        let _guard = ProfileGuard::acquire(&self.active, session.profile_id())?;

        match self.rotate(session, plan).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                session.abort();
                error.log();
                Err(error)
            }
        }
    }

    async fn rotate(
        &self,
        session: &mut RotationSession,
        plan: &RotationPlan,
    ) -> Result<RotationOutcome> {
        let profile_id = session.profile_id().to_owned();

        // Upload.
        session.transition(RotationState::Uploading);
        if !plan.new_credentials {
            self.transport.add_profile(&profile_id).await?;
        }
        let RotationStream { tx, rx } = self.transport.open_rotation().await?;
        tx.send(session.upload_request())
            .await
            .map_err(|_| ProtocolError::UploadSend)?;
        Debug::UploadSent(&profile_id, session.entities().len()).log();

        // Wait for the device to acknowledge the upload.
        session.transition(RotationState::AwaitingDeviceAck);
        let watcher = AckWatcher::spawn(rx);
        let response = watcher
            .observer()
            .wait(
                &profile_id,
                self.config.ack_retries,
                self.config.ack_poll_interval,
            )
            .await
            .map_err(ProtocolError::RotationAckTimeout)?;
        let rx = watcher
            .join()
            .await
            .map_err(ProtocolError::RotationAckTimeout)?;
        if !matches!(
            response.rotate_response,
            Some(proto::rotate_certificate_response::RotateResponse::Certificates(..))
        ) {
            return Err(ProtocolError::UnexpectedResponse(format!(
                "{:?}",
                response.rotate_response
            ))
            .into());
        }
        session.record_response(response);
        Debug::AckReceived(&profile_id).log();

        // Validate the new credentials.
        session.transition(RotationState::Validating);
        if !plan.new_credentials {
            let fragment = self
                .renderer
                .profile_binding(&self.config.grpc_server, &profile_id);
            self.control.apply(&fragment).await?;
            Debug::ProfileBound(&profile_id, self.renderer.family()).log();
        }
        let report = self.validator.validate(&plan.validation).await;
        if !report.passed() {
            return Err(Error::ValidationFailed(report));
        }

        // Commit.
        session.transition(RotationState::Finalizing);
        tx.send(session.finalize_request())
            .await
            .map_err(|_| ProtocolError::FinalizeSend)?;
        Debug::FinalizeSent(&profile_id).log();

        // Half-close the stream and wait for the device to close its side.
        drop(tx);
        let _ = timeout(
            self.config.ack_poll_interval,
            rx.for_each(|_| async {}),
        )
        .await;
        session.transition(RotationState::Finalized);

        Ok(RotationOutcome {
            state: session.state(),
            report,
            responses: session.responses().to_vec(),
        })
    }
}

impl std::fmt::Debug for RotationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationOrchestrator")
            .field("family", &self.renderer.family())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ===== impl ProfileGuard =====

impl ProfileGuard {
    fn acquire(
        active: &Arc<Mutex<HashSet<String>>>,
        profile_id: &str,
    ) -> Result<ProfileGuard> {
        let mut profiles = active.lock().unwrap_or_else(|e| e.into_inner());
        if !profiles.insert(profile_id.to_owned()) {
            return Err(
                PreconditionError::ProfileBusy(profile_id.to_owned()).into()
            );
        }

        Ok(ProfileGuard {
            profile_id: profile_id.to_owned(),
            active: active.clone(),
        })
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        let mut profiles =
            self.active.lock().unwrap_or_else(|e| e.into_inner());
        profiles.remove(&self.profile_id);
    }
}
