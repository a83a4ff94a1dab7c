//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use tracing::{debug, debug_span};

use crate::gate::{Surface, SurfaceReport};
use crate::renderer::DeviceFamily;
use crate::session::RotationState;

// Rotation debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    StateTransition(&'a str, RotationState, RotationState),
    InvalidTransition(&'a str, RotationState, RotationState),
    ProfileAdded(&'a str),
    ProfileBound(&'a str, DeviceFamily),
    UploadSent(&'a str, usize),
    AckPending(&'a str, u32, u32),
    AckReceived(&'a str),
    FinalizeSent(&'a str),
    SurfaceDial(Surface, &'a str),
    SurfaceChecked(&'a SurfaceReport),
    ValidationDone(usize, usize, Duration),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::StateTransition(profile_id, old_state, new_state)
            | Debug::InvalidTransition(profile_id, old_state, new_state) => {
                debug_span!("rotation", profile = %profile_id).in_scope(|| {
                    debug!(%old_state, %new_state, "{}", self);
                });
            }
            Debug::ProfileAdded(profile_id) | Debug::AckReceived(profile_id)
            | Debug::FinalizeSent(profile_id) => {
                debug_span!("rotation", profile = %profile_id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::ProfileBound(profile_id, family) => {
                debug_span!("rotation", profile = %profile_id).in_scope(|| {
                    debug!(%family, "{}", self);
                });
            }
            Debug::UploadSent(profile_id, entities) => {
                debug_span!("rotation", profile = %profile_id).in_scope(|| {
                    debug!(%entities, "{}", self);
                });
            }
            Debug::AckPending(profile_id, attempt, retries) => {
                debug_span!("rotation", profile = %profile_id).in_scope(|| {
                    debug!(%attempt, %retries, "{}", self);
                });
            }
            Debug::SurfaceDial(surface, address) => {
                debug_span!("validation", %surface).in_scope(|| {
                    debug!(%address, "{}", self);
                });
            }
            Debug::SurfaceChecked(report) => {
                debug_span!("validation", surface = %report.surface).in_scope(
                    || {
                        debug!(
                            expected = ?report.expected,
                            outcome = %report.outcome,
                            passed = %report.passed,
                            latency = ?report.latency,
                            "{}", self
                        );
                    },
                );
            }
            Debug::ValidationDone(passed, total, elapsed) => {
                debug_span!("validation").in_scope(|| {
                    debug!(%passed, %total, ?elapsed, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::StateTransition(..) => {
                write!(f, "state transition")
            }
            Debug::InvalidTransition(..) => {
                write!(f, "invalid state transition ignored")
            }
            Debug::ProfileAdded(..) => {
                write!(f, "SSL profile added")
            }
            Debug::ProfileBound(..) => {
                write!(f, "SSL profile bound to gRPC server")
            }
            Debug::UploadSent(..) => {
                write!(f, "upload request sent")
            }
            Debug::AckPending(..) => {
                write!(f, "waiting for device acknowledgement")
            }
            Debug::AckReceived(..) => {
                write!(f, "device acknowledged upload")
            }
            Debug::FinalizeSent(..) => {
                write!(f, "finalize request sent")
            }
            Debug::SurfaceDial(..) => {
                write!(f, "dialing service")
            }
            Debug::SurfaceChecked(..) => {
                write!(f, "service checked")
            }
            Debug::ValidationDone(..) => {
                write!(f, "validation pass completed")
            }
        }
    }
}
