//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod ack;
pub mod control;
pub mod debug;
pub mod entity;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod proto;
pub mod renderer;
pub mod session;
pub mod tls;
pub mod transport;

pub use control::{ControlPlane, GnmiControlPlane};
pub use entity::{RotationEntity, RotationEntityBuilder};
pub use error::{Error, Result};
pub use gate::{
    ServiceValidationGate, Surface, SurfaceTarget, ValidationReport,
    ValidationRequest, Validator,
};
pub use orchestrator::{
    RotationConfig, RotationOrchestrator, RotationOutcome, RotationPlan,
};
pub use renderer::{ConfigRenderer, DeviceFamily};
pub use session::{RotationSession, RotationState, SessionStatus};
pub use tls::TlsCredentials;
pub use transport::{GrpcDevice, RotationStream, RotationTransport};
