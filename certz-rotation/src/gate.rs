//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::{Duration, Instant};

use tokio::time::timeout;
use tonic::transport::Channel;
use tonic::{Code, Status};

use crate::debug::Debug;
use crate::error::with_source;
use crate::proto::certz::GetProfileListRequest;
use crate::proto::certz::certz_client::CertzClient;
use crate::proto::gnmi::CapabilityRequest;
use crate::proto::gnmi::g_nmi_client::GNmiClient;
use crate::proto::gnoi_system::TimeRequest;
use crate::proto::gnoi_system::system_client::SystemClient;
use crate::proto::gribi::g_ribi_client::GRibiClient;
use crate::proto::gribi::{self, AftType, GetRequest};
use crate::proto::p4runtime::CapabilitiesRequest;
use crate::proto::p4runtime::p4_runtime_client::P4RuntimeClient;
use crate::tls::{self, TlsCredentials};

pub const DFLT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

// Status codes accepted as the expected rejection of a mismatched identity.
const REJECTION_CODES: [Code; 2] =
    [Code::PermissionDenied, Code::FailedPrecondition];

// RPC surfaces exposed by a device.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Surface {
    Gnmi,
    Gnoi,
    Gribi,
    P4rt,
    Gnsi,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SurfaceTarget {
    pub surface: Surface,
    pub address: String,
}

/// Input of one validation pass.
#[derive(Clone, Debug)]
pub struct ValidationRequest {
    // Candidate client identity and trust anchors.
    pub credentials: TlsCredentials,
    pub targets: Vec<SurfaceTarget>,
    // Whether the device is expected to refuse the candidate identity.
    pub mismatch_expected: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Expectation {
    Success,
    Rejection,
}

// Result of probing one surface.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeOutcome {
    Ok,
    Status(Code, String),
    Unreachable(String),
    DeadlineExceeded(Duration),
}

#[derive(Clone, Debug)]
pub struct SurfaceReport {
    pub surface: Surface,
    pub address: String,
    pub expected: Expectation,
    pub outcome: ProbeOutcome,
    pub passed: bool,
    pub latency: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    pub surfaces: Vec<SurfaceReport>,
    pub elapsed: Duration,
}

/// Checks reachability of a device with a candidate identity.
#[tonic::async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> ValidationReport;
}

/// Probes every requested surface over a dedicated TLS connection, issuing a
/// single read-only RPC on each.
///
/// Surfaces are probed concurrently and exactly once. The connection of a
/// surface is closed as soon as its probe completes.
#[derive(Clone, Debug)]
pub struct ServiceValidationGate {
    rpc_timeout: Duration,
}

// ===== impl Surface =====

impl Surface {
    pub fn all() -> [Surface; 5] {
        [
            Surface::Gnmi,
            Surface::Gnoi,
            Surface::Gribi,
            Surface::P4rt,
            Surface::Gnsi,
        ]
    }

    // Issues the read-only probe RPC of this surface.
    async fn probe(&self, channel: Channel) -> Result<(), Status> {
        match self {
            Surface::Gnmi => {
                GNmiClient::new(channel)
                    .capabilities(CapabilityRequest {})
                    .await?;
            }
            Surface::Gnoi => {
                SystemClient::new(channel).time(TimeRequest {}).await?;
            }
            Surface::Gribi => {
                let request = GetRequest {
                    network_instance: Some(
                        gribi::get_request::NetworkInstance::All(
                            gribi::Empty {},
                        ),
                    ),
                    aft: AftType::All as i32,
                };
                let mut stream =
                    GRibiClient::new(channel).get(request).await?.into_inner();
                // An empty RIB ends the stream without any message.
                stream.message().await?;
            }
            Surface::P4rt => {
                P4RuntimeClient::new(channel)
                    .capabilities(CapabilitiesRequest {})
                    .await?;
            }
            Surface::Gnsi => {
                CertzClient::new(channel)
                    .get_profile_list(GetProfileListRequest {})
                    .await?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Surface::Gnmi => write!(f, "gnmi"),
            Surface::Gnoi => write!(f, "gnoi"),
            Surface::Gribi => write!(f, "gribi"),
            Surface::P4rt => write!(f, "p4rt"),
            Surface::Gnsi => write!(f, "gnsi"),
        }
    }
}

// ===== impl SurfaceTarget =====

impl SurfaceTarget {
    pub fn new(surface: Surface, address: impl Into<String>) -> SurfaceTarget {
        SurfaceTarget {
            surface,
            address: address.into(),
        }
    }
}

// ===== impl ValidationRequest =====

impl ValidationRequest {
    /// Targets every surface on a single address.
    pub fn all_surfaces(
        credentials: TlsCredentials,
        address: &str,
        mismatch_expected: bool,
    ) -> ValidationRequest {
        ValidationRequest {
            credentials,
            targets: Surface::all()
                .into_iter()
                .map(|surface| SurfaceTarget::new(surface, address))
                .collect(),
            mismatch_expected,
        }
    }

    fn expectation(&self) -> Expectation {
        if self.mismatch_expected {
            Expectation::Rejection
        } else {
            Expectation::Success
        }
    }
}

// ===== impl Expectation =====

impl Expectation {
    pub fn is_met(&self, outcome: &ProbeOutcome) -> bool {
        match self {
            Expectation::Success => *outcome == ProbeOutcome::Ok,
            Expectation::Rejection => matches!(
                outcome,
                ProbeOutcome::Status(code, _) if REJECTION_CODES.contains(code)
            ),
        }
    }
}

// ===== impl ProbeOutcome =====

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Ok => write!(f, "ok"),
            ProbeOutcome::Status(code, message) => {
                write!(f, "{code:?}: {message}")
            }
            ProbeOutcome::Unreachable(error) => {
                write!(f, "unreachable: {error}")
            }
            ProbeOutcome::DeadlineExceeded(deadline) => {
                write!(f, "no answer within {deadline:?}")
            }
        }
    }
}

impl From<Status> for ProbeOutcome {
    fn from(status: Status) -> ProbeOutcome {
        ProbeOutcome::Status(status.code(), status.message().to_owned())
    }
}

// ===== impl ValidationReport =====

impl ValidationReport {
    // An empty pass validates nothing and never succeeds.
    pub fn passed(&self) -> bool {
        !self.surfaces.is_empty()
            && self.surfaces.iter().all(|surface| surface.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SurfaceReport> {
        self.surfaces.iter().filter(|surface| !surface.passed)
    }

    pub fn get(&self, surface: Surface) -> Option<&SurfaceReport> {
        self.surfaces.iter().find(|report| report.surface == surface)
    }
}

// ===== impl ServiceValidationGate =====

impl ServiceValidationGate {
    pub fn new(rpc_timeout: Duration) -> ServiceValidationGate {
        ServiceValidationGate { rpc_timeout }
    }

    async fn check(
        &self,
        target: &SurfaceTarget,
        credentials: &TlsCredentials,
        expected: Expectation,
    ) -> SurfaceReport {
        Debug::SurfaceDial(target.surface, &target.address).log();

        let start = Instant::now();
        let outcome = match timeout(
            self.rpc_timeout,
            self.dial_and_probe(target, credentials),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::DeadlineExceeded(self.rpc_timeout),
        };
        let report = SurfaceReport {
            surface: target.surface,
            address: target.address.clone(),
            expected,
            passed: expected.is_met(&outcome),
            outcome,
            latency: start.elapsed(),
        };
        Debug::SurfaceChecked(&report).log();

        report
    }

    async fn dial_and_probe(
        &self,
        target: &SurfaceTarget,
        credentials: &TlsCredentials,
    ) -> ProbeOutcome {
        let channel =
            match tls::connect(&target.address, credentials, self.rpc_timeout)
                .await
            {
                Ok(channel) => channel,
                Err(error) => {
                    return ProbeOutcome::Unreachable(with_source(&error));
                }
            };

        // The channel is moved into the probe and dropped with it.
        match target.surface.probe(channel).await {
            Ok(()) => ProbeOutcome::Ok,
            Err(status) => status.into(),
        }
    }
}

impl Default for ServiceValidationGate {
    fn default() -> ServiceValidationGate {
        ServiceValidationGate::new(DFLT_RPC_TIMEOUT)
    }
}

#[tonic::async_trait]
impl Validator for ServiceValidationGate {
    async fn validate(&self, request: &ValidationRequest) -> ValidationReport {
        let start = Instant::now();
        let expected = request.expectation();
        let checks = request.targets.iter().map(|target| {
            self.check(target, &request.credentials, expected)
        });
        let surfaces = futures::future::join_all(checks).await;

        let report = ValidationReport {
            surfaces,
            elapsed: start.elapsed(),
        };
        Debug::ValidationDone(
            report.surfaces.len() - report.failures().count(),
            report.surfaces.len(),
            report.elapsed,
        )
        .log();

        report
    }
}
