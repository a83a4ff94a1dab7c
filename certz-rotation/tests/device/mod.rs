//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

// Emulated device exposing every gRPC surface over mutual TLS.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use certz_pki::{Certificate, CertificateAuthority, KeyAlgorithm};
use certz_rotation::proto::certz::certz_server::{Certz, CertzServer};
use certz_rotation::proto::certz::rotate_certificate_request::RotateRequest;
use certz_rotation::proto::certz::rotate_certificate_response::RotateResponse;
use certz_rotation::proto::certz::{self, RotateCertificateRequest};
use certz_rotation::proto::gnmi::g_nmi_server::{GNmi, GNmiServer};
use certz_rotation::proto::gnmi;
use certz_rotation::proto::gnoi_system::system_server::{System, SystemServer};
use certz_rotation::proto::gnoi_system;
use certz_rotation::proto::gribi::g_ribi_server::{GRibi, GRibiServer};
use certz_rotation::proto::gribi;
use certz_rotation::proto::p4runtime::p4_runtime_server::{
    P4Runtime, P4RuntimeServer,
};
use certz_rotation::proto::p4runtime;
use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::{self, Identity, Server, ServerTlsConfig};
use tonic::{Request, Response, Status, Streaming};

// Client common name refused by every service.
pub const INTRUDER: &str = "intruder";

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

// How the device reacts to uploads.
#[derive(Clone, Copy, Debug)]
pub enum UploadReply {
    Ack,
    Silent,
}

#[derive(Debug, Default)]
pub struct DeviceState {
    pub profiles: Mutex<Vec<String>>,
    pub sets: Mutex<Vec<gnmi::SetRequest>>,
}

#[derive(Clone, Debug)]
struct DeviceService {
    reply: UploadReply,
    state: Arc<DeviceState>,
    rotations: mpsc::UnboundedSender<Vec<RotateCertificateRequest>>,
}

pub struct TestDevice {
    pub address: String,
    pub ca: CertificateAuthority,
    pub state: Arc<DeviceState>,
    rotations: mpsc::UnboundedReceiver<Vec<RotateCertificateRequest>>,
    server: JoinHandle<Result<(), transport::Error>>,
}

// ===== impl TestDevice =====

impl TestDevice {
    pub async fn start(reply: UploadReply) -> TestDevice {
        let ca = super::ca("device-ca");
        let identity = super::leaf(&ca, "device", KeyAlgorithm::EcdsaP256);
        let tls = ServerTlsConfig::new()
            .identity(Identity::from_pem(
                identity.certificate.to_pem(),
                identity.key.to_pkcs8_pem(),
            ))
            .client_ca_root(transport::Certificate::from_pem(
                ca.certificate.to_pem(),
            ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let state = Arc::new(DeviceState::default());
        let (rotations_tx, rotations_rx) = mpsc::unbounded_channel();
        let service = DeviceService {
            reply,
            state: state.clone(),
            rotations: rotations_tx,
        };
        let router = Server::builder()
            .tls_config(tls)
            .unwrap()
            .add_service(GNmiServer::new(service.clone()))
            .add_service(SystemServer::new(service.clone()))
            .add_service(GRibiServer::new(service.clone()))
            .add_service(P4RuntimeServer::new(service.clone()))
            .add_service(CertzServer::new(service));
        let server = tokio::spawn(
            router.serve_with_incoming(TcpListenerStream::new(listener)),
        );

        TestDevice {
            address,
            ca,
            state,
            rotations: rotations_rx,
            server,
        }
    }

    // Waits for a rotation stream to be closed by the client and returns the
    // requests it carried.
    pub async fn next_rotation(&mut self) -> Vec<RotateCertificateRequest> {
        tokio::time::timeout(Duration::from_secs(10), self.rotations.recv())
            .await
            .expect("rotation stream not closed")
            .expect("device stopped")
    }
}

impl Drop for TestDevice {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// ===== impl DeviceService =====

// Rejects the intruder client identity.
fn authorize<T>(request: &Request<T>) -> Result<(), Status> {
    let certs = request
        .peer_certs()
        .ok_or_else(|| Status::unauthenticated("no client certificate"))?;
    let leaf = certs
        .first()
        .ok_or_else(|| Status::unauthenticated("empty client chain"))?;
    let info = Certificate::from_der(leaf.as_ref().to_vec())
        .and_then(|cert| cert.info())
        .map_err(|error| Status::unauthenticated(error.to_string()))?;
    if info.common_name == INTRUDER {
        return Err(Status::permission_denied("client not authorized"));
    }

    Ok(())
}

#[tonic::async_trait]
impl GNmi for DeviceService {
    async fn capabilities(
        &self,
        request: Request<gnmi::CapabilityRequest>,
    ) -> Result<Response<gnmi::CapabilityResponse>, Status> {
        authorize(&request)?;
        Ok(Response::new(gnmi::CapabilityResponse {
            g_nmi_version: "0.10.0".to_owned(),
            ..Default::default()
        }))
    }

    async fn set(
        &self,
        request: Request<gnmi::SetRequest>,
    ) -> Result<Response<gnmi::SetResponse>, Status> {
        authorize(&request)?;
        self.state.sets.lock().unwrap().push(request.into_inner());
        Ok(Response::new(gnmi::SetResponse::default()))
    }
}

#[tonic::async_trait]
impl System for DeviceService {
    async fn time(
        &self,
        request: Request<gnoi_system::TimeRequest>,
    ) -> Result<Response<gnoi_system::TimeResponse>, Status> {
        authorize(&request)?;
        Ok(Response::new(gnoi_system::TimeResponse { time: 1 }))
    }
}

#[tonic::async_trait]
impl GRibi for DeviceService {
    type GetStream = ResponseStream<gribi::GetResponse>;

    async fn get(
        &self,
        request: Request<gribi::GetRequest>,
    ) -> Result<Response<Self::GetStream>, Status> {
        authorize(&request)?;
        // Empty RIB.
        Ok(Response::new(Box::pin(futures::stream::empty())))
    }
}

#[tonic::async_trait]
impl P4Runtime for DeviceService {
    async fn capabilities(
        &self,
        request: Request<p4runtime::CapabilitiesRequest>,
    ) -> Result<Response<p4runtime::CapabilitiesResponse>, Status> {
        authorize(&request)?;
        Ok(Response::new(p4runtime::CapabilitiesResponse {
            p4runtime_api_version: "1.4.0".to_owned(),
        }))
    }
}

#[tonic::async_trait]
impl Certz for DeviceService {
    type RotateStream = ResponseStream<certz::RotateCertificateResponse>;

    async fn rotate(
        &self,
        request: Request<Streaming<RotateCertificateRequest>>,
    ) -> Result<Response<Self::RotateStream>, Status> {
        authorize(&request)?;

        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(4);
        let reply = self.reply;
        let rotations = self.rotations.clone();
        tokio::spawn(async move {
            let mut requests = vec![];
            while let Ok(Some(request)) = inbound.message().await {
                let upload = matches!(
                    request.rotate_request,
                    Some(RotateRequest::Certificates(..))
                );
                requests.push(request);
                if upload && matches!(reply, UploadReply::Ack) {
                    let response = certz::RotateCertificateResponse {
                        rotate_response: Some(RotateResponse::Certificates(
                            certz::UploadResponse {},
                        )),
                    };
                    let _ = tx.send(Ok(response)).await;
                }
            }
            let _ = rotations.send(requests);
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn add_profile(
        &self,
        request: Request<certz::AddProfileRequest>,
    ) -> Result<Response<certz::AddProfileResponse>, Status> {
        authorize(&request)?;
        let profile_id = request.into_inner().ssl_profile_id;
        let mut profiles = self.state.profiles.lock().unwrap();
        if profiles.contains(&profile_id) {
            return Err(Status::already_exists("profile exists"));
        }
        profiles.push(profile_id);
        Ok(Response::new(certz::AddProfileResponse {}))
    }

    async fn delete_profile(
        &self,
        request: Request<certz::DeleteProfileRequest>,
    ) -> Result<Response<certz::DeleteProfileResponse>, Status> {
        authorize(&request)?;
        let profile_id = request.into_inner().ssl_profile_id;
        let mut profiles = self.state.profiles.lock().unwrap();
        let Some(pos) = profiles.iter().position(|id| *id == profile_id) else {
            return Err(Status::not_found("unknown profile"));
        };
        profiles.remove(pos);
        Ok(Response::new(certz::DeleteProfileResponse {}))
    }

    async fn get_profile_list(
        &self,
        request: Request<certz::GetProfileListRequest>,
    ) -> Result<Response<certz::GetProfileListResponse>, Status> {
        authorize(&request)?;
        Ok(Response::new(certz::GetProfileListResponse {
            ssl_profile_ids: self.state.profiles.lock().unwrap().clone(),
        }))
    }
}
