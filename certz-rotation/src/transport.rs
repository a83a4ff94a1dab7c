//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::Code;

use crate::ack::ResponseStream;
use crate::debug::Debug;
use crate::error::{ProtocolError, Result};
use crate::proto::certz as proto;
use crate::proto::certz::certz_client::CertzClient;

// Requests are sent one at a time, so a small buffer is enough.
const REQUEST_BUFFER: usize = 4;

/// Both directions of a rotation stream.
///
/// Dropping the sender half-closes the stream; dropping the receiver stops
/// listening to the device.
pub struct RotationStream {
    pub tx: mpsc::Sender<proto::RotateCertificateRequest>,
    pub rx: ResponseStream,
}

/// Device side of the certificate rotation protocol.
#[tonic::async_trait]
pub trait RotationTransport: Send + Sync {
    /// Creates an SSL profile. An already existing profile isn't an error.
    async fn add_profile(&self, profile_id: &str) -> Result<()>;

    /// Opens a bidirectional rotation stream.
    async fn open_rotation(&self) -> Result<RotationStream>;
}

/// gNSI certz client of a device.
#[derive(Clone, Debug)]
pub struct GrpcDevice {
    client: CertzClient<Channel>,
}

// ===== impl RotationStream =====

impl std::fmt::Debug for RotationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationStream")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

// ===== impl GrpcDevice =====

impl GrpcDevice {
    pub fn new(channel: Channel) -> GrpcDevice {
        GrpcDevice {
            client: CertzClient::new(channel),
        }
    }

    pub async fn delete_profile(&self, profile_id: &str) -> Result<()> {
        let request = proto::DeleteProfileRequest {
            ssl_profile_id: profile_id.to_owned(),
        };
        self.client
            .clone()
            .delete_profile(request)
            .await
            .map_err(ProtocolError::DeleteProfile)?;

        Ok(())
    }

    pub async fn profile_list(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .clone()
            .get_profile_list(proto::GetProfileListRequest {})
            .await
            .map_err(ProtocolError::GetProfileList)?;

        Ok(response.into_inner().ssl_profile_ids)
    }
}

#[tonic::async_trait]
impl RotationTransport for GrpcDevice {
    async fn add_profile(&self, profile_id: &str) -> Result<()> {
        let request = proto::AddProfileRequest {
            ssl_profile_id: profile_id.to_owned(),
        };
        match self.client.clone().add_profile(request).await {
            Ok(_) => {
                Debug::ProfileAdded(profile_id).log();
                Ok(())
            }
            Err(status) if status.code() == Code::AlreadyExists => Ok(()),
            Err(status) => Err(ProtocolError::AddProfile(status).into()),
        }
    }

    async fn open_rotation(&self) -> Result<RotationStream> {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);

        // The call is issued lazily, once the response stream is first
        // polled, so that the upload request is already queued when the
        // device receives the stream headers.
        let mut client = self.client.clone();
        let requests = ReceiverStream::new(rx);
        let responses = futures::stream::once(async move {
            client.rotate(requests).await
        })
        .flat_map(|result| match result {
            Ok(response) => response.into_inner().boxed(),
            Err(status) => futures::stream::once(async { Err(status) }).boxed(),
        })
        .boxed();

        Ok(RotationStream { tx, rx: responses })
    }
}
