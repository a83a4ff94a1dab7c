//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::Instrument;

use crate::debug::Debug;
use crate::error::AckFailure;
use crate::proto::certz as proto;

pub type ResponseStream =
    BoxStream<'static, Result<proto::RotateCertificateResponse, tonic::Status>>;

// Resolution state of the device acknowledgement.
#[derive(Clone, Debug)]
pub enum AckStatus {
    Pending,
    Received(proto::RotateCertificateResponse),
    Failed(tonic::Status),
    Closed,
}

/// Task receiving the device acknowledgement of an upload.
///
/// The acknowledgement is resolved once and can be observed by any number of
/// [`AckObserver`]s. Dropping the watcher cancels the receive.
pub struct AckWatcher {
    join_handle: JoinHandle<ResponseStream>,
    status: watch::Receiver<AckStatus>,
}

/// Waits on the resolution of an [`AckWatcher`] with a fixed total budget.
#[derive(Clone, Debug)]
pub struct AckObserver {
    status: watch::Receiver<AckStatus>,
}

// ===== impl AckWatcher =====

impl AckWatcher {
    /// Starts receiving the first message of the response stream.
    pub fn spawn(mut responses: ResponseStream) -> AckWatcher {
        let (status_tx, status_rx) = watch::channel(AckStatus::Pending);
        let join_handle = tokio::spawn(
            async move {
                let status = match responses.next().await {
                    Some(Ok(response)) => AckStatus::Received(response),
                    Some(Err(status)) => AckStatus::Failed(status),
                    None => AckStatus::Closed,
                };
                status_tx.send_replace(status);
                responses
            }
            .in_current_span(),
        );

        AckWatcher {
            join_handle,
            status: status_rx,
        }
    }

    pub fn observer(&self) -> AckObserver {
        AckObserver {
            status: self.status.clone(),
        }
    }

    /// Waits for the watcher to finish and takes back the response stream.
    pub async fn join(mut self) -> Result<ResponseStream, AckFailure> {
        (&mut self.join_handle).await.map_err(|_| AckFailure::Closed)
    }
}

impl std::fmt::Debug for AckWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckWatcher")
            .field("finished", &self.join_handle.is_finished())
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl Drop for AckWatcher {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

// ===== impl AckObserver =====

impl AckObserver {
    /// Polls the acknowledgement up to `retries` times, `interval` apart.
    ///
    /// The total wait never exceeds `retries * interval`.
    pub async fn wait(
        &mut self,
        profile_id: &str,
        retries: u32,
        interval: Duration,
    ) -> Result<proto::RotateCertificateResponse, AckFailure> {
        for attempt in 1..=retries {
            Debug::AckPending(profile_id, attempt, retries).log();

            let resolved = timeout(
                interval,
                self.status
                    .wait_for(|status| !matches!(status, AckStatus::Pending)),
            )
            .await;
            match resolved {
                Ok(Ok(resolution)) => {
                    return match &*resolution {
                        AckStatus::Received(response) => Ok(response.clone()),
                        AckStatus::Failed(status) => {
                            Err(AckFailure::Stream(status.clone()))
                        }
                        AckStatus::Pending | AckStatus::Closed => {
                            Err(AckFailure::Closed)
                        }
                    };
                }
                // The watcher went away without resolving.
                Ok(Err(_)) => return Err(AckFailure::Closed),
                Err(_) => continue,
            }
        }

        Err(AckFailure::Expired(retries, interval * retries))
    }
}
