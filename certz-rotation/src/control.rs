//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;

use tonic::transport::Channel;

use crate::error::{Error, Result};
use crate::proto::gnmi::g_nmi_client::GNmiClient;
use crate::proto::gnmi::{self as proto, typed_value};
use crate::renderer::{ConfigFragment, PathElem};

const CLI_ORIGIN: &str = "cli";
const OPENCONFIG_ORIGIN: &str = "openconfig";

/// The non-TLS control plane of a device, used to change its configuration.
#[tonic::async_trait]
pub trait ControlPlane: Send + Sync {
    async fn apply(&self, fragment: &ConfigFragment) -> Result<()>;
}

/// Control plane backed by gNMI `Set` requests.
#[derive(Clone, Debug)]
pub struct GnmiControlPlane {
    client: GNmiClient<Channel>,
}

// ===== impl GnmiControlPlane =====

impl GnmiControlPlane {
    pub fn new(channel: Channel) -> GnmiControlPlane {
        GnmiControlPlane {
            client: GNmiClient::new(channel),
        }
    }
}

#[tonic::async_trait]
impl ControlPlane for GnmiControlPlane {
    async fn apply(&self, fragment: &ConfigFragment) -> Result<()> {
        let request = set_request(fragment);
        self.client
            .clone()
            .set(request)
            .await
            .map_err(Error::ControlPlane)?;

        Ok(())
    }
}

// ===== global functions =====

// Builds the gNMI update carrying a configuration fragment.
//
// CLI fragments are sent as ASCII values with the "cli" origin, OpenConfig
// fragments as JSON_IETF values at their schema path.
pub fn set_request(fragment: &ConfigFragment) -> proto::SetRequest {
    let update = match fragment {
        ConfigFragment::Cli(text) => proto::Update {
            path: Some(proto::Path {
                origin: CLI_ORIGIN.to_owned(),
                ..Default::default()
            }),
            val: Some(proto::TypedValue {
                value: Some(typed_value::Value::AsciiVal(text.clone())),
            }),
        },
        ConfigFragment::OpenConfig { path, json } => proto::Update {
            path: Some(proto::Path {
                origin: OPENCONFIG_ORIGIN.to_owned(),
                elem: path.iter().map(path_elem).collect(),
                ..Default::default()
            }),
            val: Some(proto::TypedValue {
                value: Some(typed_value::Value::JsonIetfVal(
                    json.clone().into_bytes(),
                )),
            }),
        },
    };

    proto::SetRequest {
        update: vec![update],
        ..Default::default()
    }
}

fn path_elem(elem: &PathElem) -> proto::PathElem {
    proto::PathElem {
        name: elem.name.clone(),
        key: elem.keys.iter().cloned().collect::<HashMap<_, _>>(),
    }
}
