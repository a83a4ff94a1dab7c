//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use crate::error::{Error, Result};

// Device families with a known configuration syntax.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceFamily {
    Arista,
    Cisco,
    Juniper,
    Nokia,
    OpenConfig,
}

/// A device configuration change, applied through the management plane.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigFragment {
    // Vendor CLI text, applied with the "cli" origin.
    Cli(String),
    // OpenConfig leaf update.
    OpenConfig { path: Vec<PathElem>, json: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathElem {
    pub name: String,
    pub keys: Vec<(String, String)>,
}

/// Renders configuration fragments in the syntax of one device family.
pub trait ConfigRenderer: Send + Sync {
    fn family(&self) -> DeviceFamily;

    /// Binds an SSL profile to a gRPC server, making the server use the
    /// credentials held by the profile.
    fn profile_binding(&self, grpc_server: &str, profile_id: &str)
    -> ConfigFragment;
}

#[derive(Debug)]
pub struct AristaRenderer;

#[derive(Debug)]
pub struct CiscoRenderer;

#[derive(Debug)]
pub struct JuniperRenderer;

#[derive(Debug)]
pub struct NokiaRenderer;

#[derive(Debug)]
pub struct OpenConfigRenderer;

// ===== impl DeviceFamily =====

impl DeviceFamily {
    pub fn renderer(&self) -> Box<dyn ConfigRenderer> {
        match self {
            DeviceFamily::Arista => Box::new(AristaRenderer),
            DeviceFamily::Cisco => Box::new(CiscoRenderer),
            DeviceFamily::Juniper => Box::new(JuniperRenderer),
            DeviceFamily::Nokia => Box::new(NokiaRenderer),
            DeviceFamily::OpenConfig => Box::new(OpenConfigRenderer),
        }
    }
}

impl FromStr for DeviceFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<DeviceFamily> {
        match s.to_ascii_lowercase().as_str() {
            "arista" => Ok(DeviceFamily::Arista),
            "cisco" => Ok(DeviceFamily::Cisco),
            "juniper" => Ok(DeviceFamily::Juniper),
            "nokia" => Ok(DeviceFamily::Nokia),
            "openconfig" => Ok(DeviceFamily::OpenConfig),
            _ => Err(Error::UnsupportedDevice(s.to_owned())),
        }
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceFamily::Arista => write!(f, "arista"),
            DeviceFamily::Cisco => write!(f, "cisco"),
            DeviceFamily::Juniper => write!(f, "juniper"),
            DeviceFamily::Nokia => write!(f, "nokia"),
            DeviceFamily::OpenConfig => write!(f, "openconfig"),
        }
    }
}

// ===== impl ConfigRenderer =====

impl ConfigRenderer for AristaRenderer {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Arista
    }

    fn profile_binding(
        &self,
        grpc_server: &str,
        profile_id: &str,
    ) -> ConfigFragment {
        ConfigFragment::Cli(format!(
            "management api gnmi\n   transport grpc {grpc_server}\n      ssl profile {profile_id}\n"
        ))
    }
}

impl ConfigRenderer for CiscoRenderer {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Cisco
    }

    fn profile_binding(
        &self,
        grpc_server: &str,
        profile_id: &str,
    ) -> ConfigFragment {
        ConfigFragment::Cli(format!(
            "grpc\n server {grpc_server}\n  ssl-profile-id {profile_id}\n !\n!\n"
        ))
    }
}

impl ConfigRenderer for JuniperRenderer {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Juniper
    }

    fn profile_binding(
        &self,
        grpc_server: &str,
        profile_id: &str,
    ) -> ConfigFragment {
        ConfigFragment::Cli(format!(
            "set system services extension-service request-response grpc {grpc_server} ssl local-certificate {profile_id}\n"
        ))
    }
}

impl ConfigRenderer for NokiaRenderer {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Nokia
    }

    fn profile_binding(
        &self,
        grpc_server: &str,
        profile_id: &str,
    ) -> ConfigFragment {
        ConfigFragment::Cli(format!(
            "set / system grpc-server {grpc_server} tls-profile {profile_id}\n"
        ))
    }
}

impl ConfigRenderer for OpenConfigRenderer {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::OpenConfig
    }

    fn profile_binding(
        &self,
        grpc_server: &str,
        profile_id: &str,
    ) -> ConfigFragment {
        let path = vec![
            PathElem::new("system"),
            PathElem::new("grpc-servers"),
            PathElem::new("grpc-server").key("name", grpc_server),
            PathElem::new("config"),
            PathElem::new("certificate-id"),
        ];
        ConfigFragment::OpenConfig {
            path,
            json: serde_json::Value::from(profile_id).to_string(),
        }
    }
}

// ===== impl PathElem =====

impl PathElem {
    pub fn new(name: &str) -> PathElem {
        PathElem {
            name: name.to_owned(),
            keys: vec![],
        }
    }

    pub fn key(mut self, name: &str, value: &str) -> PathElem {
        self.keys.push((name.to_owned(), value.to_owned()));
        self
    }
}

impl std::fmt::Display for PathElem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for (name, value) in &self.keys {
            write!(f, "[{name}={value}]")?;
        }
        Ok(())
    }
}

// ===== global functions =====

/// Returns the renderer of the named device family.
///
/// Unknown families are rejected instead of falling back to a default
/// syntax.
pub fn for_family(family: &str) -> Result<Box<dyn ConfigRenderer>> {
    family.parse::<DeviceFamily>().map(|family| family.renderer())
}
