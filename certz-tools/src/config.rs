//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::net::IpAddr;
use std::time::Duration;

use certz_pki::KeyAlgorithm;
use certz_rotation::orchestrator::{
    DFLT_ACK_POLL_INTERVAL, DFLT_ACK_RETRIES, DFLT_GRPC_SERVER,
};
use certz_rotation::{RotationConfig, Surface, SurfaceTarget};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub logging: Logging,
    pub device: Device,
    pub services: Services,
    pub credentials: Credentials,
    pub rotation: Rotation,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub file: LoggingFile,
    pub stdout: LoggingStdout,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub enabled: bool,
    pub dir: String,
    pub name: String,
    pub rotation: LoggingFileRotation,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFmt {
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_thread_id: bool,
    pub show_source: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFileRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    Compact,
    Full,
    Json,
    Pretty,
}

// Device under rotation.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Device {
    pub address: String,
    pub server_name: String,
    pub vendor: String,
    pub grpc_server: String,
    pub profile_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Services {
    pub gnmi: Service,
    pub gnoi: Service,
    pub gribi: Service,
    pub p4rt: Service,
    pub gnsi: Service,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Service {
    pub enabled: bool,
    // Defaults to the device address.
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    // Identity currently accepted by the device.
    pub client_certificate: String,
    pub client_key: String,
    pub trust_bundle: String,
    // CA used to issue the rotated material.
    pub ca_certificate: String,
    pub ca_key: String,
    pub client_name: String,
    pub server_ips: Vec<IpAddr>,
    pub cert_days: u32,
    pub algorithm: KeyAlgorithm,
    // Where the rotated client identity is saved once finalized.
    pub rotated_dir: String,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rotation {
    pub ack_retries: u32,
    // Seconds.
    pub ack_poll_interval: u64,
    pub rpc_timeout: u64,
    pub new_credentials: bool,
    pub mismatch_expected: bool,
    pub force_overwrite: bool,
    pub entity_version: String,
}

// ===== impl Config =====

impl Config {
    pub const DFLT_FILEPATH: &'static str = "/etc/certz.toml";

    /// Loads the configuration file, falling back to the default
    /// configuration when the file can't be read.
    pub fn load(config_file: Option<&str>) -> Result<Config, toml::de::Error> {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => toml::from_str(&config_str),
            Err(err) => {
                eprintln!("Failed to load configuration file: {err}");
                eprintln!("Falling back to default configuration...");
                Ok(Config::default())
            }
        }
    }

    // Surfaces checked by the validation gate.
    pub fn validation_targets(&self) -> Vec<SurfaceTarget> {
        let services = &self.services;
        [
            (Surface::Gnmi, &services.gnmi),
            (Surface::Gnoi, &services.gnoi),
            (Surface::Gribi, &services.gribi),
            (Surface::P4rt, &services.p4rt),
            (Surface::Gnsi, &services.gnsi),
        ]
        .into_iter()
        .filter(|(_, service)| service.enabled)
        .map(|(surface, service)| {
            let address =
                service.address.as_deref().unwrap_or(&self.device.address);
            SurfaceTarget::new(surface, address)
        })
        .collect()
    }

    pub fn rotation_config(&self) -> RotationConfig {
        RotationConfig::new(
            self.rotation.ack_retries,
            Duration::from_secs(self.rotation.ack_poll_interval),
            self.device.grpc_server.clone(),
        )
    }
}

// ===== impl LoggingFile =====

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            enabled: false,
            dir: "/var/log".to_owned(),
            name: "certz.log".to_owned(),
            rotation: Default::default(),
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingStdout =====

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: true,
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingFmt =====

impl Default for LoggingFmt {
    fn default() -> LoggingFmt {
        LoggingFmt {
            style: LoggingFmtStyle::Full,
            colors: false,
            show_thread_id: false,
            show_source: false,
        }
    }
}

// ===== impl Device =====

impl Default for Device {
    fn default() -> Device {
        Device {
            address: "[::1]:9339".to_owned(),
            server_name: "localhost".to_owned(),
            vendor: "openconfig".to_owned(),
            grpc_server: DFLT_GRPC_SERVER.to_owned(),
            profile_id: "certz".to_owned(),
        }
    }
}

// ===== impl Service =====

impl Default for Service {
    fn default() -> Service {
        Service {
            enabled: true,
            address: None,
        }
    }
}

// ===== impl Credentials =====

impl Default for Credentials {
    fn default() -> Credentials {
        Credentials {
            client_certificate: "/etc/certz/certificate.pem".to_owned(),
            client_key: "/etc/certz/key.pem".to_owned(),
            trust_bundle: "/etc/certz/trust_bundle.p7b".to_owned(),
            ca_certificate: "/etc/certz/CABundle.pem".to_owned(),
            ca_key: "/etc/certz/ca.key".to_owned(),
            client_name: "certz".to_owned(),
            server_ips: vec![],
            cert_days: 365,
            algorithm: KeyAlgorithm::default(),
            rotated_dir: "/etc/certz/rotated".to_owned(),
        }
    }
}

// ===== impl Rotation =====

impl Default for Rotation {
    fn default() -> Rotation {
        Rotation {
            ack_retries: DFLT_ACK_RETRIES,
            ack_poll_interval: DFLT_ACK_POLL_INTERVAL.as_secs(),
            rpc_timeout: 10,
            new_credentials: false,
            mismatch_expected: false,
            force_overwrite: false,
            entity_version: "1".to_owned(),
        }
    }
}
