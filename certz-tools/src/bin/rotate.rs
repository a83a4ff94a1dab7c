//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use certz_tools::config::Config;
use certz_tools::logging::init_tracing;
use certz_tools::rotate;
use clap::{App, Arg};
use tracing::{error, info};

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Certz credential rotation")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rotates the TLS credentials of a gNxI device")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = match Config::load(config_file) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            std::process::exit(1);
        }
    };

    // Initialize tracing.
    init_tracing(&config.logging);

    info!(
        device = %config.device.address,
        profile = %config.device.profile_id,
        "starting rotation"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            error!(%error, "failed to create async runtime");
            std::process::exit(1);
        }
    };

    match runtime.block_on(rotate::run(&config)) {
        Ok(outcome) => {
            for surface in &outcome.report.surfaces {
                info!(
                    surface = %surface.surface,
                    address = %surface.address,
                    outcome = %surface.outcome,
                    latency = ?surface.latency,
                    "surface validated"
                );
            }
            info!(state = %outcome.state, "exiting");
        }
        Err(error) => {
            error!(%error, "rotation failed");
            std::process::exit(1);
        }
    }
}
