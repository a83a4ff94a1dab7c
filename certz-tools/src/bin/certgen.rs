//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use certz_pki::KeyAlgorithm;
use certz_tools::certgen::{self, CertgenArgs};
use certz_tools::config::Logging;
use certz_tools::logging::init_tracing;
use clap::{App, Arg, ArgMatches};

fn parse_args(matches: &ArgMatches<'_>) -> Result<CertgenArgs, String> {
    // Required arguments are enforced by clap.
    let username = matches.value_of("username").unwrap_or_default();
    let ips = matches.value_of("ips").unwrap_or_default();
    let out = matches.value_of("out").unwrap_or_default();

    let ips = certgen::parse_ips(ips).map_err(|error| error.to_string())?;
    let mut args = CertgenArgs::new(username, ips, out);

    if let Some(days) = matches.value_of("cert-days") {
        args.cert_days = days
            .parse()
            .map_err(|_| format!("invalid certificate validity: {days}"))?;
    }
    if let Some(years) = matches.value_of("ca-years") {
        args.ca_years = years
            .parse()
            .map_err(|_| format!("invalid CA validity: {years}"))?;
    }
    if let Some(name) = matches.value_of("ca-name") {
        args.ca_name = name.to_owned();
    }
    if let Some(algorithm) = matches.value_of("algorithm") {
        args.algorithm = KeyAlgorithm::from_str(algorithm)
            .map_err(|error| error.to_string())?;
    }

    Ok(args)
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Certz certificate generator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generates a CA and a client certificate for gNxI testing")
        .arg(
            Arg::with_name("username")
                .long("username")
                .value_name("name")
                .help("Common name of the client certificate.")
                .required(true),
        )
        .arg(
            Arg::with_name("ips")
                .long("ips")
                .value_name("list")
                .help("Comma-separated IP addresses of the certificate.")
                .required(true),
        )
        .arg(
            Arg::with_name("out")
                .long("out")
                .value_name("dir")
                .help("Output directory, created if absent.")
                .required(true),
        )
        .arg(
            Arg::with_name("cert-days")
                .long("cert-days")
                .value_name("days")
                .help("Client certificate validity, in days (default: 365)."),
        )
        .arg(
            Arg::with_name("ca-years")
                .long("ca-years")
                .value_name("years")
                .help("CA validity, in years (default: 1)."),
        )
        .arg(
            Arg::with_name("ca-name")
                .long("ca-name")
                .value_name("name")
                .help("Subject name of the CA."),
        )
        .arg(
            Arg::with_name("algorithm")
                .long("algorithm")
                .value_name("alg")
                .help("Key algorithm: rsa-2048, rsa-4096, ecdsa-p256 or ecdsa-p384."),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log progress to stdout."),
        )
        .get_matches();

    let args = match parse_args(&matches) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    if matches.is_present("verbose") {
        init_tracing(&Logging::default());
    }

    match certgen::generate(&args) {
        Ok(artifacts) => {
            println!("certificate: {}", artifacts.certificate.display());
            println!("key: {}", artifacts.key.display());
            println!("CA certificate: {}", artifacts.ca_certificate.display());
            println!("CA key: {}", artifacts.ca_key.display());
            println!("bundle: {}", artifacts.bundle.display());
        }
        Err(error) => {
            eprintln!("failed to generate certificates: {error}");
            std::process::exit(1);
        }
    }
}
