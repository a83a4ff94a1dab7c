//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::Path;

use tracing::{debug, debug_span};

use crate::keys::KeyAlgorithm;

// PKI debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    CaGenerated(&'a str, KeyAlgorithm, &'a Path),
    CaLoaded(&'a Path),
    CertificateSigned(&'a str, KeyAlgorithm),
    BundleWritten(&'a Path),
    TrustBundleDecoded(usize),
    TrustBundleEncoded(usize),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::CaGenerated(subject, algorithm, dir) => {
                debug_span!("ca", %subject).in_scope(|| {
                    debug!(%algorithm, dir = %dir.display(), "{}", self);
                });
            }
            Debug::CaLoaded(path) => {
                debug_span!("ca").in_scope(|| {
                    debug!(path = %path.display(), "{}", self);
                });
            }
            Debug::CertificateSigned(common_name, algorithm) => {
                debug_span!("leaf", %common_name).in_scope(|| {
                    debug!(%algorithm, "{}", self);
                });
            }
            Debug::BundleWritten(path) => {
                debug!(path = %path.display(), "{}", self);
            }
            Debug::TrustBundleDecoded(count)
            | Debug::TrustBundleEncoded(count) => {
                debug_span!("trust-bundle").in_scope(|| {
                    debug!(%count, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::CaGenerated(..) => {
                write!(f, "certificate authority generated")
            }
            Debug::CaLoaded(..) => {
                write!(f, "certificate authority loaded")
            }
            Debug::CertificateSigned(..) => {
                write!(f, "leaf certificate signed")
            }
            Debug::BundleWritten(..) => {
                write!(f, "certificate bundle written")
            }
            Debug::TrustBundleDecoded(..) => {
                write!(f, "trust bundle decoded")
            }
            Debug::TrustBundleEncoded(..) => {
                write!(f, "trust bundle encoded")
            }
        }
    }
}
