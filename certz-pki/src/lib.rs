//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod bundle;
pub mod certificate;
pub mod debug;
pub mod encoding;
pub mod error;
pub mod factory;
pub mod keys;
pub mod store;

pub use bundle::{TrustBundle, TrustBundleCodec};
pub use certificate::{Certificate, CertificateInfo};
pub use error::{Error, ErrorKind, Result};
pub use factory::{CertificateFactory, CertificateTemplate, SignedCertificate};
pub use keys::{KeyAlgorithm, KeyPair, KeyType};
pub use store::{CertificateAuthority, KeyMaterialStore};
