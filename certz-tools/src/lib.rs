//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod certgen;
pub mod config;
pub mod logging;
pub mod rotate;
