//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//


use std::os::unix::fs::PermissionsExt;
use std::path::Path;

//
// Helper functions.
//

pub fn mode(path: &Path) -> u32 {
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}

// Labels of the PEM blocks of a file, in order.
pub fn pem_labels(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("-----BEGIN "))
        .filter_map(|line| line.strip_suffix("-----"))
        .map(str::to_owned)
        .collect()
}
