//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use pem::{EncodeConfig, LineEnding, Pem};

use crate::error::{DecodeError, Error, IoError, Result};

pub const LABEL_CERTIFICATE: &str = "CERTIFICATE";
pub const LABEL_PRIVATE_KEY: &str = "PRIVATE KEY";
pub const LABEL_RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
pub const LABEL_PKCS7: &str = "PKCS7";

// Private key files are only readable by their owner.
const PRIVATE_FILE_MODE: u32 = 0o600;
const PUBLIC_FILE_MODE: u32 = 0o644;

// ===== global functions =====

// Encodes a DER payload as a PEM block with LF line endings.
pub fn encode(label: &str, der: &[u8]) -> String {
    let block = Pem::new(label, der.to_vec());
    pem::encode_config(
        &block,
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}

// Decodes exactly one PEM block whose label is one of `labels`.
pub fn decode_single(data: &[u8], labels: &[&str]) -> Result<Pem> {
    let mut blocks = pem::parse_many(data).map_err(DecodeError::Malformed)?;
    let block = match blocks.len() {
        0 => return Err(DecodeError::NoPemBlock.into()),
        1 => blocks.remove(0),
        count => return Err(DecodeError::TooManyPemBlocks(count).into()),
    };

    if !labels.contains(&block.tag()) {
        return Err(DecodeError::UnexpectedLabel(block.tag().to_owned()).into());
    }

    Ok(block)
}

// Reads a whole file, distinguishing a missing file from other I/O errors.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|error| match error.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => IoError::Read(path.to_path_buf(), error).into(),
    })
}

pub fn write_file(
    path: &Path,
    contents: &[u8],
    private: bool,
) -> std::io::Result<()> {
    let mode = if private {
        PRIVATE_FILE_MODE
    } else {
        PUBLIC_FILE_MODE
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

// Creates a directory (and its parents) if it doesn't exist yet.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}
