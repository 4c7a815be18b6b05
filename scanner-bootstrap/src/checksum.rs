//! SHA-256 checksum calculation for archive verification.
//!
//! Every archive is hashed twice on its way into the cache: once as a
//! private temporary download and once more right before it is unpacked.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Buffer size for reading during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the SHA-256 of everything readable from `reader`.
///
/// # Returns
///
/// The lowercase hexadecimal SHA-256 hash of the stream.
pub fn calculate_checksum<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Calculate the SHA-256 of a file.
pub fn calculate_file_checksum(path: &Path) -> io::Result<String> {
    calculate_checksum(File::open(path)?)
}

/// Check that a stream hashes to `expected`.
///
/// The comparison ignores hex case. Read errors count as "not verified".
pub fn verify_checksum<R: Read>(reader: R, expected: &str) -> bool {
    match calculate_checksum(reader) {
        Ok(actual) => actual.eq_ignore_ascii_case(expected.trim()),
        Err(e) => {
            tracing::debug!(error = %e, "Checksum calculation failed");
            false
        }
    }
}

/// Check that the file at `path` hashes to `expected`.
pub fn verify_file_checksum(path: &Path, expected: &str) -> bool {
    match File::open(path) {
        Ok(file) => verify_checksum(file, expected),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Cannot open file for checksum");
            false
        }
    }
}
