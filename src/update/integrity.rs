//! Archive integrity verification.
//!
//! A downloaded archive is checked against the SHA-256 published with the
//! release before anything is extracted.

use crate::error::{Result, UpdateError};
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::Path;
use tracing::{info, warn};

/// Verify `path` against an optional expected SHA-256 hex digest.
///
/// With no expected digest the file is only checked for existence.
///
/// # Errors
///
/// Returns [`UpdateError::Integrity`] if the file is missing, unreadable or
/// its digest differs.
pub fn verify(path: &Path, expected_sha256: Option<&str>) -> Result<()> {
    if !path.is_file() {
        return Err(UpdateError::Integrity(format!(
            "archive missing: {}",
            path.display()
        )));
    }

    let Some(expected) = expected_sha256 else {
        info!(path = %path.display(), "no checksum published, skipping verification");
        return Ok(());
    };

    let actual = sha256_hex(path).map_err(|e| {
        UpdateError::Integrity(format!("cannot read {} for checksum: {e}", path.display()))
    })?;

    if actual.eq_ignore_ascii_case(expected) {
        info!(path = %path.display(), "archive checksum ok");
        Ok(())
    } else {
        warn!(path = %path.display(), expected, actual = %actual, "archive checksum mismatch");
        Err(UpdateError::Integrity(format!(
            "checksum mismatch for {}: expected {expected}, got {actual}",
            path.display()
        )))
    }
}

/// SHA-256 hex digest of a file, read in 64 KiB chunks.
pub fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65_536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
