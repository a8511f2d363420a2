//! Content Fingerprints
//!
//! A fingerprint is either a lowercase hex digest of the file content or one
//! of a fixed set of sentinel markers describing a non-nominal outcome.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use sha2::{Digest, Sha256};

use super::entropy::CHUNK_SIZE;

// ============================================================================
// SENTINELS
// ============================================================================

/// No fingerprint was reported
pub const UNKNOWN: &str = "unknown";
/// Remote analysis service unreachable, timed out or answered non-2xx
pub const REMOTE_SERVICE_ERROR: &str = "remote-service-error";
/// Remote analysis service answered 2xx with an unexpected body
pub const DECODE_ERROR: &str = "decode-error";
/// Worker output could not be parsed
pub const PARSE_ERROR: &str = "parse-error";
/// Worker failed to start, exited non-zero or printed nothing
pub const WORKER_ERROR: &str = "worker-error";

/// Sentinels that mark a failed prediction
pub const FAILURE_SENTINELS: [&str; 4] = [REMOTE_SERVICE_ERROR, DECODE_ERROR, PARSE_ERROR, WORKER_ERROR];

/// Is this fingerprint one of the failure sentinels?
pub fn is_failure_sentinel(fingerprint: &str) -> bool {
    FAILURE_SENTINELS.contains(&fingerprint)
}

/// Is this fingerprint a recognised sentinel (including `unknown`)?
pub fn is_sentinel(fingerprint: &str) -> bool {
    fingerprint == UNKNOWN || is_failure_sentinel(fingerprint)
}

/// MD5, SHA-1, SHA-256 or SHA-512 in hex
pub fn is_hex_digest(value: &str) -> bool {
    matches!(value.len(), 32 | 40 | 64 | 128) && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Coerce an arbitrary reported fingerprint into the canonical form:
/// lowercase digest, a known sentinel, or `unknown`.
pub fn canonicalize(value: &str) -> String {
    let trimmed = value.trim();
    if is_sentinel(trimmed) {
        trimmed.to_string()
    } else if is_hex_digest(trimmed) {
        trimmed.to_ascii_lowercase()
    } else {
        UNKNOWN.to_string()
    }
}

// ============================================================================
// HASHING
// ============================================================================

/// SHA-256 of a file, read in fixed-size chunks
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
