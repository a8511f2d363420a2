//! Entropy Signature
//!
//! Shannon entropy over the byte-value distribution of a whole stream,
//! computed with a fixed 256-bucket histogram and a fixed read buffer so
//! memory stays bounded regardless of file size.
//!
//! Returns a value between 0.0 (all bytes identical) and 8.0 (uniform).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Read buffer size (1 MiB)
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Maximum possible entropy in bits per byte
pub const MAX_ENTROPY: f64 = 8.0;

// ============================================================================
// HISTOGRAM
// ============================================================================

/// Byte frequency histogram
#[derive(Debug, Clone)]
pub struct ByteHistogram {
    counts: [u64; 256],
    total: u64,
}

impl Default for ByteHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteHistogram {
    pub fn new() -> Self {
        Self {
            counts: [0; 256],
            total: 0,
        }
    }

    /// Add a chunk of bytes
    #[inline]
    pub fn update(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.counts[byte as usize] += 1;
        }
        self.total += chunk.len() as u64;
    }

    /// Total bytes observed
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Shannon entropy of the observed distribution
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let total = self.total as f64;
        let mut entropy = 0.0;

        for &count in &self.counts {
            if count == 0 {
                continue;
            }
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }

        // rounding can land a hair above 8.0
        entropy.clamp(0.0, MAX_ENTROPY)
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Compute the entropy signature of a stream, reading it sequentially to EOF.
///
/// The caller owns the reader; it is consumed but not closed or rewound.
pub fn signature_of_reader<R: Read>(reader: &mut R) -> io::Result<f64> {
    let mut histogram = ByteHistogram::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        histogram.update(&buffer[..n]);
    }

    Ok(histogram.entropy())
}

/// Compute the entropy signature of a file on disk
pub fn signature_of_file(path: &Path) -> io::Result<f64> {
    let mut file = File::open(path)?;
    signature_of_reader(&mut file)
}

// ============================================================================
// TESTS
// ============================================================================
