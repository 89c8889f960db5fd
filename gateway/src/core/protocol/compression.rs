//! Gzip helpers for frame payloads.

use std::io::{Read, Write};

use flate2::Compression as GzLevel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use super::error::FrameError;
use super::variant::Compression;

/// Upper bound on a decompressed payload. Matches the WebSocket frame limit.
pub const MAX_DECOMPRESSED_SIZE: usize = 10 * 1024 * 1024;

pub fn gzip_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), GzLevel::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(data.len().saturating_mul(2).min(MAX_DECOMPRESSED_SIZE));
    let mut decoder = GzDecoder::new(data).take(MAX_DECOMPRESSED_SIZE as u64 + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| FrameError::Decompress(e.to_string()))?;
    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(FrameError::Decompress(format!(
            "decompressed payload exceeds {MAX_DECOMPRESSED_SIZE} bytes"
        )));
    }
    Ok(out)
}

/// Apply `compression` to a payload the caller is about to encode.
///
/// Codes other than gzip are written verbatim.
pub fn compress(compression: Compression, data: &[u8]) -> std::io::Result<Vec<u8>> {
    match compression {
        Compression::Gzip => gzip_compress(data),
        Compression::None | Compression::Other(_) => Ok(data.to_vec()),
    }
}
