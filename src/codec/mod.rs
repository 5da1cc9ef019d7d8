//! Payload compression.
//!
//! Tile payloads are zlib streams (deflate with the zlib header and
//! adler32 trailer), which is what the engine's tile loader inflates.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

/// Highest zlib level; tiles are written once and read many times.
pub const DEFAULT_LEVEL: u32 = 9;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateCodec {
    level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: DEFAULT_LEVEL }
    }
}

impl DeflateCodec {
    /// `level` is clamped to zlib's 0..=9.
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(self.level));
        enc.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }

    /// Inflate `data`, which must expand to exactly `expected_len` bytes.
    pub fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        // The length comes from the file, so it only bounds the read.
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        if out.len() != expected_len {
            return Err(CodecError::Decompression(format!(
                "inflated {} bytes, expected {expected_len}",
                out.len()
            )));
        }
        Ok(out)
    }
}
