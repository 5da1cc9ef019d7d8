use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;

pub type Result<T> = std::result::Result<T, EphError>;

#[derive(Error, Debug)]
pub enum EphError {
    /// A record has no value for a declared column.
    #[error("Record is missing a value for column '{column}'")]
    SchemaMismatch { column: String },
    #[error("Value for column '{column}' is not {expected}")]
    TypeMismatch { column: String, expected: &'static str },
    #[error("String too long for column '{column}' ({len} > {size} bytes)")]
    ValueTooLong { column: String, len: usize, size: usize },
    #[error("Buffer length {len} is not a multiple of the row size {row_size}")]
    InvalidLength { len: usize, row_size: usize },
    #[error("Invalid magic {found:?}, expected \"EPHE\"")]
    BadMagic { found: [u8; 4] },
    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u32),
    /// Chunks older than version 3 carry no column header.
    #[error("Unsupported tile chunk version: {0}")]
    UnsupportedChunkVersion(u32),
    #[error("Invalid chunk type {0:?}: expected 4 ASCII bytes starting with an uppercase letter")]
    InvalidChunkType(String),
    #[error("{what} of {len} does not fit the 32-bit header field")]
    TooLarge { what: &'static str, len: usize },
    #[error("Invalid nuniq {0}: must be at least 4")]
    InvalidNuniq(u64),
    #[error("Pixel {pix} does not exist at order {order}")]
    InvalidPixel { order: u32, pix: u64 },
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("Unknown type tag {tag:?} for column '{column}'")]
    UnknownColumnType { column: String, tag: String },
    #[error("Corrupt tile: {0}")]
    Corrupt(String),
    #[error("Unexpected end of data")]
    Truncated,
    #[error("File holds no tile chunk")]
    NoTileChunk,
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("IO error: {0}")]
    Stream(io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<io::Error> for EphError {
    fn from(e: io::Error) -> Self {
        // In-memory readers only fail by running out of bytes.
        if e.kind() == io::ErrorKind::UnexpectedEof {
            EphError::Truncated
        } else {
            EphError::Stream(e)
        }
    }
}

impl EphError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EphError::Io { path: path.into(), source }
    }
}
