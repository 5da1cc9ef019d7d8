//! Wire structures of a `.eph` file.
//!
//! ```text
//! "EPHE"  u32 file_version (= 2)
//! chunk*:
//!   [u8; 4] type          uppercase first letter = survey tile chunk
//!   u32     length        bytes of chunk body
//!   body:
//!     u32   chunk_version (= 3)
//!     u64   nuniq
//!     u32   flags         bit 0: payload is byte-shuffled
//!     u32   row_size
//!     u32   column count
//!     u32   row count
//!     20 B  column descriptor × column count
//!     u32   uncompressed payload length
//!     u32   compressed payload length
//!     ...   zlib payload
//!   u32     checksum      always written as 0, never checked
//! ```
//!
//! Everything is little-endian.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{EphError, Result};
use crate::schema::{ColumnType, COLUMN_ID_LEN};
use crate::units::Unit;

pub const MAGIC: &[u8; 4] = b"EPHE";
pub const FILE_VERSION: u32 = 2;
pub const CHUNK_VERSION: u32 = 3;

/// Payload bytes are transposed (see [`crate::shuffle`]).
pub const FLAG_SHUFFLED: u32 = 1;

pub const FILE_HEADER_SIZE: usize = 8;
pub const CHUNK_HEADER_SIZE: usize = 8;
pub const CHECKSUM_SIZE: usize = 4;
/// chunk_version + nuniq + flags + row_size + n_cols + n_rows.
pub const TILE_HEADER_SIZE: usize = 4 + 8 + 4 * 4;
pub const COLUMN_DESCRIPTOR_SIZE: usize = 20;
/// Uncompressed + compressed payload lengths.
pub const PAYLOAD_HEADER_SIZE: usize = 8;

// ── File header ──────────────────────────────────────────────────────────────

pub fn write_file_header<W: Write>(mut writer: W) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(FILE_VERSION)?;
    Ok(())
}

/// Check magic and version; returns the version.
pub fn read_file_header<R: Read>(mut reader: R) -> Result<u32> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(EphError::BadMagic { found: magic });
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != FILE_VERSION {
        return Err(EphError::UnsupportedVersion(version));
    }
    Ok(version)
}

// ── Chunk header ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: [u8; 4],
    pub length: u32,
}

impl ChunkHeader {
    /// Survey tile chunks are tagged with an uppercase first letter.
    pub fn is_tile(&self) -> bool {
        self.chunk_type[0].is_ascii_uppercase()
    }

    pub fn type_str(&self) -> String {
        String::from_utf8_lossy(&self.chunk_type).into_owned()
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.chunk_type)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut chunk_type = [0u8; 4];
        reader.read_exact(&mut chunk_type)?;
        let length = reader.read_u32::<LittleEndian>()?;
        Ok(Self { chunk_type, length })
    }
}

// ── Tile header ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {
    pub chunk_version: u32,
    pub nuniq: u64,
    pub flags: u32,
    pub row_size: u32,
    pub column_count: u32,
    pub row_count: u32,
}

impl TileHeader {
    pub fn is_shuffled(&self) -> bool {
        self.flags & FLAG_SHUFFLED != 0
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.chunk_version)?;
        writer.write_u64::<LittleEndian>(self.nuniq)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.row_size)?;
        writer.write_u32::<LittleEndian>(self.column_count)?;
        writer.write_u32::<LittleEndian>(self.row_count)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let chunk_version = reader.read_u32::<LittleEndian>()?;
        if chunk_version < CHUNK_VERSION {
            return Err(EphError::UnsupportedChunkVersion(chunk_version));
        }
        Ok(Self {
            chunk_version,
            nuniq: reader.read_u64::<LittleEndian>()?,
            flags: reader.read_u32::<LittleEndian>()?,
            row_size: reader.read_u32::<LittleEndian>()?,
            column_count: reader.read_u32::<LittleEndian>()?,
            row_count: reader.read_u32::<LittleEndian>()?,
        })
    }
}

// ── Column descriptor ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub id: String,
    pub ty: ColumnType,
    pub unit: Unit,
    /// Byte offset of the column inside a row.
    pub offset: u32,
    pub size: u32,
}

impl ColumnDescriptor {
    pub fn new(id: &str, ty: ColumnType, unit: Unit, offset: u32) -> Self {
        Self { id: id.to_owned(), ty, unit, offset, size: ty.size() }
    }

    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.offset as usize + self.size as usize
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut id = [0u8; COLUMN_ID_LEN];
        let n = self.id.len().min(COLUMN_ID_LEN);
        id[..n].copy_from_slice(&self.id.as_bytes()[..n]);
        writer.write_all(&id)?;
        writer.write_all(&[self.ty.tag(), 0, 0, 0])?;
        writer.write_u32::<LittleEndian>(self.unit.code())?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut id = [0u8; COLUMN_ID_LEN];
        reader.read_exact(&mut id)?;
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag)?;
        let unit = Unit(reader.read_u32::<LittleEndian>()?);
        let offset = reader.read_u32::<LittleEndian>()?;
        let size = reader.read_u32::<LittleEndian>()?;

        let id = trim_nul(&id);
        let tag_str = trim_nul(&tag);
        let ty = match tag_str.as_bytes() {
            [t] => ColumnType::from_tag(*t, size),
            _ => None,
        }
        .ok_or_else(|| EphError::UnknownColumnType { column: id.clone(), tag: tag_str })?;
        if ty.size() != size {
            return Err(EphError::Corrupt(format!(
                "column '{id}' is {ty} but declares {size} bytes"
            )));
        }
        Ok(Self { id, ty, unit, offset, size })
    }
}

fn trim_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
