//! Tile encoding and decoding.
//!
//! A tile is one `.eph` file holding a single survey chunk: the column
//! header followed by the rows, packed ([`crate::row`]), byte-shuffled
//! ([`crate::shuffle`]) and zlib-compressed ([`crate::codec`]).
//!
//! ```no_run
//! use ephe::schema::{Column, Schema};
//! use ephe::tile::{create_tile, read_tile};
//! use ephe::units::Unit;
//! use ephe::value::{Record, Value};
//!
//! let schema = Schema::new(vec![
//!     Column::int32("hip"),
//!     Column::float32("vmag").with_unit(Unit::VMAG).with_zerobits(16),
//! ])?;
//! let records = vec![Record::from([
//!     ("hip".to_string(), Value::Int32(91262)),
//!     ("vmag".to_string(), Value::Float32(0.03)),
//! ])];
//! let path = create_tile(&records, "STAR", 10, "data/stars", &schema)?;
//! let tile = read_tile(&path)?;
//! assert_eq!(tile.records.len(), 1);
//! # Ok::<(), ephe::EphError>(())
//! ```

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};

use crate::codec::{DeflateCodec, DEFAULT_LEVEL};
use crate::error::{EphError, Result};
use crate::header::{
    read_file_header, write_file_header, ChunkHeader, ColumnDescriptor, TileHeader,
    CHECKSUM_SIZE, CHUNK_VERSION, COLUMN_DESCRIPTOR_SIZE, FLAG_SHUFFLED,
    PAYLOAD_HEADER_SIZE, TILE_HEADER_SIZE,
};
use crate::nuniq::Nuniq;
use crate::row;
use crate::schema::{Column, ColumnType, Schema};
use crate::shuffle::{shuffle, unshuffle};
use crate::units::Unit;
use crate::value::{Record, Value};

// ── EncodeOptions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// zlib level, 0..=9.
    pub level: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { level: DEFAULT_LEVEL }
    }
}

// ── Tile ─────────────────────────────────────────────────────────────────────

/// A decoded tile.
#[derive(Debug, Clone)]
pub struct Tile {
    pub chunk_type: [u8; 4],
    pub header: TileHeader,
    /// Column descriptors in stored order.
    pub columns: Vec<ColumnDescriptor>,
    /// Records in stored order.
    pub records: Vec<Record>,
    /// Size of the zlib payload, for diagnostics.
    pub compressed_size: usize,
}

impl Tile {
    pub fn chunk_type_str(&self) -> String {
        String::from_utf8_lossy(&self.chunk_type).into_owned()
    }

    pub fn nuniq(&self) -> Result<Nuniq> {
        Nuniq::new(self.header.nuniq)
    }

    /// Rebuild the schema from the stored descriptors.
    ///
    /// Quantization is not stored, so every column comes back with zero
    /// `zerobits`.  Fails if the stored offsets are not the packed layout
    /// the encoder produces.
    pub fn schema(&self) -> Result<Schema> {
        let schema = Schema::new(
            self.columns
                .iter()
                .map(|d| Column::new(d.id.clone(), d.ty).with_unit(d.unit))
                .collect(),
        )?;
        if schema.descriptors() != self.columns {
            return Err(EphError::InvalidSchema("stored columns are not densely packed".into()));
        }
        Ok(schema)
    }

    /// Values of column `id` in record order, read as type `ty`.
    ///
    /// Float values are converted from the stored unit to `unit`; a `unit`
    /// of [`Unit::NONE`] returns them as stored.  Fails with
    /// `SchemaMismatch` when the tile has no such column and with
    /// `TypeMismatch` when it is stored with another type.
    pub fn column(&self, id: &str, ty: ColumnType, unit: Unit) -> Result<Vec<Value>> {
        let desc = self
            .columns
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| EphError::SchemaMismatch { column: id.to_owned() })?;
        if desc.ty != ty {
            return Err(EphError::TypeMismatch { column: id.to_owned(), expected: ty.name() });
        }
        self.records
            .iter()
            .map(|record| {
                let value = record
                    .get(id)
                    .ok_or_else(|| EphError::SchemaMismatch { column: id.to_owned() })?;
                Ok(match *value {
                    Value::Float32(v) => Value::Float32(desc.unit.convert(unit, v as f64) as f32),
                    ref other => other.clone(),
                })
            })
            .collect()
    }
}

// ── Encode ───────────────────────────────────────────────────────────────────

fn check_chunk_type(chunk_type: &str) -> Result<[u8; 4]> {
    let bytes: [u8; 4] = chunk_type
        .as_bytes()
        .try_into()
        .map_err(|_| EphError::InvalidChunkType(chunk_type.to_owned()))?;
    if !bytes[0].is_ascii_uppercase() || !bytes.iter().all(u8::is_ascii) {
        return Err(EphError::InvalidChunkType(chunk_type.to_owned()));
    }
    Ok(bytes)
}

fn header_u32(what: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| EphError::TooLarge { what, len })
}

/// Encode `records` into the bytes of a tile file.
///
/// Records are stored in the given order.  Nothing is produced if any record
/// fails to match the schema.
pub fn encode_tile(
    records: &[Record],
    chunk_type: &str,
    nuniq: Nuniq,
    schema: &Schema,
    opts: &EncodeOptions,
) -> Result<Vec<u8>> {
    let chunk_type = check_chunk_type(chunk_type)?;
    let row_size = schema.row_size();

    let rows = row::encode_rows(schema, records)?;
    let shuffled = shuffle(&rows, row_size)?;
    let compressed = DeflateCodec::new(opts.level).compress(&shuffled)?;

    let header = TileHeader {
        chunk_version: CHUNK_VERSION,
        nuniq: nuniq.get(),
        flags: FLAG_SHUFFLED,
        row_size: header_u32("row size", row_size)?,
        column_count: header_u32("column count", schema.len())?,
        row_count: header_u32("row count", records.len())?,
    };
    let out = assemble(chunk_type, &header, &schema.descriptors(), shuffled.len(), &compressed)?;

    debug!(
        "encoded tile {nuniq}: {} rows × {row_size} B, {} B → {} B",
        records.len(),
        shuffled.len(),
        compressed.len()
    );
    Ok(out)
}

/// Lay out a one-chunk tile file around an already compressed payload.
fn assemble(
    chunk_type: [u8; 4],
    header: &TileHeader,
    descriptors: &[ColumnDescriptor],
    data_len: usize,
    compressed: &[u8],
) -> Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(
        TILE_HEADER_SIZE + descriptors.len() * COLUMN_DESCRIPTOR_SIZE + PAYLOAD_HEADER_SIZE + compressed.len(),
    );
    header.write(&mut chunk)?;
    for desc in descriptors {
        desc.write(&mut chunk)?;
    }
    chunk.write_u32::<LittleEndian>(header_u32("payload", data_len)?)?;
    chunk.write_u32::<LittleEndian>(header_u32("compressed payload", compressed.len())?)?;
    chunk.write_all(compressed)?;

    let mut out = Vec::with_capacity(chunk.len() + 20);
    write_file_header(&mut out)?;
    ChunkHeader { chunk_type, length: header_u32("chunk", chunk.len())? }.write(&mut out)?;
    out.write_all(&chunk)?;
    // Checksum slot: never computed by any writer, never checked by readers.
    out.write_u32::<LittleEndian>(0)?;
    Ok(out)
}

/// Encode `records` and write them to the tile path of `nuniq` below `root`,
/// creating missing directories.  Returns the written path.
pub fn create_tile<P: AsRef<Path>>(
    records: &[Record],
    chunk_type: &str,
    nuniq: u64,
    root: P,
    schema: &Schema,
) -> Result<PathBuf> {
    create_tile_with(records, chunk_type, nuniq, root, schema, &EncodeOptions::default())
}

pub fn create_tile_with<P: AsRef<Path>>(
    records: &[Record],
    chunk_type: &str,
    nuniq: u64,
    root: P,
    schema: &Schema,
    opts: &EncodeOptions,
) -> Result<PathBuf> {
    let nuniq = Nuniq::new(nuniq)?;
    let path = nuniq.tile_path(root);
    let bytes = encode_tile(records, chunk_type, nuniq, schema, opts)?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| EphError::io(dir, e))?;
    }
    fs::write(&path, &bytes).map_err(|e| EphError::io(&path, e))?;
    info!("wrote {} ({} rows, {} B)", path.display(), records.len(), bytes.len());
    Ok(path)
}

// ── Decode ───────────────────────────────────────────────────────────────────

/// Decode the first survey chunk of a tile file.
pub fn decode_tile(bytes: &[u8]) -> Result<Tile> {
    let mut cur = Cursor::new(bytes);
    read_file_header(&mut cur)?;

    loop {
        if cur.position() as usize >= bytes.len() {
            return Err(EphError::NoTileChunk);
        }
        let chunk = ChunkHeader::read(&mut cur)?;
        let start = cur.position() as usize;
        let end = start
            .checked_add(chunk.length as usize)
            .filter(|&end| end + CHECKSUM_SIZE <= bytes.len())
            .ok_or(EphError::Truncated)?;
        if chunk.is_tile() {
            return decode_chunk(chunk, &bytes[start..end]);
        }
        warn!("skipping non-tile chunk {:?} ({} B)", chunk.type_str(), chunk.length);
        cur.set_position((end + CHECKSUM_SIZE) as u64);
    }
}

fn decode_chunk(chunk: ChunkHeader, body: &[u8]) -> Result<Tile> {
    let mut cur = Cursor::new(body);
    let header = TileHeader::read(&mut cur)?;

    let remaining = body.len() - cur.position() as usize;
    if header.column_count as usize > remaining / COLUMN_DESCRIPTOR_SIZE {
        return Err(EphError::Truncated);
    }
    let columns = (0..header.column_count)
        .map(|_| ColumnDescriptor::read(&mut cur))
        .collect::<Result<Vec<_>>>()?;

    let data_len = cur.read_u32::<LittleEndian>()? as usize;
    let comp_len = cur.read_u32::<LittleEndian>()? as usize;
    let pos = cur.position() as usize;
    let compressed = pos
        .checked_add(comp_len)
        .and_then(|end| body.get(pos..end))
        .ok_or(EphError::Truncated)?;

    let row_size = header.row_size as usize;
    let expected = (header.row_count as usize).checked_mul(row_size);
    if expected != Some(data_len) {
        return Err(EphError::Corrupt(format!(
            "payload of {data_len} B does not hold {} rows of {row_size} B",
            header.row_count
        )));
    }

    let raw = DeflateCodec::default().decompress(compressed, data_len)?;
    let data = if header.is_shuffled() { unshuffle(&raw, row_size)? } else { raw };
    let records = row::decode_rows(&columns, row_size, &data)?;

    debug!(
        "decoded {:?} chunk, nuniq {}: {} rows × {row_size} B, {} columns",
        chunk.type_str(),
        header.nuniq,
        records.len(),
        columns.len()
    );
    Ok(Tile {
        chunk_type: chunk.chunk_type,
        header,
        columns,
        records,
        compressed_size: comp_len,
    })
}

/// Read and decode a tile file.
pub fn read_tile<P: AsRef<Path>>(path: P) -> Result<Tile> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| EphError::io(path, e))?;
    decode_tile(&bytes)
}
