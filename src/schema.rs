//! Column schema of a tile.
//!
//! Schema order fixes both the descriptor order in the header and the byte
//! layout of every row: each column occupies `size` bytes starting right
//! after the previous one, so the row size is the sum of column sizes.
//!
//! Schemas are usually built in code with the [`Column`] constructors, or
//! loaded from JSON:
//!
//! ```json
//! [
//!   {"id": "hip",  "type": "i"},
//!   {"id": "vmag", "type": "f", "unit": "vmag", "zerobits": 16},
//!   {"id": "name", "type": "s", "size": 16}
//! ]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{EphError, Result};
use crate::header::ColumnDescriptor;
use crate::quantize::MAX_ZEROBITS;
use crate::units::Unit;

/// Maximum length of a column id on disk.
pub const COLUMN_ID_LEN: usize = 4;

// ── ColumnType ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `i`: little-endian signed 32-bit integer.
    Int32,
    /// `f`: little-endian IEEE-754 single.
    Float32,
    /// `Q`: little-endian unsigned 64-bit integer.
    UInt64,
    /// `s`: fixed-size byte string, NUL padded.
    Bytes(u32),
}

impl ColumnType {
    /// One-letter type tag written into the descriptor.
    pub fn tag(self) -> u8 {
        match self {
            ColumnType::Int32 => b'i',
            ColumnType::Float32 => b'f',
            ColumnType::UInt64 => b'Q',
            ColumnType::Bytes(_) => b's',
        }
    }

    /// Resolve a tag; strings take their size from the descriptor.
    pub fn from_tag(tag: u8, size: u32) -> Option<Self> {
        match tag {
            b'i' => Some(ColumnType::Int32),
            b'f' => Some(ColumnType::Float32),
            b'Q' => Some(ColumnType::UInt64),
            b's' => Some(ColumnType::Bytes(size)),
            _ => None,
        }
    }

    pub fn size(self) -> u32 {
        match self {
            ColumnType::Int32 | ColumnType::Float32 => 4,
            ColumnType::UInt64 => 8,
            ColumnType::Bytes(n) => n,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int32 => "int32",
            ColumnType::Float32 => "float32",
            ColumnType::UInt64 => "uint64",
            ColumnType::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Bytes(n) => write!(f, "bytes[{n}]"),
            t => f.write_str(t.name()),
        }
    }
}

// ── Column ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    pub ty: ColumnType,
    pub unit: Unit,
    /// Low bits of the float pattern cleared before storage.  Floats only.
    pub zerobits: u32,
}

impl Column {
    pub fn new(id: impl Into<String>, ty: ColumnType) -> Self {
        Self { id: id.into(), ty, unit: Unit::NONE, zerobits: 0 }
    }

    pub fn int32(id: impl Into<String>) -> Self {
        Self::new(id, ColumnType::Int32)
    }

    pub fn float32(id: impl Into<String>) -> Self {
        Self::new(id, ColumnType::Float32)
    }

    pub fn uint64(id: impl Into<String>) -> Self {
        Self::new(id, ColumnType::UInt64)
    }

    pub fn bytes(id: impl Into<String>, size: u32) -> Self {
        Self::new(id, ColumnType::Bytes(size))
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_zerobits(mut self, zerobits: u32) -> Self {
        self.zerobits = zerobits;
        self
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.ty.size() as usize
    }

    fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(EphError::InvalidSchema(msg));
        if self.id.is_empty() || self.id.len() > COLUMN_ID_LEN {
            return bad(format!("column id '{}' must be 1 to {COLUMN_ID_LEN} bytes", self.id));
        }
        if !self.id.bytes().all(|b| b.is_ascii() && b != 0) {
            return bad(format!("column id '{}' must be ASCII without NUL", self.id));
        }
        if let ColumnType::Bytes(0) = self.ty {
            return bad(format!("string column '{}' has zero size", self.id));
        }
        if self.zerobits > 0 && self.ty != ColumnType::Float32 {
            return bad(format!("column '{}': zerobits only apply to float columns", self.id));
        }
        if self.zerobits > MAX_ZEROBITS {
            return bad(format!(
                "column '{}': zerobits {} exceeds {MAX_ZEROBITS}",
                self.id, self.zerobits
            ));
        }
        Ok(())
    }
}

// JSON columns go through a raw form so the type letter, optional size and
// unit spelling can be checked together.
#[derive(Deserialize)]
#[serde(untagged)]
enum UnitSpec {
    Code(u32),
    Name(String),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnRaw {
    id: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    size: Option<u32>,
    #[serde(default)]
    unit: Option<UnitSpec>,
    #[serde(default, alias = "quantization")]
    zerobits: Option<u32>,
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;

        let raw = ColumnRaw::deserialize(deserializer)?;
        let tag = match raw.ty.as_bytes() {
            [t] => *t,
            _ => return Err(D::Error::custom(format!("column '{}': bad type '{}'", raw.id, raw.ty))),
        };
        let ty = match (ColumnType::from_tag(tag, raw.size.unwrap_or(0)), raw.size) {
            (Some(ColumnType::Bytes(_)), None) => {
                return Err(D::Error::custom(format!("string column '{}' needs a size", raw.id)));
            }
            (Some(ColumnType::Bytes(n)), Some(_)) => ColumnType::Bytes(n),
            (Some(t), Some(size)) if size != t.size() => {
                return Err(D::Error::custom(format!(
                    "column '{}': type '{}' is {} bytes, not {size}",
                    raw.id, raw.ty, t.size()
                )));
            }
            (Some(t), _) => t,
            (None, _) => {
                return Err(D::Error::custom(format!("column '{}': unknown type '{}'", raw.id, raw.ty)));
            }
        };
        let unit = match raw.unit {
            None => Unit::NONE,
            Some(UnitSpec::Code(c)) => Unit(c),
            Some(UnitSpec::Name(n)) => Unit::from_name(&n)
                .ok_or_else(|| D::Error::custom(format!("column '{}': unknown unit '{n}'", raw.id)))?,
        };
        Ok(Column { id: raw.id, ty, unit, zerobits: raw.zerobits.unwrap_or(0) })
    }
}

// ── Schema ───────────────────────────────────────────────────────────────────

/// Validated, ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<Column>")]
pub struct Schema {
    columns: Vec<Column>,
    row_size: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(EphError::InvalidSchema("schema has no columns".into()));
        }
        let mut seen = HashSet::new();
        for col in &columns {
            col.validate()?;
            if !seen.insert(col.id.as_str()) {
                return Err(EphError::InvalidSchema(format!("duplicate column id '{}'", col.id)));
            }
        }
        let row_size = columns.iter().map(Column::size).sum();
        Ok(Self { columns, row_size })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EphError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Sum of all column sizes.
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// On-disk descriptors, with offsets assigned in schema order.
    pub fn descriptors(&self) -> Vec<ColumnDescriptor> {
        let mut offset = 0u32;
        self.columns
            .iter()
            .map(|c| {
                let d = ColumnDescriptor::new(&c.id, c.ty, c.unit, offset);
                offset += c.ty.size();
                d
            })
            .collect()
    }
}

impl TryFrom<Vec<Column>> for Schema {
    type Error = EphError;

    fn try_from(columns: Vec<Column>) -> Result<Self> {
        Schema::new(columns)
    }
}
