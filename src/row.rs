//! Fixed-width row packing.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{EphError, Result};
use crate::header::ColumnDescriptor;
use crate::quantize;
use crate::schema::{Column, ColumnType, Schema};
use crate::value::{Record, Value};

/// Append one row to `out`, columns in schema order.
pub fn encode_row(schema: &Schema, record: &Record, out: &mut Vec<u8>) -> Result<()> {
    for col in schema.columns() {
        let value = record
            .get(&col.id)
            .ok_or_else(|| EphError::SchemaMismatch { column: col.id.clone() })?;
        encode_value(col, value, out)?;
    }
    Ok(())
}

/// Pack all records, in the given order, into one `len × row_size` buffer.
pub fn encode_rows(schema: &Schema, records: &[Record]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(records.len() * schema.row_size());
    for record in records {
        encode_row(schema, record, &mut buf)?;
    }
    debug_assert_eq!(buf.len(), records.len() * schema.row_size());
    Ok(buf)
}

fn encode_value(col: &Column, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let mut word = [0u8; 8];
    match (col.ty, value) {
        (ColumnType::Int32, Value::Int32(v)) => {
            LittleEndian::write_i32(&mut word, *v);
            out.extend_from_slice(&word[..4]);
        }
        (ColumnType::Float32, Value::Float32(v)) => {
            LittleEndian::write_f32(&mut word, quantize::truncate(*v, col.zerobits));
            out.extend_from_slice(&word[..4]);
        }
        (ColumnType::UInt64, Value::UInt64(v)) => {
            LittleEndian::write_u64(&mut word, *v);
            out.extend_from_slice(&word);
        }
        (ColumnType::Bytes(size), Value::Bytes(b)) => {
            let size = size as usize;
            if b.len() > size {
                return Err(EphError::ValueTooLong {
                    column: col.id.clone(),
                    len: b.len(),
                    size,
                });
            }
            out.extend_from_slice(b);
            out.resize(out.len() + size - b.len(), 0);
        }
        (ty, _) => {
            return Err(EphError::TypeMismatch { column: col.id.clone(), expected: ty.name() });
        }
    }
    Ok(())
}

/// Decode one value from the row bytes of `col`.
///
/// Trailing NUL padding of strings is removed.
pub fn decode_value(col: &ColumnDescriptor, bytes: &[u8]) -> Value {
    match col.ty {
        ColumnType::Int32 => Value::Int32(LittleEndian::read_i32(bytes)),
        ColumnType::Float32 => Value::Float32(LittleEndian::read_f32(bytes)),
        ColumnType::UInt64 => Value::UInt64(LittleEndian::read_u64(bytes)),
        ColumnType::Bytes(_) => {
            let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            Value::Bytes(bytes[..end].to_vec())
        }
    }
}

/// Split `data` into rows of `row_size` bytes and decode every column at its
/// stored offset.
pub fn decode_rows(columns: &[ColumnDescriptor], row_size: usize, data: &[u8]) -> Result<Vec<Record>> {
    if let Some(col) = columns.iter().find(|c| c.range().end > row_size) {
        return Err(EphError::Corrupt(format!(
            "column '{}' ({}..{}) overruns the {row_size}-byte row",
            col.id, col.range().start, col.range().end
        )));
    }
    if row_size == 0 || data.len() % row_size != 0 {
        return Err(EphError::InvalidLength { len: data.len(), row_size });
    }
    Ok(data
        .chunks_exact(row_size)
        .map(|row| {
            columns
                .iter()
                .map(|c| (c.id.clone(), decode_value(c, &row[c.range()])))
                .collect()
        })
        .collect())
}
