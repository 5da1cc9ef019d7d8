//! Byte shuffling of fixed-width rows.
//!
//! `N` rows of `row_size` bytes are viewed as an `N × row_size` matrix and
//! written out transposed, so byte `i` of every row ends up contiguous.
//! Same-offset bytes of similar values (exponents, high bytes of ids) then
//! form long, highly compressible runs.

use crate::error::{EphError, Result};

fn check(len: usize, row_size: usize) -> Result<usize> {
    if row_size == 0 || len % row_size != 0 {
        return Err(EphError::InvalidLength { len, row_size });
    }
    Ok(len / row_size)
}

/// `out[i * n + j] = data[j * row_size + i]`.
pub fn shuffle(data: &[u8], row_size: usize) -> Result<Vec<u8>> {
    let n = check(data.len(), row_size)?;
    let mut out = vec![0u8; data.len()];
    for (j, row) in data.chunks_exact(row_size).enumerate() {
        for (i, &b) in row.iter().enumerate() {
            out[i * n + j] = b;
        }
    }
    Ok(out)
}

/// Inverse of [`shuffle`]; the row count is `data.len() / row_size`.
pub fn unshuffle(data: &[u8], row_size: usize) -> Result<Vec<u8>> {
    let n = check(data.len(), row_size)?;
    let mut out = vec![0u8; data.len()];
    for (j, row) in out.chunks_exact_mut(row_size).enumerate() {
        for (i, b) in row.iter_mut().enumerate() {
            *b = data[i * n + j];
        }
    }
    Ok(out)
}
