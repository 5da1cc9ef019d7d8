//! [`TileStore`]: a directory of tiles laid out by `nuniq`.
//!
//! ```no_run
//! use ephe::{Column, Schema, TileStore};
//!
//! let store = TileStore::open("data/stars");
//! let schema = Schema::new(vec![Column::int32("hip")])?;
//! store.write("STAR", 4, &schema, &[])?;
//! let tile = store.read(4)?;
//! assert_eq!(tile.records.len(), 0);
//! # Ok::<(), ephe::EphError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EphError, Result};
use crate::nuniq::{Nuniq, TILE_EXTENSION};
use crate::properties::HipsProperties;
use crate::schema::Schema;
use crate::tile::{create_tile_with, read_tile, EncodeOptions, Tile};
use crate::value::Record;

#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
    opts: EncodeOptions,
}

impl TileStore {
    /// The directory is created lazily by the first write.
    pub fn open<P: AsRef<Path>>(root: P) -> Self {
        Self::with_options(root, EncodeOptions::default())
    }

    pub fn with_options<P: AsRef<Path>>(root: P, opts: EncodeOptions) -> Self {
        Self { root: root.as_ref().to_owned(), opts }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, nuniq: u64) -> Result<PathBuf> {
        Ok(Nuniq::new(nuniq)?.tile_path(&self.root))
    }

    pub fn contains(&self, nuniq: u64) -> bool {
        self.path(nuniq).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Encode and write one tile.  An existing tile at the same key is
    /// replaced.
    pub fn write(&self, chunk_type: &str, nuniq: u64, schema: &Schema, records: &[Record]) -> Result<PathBuf> {
        create_tile_with(records, chunk_type, nuniq, &self.root, schema, &self.opts)
    }

    pub fn read(&self, nuniq: u64) -> Result<Tile> {
        read_tile(self.path(nuniq)?)
    }

    /// Every tile key present on disk, sorted.  Files that do not follow the
    /// `Norder<o>/Dir<d>/Npix<p>.eph` layout are ignored.
    pub fn list(&self) -> Result<Vec<Nuniq>> {
        let mut keys = Vec::new();
        if !self.root.is_dir() {
            return Ok(keys);
        }
        for order_dir in read_dir(&self.root)? {
            let Some(order) = parse_name(&order_dir, "Norder", "") else { continue };
            let Ok(order) = u32::try_from(order) else { continue };
            if !order_dir.is_dir() {
                continue;
            }
            for pix_dir in read_dir(&order_dir)? {
                if parse_name(&pix_dir, "Dir", "").is_none() || !pix_dir.is_dir() {
                    continue;
                }
                for file in read_dir(&pix_dir)? {
                    let Some(pix) = parse_name(&file, "Npix", TILE_EXTENSION) else { continue };
                    if let Ok(key) = Nuniq::from_order_pix(order, pix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Fill the order range of `props` from the tiles present.  An empty
    /// store leaves it untouched.
    pub fn describe(&self, mut props: HipsProperties) -> Result<HipsProperties> {
        let keys = self.list()?;
        if let (Some(min), Some(max)) = (
            keys.iter().map(|k| k.order()).min(),
            keys.iter().map(|k| k.order()).max(),
        ) {
            props.order_min = min;
            props.order_max = Some(max);
        }
        Ok(props)
    }

    /// Write the survey `properties` file, with the order range taken from
    /// the tiles present.
    pub fn write_properties(&self, props: HipsProperties) -> Result<PathBuf> {
        self.describe(props)?.write_to(&self.root)
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| EphError::io(dir, e))?;
    entries
        .map(|e| e.map(|e| e.path()).map_err(|err| EphError::io(dir, err)))
        .collect()
}

/// Parse `<prefix><number>[.<ext>]` from the file name of `path`.
fn parse_name(path: &Path, prefix: &str, ext: &str) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix(prefix)?;
    let digits = if ext.is_empty() {
        rest
    } else {
        rest.strip_suffix(ext)?.strip_suffix('.')?
    };
    digits.parse().ok()
}
