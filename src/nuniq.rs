//! HiPS `nuniq` keys and the on-disk tile path convention.
//!
//! A `nuniq` packs a HEALPix order and a nested pixel index into one integer:
//! `nuniq = pix + 4 * 4^order`.  Tiles live at
//! `<root>/Norder<order>/Dir<bucket>/Npix<pix>.eph`, where `bucket` is `pix`
//! rounded down to a multiple of 10000.  Tile loaders locate files from this
//! layout alone, so it is frozen.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{EphError, Result};

/// Number of pixels grouped under one `Dir<bucket>` directory.
pub const DIR_BUCKET_SIZE: u64 = 10_000;

/// Deepest HEALPix order representable in a 64-bit `nuniq`.
pub const MAX_ORDER: u32 = 29;

/// File extension of tile files.
pub const TILE_EXTENSION: &str = "eph";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nuniq(u64);

impl Nuniq {
    /// Wrap a raw key.  Keys below 4 have no valid order, keys from
    /// `16 * 4^29` on are deeper than [`MAX_ORDER`].
    pub fn new(nuniq: u64) -> Result<Self> {
        if nuniq < 4 || (nuniq / 4).ilog2() / 2 > MAX_ORDER {
            return Err(EphError::InvalidNuniq(nuniq));
        }
        Ok(Self(nuniq))
    }

    /// Build the key of pixel `pix` at `order`.
    pub fn from_order_pix(order: u32, pix: u64) -> Result<Self> {
        if order > MAX_ORDER || pix >= 12u64 << (2 * order) {
            return Err(EphError::InvalidPixel { order, pix });
        }
        let base = 4u64 << (2 * order);
        Ok(Self(base + pix))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// `floor(log2(nuniq / 4) / 2)`.
    #[inline]
    pub fn order(self) -> u32 {
        (self.0 / 4).ilog2() / 2
    }

    /// `nuniq - 4 * 4^order`.
    #[inline]
    pub fn pix(self) -> u64 {
        self.0 - (4u64 << (2 * self.order()))
    }

    #[inline]
    pub fn dir_bucket(self) -> u64 {
        (self.pix() / DIR_BUCKET_SIZE) * DIR_BUCKET_SIZE
    }

    /// Path of this tile below `root`.
    pub fn tile_path<P: AsRef<Path>>(self, root: P) -> PathBuf {
        root.as_ref()
            .join(format!("Norder{}", self.order()))
            .join(format!("Dir{}", self.dir_bucket()))
            .join(format!("Npix{}.{}", self.pix(), TILE_EXTENSION))
    }
}

impl TryFrom<u64> for Nuniq {
    type Error = EphError;

    fn try_from(v: u64) -> Result<Self> {
        Self::new(v)
    }
}

impl fmt::Display for Nuniq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (order {}, pix {})", self.0, self.order(), self.pix())
    }
}

/// Resolve the tile path of `nuniq` below `root`.
pub fn resolve_path<P: AsRef<Path>>(root: P, nuniq: u64) -> Result<PathBuf> {
    Ok(Nuniq::new(nuniq)?.tile_path(root))
}
