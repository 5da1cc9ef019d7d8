pub mod error;
pub mod nuniq;
pub mod units;
pub mod schema;
pub mod value;
pub mod quantize;
pub mod row;
pub mod shuffle;
pub mod codec;
pub mod header;
pub mod tile;
pub mod store;
pub mod properties;

pub use error::{EphError, Result};
pub use nuniq::{Nuniq, resolve_path};
pub use schema::{Column, ColumnType, Schema};
pub use units::Unit;
pub use value::{Record, Value};
pub use tile::{Tile, EncodeOptions, encode_tile, decode_tile, create_tile, read_tile};
pub use store::TileStore;
