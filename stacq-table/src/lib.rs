//! STAC catalogs as flat geospatial tables.
//!
//! This crate turns a static STAC catalog (or any collection of STAC items)
//! into an [`ItemTable`]: one row per item, attribute columns held in an
//! Arrow [`RecordBatch`](arrow::record_batch::RecordBatch), and the item
//! geometries parsed into [`geo::Geometry`] shapes alongside it. The inverse
//! direction ([`ItemTable::to_items`]) reconstructs STAC Feature JSON from
//! the table, and [`geoparquet`] persists tables as GeoParquet files with a
//! WKB-encoded geometry column.
//!
//! Conversion is a pure function of its input: the catalog is never mutated
//! and nothing is cached between calls.
#![forbid(unsafe_code)]

pub mod catalog;
pub mod geoparquet;
mod inference;
pub mod item;
pub mod table;

pub use catalog::Catalog;
pub use geoparquet::{from_geoparquet, to_geoparquet};
pub use item::{Item, ItemCollection};
pub use table::{micros_to_rfc3339, rfc3339_to_micros, ItemTable};

/// Column holding the item identifier.
pub const ID_COLUMN: &str = "id";
/// Column holding the item's collection membership.
pub const COLLECTION_COLUMN: &str = "collection";
/// Logical name of the parsed geometry column.
pub const GEOMETRY_COLUMN: &str = "geometry";
/// Column holding the item timestamp (UTC microseconds).
pub const DATETIME_COLUMN: &str = "datetime";

/// Field-metadata key marking columns that carry JSON-encoded values.
pub(crate) const JSON_ENCODING_KEY: &str = "stacq:encoding";
pub(crate) const JSON_ENCODING_VALUE: &str = "json";

/// Field-metadata key marking columns that reconstruct as top-level item
/// fields (`assets`, `links`, `bbox`, ...) rather than properties.
pub(crate) const TOP_LEVEL_KEY: &str = "stacq:top_level";

/// Delimiter used when flattening nested property objects into column names.
/// STAC extension keys already use `:` and are kept as-is.
pub(crate) const FLATTEN_DELIMITER: char = '.';
