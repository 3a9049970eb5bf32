//! stacq: in-memory search over static STAC catalogs.
//!
//! This crate is the primary entrypoint of the stacq toolkit. It converts a
//! static STAC catalog into a flat geospatial table (one row per item) and
//! applies declarative search filters: collection and id membership, spatial
//! intersection (`bbox` / `intersects`), closed temporal ranges, and CQL2
//! filter expressions.
//!
//! # Quick start
//!
//! ```no_run
//! use stacq::{search, Catalog, SearchOptions};
//!
//! let catalog = Catalog::read_file("catalog.json")?;
//! let result = search(
//!     catalog,
//!     SearchOptions::new()
//!         .collections("sentinel-2")
//!         .filter("eo:cloud_cover < 10"),
//! )?;
//! for item in result.items() {
//!     println!("{}", item?.id());
//! }
//! # Ok::<(), stacq::Error>(())
//! ```
//!
//! # Architecture
//!
//! stacq is organized as a layered workspace:
//!
//! - **Expressions** (`stacq-expr`): CQL2-text and CQL2-JSON filter parsing
//!   into a shared predicate AST.
//! - **Tables** (`stacq-table`): STAC catalog traversal, item-to-table
//!   conversion with schema widening, the round trip back to STAC JSON, and
//!   GeoParquet persistence.
//! - **Search** (this crate): option validation, predicate translation, the
//!   executor, and the result view.
//!
//! All operations are synchronous and run to completion on the caller's
//! thread; a search never mutates its input.
#![forbid(unsafe_code)]

mod datetime;
mod eval;
mod options;
mod result;
mod search;

pub use eval::{ArrowEvaluator, FilterEvaluator};
pub use options::{
    BboxInput, DatetimeInput, FilterInput, FilterLang, IntersectsInput, ListInput, SearchOptions,
};
pub use result::{Items, SearchResult};
pub use search::{search, search_with_evaluator, SearchSource};

// Re-export the underlying layers for convenient access.
pub use stacq_expr::{parse_cql2_json, parse_cql2_text, CompareOp, Expr, Literal};
pub use stacq_result::{Error, Result};
pub use stacq_table::{
    from_geoparquet, to_geoparquet, Catalog, Item, ItemCollection, ItemTable, COLLECTION_COLUMN,
    DATETIME_COLUMN, GEOMETRY_COLUMN, ID_COLUMN,
};
