//! Error types and result definitions for the stacq STAC search toolkit.
//!
//! All stacq crates share a single [`Error`] enum and the [`Result<T>`] alias
//! defined here. Failures propagate to the caller synchronously with the `?`
//! operator; there is no retry or recovery layer because the toolkit has no
//! transient failure modes (no network, no concurrency).
//!
//! # Error Categories
//!
//! - **Validation errors** ([`Error::UnsupportedOption`],
//!   [`Error::ConflictingOptions`], [`Error::UnknownColumn`]): raised before
//!   any row scan, never partially applied.
//! - **Parsing errors** ([`Error::FilterParse`], [`Error::GeometryParse`]):
//!   surfaced immediately from the delegated parsers, not swallowed.
//! - **Library errors** ([`Error::Io`], [`Error::Arrow`], [`Error::Parquet`],
//!   [`Error::Json`]): wrapped errors from the underlying I/O and columnar
//!   stacks.
//!
//! Missing properties are never errors: they widen the table schema and flow
//! through predicates as nulls.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
