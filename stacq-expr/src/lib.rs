//! Filter expression AST and CQL2 parsers.
//!
//! Search filters arrive in one of two textual forms defined by the OGC
//! Common Query Language: `cql2-text` (an SQL-like grammar) and `cql2-json`
//! (an `{"op": ..., "args": [...]}` tree). Both front ends lower into the
//! same [`Expr`] AST, which the search executor validates against the table
//! schema and hands to a filter evaluator.
#![forbid(unsafe_code)]

pub mod expr;
pub mod json;
pub mod literal;
pub mod text;

pub use expr::{CompareOp, Expr};
pub use json::{parse_cql2_json, parse_cql2_json_str};
pub use literal::Literal;
pub use text::parse_cql2_text;
