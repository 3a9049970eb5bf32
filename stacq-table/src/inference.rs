//! Property flattening and column-type inference.
//!
//! Table conversion is an explicit two-pass algorithm: the first pass walks
//! every item, flattens its property map, and widens a per-column type; the
//! second pass (in [`table`](crate::table)) builds the Arrow arrays. Items
//! missing a property get a null in that column (schema widening, never
//! per-item schemas).

use serde_json::{Map, Value};

use crate::{DATETIME_COLUMN, FLATTEN_DELIMITER};

/// Inferred Arrow type for a property column.
///
/// `widen` forms a small lattice: `Int ⊔ Float = Float`, and anything else
/// mixed (or natively nested) collapses to [`ColumnType::Json`], a column of
/// JSON-encoded text that decodes losslessly on round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    Int,
    Float,
    Bool,
    String,
    Timestamp,
    Json,
}

impl ColumnType {
    pub(crate) fn widen(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            _ => Json,
        }
    }
}

/// Infer the column type for one flattened property value.
///
/// Returns `None` for JSON nulls, which carry no type information.
pub(crate) fn infer_value_type(column: &str, value: &Value) -> Option<ColumnType> {
    if value.is_null() {
        return None;
    }
    if column == DATETIME_COLUMN {
        // The STAC item timestamp becomes a typed timestamp column.
        return Some(ColumnType::Timestamp);
    }
    Some(match value {
        Value::Bool(_) => ColumnType::Bool,
        Value::Number(n) if n.is_i64() => ColumnType::Int,
        Value::Number(_) => ColumnType::Float,
        Value::String(_) => ColumnType::String,
        Value::Array(_) | Value::Object(_) => ColumnType::Json,
        Value::Null => unreachable!(),
    })
}

/// Flatten a property map into `(column, value)` pairs.
///
/// Nested objects are joined with [`FLATTEN_DELIMITER`]; STAC extension keys
/// (`eo:cloud_cover`) already use `:` and pass through unchanged. Arrays are
/// treated as leaf values.
pub(crate) fn flatten_properties(properties: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    for (key, value) in properties {
        flatten_into(key, value, &mut out);
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(nested) if !nested.is_empty() => {
            for (key, child) in nested {
                let joined = format!("{prefix}{FLATTEN_DELIMITER}{key}");
                flatten_into(&joined, child, out);
            }
        }
        other => out.push((prefix.to_string(), other.clone())),
    }
}

/// Rebuild a nested property map from flattened `(column, value)` pairs,
/// splitting column names on [`FLATTEN_DELIMITER`].
pub(crate) fn unflatten_properties(pairs: Vec<(String, Value)>) -> Map<String, Value> {
    let mut out = Map::new();
    for (column, value) in pairs {
        let mut segments = column.split(FLATTEN_DELIMITER).peekable();
        let mut target = &mut out;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                target.insert(segment.to_string(), value);
                break;
            }
            let slot = target
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                // A leaf column shadowing a nested prefix; the nested
                // values win, matching flatten's output shape.
                *slot = Value::Object(Map::new());
            }
            target = match slot {
                Value::Object(map) => map,
                _ => unreachable!(),
            };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn widening_lattice() {
        assert_eq!(ColumnType::Int.widen(ColumnType::Int), ColumnType::Int);
        assert_eq!(ColumnType::Int.widen(ColumnType::Float), ColumnType::Float);
        assert_eq!(ColumnType::Float.widen(ColumnType::Int), ColumnType::Float);
        assert_eq!(ColumnType::Int.widen(ColumnType::String), ColumnType::Json);
        assert_eq!(ColumnType::Bool.widen(ColumnType::Json), ColumnType::Json);
    }

    #[test]
    fn nested_objects_flatten_with_dots() {
        let props = json!({
            "eo:cloud_cover": 12.5,
            "raster:bands": [{"nodata": 0}],
            "extra": {"nested": {"deep": true}},
        });
        let pairs = flatten_properties(props.as_object().unwrap());
        let columns: Vec<&str> = pairs.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(columns, vec!["eo:cloud_cover", "raster:bands", "extra.nested.deep"]);
    }

    #[test]
    fn unflatten_inverts_flatten() {
        let props = json!({
            "platform": "SS02",
            "extra": {"nested": {"deep": true}, "other": 1},
        });
        let pairs = flatten_properties(props.as_object().unwrap());
        let rebuilt = unflatten_properties(pairs);
        assert_eq!(Value::Object(rebuilt), props);
    }

    #[test]
    fn datetime_column_infers_timestamp() {
        assert_eq!(
            infer_value_type("datetime", &json!("2021-04-01T12:00:00Z")),
            Some(ColumnType::Timestamp)
        );
        assert_eq!(
            infer_value_type("platform", &json!("SS02")),
            Some(ColumnType::String)
        );
        assert_eq!(infer_value_type("platform", &Value::Null), None);
    }
}
