//! Filter evaluation against item tables.
//!
//! Expressions evaluate to a row mask with SQL-style null handling: a row
//! whose column value is null does not match any predicate on that column,
//! except an explicit `IS NULL` test. Masks themselves are never null, so
//! combining them is plain boolean algebra.

use std::cmp::Ordering;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use geo::{Geometry, Intersects};
use regex::Regex;
use stacq_expr::{CompareOp, Expr, Literal};
use stacq_result::{Error, Result};
use stacq_table::{rfc3339_to_micros, ItemTable, GEOMETRY_COLUMN};

/// Turns a filter expression into a row mask over a table.
///
/// The evaluator is a seam: searches accept any implementation, and the
/// default [`ArrowEvaluator`] walks the expression once per column array.
pub trait FilterEvaluator {
    /// Produce one mask entry per table row; `true` keeps the row.
    fn evaluate(&self, expr: &Expr, table: &ItemTable) -> Result<BooleanArray>;
}

/// The built-in evaluator over Arrow attribute columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowEvaluator;

impl FilterEvaluator for ArrowEvaluator {
    fn evaluate(&self, expr: &Expr, table: &ItemTable) -> Result<BooleanArray> {
        let mask = eval_expr(expr, table)?;
        debug_assert_eq!(mask.len(), table.num_rows());
        Ok(mask)
    }
}

fn eval_expr(expr: &Expr, table: &ItemTable) -> Result<BooleanArray> {
    match expr {
        Expr::And(children) => combine(children, table, |a, b| a && b, true),
        Expr::Or(children) => combine(children, table, |a, b| a || b, false),
        Expr::Not(inner) => {
            let mask = eval_expr(inner, table)?;
            Ok(map_rows(table.num_rows(), |row| !mask.value(row)))
        }
        Expr::Compare { column, op, value } => compare_column(table, column, *op, value),
        Expr::Like {
            column,
            pattern,
            negated,
        } => like_column(table, column, pattern, *negated),
        Expr::InList {
            column,
            list,
            negated,
        } => {
            let mut mask = map_rows(table.num_rows(), |_| false);
            for value in list {
                let hit = compare_column(table, column, CompareOp::Eq, value)?;
                mask = map_rows(table.num_rows(), |row| mask.value(row) || hit.value(row));
            }
            if *negated {
                negate_against_nulls(table, column, &mask)
            } else {
                Ok(mask)
            }
        }
        Expr::Between {
            column,
            low,
            high,
            negated,
        } => {
            let above = compare_column(table, column, CompareOp::GtEq, low)?;
            let below = compare_column(table, column, CompareOp::LtEq, high)?;
            let mask = map_rows(table.num_rows(), |row| {
                above.value(row) && below.value(row)
            });
            if *negated {
                negate_against_nulls(table, column, &mask)
            } else {
                Ok(mask)
            }
        }
        Expr::IsNull { column, negated } => {
            let nulls = null_mask(table, column)?;
            if *negated {
                Ok(map_rows(table.num_rows(), |row| !nulls.value(row)))
            } else {
                Ok(nulls)
            }
        }
        Expr::Intersects { column, geometry } => intersects_column(table, column, geometry),
    }
}

fn combine(
    children: &[Expr],
    table: &ItemTable,
    fold: impl Fn(bool, bool) -> bool,
    identity: bool,
) -> Result<BooleanArray> {
    let mut acc = vec![identity; table.num_rows()];
    for child in children {
        let mask = eval_expr(child, table)?;
        for (row, slot) in acc.iter_mut().enumerate() {
            *slot = fold(*slot, mask.value(row));
        }
    }
    Ok(BooleanArray::from(acc))
}

fn map_rows(rows: usize, f: impl Fn(usize) -> bool) -> BooleanArray {
    BooleanArray::from((0..rows).map(f).collect::<Vec<bool>>())
}

/// A negated predicate still excludes null rows, so the complement is taken
/// against the set of non-null rows rather than all rows.
fn negate_against_nulls(table: &ItemTable, column: &str, mask: &BooleanArray) -> Result<BooleanArray> {
    let nulls = null_mask(table, column)?;
    Ok(map_rows(table.num_rows(), |row| {
        !mask.value(row) && !nulls.value(row)
    }))
}

fn null_mask(table: &ItemTable, column: &str) -> Result<BooleanArray> {
    if column == GEOMETRY_COLUMN {
        return Ok(BooleanArray::from(
            table
                .geometry()
                .iter()
                .map(Option::is_none)
                .collect::<Vec<bool>>(),
        ));
    }
    let array = attribute_column(table, column)?;
    Ok(map_rows(table.num_rows(), |row| array.is_null(row)))
}

fn attribute_column<'a>(table: &'a ItemTable, column: &str) -> Result<&'a ArrayRef> {
    table
        .column(column)
        .ok_or_else(|| Error::UnknownColumn(column.to_string()))
}

fn compare_column(
    table: &ItemTable,
    column: &str,
    op: CompareOp,
    value: &Literal,
) -> Result<BooleanArray> {
    if column == GEOMETRY_COLUMN {
        return Err(Error::InvalidArgumentError(format!(
            "the geometry column supports only spatial predicates, not `{op}`"
        )));
    }
    let array = attribute_column(table, column)?;

    match array.data_type() {
        DataType::Utf8 => {
            let values = downcast::<StringArray>(array, column)?;
            let Literal::String(expected) = value else {
                return Err(type_mismatch(column, "a string", value));
            };
            Ok(map_rows(table.num_rows(), |row| {
                !values.is_null(row) && ordering_matches(op, values.value(row).cmp(expected))
            }))
        }
        DataType::Int64 => {
            let values = downcast::<Int64Array>(array, column)?;
            match value {
                Literal::Integer(expected) => Ok(map_rows(table.num_rows(), |row| {
                    !values.is_null(row) && ordering_matches(op, values.value(row).cmp(expected))
                })),
                Literal::Float(expected) => Ok(float_compare_rows(
                    table.num_rows(),
                    |row| (!values.is_null(row)).then(|| values.value(row) as f64),
                    op,
                    *expected,
                )),
                other => Err(type_mismatch(column, "a number", other)),
            }
        }
        DataType::Float64 => {
            let values = downcast::<Float64Array>(array, column)?;
            let expected = value
                .as_f64()
                .ok_or_else(|| type_mismatch(column, "a number", value))?;
            Ok(float_compare_rows(
                table.num_rows(),
                |row| (!values.is_null(row)).then(|| values.value(row)),
                op,
                expected,
            ))
        }
        DataType::Boolean => {
            let values = downcast::<BooleanArray>(array, column)?;
            let Literal::Bool(expected) = value else {
                return Err(type_mismatch(column, "a boolean", value));
            };
            if !matches!(op, CompareOp::Eq | CompareOp::NotEq) {
                return Err(Error::InvalidArgumentError(format!(
                    "boolean column '{column}' supports only `=` and `<>`"
                )));
            }
            Ok(map_rows(table.num_rows(), |row| {
                !values.is_null(row)
                    && ordering_matches(op, values.value(row).cmp(expected))
            }))
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let values = downcast::<TimestampMicrosecondArray>(array, column)?;
            let Literal::String(text) = value else {
                return Err(type_mismatch(column, "an RFC 3339 string", value));
            };
            let expected = rfc3339_to_micros(text)?;
            Ok(map_rows(table.num_rows(), |row| {
                !values.is_null(row) && ordering_matches(op, values.value(row).cmp(&expected))
            }))
        }
        other => Err(Error::InvalidArgumentError(format!(
            "column '{column}' of type {other:?} cannot be compared in a filter"
        ))),
    }
}

fn float_compare_rows(
    rows: usize,
    value_at: impl Fn(usize) -> Option<f64>,
    op: CompareOp,
    expected: f64,
) -> BooleanArray {
    map_rows(rows, |row| match value_at(row) {
        Some(actual) => actual
            .partial_cmp(&expected)
            .is_some_and(|ord| ordering_matches(op, ord)),
        None => false,
    })
}

fn ordering_matches(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::NotEq => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::LtEq => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::GtEq => ord != Ordering::Less,
    }
}

fn type_mismatch(column: &str, expected: &str, actual: &Literal) -> Error {
    Error::InvalidArgumentError(format!(
        "column '{column}' expects {expected}, got {} literal",
        actual.kind()
    ))
}

fn like_column(table: &ItemTable, column: &str, pattern: &str, negated: bool) -> Result<BooleanArray> {
    if column == GEOMETRY_COLUMN {
        return Err(Error::InvalidArgumentError(
            "the geometry column supports only spatial predicates, not `LIKE`".into(),
        ));
    }
    let array = attribute_column(table, column)?;
    let values = match array.data_type() {
        DataType::Utf8 => downcast::<StringArray>(array, column)?,
        other => {
            return Err(Error::InvalidArgumentError(format!(
                "`LIKE` requires a string column, '{column}' is {other:?}"
            )));
        }
    };

    let regex = like_to_regex(pattern)?;
    let mask = map_rows(table.num_rows(), |row| {
        !values.is_null(row) && regex.is_match(values.value(row))
    });
    if negated {
        negate_against_nulls(table, column, &mask)
    } else {
        Ok(mask)
    }
}

/// Compile a SQL `LIKE` pattern (`%` any run, `_` any single character) into
/// an anchored regex.
fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 4);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source)
        .map_err(|err| Error::FilterParse(format!("invalid LIKE pattern {pattern:?}: {err}")))
}

fn intersects_column(
    table: &ItemTable,
    column: &str,
    geometry: &Geometry<f64>,
) -> Result<BooleanArray> {
    if column != GEOMETRY_COLUMN {
        return Err(Error::InvalidArgumentError(format!(
            "spatial predicates apply to the '{GEOMETRY_COLUMN}' column, not '{column}'"
        )));
    }
    Ok(BooleanArray::from(
        table
            .geometry()
            .iter()
            .map(|geom| match geom {
                Some(shape) => shape.intersects(geometry),
                None => false,
            })
            .collect::<Vec<bool>>(),
    ))
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, column: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Internal(format!("unexpected array type in column '{column}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stacq_table::Item;

    fn table() -> ItemTable {
        let items: Vec<Item> = [
            ("i-1", json!({"platform": "SS02", "eo:cloud_cover": 10.0}), Some((0.5, 0.5))),
            ("i-2", json!({"platform": "SSC1", "eo:cloud_cover": 80.0}), Some((5.5, 5.5))),
            ("i-3", json!({"platform": "101c"}), None),
        ]
        .into_iter()
        .map(|(id, extra, point)| {
            let mut properties = json!({"datetime": "2021-04-01T12:00:00Z"});
            if let (Some(base), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
                for (k, v) in extra {
                    base.insert(k.clone(), v.clone());
                }
            }
            let geometry = match point {
                Some((lon, lat)) => json!({"type": "Point", "coordinates": [lon, lat]}),
                None => json!(null),
            };
            Item::from_value(json!({
                "type": "Feature",
                "id": id,
                "geometry": geometry,
                "properties": properties,
            }))
            .unwrap()
        })
        .collect();
        ItemTable::from_items(&items).unwrap()
    }

    fn rows(mask: &BooleanArray) -> Vec<bool> {
        (0..mask.len()).map(|row| mask.value(row)).collect()
    }

    #[test]
    fn string_equality() {
        let expr = stacq_expr::parse_cql2_text("platform = 'SS02'").unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![true, false, false]);
    }

    #[test]
    fn null_rows_never_match_a_comparison() {
        let expr = stacq_expr::parse_cql2_text("\"eo:cloud_cover\" < 50").unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![true, false, false]);
    }

    #[test]
    fn negated_in_list_excludes_nulls_too() {
        let expr =
            stacq_expr::parse_cql2_text("\"eo:cloud_cover\" NOT IN (10.0, 80.0)").unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![false, false, false]);
    }

    #[test]
    fn is_null_on_the_geometry_column_uses_the_shape_column() {
        let expr = stacq_expr::parse_cql2_text("geometry IS NULL").unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![false, false, true]);
    }

    #[test]
    fn like_translates_wildcards_and_escapes_the_rest() {
        let expr = stacq_expr::parse_cql2_text("platform LIKE 'SS%'").unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![true, true, false]);

        let expr = stacq_expr::parse_cql2_text("platform LIKE '10_c'").unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![false, false, true]);
    }

    #[test]
    fn intersects_skips_null_geometry() {
        let expr = stacq_expr::parse_cql2_text(
            "S_INTERSECTS(geometry, 'POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))')",
        )
        .unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![true, false, false]);
    }

    #[test]
    fn comparing_the_geometry_column_is_rejected() {
        let expr = stacq_expr::parse_cql2_text("geometry = 'x'").unwrap();
        assert!(matches!(
            ArrowEvaluator.evaluate(&expr, &table()),
            Err(Error::InvalidArgumentError(_))
        ));
    }

    #[test]
    fn timestamp_comparison_parses_the_literal() {
        let expr =
            stacq_expr::parse_cql2_text("datetime >= '2021-01-01T00:00:00Z'").unwrap();
        let mask = ArrowEvaluator.evaluate(&expr, &table()).unwrap();
        assert_eq!(rows(&mask), vec![true, true, true]);
    }
}
