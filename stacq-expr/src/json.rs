//! CQL2-JSON parsing.
//!
//! CQL2-JSON encodes a filter as a tree of `{"op": ..., "args": [...]}`
//! objects. Property references appear as `{"property": "name"}` and spatial
//! operands as inline GeoJSON geometry objects, which are decoded through
//! the [`geojson`] crate.

use geo::Geometry;
use serde_json::Value;
use stacq_result::{Error, Result};

use crate::expr::{CompareOp, Expr};
use crate::literal::Literal;

/// Parse a CQL2-JSON filter document into an [`Expr`].
pub fn parse_cql2_json(value: &Value) -> Result<Expr> {
    lower(value)
}

/// Parse CQL2-JSON from its textual form.
pub fn parse_cql2_json_str(input: &str) -> Result<Expr> {
    let value: Value = serde_json::from_str(input)?;
    lower(&value)
}

fn lower(value: &Value) -> Result<Expr> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::FilterParse(format!("expected a CQL2-JSON object, got: {value}")))?;
    let op = obj
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::FilterParse("CQL2-JSON node is missing \"op\"".into()))?;
    let args = obj
        .get("args")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::FilterParse(format!("CQL2-JSON op {op:?} is missing \"args\"")))?;

    match op.to_ascii_lowercase().as_str() {
        "and" => Ok(Expr::And(args.iter().map(lower).collect::<Result<_>>()?)),
        "or" => Ok(Expr::Or(args.iter().map(lower).collect::<Result<_>>()?)),
        "not" => {
            let [arg] = args.as_slice() else {
                return Err(arity_error("not", 1, args.len()));
            };
            Ok(Expr::Not(Box::new(lower(arg)?)))
        }
        "=" | "<>" | "!=" | "<" | "<=" | ">" | ">=" => {
            let [left, right] = args.as_slice() else {
                return Err(arity_error(op, 2, args.len()));
            };
            let compare_op = match op {
                "=" => CompareOp::Eq,
                "<>" | "!=" => CompareOp::NotEq,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::LtEq,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::GtEq,
                _ => unreachable!(),
            };
            // The property reference may sit on either side.
            if let Some(column) = property_name(left) {
                Ok(Expr::Compare {
                    column: column.to_string(),
                    op: compare_op,
                    value: literal(right)?,
                })
            } else if let Some(column) = property_name(right) {
                Ok(Expr::Compare {
                    column: column.to_string(),
                    op: compare_op.flip(),
                    value: literal(left)?,
                })
            } else {
                Err(Error::FilterParse(format!(
                    "comparison op {op:?} must reference a property"
                )))
            }
        }
        "like" => {
            let [prop, pattern] = args.as_slice() else {
                return Err(arity_error("like", 2, args.len()));
            };
            let pattern = pattern.as_str().ok_or_else(|| {
                Error::FilterParse("\"like\" pattern must be a string".into())
            })?;
            Ok(Expr::Like {
                column: required_property(prop, "like")?.to_string(),
                pattern: pattern.to_string(),
                negated: false,
            })
        }
        "in" => {
            let [prop, list] = args.as_slice() else {
                return Err(arity_error("in", 2, args.len()));
            };
            let list = list
                .as_array()
                .ok_or_else(|| Error::FilterParse("\"in\" list must be an array".into()))?
                .iter()
                .map(literal)
                .collect::<Result<Vec<_>>>()?;
            Ok(Expr::InList {
                column: required_property(prop, "in")?.to_string(),
                list,
                negated: false,
            })
        }
        "between" => {
            let (prop, low, high) = match args.as_slice() {
                [prop, low, high] => (prop, low.clone(), high.clone()),
                [prop, bounds] => {
                    let bounds = bounds.as_array().filter(|b| b.len() == 2).ok_or_else(|| {
                        Error::FilterParse("\"between\" bounds must be a 2-element array".into())
                    })?;
                    (prop, bounds[0].clone(), bounds[1].clone())
                }
                _ => return Err(arity_error("between", 3, args.len())),
            };
            Ok(Expr::Between {
                column: required_property(prop, "between")?.to_string(),
                low: literal(&low)?,
                high: literal(&high)?,
                negated: false,
            })
        }
        "isnull" => {
            let [prop] = args.as_slice() else {
                return Err(arity_error("isNull", 1, args.len()));
            };
            Ok(Expr::IsNull {
                column: required_property(prop, "isNull")?.to_string(),
                negated: false,
            })
        }
        "s_intersects" => {
            let [prop, geom] = args.as_slice() else {
                return Err(arity_error("s_intersects", 2, args.len()));
            };
            Ok(Expr::Intersects {
                column: required_property(prop, "s_intersects")?.to_string(),
                geometry: geometry(geom)?,
            })
        }
        other => Err(Error::FilterParse(format!(
            "unsupported CQL2-JSON op: {other:?}"
        ))),
    }
}

fn arity_error(op: &str, expected: usize, got: usize) -> Error {
    Error::FilterParse(format!(
        "CQL2-JSON op {op:?} takes {expected} argument(s), got {got}"
    ))
}

fn property_name(value: &Value) -> Option<&str> {
    value.as_object()?.get("property")?.as_str()
}

fn required_property<'a>(value: &'a Value, op: &str) -> Result<&'a str> {
    property_name(value).ok_or_else(|| {
        Error::FilterParse(format!(
            "first argument of {op:?} must be a {{\"property\": ...}} reference"
        ))
    })
}

fn literal(value: &Value) -> Result<Literal> {
    match value {
        Value::String(s) => Ok(Literal::String(s.clone())),
        Value::Bool(b) => Ok(Literal::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Literal::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Literal::Float(f))
            } else {
                Err(Error::FilterParse(format!("invalid numeric literal: {n}")))
            }
        }
        other => Err(Error::FilterParse(format!(
            "unsupported literal in CQL2-JSON filter: {other}"
        ))),
    }
}

fn geometry(value: &Value) -> Result<Geometry<f64>> {
    let gj = geojson::Geometry::from_json_value(value.clone()).map_err(Error::geometry_parse)?;
    Geometry::<f64>::try_from(&gj).map_err(Error::geometry_parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_comparison_with_property_reference() {
        let expr = parse_cql2_json(&json!({
            "op": "=",
            "args": [{"property": "platform"}, "SS02"],
        }))
        .unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                column: "platform".into(),
                op: CompareOp::Eq,
                value: Literal::from("SS02"),
            }
        );
    }

    #[test]
    fn parses_s_intersects_with_geojson_polygon() {
        let expr = parse_cql2_json(&json!({
            "op": "s_intersects",
            "args": [
                {"property": "geometry"},
                {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]],
                },
            ],
        }))
        .unwrap();
        match expr {
            Expr::Intersects { column, geometry } => {
                assert_eq!(column, "geometry");
                assert!(matches!(geometry, Geometry::Polygon(_)));
            }
            other => panic!("expected Intersects, got {other:?}"),
        }
    }

    #[test]
    fn parses_nested_boolean_tree() {
        let expr = parse_cql2_json(&json!({
            "op": "and",
            "args": [
                {"op": "<", "args": [{"property": "eo:cloud_cover"}, 10]},
                {"op": "not", "args": [
                    {"op": "isNull", "args": [{"property": "platform"}]},
                ]},
            ],
        }))
        .unwrap();
        match expr {
            Expr::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], Expr::Not(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn missing_op_is_a_parse_error() {
        let err = parse_cql2_json(&json!({"args": []})).unwrap_err();
        assert!(matches!(err, Error::FilterParse(_)));
    }

    #[test]
    fn parses_from_text_form() {
        let expr = parse_cql2_json_str(
            r#"{"op": "in", "args": [{"property": "platform"}, ["SS02", "SSC1"]]}"#,
        )
        .unwrap();
        assert_eq!(
            expr,
            Expr::InList {
                column: "platform".into(),
                list: vec![Literal::from("SS02"), Literal::from("SSC1")],
                negated: false,
            }
        );
    }
}
