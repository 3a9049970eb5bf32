//! CQL2-text parsing.
//!
//! CQL2-text comparison and boolean syntax is close enough to an SQL `WHERE`
//! clause that parsing is delegated to [`sqlparser`] with a small custom
//! dialect, then lowered into the [`Expr`] AST. The dialect admits `:` inside
//! identifiers so STAC extension columns such as `view:azimuth` or
//! `eo:cloud_cover` can be referenced without quoting.
//!
//! The supported subset: comparisons, `AND`/`OR`/`NOT`, `LIKE`, `IN`,
//! `BETWEEN`, `IS [NOT] NULL`, and `S_INTERSECTS(geometry, '<WKT>')`.

use sqlparser::ast as sql;
use sqlparser::dialect::Dialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use geo::Geometry;
use stacq_result::{Error, Result};
use wkt::TryFromWkt;

use crate::expr::{CompareOp, Expr};
use crate::literal::Literal;

/// SQL dialect for CQL2-text: standard double-quoted delimited identifiers,
/// with `:` accepted as part of a bare identifier.
#[derive(Debug, Default)]
pub struct Cql2Dialect;

impl Dialect for Cql2Dialect {
    fn is_identifier_start(&self, ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn is_identifier_part(&self, ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_' || ch == ':'
    }
}

/// Parse a CQL2-text filter expression into an [`Expr`].
pub fn parse_cql2_text(input: &str) -> Result<Expr> {
    let dialect = Cql2Dialect;
    let mut parser = Parser::new(&dialect)
        .try_with_sql(input)
        .map_err(Error::filter_parse)?;
    let ast = parser.parse_expr().map_err(Error::filter_parse)?;
    if parser.peek_token().token != Token::EOF {
        return Err(Error::FilterParse(format!(
            "unexpected trailing input in filter expression: {input:?}"
        )));
    }
    lower(&ast)
}

fn lower(expr: &sql::Expr) -> Result<Expr> {
    match expr {
        sql::Expr::Nested(inner) => lower(inner),
        sql::Expr::UnaryOp {
            op: sql::UnaryOperator::Not,
            expr,
        } => Ok(Expr::Not(Box::new(lower(expr)?))),
        sql::Expr::BinaryOp { left, op, right } => lower_binary(left, op, right),
        sql::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let column = column_name(expr)?;
            let pattern = match literal(pattern)? {
                Literal::String(s) => s,
                other => {
                    return Err(Error::FilterParse(format!(
                        "LIKE pattern must be a string, got {}",
                        other.kind()
                    )));
                }
            };
            Ok(Expr::Like {
                column,
                pattern,
                negated: *negated,
            })
        }
        sql::Expr::InList {
            expr,
            list,
            negated,
        } => {
            let column = column_name(expr)?;
            let list = list.iter().map(literal).collect::<Result<Vec<_>>>()?;
            Ok(Expr::InList {
                column,
                list,
                negated: *negated,
            })
        }
        sql::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            column: column_name(expr)?,
            low: literal(low)?,
            high: literal(high)?,
            negated: *negated,
        }),
        sql::Expr::IsNull(inner) => Ok(Expr::IsNull {
            column: column_name(inner)?,
            negated: false,
        }),
        sql::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
            column: column_name(inner)?,
            negated: true,
        }),
        sql::Expr::Function(func) => lower_function(func),
        other => Err(Error::FilterParse(format!(
            "unsupported filter expression: {other}"
        ))),
    }
}

fn lower_binary(left: &sql::Expr, op: &sql::BinaryOperator, right: &sql::Expr) -> Result<Expr> {
    use sql::BinaryOperator as B;

    let compare_op = match op {
        B::And => return Ok(Expr::And(vec![lower(left)?, lower(right)?])),
        B::Or => return Ok(Expr::Or(vec![lower(left)?, lower(right)?])),
        B::Eq => CompareOp::Eq,
        B::NotEq => CompareOp::NotEq,
        B::Lt => CompareOp::Lt,
        B::LtEq => CompareOp::LtEq,
        B::Gt => CompareOp::Gt,
        B::GtEq => CompareOp::GtEq,
        other => {
            return Err(Error::FilterParse(format!(
                "unsupported operator in filter expression: {other}"
            )));
        }
    };

    // CQL2 allows the property reference on either side.
    if is_column(left) {
        Ok(Expr::Compare {
            column: column_name(left)?,
            op: compare_op,
            value: literal(right)?,
        })
    } else if is_column(right) {
        Ok(Expr::Compare {
            column: column_name(right)?,
            op: compare_op.flip(),
            value: literal(left)?,
        })
    } else {
        Err(Error::FilterParse(format!(
            "comparison must reference a column: {left} {op} {right}"
        )))
    }
}

fn lower_function(func: &sql::Function) -> Result<Expr> {
    let name = func.name.to_string();
    if !name.eq_ignore_ascii_case("s_intersects") {
        return Err(Error::FilterParse(format!(
            "unsupported function in filter expression: {name}"
        )));
    }

    let args = match &func.args {
        sql::FunctionArguments::List(list) => &list.args,
        _ => {
            return Err(Error::FilterParse(
                "S_INTERSECTS requires an argument list".into(),
            ));
        }
    };
    if args.len() != 2 {
        return Err(Error::FilterParse(format!(
            "S_INTERSECTS takes 2 arguments, got {}",
            args.len()
        )));
    }

    let column = column_name(function_arg(&args[0])?)?;
    let geometry = match literal(function_arg(&args[1])?)? {
        // WKT carried as a quoted string, e.g. 'POLYGON ((...))'.
        Literal::String(wkt_text) => Geometry::<f64>::try_from_wkt_str(&wkt_text)
            .map_err(Error::geometry_parse)?,
        other => {
            return Err(Error::FilterParse(format!(
                "S_INTERSECTS geometry must be a WKT string, got {}",
                other.kind()
            )));
        }
    };

    Ok(Expr::Intersects { column, geometry })
}

fn function_arg(arg: &sql::FunctionArg) -> Result<&sql::Expr> {
    match arg {
        sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(expr)) => Ok(expr),
        other => Err(Error::FilterParse(format!(
            "unsupported function argument: {other}"
        ))),
    }
}

fn is_column(expr: &sql::Expr) -> bool {
    matches!(
        expr,
        sql::Expr::Identifier(_) | sql::Expr::CompoundIdentifier(_)
    )
}

fn column_name(expr: &sql::Expr) -> Result<String> {
    match expr {
        sql::Expr::Identifier(ident) => Ok(ident.value.clone()),
        sql::Expr::CompoundIdentifier(parts) => Ok(parts
            .iter()
            .map(|p| p.value.as_str())
            .collect::<Vec<_>>()
            .join(".")),
        sql::Expr::Nested(inner) => column_name(inner),
        other => Err(Error::FilterParse(format!(
            "expected a column reference, got: {other}"
        ))),
    }
}

fn literal(expr: &sql::Expr) -> Result<Literal> {
    match expr {
        sql::Expr::Value(value) => value_literal(value),
        sql::Expr::Nested(inner) => literal(inner),
        sql::Expr::UnaryOp {
            op: sql::UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Literal::Integer(i) => Ok(Literal::Integer(-i)),
            Literal::Float(f) => Ok(Literal::Float(-f)),
            other => Err(Error::FilterParse(format!(
                "cannot negate a {} literal",
                other.kind()
            ))),
        },
        other => Err(Error::FilterParse(format!(
            "expected a literal value, got: {other}"
        ))),
    }
}

fn value_literal(value: &sql::Value) -> Result<Literal> {
    match value {
        sql::Value::Number(text, _) => {
            if let Ok(i) = text.parse::<i64>() {
                Ok(Literal::Integer(i))
            } else {
                text.parse::<f64>()
                    .map(Literal::Float)
                    .map_err(|_| Error::FilterParse(format!("invalid numeric literal: {text}")))
            }
        }
        sql::Value::SingleQuotedString(s) => Ok(Literal::String(s.clone())),
        sql::Value::Boolean(b) => Ok(Literal::Bool(*b)),
        sql::Value::Null => Err(Error::FilterParse(
            "NULL literals are only valid with IS NULL / IS NOT NULL".into(),
        )),
        other => Err(Error::FilterParse(format!(
            "unsupported literal in filter expression: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_equality() {
        let expr = parse_cql2_text("platform = 'SS02'").unwrap();
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
    fn colon_identifiers_parse_unquoted() {
        let expr = parse_cql2_text("view:azimuth < 200").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                column: "view:azimuth".into(),
                op: CompareOp::Lt,
                value: Literal::Integer(200),
            }
        );
    }

    #[test]
    fn quoted_identifiers_also_accepted() {
        let expr = parse_cql2_text("\"eo:cloud_cover\" <= 10.5").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                column: "eo:cloud_cover".into(),
                op: CompareOp::LtEq,
                value: Literal::Float(10.5),
            }
        );
    }

    #[test]
    fn literal_on_left_flips_operator() {
        let expr = parse_cql2_text("200 > view:azimuth").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                column: "view:azimuth".into(),
                op: CompareOp::Lt,
                value: Literal::Integer(200),
            }
        );
    }

    #[test]
    fn boolean_combinators_nest() {
        let expr = parse_cql2_text("a = 1 AND (b = 2 OR NOT c = 3)").unwrap();
        match expr {
            Expr::And(children) => {
                assert_eq!(children.len(), 2);
                match &children[1] {
                    Expr::Or(branches) => {
                        assert_eq!(branches.len(), 2);
                        assert!(matches!(branches[1], Expr::Not(_)));
                    }
                    other => panic!("expected Or, got {other:?}"),
                }
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn like_in_between_null_forms() {
        assert_eq!(
            parse_cql2_text("id LIKE '%labels'").unwrap(),
            Expr::Like {
                column: "id".into(),
                pattern: "%labels".into(),
                negated: false,
            }
        );
        assert_eq!(
            parse_cql2_text("platform IN ('SS02', 'SSC1')").unwrap(),
            Expr::InList {
                column: "platform".into(),
                list: vec![Literal::from("SS02"), Literal::from("SSC1")],
                negated: false,
            }
        );
        assert_eq!(
            parse_cql2_text("view:azimuth BETWEEN 100 AND 300").unwrap(),
            Expr::Between {
                column: "view:azimuth".into(),
                low: Literal::Integer(100),
                high: Literal::Integer(300),
                negated: false,
            }
        );
        assert_eq!(
            parse_cql2_text("proj:epsg IS NOT NULL").unwrap(),
            Expr::IsNull {
                column: "proj:epsg".into(),
                negated: true,
            }
        );
    }

    #[test]
    fn s_intersects_takes_wkt_string() {
        let expr =
            parse_cql2_text("S_INTERSECTS(geometry, 'POLYGON ((0 0, 2 0, 2 2, 0 2, 0 0))')")
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
    fn malformed_input_is_a_parse_error() {
        assert!(matches!(
            parse_cql2_text("platform = ="),
            Err(Error::FilterParse(_))
        ));
        assert!(matches!(
            parse_cql2_text("platform = 'SS02' garbage"),
            Err(Error::FilterParse(_))
        ));
    }
}
