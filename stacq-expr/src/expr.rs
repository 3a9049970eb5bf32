//! Column-predicate AST shared by the CQL2 text and JSON front ends.

use geo::Geometry;

use crate::literal::Literal;

/// Logical expression over column predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// `column <op> literal` comparison.
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    /// SQL `LIKE` pattern match (`%` and `_` wildcards).
    Like {
        column: String,
        pattern: String,
        negated: bool,
    },
    /// Set membership against a list of literals.
    InList {
        column: String,
        list: Vec<Literal>,
        negated: bool,
    },
    /// Inclusive range membership.
    Between {
        column: String,
        low: Literal,
        high: Literal,
        negated: bool,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    /// Spatial intersection against a fixed geometry (`S_INTERSECTS`).
    Intersects {
        column: String,
        geometry: Geometry<f64>,
    },
}

/// Comparison operators recognized in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// The operator with its operands swapped (`a < b` becomes `b > a`).
    pub fn flip(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::NotEq => CompareOp::NotEq,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        f.write_str(s)
    }
}

impl Expr {
    /// Build an AND of sub-expressions, collapsing the trivial cases.
    pub fn all_of(mut exprs: Vec<Expr>) -> Expr {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::And(exprs)
        }
    }

    /// Columns referenced by this expression, in first-appearance order
    /// without duplicates.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        let mut push = |c: &'a str| {
            if !out.contains(&c) {
                out.push(c);
            }
        };
        match self {
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
            Expr::Not(inner) => inner.collect_columns(out),
            Expr::Compare { column, .. }
            | Expr::Like { column, .. }
            | Expr::InList { column, .. }
            | Expr::Between { column, .. }
            | Expr::IsNull { column, .. }
            | Expr::Intersects { column, .. } => push(column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_columns_deduplicated_in_order() {
        let expr = Expr::And(vec![
            Expr::Compare {
                column: "platform".into(),
                op: CompareOp::Eq,
                value: Literal::from("SS02"),
            },
            Expr::Or(vec![
                Expr::Compare {
                    column: "view:azimuth".into(),
                    op: CompareOp::Lt,
                    value: Literal::from(200),
                },
                Expr::IsNull {
                    column: "platform".into(),
                    negated: false,
                },
            ]),
        ]);
        assert_eq!(expr.referenced_columns(), vec!["platform", "view:azimuth"]);
    }

    #[test]
    fn all_of_unwraps_single_expression() {
        let pred = Expr::IsNull {
            column: "a".into(),
            negated: true,
        };
        assert_eq!(Expr::all_of(vec![pred.clone()]), pred);
        match Expr::all_of(vec![pred.clone(), pred]) {
            Expr::And(v) => assert_eq!(v.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }
}
