//! Key-range predicates and their lexicographic expansion.
//!
//! Column-wise independent inequalities do not express tuple order:
//! `(a, b) >= (1, 5)` is not `a >= 1 AND b >= 5`. The expansion is
//! recursive over the key columns instead:
//!
//! ```text
//! GE(b1..bm) = k1 > b1 OR (k1 = b1 AND GE(b2..bm)),   last column: km >= bm
//! LT(b1..bm) = k1 < b1 OR (k1 = b1 AND LT(b2..bm)),   last column: km <  bm
//! ```

use std::cmp::Ordering;

use serde::Serialize;

use super::expr::{CompareOp, Expr};
use super::key::KeyTuple;
use crate::error::Result;

/// Key range owned by one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePredicate {
    /// Whole table (single-partition plans only).
    None,
    /// Keys strictly below the bound.
    Lt(KeyTuple),
    /// Keys at or above the bound.
    Ge(KeyTuple),
    /// `lower <= key < upper`.
    Between { lower: KeyTuple, upper: KeyTuple },
}

impl RangePredicate {
    /// Inclusive lower bound, if any.
    pub fn lower(&self) -> Option<&KeyTuple> {
        match self {
            RangePredicate::Ge(lower) | RangePredicate::Between { lower, .. } => Some(lower),
            _ => None,
        }
    }

    /// Exclusive upper bound, if any.
    pub fn upper(&self) -> Option<&KeyTuple> {
        match self {
            RangePredicate::Lt(upper) | RangePredicate::Between { upper, .. } => Some(upper),
            _ => None,
        }
    }

    /// Whether `key` falls in this range, by direct tuple comparison.
    pub fn contains(&self, key: &KeyTuple) -> Result<bool> {
        if let Some(lower) = self.lower() {
            if key.compare(lower)? == Ordering::Less {
                return Ok(false);
            }
        }
        if let Some(upper) = self.upper() {
            if key.compare(upper)? != Ordering::Less {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Expand into a logical expression tree over the key columns.
    pub fn to_expr(&self) -> Expr {
        match self {
            RangePredicate::None => Expr::True,
            RangePredicate::Lt(upper) => lt_expr(upper),
            RangePredicate::Ge(lower) => ge_expr(lower),
            RangePredicate::Between { lower, upper } => {
                Expr::and(vec![ge_expr(lower), lt_expr(upper)])
            }
        }
    }
}

/// `key >= bound`, lexicographically.
pub fn ge_expr(bound: &KeyTuple) -> Expr {
    expand(bound, 0, CompareOp::Gt, CompareOp::Ge)
}

/// `key < bound`, lexicographically.
pub fn lt_expr(bound: &KeyTuple) -> Expr {
    expand(bound, 0, CompareOp::Lt, CompareOp::Lt)
}

/// `strict` applies to every column but the last, `last` to the final one.
fn expand(bound: &KeyTuple, idx: usize, strict: CompareOp, last: CompareOp) -> Expr {
    let column = &bound.schema().columns()[idx].name;
    let value = bound.values()[idx].clone();

    if idx + 1 == bound.values().len() {
        return Expr::compare(column.as_str(), last, value);
    }

    Expr::or(vec![
        Expr::compare(column.as_str(), strict, value.clone()),
        Expr::and(vec![
            Expr::compare(column.as_str(), CompareOp::Eq, value),
            expand(bound, idx + 1, strict, last),
        ]),
    ])
}
