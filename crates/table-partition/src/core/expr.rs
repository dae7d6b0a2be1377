//! Dialect-independent logical filter expressions.
//!
//! Partition filters are built as [`Expr`] trees and only turned into SQL
//! text by a [`Dialect`](crate::dialect::Dialect), so the same plan can be
//! rendered for any supported database.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use super::key::{KeyTuple, KeyValue};
use crate::error::{PartitionError, Result};

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// SQL operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Whether `ordering` (of left vs right operand) satisfies this operator.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Logical filter expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Always true.
    True,
    /// Always false.
    False,
    /// `column <op> value`.
    Compare {
        column: String,
        op: CompareOp,
        value: KeyValue,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    /// Caller-supplied filter text, passed through to the renderer unchanged.
    Raw(String),
}

impl Expr {
    /// Leaf comparison.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: KeyValue) -> Self {
        Expr::Compare {
            column: column.into(),
            op,
            value,
        }
    }

    /// Conjunction, dropping always-true operands; any always-false operand
    /// makes the whole thing false.
    pub fn and(parts: Vec<Expr>) -> Self {
        if parts.iter().any(Expr::is_false) {
            return Expr::False;
        }
        let mut parts: Vec<Expr> = parts.into_iter().filter(|p| !p.is_true()).collect();
        match parts.len() {
            0 => Expr::True,
            1 => parts.remove(0),
            _ => Expr::And(parts),
        }
    }

    /// Disjunction, dropping always-false operands; any always-true operand
    /// makes the whole thing true. An empty disjunction matches nothing.
    pub fn or(parts: Vec<Expr>) -> Self {
        if parts.iter().any(Expr::is_true) {
            return Expr::True;
        }
        let mut parts: Vec<Expr> = parts.into_iter().filter(|p| !p.is_false()).collect();
        match parts.len() {
            0 => Expr::False,
            1 => parts.remove(0),
            _ => Expr::Or(parts),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Expr::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Expr::False)
    }

    /// Evaluate against a key tuple.
    ///
    /// `Raw` filters are opaque and cannot be evaluated in memory.
    pub fn evaluate(&self, row: &KeyTuple) -> Result<bool> {
        match self {
            Expr::True => Ok(true),
            Expr::False => Ok(false),
            Expr::Compare { column, op, value } => {
                let actual = row.get(column).ok_or_else(|| {
                    PartitionError::Evaluate(format!("column '{}' is not part of the key", column))
                })?;
                if actual.key_type() != value.key_type() {
                    return Err(PartitionError::mismatch(
                        format!("{} {}", column, actual.key_type()),
                        format!("{} {}", column, value.key_type()),
                    ));
                }
                Ok(op.accepts(actual.cmp(value)))
            }
            Expr::And(parts) => {
                for part in parts {
                    if !part.evaluate(row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or(parts) => {
                for part in parts {
                    if part.evaluate(row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Raw(text) => Err(PartitionError::Evaluate(format!(
                "raw filter '{}' can only be evaluated by the database",
                text
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::{KeyColumn, KeySchema, KeyType};

    fn id_row(id: i64) -> KeyTuple {
        let schema =
            KeySchema::new(vec![KeyColumn::new("id", KeyType::Integer, KeyType::ALL).unwrap()])
                .unwrap();
        KeyTuple::new(schema, vec![id.into()]).unwrap()
    }

    #[test]
    fn test_and_drops_true_operands() {
        let leaf = Expr::compare("id", CompareOp::Lt, 4.into());
        assert_eq!(Expr::and(vec![Expr::True, leaf.clone()]), leaf);
        assert_eq!(Expr::and(vec![Expr::True]), Expr::True);
    }

    #[test]
    fn test_or_with_true_is_true() {
        let leaf = Expr::compare("id", CompareOp::Lt, 4.into());
        assert_eq!(Expr::or(vec![leaf, Expr::True]), Expr::True);
    }

    #[test]
    fn test_empty_or_matches_nothing() {
        let empty = Expr::or(vec![]);
        assert_eq!(empty, Expr::False);
        assert!(!empty.evaluate(&id_row(1)).unwrap());

        let leaf = Expr::compare("id", CompareOp::Lt, 4.into());
        assert_eq!(Expr::or(vec![Expr::False, leaf.clone()]), leaf);
        assert_eq!(Expr::and(vec![leaf, Expr::False]), Expr::False);
    }

    #[test]
    fn test_evaluate_compare_ops() {
        let row = id_row(4);
        let check = |op, v: i64| Expr::compare("id", op, v.into()).evaluate(&row).unwrap();
        assert!(check(CompareOp::Eq, 4));
        assert!(check(CompareOp::Ge, 4));
        assert!(!check(CompareOp::Gt, 4));
        assert!(check(CompareOp::Lt, 5));
        assert!(check(CompareOp::Le, 4));
    }

    #[test]
    fn test_evaluate_unknown_column_and_raw_fail() {
        let row = id_row(1);
        assert!(Expr::compare("other", CompareOp::Eq, 1.into())
            .evaluate(&row)
            .is_err());
        assert!(Expr::Raw("x > 1".into()).evaluate(&row).is_err());
    }

    #[test]
    fn test_evaluate_type_mismatch() {
        let row = id_row(1);
        let err = Expr::compare("id", CompareOp::Eq, "1".into())
            .evaluate(&row)
            .unwrap_err();
        assert!(matches!(err, PartitionError::SchemaMismatch { .. }));
    }
}
