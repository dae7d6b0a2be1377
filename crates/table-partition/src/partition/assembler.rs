//! Combines key ranges with the caller's base filter.

use serde::Serialize;
use tracing::debug;

use crate::core::expr::Expr;
use crate::core::identifier::validate_base_filter;
use crate::core::key::KeyTuple;
use crate::core::range::RangePredicate;
use crate::dialect::Dialect;
use crate::error::{PartitionError, Result};

/// One partition of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    /// 0-based partition index.
    pub index: usize,
    pub range: RangePredicate,
    /// Filter applied when reading the source table.
    pub source_filter: Expr,
    /// Filter applied when reading the target table.
    pub target_filter: Expr,
}

impl Partition {
    /// Render the source filter with the source side's dialect.
    pub fn render_source(&self, dialect: &dyn Dialect) -> Result<String> {
        dialect.render(&self.source_filter)
    }

    /// Render the target filter with the target side's dialect.
    pub fn render_target(&self, dialect: &dyn Dialect) -> Result<String> {
        dialect.render(&self.target_filter)
    }
}

/// Parse a configured base filter into an opaque expression.
pub fn base_filter(text: Option<&str>) -> Result<Option<Expr>> {
    match text {
        None => Ok(None),
        Some(t) => {
            validate_base_filter(t)?;
            Ok(Some(Expr::Raw(t.trim().to_string())))
        }
    }
}

/// AND-merge the base filter into every range.
pub fn assemble(ranges: Vec<RangePredicate>, base: Option<&Expr>) -> Vec<Partition> {
    ranges
        .into_iter()
        .enumerate()
        .map(|(index, range)| {
            let filter = match base {
                Some(b) => Expr::and(vec![b.clone(), range.to_expr()]),
                None => range.to_expr(),
            };
            debug!("Partition {}: {:?}", index, range);
            Partition {
                index,
                range,
                source_filter: filter.clone(),
                target_filter: filter,
            }
        })
        .collect()
}

/// Assert that every row falls in exactly one partition's key range.
///
/// Only the range part is evaluated; the base filter is opaque and applies
/// identically to all partitions.
pub fn check_coverage(partitions: &[Partition], rows: &[KeyTuple]) -> Result<()> {
    let exprs: Vec<Expr> = partitions.iter().map(|p| p.range.to_expr()).collect();
    for row in rows {
        let mut matches = 0;
        for expr in &exprs {
            if expr.evaluate(row)? {
                matches += 1;
            }
        }
        if matches != 1 {
            return Err(PartitionError::CoverageViolation {
                row: row.to_string(),
                matches,
            });
        }
    }
    debug!(
        "Coverage check passed: {} rows across {} partitions",
        rows.len(),
        partitions.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::{KeyColumn, KeySchema, KeyType};
    use crate::dialect::{MssqlDialect, PostgresDialect};
    use crate::partition::boundary::select_boundaries;
    use crate::partition::builder::build_ranges;

    fn schema2() -> KeySchema {
        KeySchema::new(vec![
            KeyColumn::new("region", KeyType::String, KeyType::ALL).unwrap(),
            KeyColumn::new("id", KeyType::Integer, KeyType::ALL).unwrap(),
        ])
        .unwrap()
    }

    fn composite_rows() -> Vec<KeyTuple> {
        let schema = schema2();
        let mut rows = Vec::new();
        for region in ["east", "north", "south", "west"] {
            for id in 1..=6 {
                rows.push(KeyTuple::new(schema.clone(), vec![region.into(), id.into()]).unwrap());
            }
        }
        rows
    }

    fn int_rows(keys: impl IntoIterator<Item = i64>) -> Vec<KeyTuple> {
        let schema =
            KeySchema::new(vec![KeyColumn::new("key", KeyType::Integer, KeyType::ALL).unwrap()])
                .unwrap();
        keys.into_iter()
            .map(|k| KeyTuple::new(schema.clone(), vec![k.into()]).unwrap())
            .collect()
    }

    #[test]
    fn test_rendered_filters_for_ten_rows() {
        let rows = int_rows(1..=10);
        let ranges = build_ranges(&select_boundaries(&rows, 3).unwrap()).unwrap();
        let partitions = assemble(ranges, None);
        let pg = PostgresDialect::new();

        let rendered: Vec<String> = partitions
            .iter()
            .map(|p| p.render_source(&pg).unwrap())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "\"key\" < 4",
                "\"key\" >= 4 AND \"key\" < 7",
                "\"key\" >= 7"
            ]
        );
    }

    #[test]
    fn test_base_filter_is_and_merged_and_parenthesized() {
        let rows = int_rows(1..=10);
        let ranges = build_ranges(&select_boundaries(&rows, 2).unwrap()).unwrap();
        let base = base_filter(Some("status <> 'void'")).unwrap();
        let partitions = assemble(ranges, base.as_ref());

        let pg = PostgresDialect::new();
        let mssql = MssqlDialect::new();
        assert_eq!(
            partitions[0].render_source(&pg).unwrap(),
            "(status <> 'void') AND \"key\" < 6"
        );
        assert_eq!(
            partitions[1].render_target(&mssql).unwrap(),
            "(status <> 'void') AND [key] >= 6"
        );
    }

    #[test]
    fn test_single_partition_with_and_without_base_filter() {
        let rows = int_rows(1..=3);
        let pg = PostgresDialect::new();

        let ranges = build_ranges(&select_boundaries(&rows, 1).unwrap()).unwrap();
        let plain = assemble(ranges.clone(), None);
        assert_eq!(plain[0].source_filter, Expr::True);
        assert_eq!(plain[0].render_source(&pg).unwrap(), "1 = 1");

        let base = base_filter(Some("amount > 0")).unwrap();
        let filtered = assemble(ranges, base.as_ref());
        assert_eq!(filtered[0].render_source(&pg).unwrap(), "amount > 0");
    }

    #[test]
    fn test_base_filter_rejects_injection() {
        assert!(base_filter(Some("1=1; DROP TABLE x")).is_err());
        assert!(base_filter(None).unwrap().is_none());
    }

    #[test]
    fn test_coverage_holds_for_composite_keys_for_all_n() {
        let rows = composite_rows();
        for n in 1..=rows.len() {
            let ranges = build_ranges(&select_boundaries(&rows, n).unwrap()).unwrap();
            let partitions = assemble(ranges, None);
            check_coverage(&partitions, &rows).unwrap();

            // Brute-force reference: partition of row at position p is the
            // last boundary position <= p
            for (p, row) in rows.iter().enumerate() {
                let expected = (0..n)
                    .rev()
                    .find(|k| (k * rows.len()) / n <= p)
                    .unwrap();
                let hit: Vec<usize> = partitions
                    .iter()
                    .filter(|part| part.range.contains(row).unwrap())
                    .map(|part| part.index)
                    .collect();
                assert_eq!(hit, vec![expected], "N={} row={}", n, row);
            }
        }
    }

    #[test]
    fn test_coverage_violation_is_reported() {
        let rows = int_rows(1..=10);
        let ranges = build_ranges(&select_boundaries(&rows, 3).unwrap()).unwrap();
        let mut partitions = assemble(ranges, None);
        // Drop the middle partition so rows 4..=6 match nothing
        partitions.remove(1);

        match check_coverage(&partitions, &rows).unwrap_err() {
            PartitionError::CoverageViolation { row, matches } => {
                assert_eq!(row, "(4)");
                assert_eq!(matches, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
