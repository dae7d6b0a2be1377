//! End-to-end partition generation.

use serde::Serialize;
use tracing::{info, warn};

use crate::core::expr::Expr;
use crate::core::key::KeySchema;
use crate::error::{PartitionError, Result};
use crate::source::{BoundarySource, TableRef};

use super::assembler::{assemble, check_coverage, Partition};
use super::boundary::{boundaries_from_keys, Boundary};
use super::builder::build_ranges;

/// What to partition.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub source_table: TableRef,
    pub target_table: TableRef,
    /// Table boundaries are sampled from (one of the two above).
    pub sample_table: TableRef,
    pub key_schema: KeySchema,
    pub base_filter: Option<Expr>,
    /// Verify in memory that every row lands in exactly one partition.
    pub check_coverage: bool,
}

/// A generated partition plan.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionPlan {
    pub source_table: TableRef,
    pub target_table: TableRef,
    pub key_columns: Vec<String>,
    pub row_count: u64,
    pub boundaries: Vec<Boundary>,
    pub partitions: Vec<Partition>,
}

impl PartitionPlan {
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

/// Generate N partitions for `request`, sampling boundaries from `source`.
///
/// Boundaries are chosen over the whole table; the base filter is applied
/// identically to every partition and does not influence them.
pub async fn generate_partitions(
    source: &dyn BoundarySource,
    request: &PlanRequest,
    n: usize,
) -> Result<PartitionPlan> {
    if n == 0 {
        return Err(PartitionError::InvalidPartitionCount(n));
    }

    let table = &request.sample_table;
    let row_count = source.row_count(table).await?;
    if row_count < n as u64 {
        return Err(PartitionError::InsufficientRows {
            requested: n,
            row_count,
        });
    }

    let keys = source
        .fetch_boundaries(table, &request.key_schema, n)
        .await?;
    if keys.len() != n {
        // Rows deleted between counting and sampling
        return Err(PartitionError::InsufficientRows {
            requested: n,
            row_count: keys.len() as u64,
        });
    }

    let boundaries = boundaries_from_keys(keys)?;
    let ranges = build_ranges(&boundaries)?;
    let partitions = assemble(ranges, request.base_filter.as_ref());

    if request.check_coverage {
        match source.snapshot(table) {
            Some(rows) => check_coverage(&partitions, &rows)?,
            None => warn!(
                "Coverage check requested but the {} source cannot provide rows; skipping",
                source.db_type()
            ),
        }
    }

    info!(
        "Generated {} partitions for {} ({} rows, key {})",
        partitions.len(),
        table,
        row_count,
        request.key_schema
    );

    Ok(PartitionPlan {
        source_table: request.source_table.clone(),
        target_table: request.target_table.clone(),
        key_columns: request.key_schema.names(),
        row_count,
        boundaries,
        partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::{KeyColumn, KeyTuple, KeyType};
    use crate::core::range::RangePredicate;
    use crate::dialect::{Dialect, MssqlDialect, PostgresDialect};
    use crate::partition::assembler::base_filter;
    use crate::source::MemorySource;
    use async_trait::async_trait;

    fn key_schema() -> KeySchema {
        KeySchema::new(vec![KeyColumn::new("key", KeyType::Integer, KeyType::ALL).unwrap()])
            .unwrap()
    }

    fn request(schema: KeySchema) -> PlanRequest {
        PlanRequest {
            source_table: TableRef::new("dbo", "orders"),
            target_table: TableRef::new("public", "orders"),
            sample_table: TableRef::new("dbo", "orders"),
            key_schema: schema,
            base_filter: None,
            check_coverage: true,
        }
    }

    fn ten_rows() -> MemorySource {
        let schema = key_schema();
        let rows = (1..=10)
            .map(|k| KeyTuple::new(schema.clone(), vec![k.into()]).unwrap())
            .collect();
        MemorySource::new(schema, rows).unwrap()
    }

    #[tokio::test]
    async fn test_generate_ten_rows_three_partitions() {
        let source = ten_rows();
        let plan = generate_partitions(&source, &request(key_schema()), 3)
            .await
            .unwrap();

        assert_eq!(plan.partition_count(), 3);
        assert_eq!(plan.row_count, 10);
        assert_eq!(plan.key_columns, vec!["key"]);

        let pg = PostgresDialect::new();
        let mssql = MssqlDialect::new();
        let rendered: Vec<(String, String)> = plan
            .partitions
            .iter()
            .map(|p| {
                (
                    p.render_source(&mssql).unwrap(),
                    p.render_target(&pg).unwrap(),
                )
            })
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("[key] < 4".to_string(), "\"key\" < 4".to_string()),
                (
                    "[key] >= 4 AND [key] < 7".to_string(),
                    "\"key\" >= 4 AND \"key\" < 7".to_string()
                ),
                ("[key] >= 7".to_string(), "\"key\" >= 7".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_partition_is_unbounded() {
        let source = ten_rows();
        let mut req = request(key_schema());
        req.base_filter = base_filter(Some("status = 'open'")).unwrap();
        let plan = generate_partitions(&source, &req, 1).await.unwrap();

        assert_eq!(plan.boundaries.len(), 1);
        assert_eq!(plan.partitions[0].range, RangePredicate::None);
        assert_eq!(
            PostgresDialect::new()
                .render(&plan.partitions[0].source_filter)
                .unwrap(),
            "status = 'open'"
        );
    }

    #[tokio::test]
    async fn test_too_many_partitions() {
        let source = ten_rows();
        let err = generate_partitions(&source, &request(key_schema()), 11)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PartitionError::InsufficientRows {
                requested: 11,
                row_count: 10
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_partitions() {
        let source = ten_rows();
        let err = generate_partitions(&source, &request(key_schema()), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PartitionError::InvalidPartitionCount(0)));
    }

    /// Reports more rows than it can return boundaries for.
    struct ShrinkingSource(MemorySource);

    #[async_trait]
    impl BoundarySource for ShrinkingSource {
        async fn row_count(&self, _table: &TableRef) -> Result<u64> {
            Ok(100)
        }

        async fn fetch_boundaries(
            &self,
            table: &TableRef,
            schema: &KeySchema,
            _n: usize,
        ) -> Result<Vec<KeyTuple>> {
            self.0.fetch_boundaries(table, schema, 2).await
        }

        fn db_type(&self) -> &str {
            "shrinking"
        }
    }

    #[tokio::test]
    async fn test_short_boundary_fetch_is_insufficient_rows() {
        let source = ShrinkingSource(ten_rows());
        let err = generate_partitions(&source, &request(key_schema()), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PartitionError::InsufficientRows {
                requested: 5,
                row_count: 2
            }
        ));
    }

    /// Returns string boundaries in a case-insensitive collation order.
    struct CollatedSource;

    #[async_trait]
    impl BoundarySource for CollatedSource {
        async fn row_count(&self, _table: &TableRef) -> Result<u64> {
            Ok(6)
        }

        async fn fetch_boundaries(
            &self,
            _table: &TableRef,
            schema: &KeySchema,
            _n: usize,
        ) -> Result<Vec<KeyTuple>> {
            ["apple", "Banana", "cherry"]
                .into_iter()
                .map(|k| KeyTuple::new(schema.clone(), vec![k.into()]))
                .collect()
        }

        fn db_type(&self) -> &str {
            "collated"
        }
    }

    #[tokio::test]
    async fn test_database_collation_order_is_trusted() {
        let schema =
            KeySchema::new(vec![KeyColumn::new("name", KeyType::String, KeyType::ALL).unwrap()])
                .unwrap();
        let plan = generate_partitions(&CollatedSource, &request(schema), 3)
            .await
            .unwrap();

        assert_eq!(plan.partition_count(), 3);
        assert_eq!(
            plan.partitions[1]
                .render_target(&PostgresDialect::new())
                .unwrap(),
            "\"name\" >= 'Banana' AND \"name\" < 'cherry'"
        );
    }

    #[tokio::test]
    async fn test_duplicate_key_rows_still_cover() {
        let schema = key_schema();
        let rows = [1, 2, 2, 2, 2, 2, 3, 4]
            .into_iter()
            .map(|k: i64| KeyTuple::new(schema.clone(), vec![k.into()]).unwrap())
            .collect();
        let source = MemorySource::new(schema.clone(), rows).unwrap();

        let plan = generate_partitions(&source, &request(schema), 4)
            .await
            .unwrap();
        assert_eq!(plan.partition_count(), 4);
    }
}
